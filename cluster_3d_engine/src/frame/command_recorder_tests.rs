//! Unit tests for command_recorder.rs

use std::sync::{Arc, Mutex};
use crate::error::Error;
use crate::graphics_device::{RenderContext, BufferUsage, MemoryResidency};
use crate::graphics_device::mock_graphics_device::{
    MockGraphicsDevice, SharedMockState, mock_command_list,
};
use crate::resource::GpuResourceAllocator;
use crate::frame::{CommandRecorder, FrameSlot};

fn create_recorder() -> (CommandRecorder, GpuResourceAllocator, SharedMockState) {
    let device = MockGraphicsDevice::new();
    let state = device.state();
    let context = RenderContext::new(Arc::new(Mutex::new(device)));
    let recorder = CommandRecorder::new(context.clone()).unwrap();
    (recorder, GpuResourceAllocator::new(context), state)
}

// ============================================================================
// ONE-SHOT REGION
// ============================================================================

#[test]
fn test_immediate_copy_completes_before_return() {
    let (mut recorder, mut allocator, state) = create_recorder();
    let src = allocator.create_buffer(8, BufferUsage::Staging, MemoryResidency::CpuToGpu).unwrap();
    let dst = allocator.create_buffer(8, BufferUsage::Geometry, MemoryResidency::GpuOnly).unwrap();
    src.buffer().update(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    recorder
        .record_immediate(|cmd| cmd.copy_buffer(src.buffer(), dst.buffer(), 8))
        .unwrap();

    let bytes = allocator.context().device().unwrap().read_buffer(dst.buffer()).unwrap();
    assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    let state = state.lock().unwrap();
    assert_eq!(state.submissions.len(), 1);
    assert_eq!(state.copies_executed, 1);
    assert_eq!(recorder.immediate_submits(), 1);
}

#[test]
fn test_immediate_returns_closure_value() {
    let (mut recorder, _allocator, _state) = create_recorder();
    let value = recorder.record_immediate(|_cmd| Ok(42)).unwrap();
    assert_eq!(value, 42);
}

#[test]
fn test_immediate_fence_is_reusable() {
    let (mut recorder, _allocator, state) = create_recorder();
    for _ in 0..3 {
        recorder.record_immediate(|_cmd| Ok(())).unwrap();
    }
    let state = state.lock().unwrap();
    assert_eq!(state.submissions.len(), 3);
    let fence = state.submissions[0].fence.unwrap();
    assert!(state.submissions.iter().all(|s| s.fence == Some(fence)));
    assert!(!state.is_fence_signaled(fence));
}

#[test]
fn test_failed_recording_is_still_submitted_then_propagated() {
    let (mut recorder, _allocator, state) = create_recorder();

    let result: crate::error::Result<()> = recorder.record_immediate(|_cmd| {
        Err(Error::InvalidResource("recording gave up".to_string()))
    });

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    let state = state.lock().unwrap();
    assert_eq!(state.submissions.len(), 1);
    let fence = state.submissions[0].fence.unwrap();
    assert!(!state.is_fence_signaled(fence));
}

#[test]
fn test_failed_copy_keeps_recorder_usable() {
    let (mut recorder, mut allocator, state) = create_recorder();
    let src = allocator.create_buffer(4, BufferUsage::Staging, MemoryResidency::CpuToGpu).unwrap();
    let dst = allocator.create_buffer(4, BufferUsage::Geometry, MemoryResidency::GpuOnly).unwrap();

    // Larger than both buffers
    let result = recorder.record_immediate(|cmd| cmd.copy_buffer(src.buffer(), dst.buffer(), 64));
    assert!(result.is_err());

    recorder
        .record_immediate(|cmd| cmd.copy_buffer(src.buffer(), dst.buffer(), 4))
        .unwrap();
    assert_eq!(state.lock().unwrap().submissions.len(), 2);
}

#[test]
fn test_submit_failure_is_reported() {
    let (mut recorder, _allocator, state) = create_recorder();
    state.lock().unwrap().fail_next_submit = true;
    assert!(recorder.record_immediate(|_cmd| Ok(())).is_err());
    assert_eq!(recorder.immediate_submits(), 0);
}

// ============================================================================
// FRAME LISTS
// ============================================================================

#[test]
fn test_frame_lists_are_independent() {
    let (mut recorder, _allocator, _state) = create_recorder();
    let first = FrameSlot::FIRST;

    recorder.frame_list_mut(first).begin().unwrap();
    assert!(recorder.frame_list(first).is_recording());
    assert!(!recorder.frame_list(first.next()).is_recording());
}

#[test]
fn test_reset_frame_clears_list() {
    let (mut recorder, _allocator, _state) = create_recorder();
    let slot = FrameSlot::FIRST;
    recorder.frame_list_mut(slot).begin().unwrap();
    recorder.frame_list_mut(slot).end().unwrap();

    recorder.reset_frame(slot).unwrap();

    let list = mock_command_list(recorder.frame_list(slot));
    assert!(list.commands.is_empty());
    assert_eq!(list.resets, 1);
}

#[test]
fn test_drop_destroys_fence() {
    let (recorder, _allocator, state) = create_recorder();
    assert_eq!(state.lock().unwrap().fences.len(), 1);
    drop(recorder);
    assert!(state.lock().unwrap().fences.is_empty());
}
