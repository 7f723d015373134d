//! Unit tests for frame_sync.rs

use std::sync::{Arc, Mutex};
use crate::graphics_device::RenderContext;
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, SharedMockState};
use crate::frame::{FrameSlot, FrameSyncManager, FRAMES_IN_FLIGHT};

fn create_context() -> (RenderContext, SharedMockState) {
    let device = MockGraphicsDevice::new();
    let state = device.state();
    (RenderContext::new(Arc::new(Mutex::new(device))), state)
}

// ============================================================================
// FRAME SLOT
// ============================================================================

#[test]
fn test_slot_wraps_around() {
    let last = FrameSlot::new(FRAMES_IN_FLIGHT - 1).unwrap();
    assert_eq!(last.next(), FrameSlot::FIRST);
    assert_eq!(FrameSlot::FIRST.next().index(), 1);
}

#[test]
fn test_slot_out_of_range() {
    assert!(FrameSlot::new(FRAMES_IN_FLIGHT).is_none());
}

#[test]
fn test_all_slots_in_order() {
    let indices: Vec<usize> = FrameSlot::all().map(FrameSlot::index).collect();
    assert_eq!(indices, (0..FRAMES_IN_FLIGHT).collect::<Vec<_>>());
}

// ============================================================================
// SYNC OBJECTS
// ============================================================================

#[test]
fn test_first_fence_unsignaled_others_signaled() {
    let (context, state) = create_context();
    let sync = FrameSyncManager::new(context).unwrap();

    let state = state.lock().unwrap();
    assert!(!state.is_fence_signaled(sync.fence(FrameSlot::FIRST)));
    for slot in FrameSlot::all().skip(1) {
        assert!(state.is_fence_signaled(sync.fence(slot)));
    }
}

#[test]
fn test_handles_are_distinct_per_slot() {
    let (context, _state) = create_context();
    let sync = FrameSyncManager::new(context).unwrap();

    let a = FrameSlot::FIRST;
    let b = a.next();
    assert_ne!(sync.acquire_semaphore(a), sync.acquire_semaphore(b));
    assert_ne!(sync.present_semaphore(a), sync.present_semaphore(b));
    assert_ne!(sync.acquire_semaphore(a), sync.present_semaphore(a));
    assert_ne!(sync.fence(a), sync.fence(b));
}

#[test]
fn test_wait_on_unsignaled_fence_is_an_error() {
    let (context, _state) = create_context();
    let sync = FrameSyncManager::new(context).unwrap();
    assert!(sync.wait(FrameSlot::FIRST).is_err());
    assert!(sync.wait(FrameSlot::FIRST.next()).is_ok());
}

#[test]
fn test_reset_unsignals_fence() {
    let (context, state) = create_context();
    let sync = FrameSyncManager::new(context).unwrap();
    let slot = FrameSlot::FIRST.next();

    sync.reset(slot).unwrap();
    assert!(!state.lock().unwrap().is_fence_signaled(sync.fence(slot)));
}

#[test]
fn test_replace_acquire_semaphore() {
    let (context, state) = create_context();
    let mut sync = FrameSyncManager::new(context).unwrap();
    let old = sync.acquire_semaphore(FrameSlot::FIRST);

    sync.replace_acquire_semaphore(FrameSlot::FIRST).unwrap();

    let fresh = sync.acquire_semaphore(FrameSlot::FIRST);
    assert_ne!(old, fresh);
    let state = state.lock().unwrap();
    assert!(!state.semaphores.contains_key(&old.0));
    assert!(!state.is_semaphore_signaled(fresh));
    assert_eq!(state.semaphores_destroyed, 1);
    assert_eq!(state.wait_idle_calls, 1);
}

#[test]
fn test_drop_destroys_everything() {
    let (context, state) = create_context();
    let sync = FrameSyncManager::new(context).unwrap();
    {
        let state = state.lock().unwrap();
        assert_eq!(state.semaphores.len(), FRAMES_IN_FLIGHT * 2);
        assert_eq!(state.fences.len(), FRAMES_IN_FLIGHT);
    }

    drop(sync);

    let state = state.lock().unwrap();
    assert!(state.semaphores.is_empty());
    assert!(state.fences.is_empty());
}
