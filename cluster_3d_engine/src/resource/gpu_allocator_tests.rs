//! Unit tests for gpu_allocator.rs

use std::sync::{Arc, Mutex};
use crate::error::Error;
use crate::graphics_device::{
    RenderContext, BufferUsage, MemoryResidency, TextureDesc, TextureFormat, TextureUsage,
};
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, SharedMockState};
use crate::resource::{GpuResourceAllocator, AllocatorStats};

fn create_allocator() -> (GpuResourceAllocator, SharedMockState) {
    let device = MockGraphicsDevice::new();
    let state = device.state();
    let context = RenderContext::new(Arc::new(Mutex::new(device)));
    (GpuResourceAllocator::new(context), state)
}

// ============================================================================
// BUFFERS
// ============================================================================

#[test]
fn test_geometry_buffer_gets_device_address() {
    let (mut allocator, _state) = create_allocator();
    let buffer = allocator
        .create_buffer(256, BufferUsage::Geometry, MemoryResidency::GpuOnly)
        .unwrap();
    assert_ne!(buffer.device_address(), 0);
    assert_eq!(buffer.size(), 256);
    assert_eq!(buffer.usage(), BufferUsage::Geometry);
}

#[test]
fn test_staging_buffer_has_no_device_address() {
    let (mut allocator, _state) = create_allocator();
    let buffer = allocator
        .create_buffer(64, BufferUsage::Staging, MemoryResidency::CpuToGpu)
        .unwrap();
    assert_eq!(buffer.device_address(), 0);
}

#[test]
fn test_zero_size_buffer_rejected_without_allocation() {
    let (mut allocator, state) = create_allocator();
    let result = allocator.create_buffer(0, BufferUsage::Light, MemoryResidency::GpuOnly);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(state.lock().unwrap().buffers_created, 0);
    assert_eq!(allocator.stats(), AllocatorStats::default());
}

#[test]
fn test_out_of_memory_propagates() {
    let (mut allocator, state) = create_allocator();
    state.lock().unwrap().fail_next_buffer = true;
    let result = allocator.create_buffer(64, BufferUsage::Material, MemoryResidency::GpuOnly);
    assert!(matches!(result, Err(Error::OutOfMemory)));
    assert_eq!(allocator.stats().live_buffers, 0);
}

#[test]
fn test_destroy_buffer_releases_memory() {
    let (mut allocator, state) = create_allocator();
    let a = allocator.create_buffer(100, BufferUsage::Geometry, MemoryResidency::GpuOnly).unwrap();
    let b = allocator.create_buffer(28, BufferUsage::Staging, MemoryResidency::CpuToGpu).unwrap();

    let stats = allocator.stats();
    assert_eq!(stats.live_buffers, 2);
    assert_eq!(stats.live_buffer_bytes, 128);

    allocator.destroy_buffer(a);
    allocator.destroy_buffer(b);

    let stats = allocator.stats();
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.live_buffer_bytes, 0);
    assert_eq!(stats.total_buffers, 2);
    assert_eq!(state.lock().unwrap().live_buffers, 0);
}

// ============================================================================
// IMAGES
// ============================================================================

#[test]
fn test_create_and_destroy_image() {
    let (mut allocator, _state) = create_allocator();
    let image = allocator.create_image(TextureDesc {
        width: 16,
        height: 16,
        format: TextureFormat::R8G8B8A8_UNORM,
        usage: TextureUsage::Sampled,
    }).unwrap();
    assert_eq!(image.texture().info().width, 16);
    assert_eq!(allocator.stats().live_images, 1);
    assert_eq!(allocator.stats().live_image_bytes, 1024);

    allocator.destroy_image(image);
    assert_eq!(allocator.stats().live_images, 0);
    assert_eq!(allocator.stats().live_image_bytes, 0);
}

#[test]
fn test_zero_size_image_rejected() {
    let (mut allocator, _state) = create_allocator();
    let result = allocator.create_image(TextureDesc {
        width: 0,
        height: 8,
        format: TextureFormat::D32_FLOAT,
        usage: TextureUsage::DepthAttachment,
    });
    assert!(result.is_err());
}
