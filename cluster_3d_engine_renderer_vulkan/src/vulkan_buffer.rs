/// Buffer - Vulkan implementation of the engine Buffer trait

use cluster_3d_engine::cluster3d::{Result, Error};
use cluster_3d_engine::cluster3d::render::{
    Buffer as RendererBuffer, BufferUsage, MemoryResidency,
};
use cluster_3d_engine::engine_error;
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan buffer implementation
///
/// Owns the buffer handle, its allocation and (for host-visible memory)
/// the persistent mapping as one value.
pub struct Buffer {
    /// Shared GPU context
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    pub(crate) allocation: Option<Allocation>,
    /// Buffer size
    pub(crate) size: u64,
    /// Device address (0 when not requested)
    device_address: u64,
    usage: BufferUsage,
    residency: MemoryResidency,
}

impl Buffer {
    /// Create a new Vulkan buffer
    pub fn new(
        ctx: Arc<GpuContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
        device_address: u64,
        usage: BufferUsage,
        residency: MemoryResidency,
    ) -> Self {
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            device_address,
            usage,
            residency,
        }
    }

    /// Host-visible contents (None for GPU-only memory)
    pub(crate) fn mapped_bytes(&self) -> Option<&[u8]> {
        let allocation = self.allocation.as_ref()?;
        let mapped = allocation.mapped_slice()?;
        mapped.get(..self.size as usize)
    }
}

impl RendererBuffer for Buffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn device_address(&self) -> u64 {
        self.device_address
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            engine_error!("cluster3d::vulkan",
                "Buffer update out of bounds (offset {}, {} bytes, size {})", offset, data.len(), self.size);
            return Err(Error::InvalidResource(format!(
                "update of {} bytes at offset {} exceeds buffer size {}", data.len(), offset, self.size
            )));
        }

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            engine_error!("cluster3d::vulkan", "Buffer update failed: no GPU allocation");
            Error::BackendError("Buffer has no allocation".to_string())
        })?;

        // Map memory and copy data
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                mapped_ptr.add(offset as usize),
                data.len(),
            );
        }

        Ok(())
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn residency(&self) -> MemoryResidency {
        self.residency
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            // Destroy buffer
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
