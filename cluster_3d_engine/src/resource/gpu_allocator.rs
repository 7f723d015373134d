/// GPU resource allocator
///
/// Buffers and images are owned values: the backend resource, its memory
/// and (for shader-visible buffers) its device address travel together and
/// are released together by `destroy_*`.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::engine_debug;
use crate::graphics_device::{
    RenderContext, Buffer, BufferDesc, BufferUsage, MemoryResidency,
    Texture, TextureDesc,
};

const SOURCE: &str = "cluster3d::GpuResourceAllocator";

// ============================================================================
// Owned resources
// ============================================================================

/// Buffer paired with its device address
pub struct GpuBuffer {
    buffer: Arc<dyn Buffer>,
    device_address: u64,
}

impl GpuBuffer {
    /// Backend buffer
    pub fn buffer(&self) -> &dyn Buffer {
        self.buffer.as_ref()
    }

    /// GPU-visible address (0 for staging/readback buffers)
    pub fn device_address(&self) -> u64 {
        self.device_address
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    pub fn usage(&self) -> BufferUsage {
        self.buffer.usage()
    }
}

/// Image owned through the allocator
pub struct GpuImage {
    texture: Arc<dyn Texture>,
    bytes: u64,
}

impl GpuImage {
    /// Backend texture
    pub fn texture(&self) -> &dyn Texture {
        self.texture.as_ref()
    }

    /// Shared texture handle (for descriptor sets)
    pub fn shared_texture(&self) -> Arc<dyn Texture> {
        Arc::clone(&self.texture)
    }
}

/// Allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Buffers created and not yet destroyed
    pub live_buffers: u32,
    /// Bytes held by live buffers
    pub live_buffer_bytes: u64,
    /// Images created and not yet destroyed
    pub live_images: u32,
    /// Bytes held by live images (tightly packed estimate)
    pub live_image_bytes: u64,
    /// Buffers created since startup
    pub total_buffers: u64,
}

// ============================================================================
// GpuResourceAllocator
// ============================================================================

/// Creates and destroys buffers and images with usage and residency hints
///
/// Not shared between threads: only the render thread allocates.
pub struct GpuResourceAllocator {
    context: RenderContext,
    stats: AllocatorStats,
}

impl GpuResourceAllocator {
    pub fn new(context: RenderContext) -> Self {
        Self { context, stats: AllocatorStats::default() }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Create a buffer
    ///
    /// Shader-visible usages (geometry, material, light) get a device address.
    ///
    /// # Errors
    ///
    /// `InvalidResource` for `size == 0`, `OutOfMemory` when the device
    /// cannot satisfy the allocation.
    pub fn create_buffer(
        &mut self,
        size: u64,
        usage: BufferUsage,
        residency: MemoryResidency,
    ) -> Result<GpuBuffer> {
        if size == 0 {
            return Err(Error::InvalidResource(format!(
                "refusing to allocate a zero-size {:?} buffer", usage
            )));
        }
        let buffer = self.context.device()?.create_buffer(BufferDesc {
            size,
            usage,
            residency,
            device_address: usage.is_shader_visible(),
        })?;
        let device_address = buffer.device_address();
        if usage.is_shader_visible() && device_address == 0 {
            return Err(Error::BackendError(format!(
                "{:?} buffer of {} bytes has no device address", usage, size
            )));
        }

        self.stats.live_buffers += 1;
        self.stats.live_buffer_bytes += size;
        self.stats.total_buffers += 1;
        engine_debug!(SOURCE, "created {:?}/{:?} buffer of {} bytes at 0x{:x}",
            usage, residency, size, device_address);

        Ok(GpuBuffer { buffer, device_address })
    }

    /// Destroy a buffer; its device address must no longer be referenced by
    /// any in-flight frame
    pub fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        self.stats.live_buffers = self.stats.live_buffers.saturating_sub(1);
        self.stats.live_buffer_bytes = self.stats.live_buffer_bytes.saturating_sub(buffer.size());
        drop(buffer);
    }

    /// Create an image
    pub fn create_image(&mut self, desc: TextureDesc) -> Result<GpuImage> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "refusing to allocate a {}x{} image", desc.width, desc.height
            )));
        }
        let texture = self.context.device()?.create_texture(desc)?;
        let bytes = texture.info().byte_size();
        self.stats.live_images += 1;
        self.stats.live_image_bytes += bytes;
        Ok(GpuImage { texture, bytes })
    }

    /// Destroy an image
    pub fn destroy_image(&mut self, image: GpuImage) {
        self.stats.live_images = self.stats.live_images.saturating_sub(1);
        self.stats.live_image_bytes = self.stats.live_image_bytes.saturating_sub(image.bytes);
        drop(image);
    }

    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }
}

#[cfg(test)]
#[path = "gpu_allocator_tests.rs"]
mod tests;
