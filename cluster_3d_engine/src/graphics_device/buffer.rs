/// Buffer trait and buffer descriptor

use crate::error::Result;

/// What a buffer is used for
///
/// Geometry, material and light buffers are shader-readable through their
/// device address. Staging and readback buffers only take part in copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertices, meshlets, meshlet vertex/triangle arrays, mesh views
    Geometry,
    /// Material index groups
    Material,
    /// Point, spot and directional lights
    Light,
    /// CPU-written source of a transfer
    Staging,
    /// CPU-read destination of a transfer
    Readback,
}

impl BufferUsage {
    /// True for buffers shaders dereference through a device address
    pub fn is_shader_visible(&self) -> bool {
        matches!(self, BufferUsage::Geometry | BufferUsage::Material | BufferUsage::Light)
    }
}

/// Where the buffer memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryResidency {
    /// Device-local, not CPU-visible
    GpuOnly,
    /// Host-visible, written by the CPU and read by the GPU
    CpuToGpu,
    /// Host-visible, written by the GPU and read back by the CPU
    GpuToCpu,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes (must be > 0)
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Memory residency
    pub residency: MemoryResidency,
    /// Query and keep the GPU-visible device address
    pub device_address: bool,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., VulkanBuffer).
/// The buffer and its memory are released when dropped.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// GPU-visible address, 0 when not requested at creation
    fn device_address(&self) -> u64;

    /// Write into CPU-visible memory
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset into the buffer in bytes
    /// * `data` - Data to write
    ///
    /// # Errors
    ///
    /// Fails for `GpuOnly` buffers and for writes past the end.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Usage given at creation
    fn usage(&self) -> BufferUsage;

    /// Residency given at creation
    fn residency(&self) -> MemoryResidency;
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
