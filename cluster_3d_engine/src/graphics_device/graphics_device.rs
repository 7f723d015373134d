/// GraphicsDevice trait - main GPU factory and queue interface

use std::sync::{Arc, Mutex, MutexGuard};
use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, Texture, TextureDesc, TextureFormat, CommandList,
    ShaderProgram, ShaderProgramDesc, PipelineStages,
};

// ============================================================================
// Sync handles
// ============================================================================

/// Opaque fence handle (raw backend handle value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceHandle(pub u64);

/// Opaque binary semaphore handle (raw backend handle value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreHandle(pub u64);

/// Wait forever
pub const WAIT_FOREVER: u64 = u64::MAX;

/// One queue submission
pub struct SubmitDesc<'a> {
    /// Executed in order
    pub command_lists: &'a [&'a dyn CommandList],
    /// Semaphores waited on, each gating the given stages
    pub wait_semaphores: &'a [(SemaphoreHandle, PipelineStages)],
    /// Semaphores signaled on completion
    pub signal_semaphores: &'a [SemaphoreHandle],
    /// Fence signaled on completion
    pub fence: Option<FenceHandle>,
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

/// Main graphics device trait
///
/// Central factory and queue interface, implemented by backends
/// (e.g., VulkanGraphicsDevice). Resources are released when their last
/// reference is dropped; fences and semaphores are destroyed explicitly.
pub trait GraphicsDevice: Send + Sync {
    /// Create a buffer
    ///
    /// # Errors
    ///
    /// `OutOfMemory` when the allocation fails, `InvalidResource` for a zero size.
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a texture (contents undefined)
    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a primary command list with its own resettable pool
    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// Create a shader program from SPIR-V stages
    fn create_shader_program(&mut self, desc: ShaderProgramDesc) -> Result<Arc<dyn ShaderProgram>>;

    /// Create a fence, optionally in the signaled state
    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle>;

    fn destroy_fence(&mut self, fence: FenceHandle);

    /// Block until the fence signals or the timeout expires
    ///
    /// # Returns
    ///
    /// `true` if signaled, `false` on timeout
    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<bool>;

    /// Return a fence to the unsignaled state
    fn reset_fence(&mut self, fence: FenceHandle) -> Result<()>;

    /// Create a binary semaphore
    fn create_semaphore(&mut self) -> Result<SemaphoreHandle>;

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle);

    /// Submit command lists to the graphics queue
    fn submit(&self, desc: &SubmitDesc<'_>) -> Result<()>;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;

    /// Blocking copy of a buffer's full contents back to the CPU
    fn read_buffer(&self, buffer: &dyn Buffer) -> Result<Vec<u8>>;

    /// Depth attachment format supported by the device
    fn depth_format(&self) -> TextureFormat;
}

// ============================================================================
// RenderContext
// ============================================================================

/// Shared handle to the graphics device
///
/// Passed explicitly to every component that records or allocates; there is
/// no device singleton.
#[derive(Clone)]
pub struct RenderContext {
    device: Arc<Mutex<dyn GraphicsDevice>>,
}

impl RenderContext {
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>) -> Self {
        Self { device }
    }

    /// Lock the device
    ///
    /// # Errors
    ///
    /// `BackendError` when a previous holder panicked.
    pub fn device(&self) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
        self.device
            .lock()
            .map_err(|_| Error::BackendError("graphics device mutex poisoned".to_string()))
    }

    /// Underlying shared device
    pub fn shared_device(&self) -> &Arc<Mutex<dyn GraphicsDevice>> {
        &self.device
    }
}
