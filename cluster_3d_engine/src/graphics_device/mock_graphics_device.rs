/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Buffers own real byte storage and copies are executed at submit time, so
/// uploads can be verified by reading the destination back. Fences and
/// binary semaphores track their signaled state and reject the misuse the
/// Vulkan validation layer would flag (double signal, wait on unsignaled,
/// submit with a signaled fence). The swapchain is scriptable.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::engine_bail;
use crate::graphics_device::{
    GraphicsDevice, Buffer, BufferDesc, BufferUsage, MemoryResidency,
    Texture, TextureDesc, TextureInfo, TextureFormat, TextureUsage,
    CommandList, ImageBarrier, ImageLayout, PipelineStages, AccessFlags,
    ClearValue, Viewport, Rect2D, DynamicState,
    ShaderProgram, ShaderProgramDesc, ShaderStage,
    Swapchain, AcquireResult, PresentResult,
    FenceHandle, SemaphoreHandle, SubmitDesc,
};

const SOURCE: &str = "cluster3d::mock";

/// Fake device addresses start here so 0 stays "no address"
const ADDRESS_BASE: u64 = 0x1000_0000;

// ============================================================================
// Shared state
// ============================================================================

/// One recorded queue submission
#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub command_count: usize,
    pub wait_semaphores: Vec<(SemaphoreHandle, PipelineStages)>,
    pub signal_semaphores: Vec<SemaphoreHandle>,
    pub fence: Option<FenceHandle>,
}

/// Ordering-sensitive device and swapchain calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    SwapchainRecreated,
    SemaphoreDestroyed(SemaphoreHandle),
}

/// Everything the mock device and swapchain observed
#[derive(Debug, Default)]
pub struct MockState {
    next_id: u64,
    next_address: u64,

    pub buffers_created: usize,
    pub live_buffers: usize,
    pub bytes_allocated: u64,
    pub textures_created: usize,
    pub programs_created: usize,

    /// fence -> signaled
    pub fences: HashMap<u64, bool>,
    /// semaphore -> signaled
    pub semaphores: HashMap<u64, bool>,
    pub semaphores_destroyed: usize,

    pub submissions: Vec<MockSubmission>,
    pub copies_executed: usize,
    pub draws: Vec<(u32, u32, u32)>,
    pub wait_idle_calls: usize,

    /// Fail the next create_buffer with OutOfMemory
    pub fail_next_buffer: bool,
    /// Fail the next submit with a backend error
    pub fail_next_submit: bool,

    // Swapchain script
    pub always_acquire: Option<AcquireResult>,
    pub acquire_script: VecDeque<AcquireResult>,
    pub present_script: VecDeque<PresentResult>,
    pub acquires: usize,
    pub presents: usize,
    pub presented_images: Vec<u32>,
    pub recreations: usize,
    /// Requested (width, height, vsync) of the last recreate
    pub last_recreate: Option<(u32, u32, bool)>,
    /// Surface limits: recreate lands on these instead of the request
    pub granted_extent: Option<(u32, u32)>,
    pub granted_vsync: Option<bool>,
    pub events: Vec<MockEvent>,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn signal_semaphore(&mut self, semaphore: SemaphoreHandle) -> Result<()> {
        match self.semaphores.get_mut(&semaphore.0) {
            Some(signaled) if *signaled => Err(Error::BackendError(format!(
                "semaphore {} signaled twice", semaphore.0
            ))),
            Some(signaled) => {
                *signaled = true;
                Ok(())
            }
            None => Err(Error::InvalidResource(format!("unknown semaphore {}", semaphore.0))),
        }
    }

    fn consume_semaphore(&mut self, semaphore: SemaphoreHandle) -> Result<()> {
        match self.semaphores.get_mut(&semaphore.0) {
            Some(signaled) if *signaled => {
                *signaled = false;
                Ok(())
            }
            Some(_) => Err(Error::BackendError(format!(
                "wait on semaphore {} that is never signaled", semaphore.0
            ))),
            None => Err(Error::InvalidResource(format!("unknown semaphore {}", semaphore.0))),
        }
    }

    pub fn is_semaphore_signaled(&self, semaphore: SemaphoreHandle) -> bool {
        self.semaphores.get(&semaphore.0).copied().unwrap_or(false)
    }

    pub fn is_fence_signaled(&self, fence: FenceHandle) -> bool {
        self.fences.get(&fence.0).copied().unwrap_or(false)
    }
}

pub type SharedMockState = Arc<Mutex<MockState>>;

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub id: u64,
    pub size: u64,
    pub usage: BufferUsage,
    pub residency: MemoryResidency,
    pub address: u64,
    pub data: Arc<Mutex<Vec<u8>>>,
    state: SharedMockState,
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn device_address(&self) -> u64 {
        self.address
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.residency == MemoryResidency::GpuOnly {
            engine_bail!(SOURCE, "update on GPU-only buffer {}", self.id);
        }
        let end = offset + data.len() as u64;
        if end > self.size {
            engine_bail!(SOURCE, "write of {} bytes at {} overflows buffer of {}", data.len(), offset, self.size);
        }
        let mut storage = self.data.lock().unwrap();
        storage[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn residency(&self) -> MemoryResidency {
        self.residency
    }
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.live_buffers -= 1;
            state.bytes_allocated -= self.size;
        }
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    pub id: u64,
    pub info: TextureInfo,
    pub data: Arc<Mutex<Vec<u8>>>,
}

impl MockTexture {
    pub fn new(id: u64, info: TextureInfo) -> Self {
        let size = info.byte_size() as usize;
        Self { id, info, data: Arc::new(Mutex::new(vec![0; size])) }
    }
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

/// Identity of a texture as recorded in barrier commands
pub fn texture_key(texture: &dyn Texture) -> usize {
    texture as *const dyn Texture as *const () as usize
}

// ============================================================================
// Mock CommandList
// ============================================================================

#[derive(Debug, Clone)]
pub enum MockCommand {
    Begin,
    End,
    Barrier {
        texture: usize,
        format: TextureFormat,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
        src_stages: PipelineStages,
        src_access: AccessFlags,
        dst_stages: PipelineStages,
        dst_access: AccessFlags,
    },
    CopyBuffer { src: Arc<Mutex<Vec<u8>>>, dst: Arc<Mutex<Vec<u8>>>, size: u64 },
    CopyBufferToTexture { src: Arc<Mutex<Vec<u8>>>, dst: Arc<Mutex<Vec<u8>>> },
    BeginRendering { color: usize, depth: Option<usize>, clear_values: Vec<ClearValue> },
    EndRendering,
    SetViewport(Viewport),
    SetScissor(Rect2D),
    SetDynamicState(DynamicState),
    BindShaderProgram { stages: Vec<ShaderStage> },
    PushConstants(Vec<u8>),
    DrawMeshTasks(u32, u32, u32),
}

impl MockCommand {
    /// Short name used by order assertions
    pub fn name(&self) -> &'static str {
        match self {
            MockCommand::Begin => "begin",
            MockCommand::End => "end",
            MockCommand::Barrier { .. } => "barrier",
            MockCommand::CopyBuffer { .. } => "copy_buffer",
            MockCommand::CopyBufferToTexture { .. } => "copy_buffer_to_texture",
            MockCommand::BeginRendering { .. } => "begin_rendering",
            MockCommand::EndRendering => "end_rendering",
            MockCommand::SetViewport(_) => "set_viewport",
            MockCommand::SetScissor(_) => "set_scissor",
            MockCommand::SetDynamicState(_) => "set_dynamic_state",
            MockCommand::BindShaderProgram { .. } => "bind_shader_program",
            MockCommand::PushConstants(_) => "push_constants",
            MockCommand::DrawMeshTasks(..) => "draw_mesh_tasks",
        }
    }
}

#[derive(Debug, Default)]
pub struct MockCommandList {
    pub commands: Vec<MockCommand>,
    pub recording: bool,
    pub resets: usize,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, command: MockCommand) -> Result<()> {
        if !self.recording {
            engine_bail!(SOURCE, "{} recorded outside begin/end", command.name());
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(MockCommand::name).collect()
    }
}

fn mock_buffer(buffer: &dyn Buffer) -> &MockBuffer {
    // Every buffer in a mock test comes from MockGraphicsDevice
    unsafe { &*(buffer as *const dyn Buffer as *const MockBuffer) }
}

fn mock_texture(texture: &dyn Texture) -> &MockTexture {
    unsafe { &*(texture as *const dyn Texture as *const MockTexture) }
}

/// Downcast a command list created by MockGraphicsDevice
pub fn mock_command_list(cmd: &dyn CommandList) -> &MockCommandList {
    unsafe { &*(cmd as *const dyn CommandList as *const MockCommandList) }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            engine_bail!(SOURCE, "begin called while already recording");
        }
        self.recording = true;
        self.record(MockCommand::Begin)
    }

    fn end(&mut self) -> Result<()> {
        self.record(MockCommand::End)?;
        self.recording = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.commands.clear();
        self.recording = false;
        self.resets += 1;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier<'_>]) -> Result<()> {
        for barrier in barriers {
            self.record(MockCommand::Barrier {
                texture: texture_key(barrier.texture),
                format: barrier.texture.info().format,
                old_layout: barrier.old_layout,
                new_layout: barrier.new_layout,
                src_stages: barrier.src_stages,
                src_access: barrier.src_access,
                dst_stages: barrier.dst_stages,
                dst_access: barrier.dst_access,
            })?;
        }
        Ok(())
    }

    fn copy_buffer(&mut self, src: &dyn Buffer, dst: &dyn Buffer, size: u64) -> Result<()> {
        if size > src.size() || size > dst.size() {
            engine_bail!(SOURCE, "copy of {} bytes exceeds src {} / dst {}", size, src.size(), dst.size());
        }
        self.record(MockCommand::CopyBuffer {
            src: Arc::clone(&mock_buffer(src).data),
            dst: Arc::clone(&mock_buffer(dst).data),
            size,
        })
    }

    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, dst: &dyn Texture) -> Result<()> {
        if src.size() < dst.info().byte_size() {
            engine_bail!(SOURCE, "staging buffer too small for texture");
        }
        self.record(MockCommand::CopyBufferToTexture {
            src: Arc::clone(&mock_buffer(src).data),
            dst: Arc::clone(&mock_texture(dst).data),
        })
    }

    fn begin_rendering(
        &mut self,
        color: &dyn Texture,
        depth: Option<&dyn Texture>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.record(MockCommand::BeginRendering {
            color: texture_key(color),
            depth: depth.map(texture_key),
            clear_values: clear_values.to_vec(),
        })
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.record(MockCommand::EndRendering)
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record(MockCommand::SetViewport(viewport))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.record(MockCommand::SetScissor(scissor))
    }

    fn set_dynamic_state(&mut self, state: &DynamicState) -> Result<()> {
        self.record(MockCommand::SetDynamicState(*state))
    }

    fn bind_shader_program(&mut self, program: &dyn ShaderProgram) -> Result<()> {
        self.record(MockCommand::BindShaderProgram { stages: program.stages().to_vec() })
    }

    fn push_constants(&mut self, program: &dyn ShaderProgram, data: &[u8]) -> Result<()> {
        if data.len() as u32 > program.push_constant_size() {
            engine_bail!(SOURCE, "push constants of {} bytes exceed range {}", data.len(), program.push_constant_size());
        }
        self.record(MockCommand::PushConstants(data.to_vec()))
    }

    fn draw_mesh_tasks(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.record(MockCommand::DrawMeshTasks(x, y, z))
    }
}

// ============================================================================
// Mock ShaderProgram
// ============================================================================

pub struct MockShaderProgram {
    pub stages: Vec<ShaderStage>,
    pub push_constant_size: u32,
    pub texture_count: u32,
}

impl ShaderProgram for MockShaderProgram {
    fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }

    fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    fn texture_count(&self) -> u32 {
        self.texture_count
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    state: SharedMockState,
    images: Vec<Arc<dyn Texture>>,
    width: u32,
    height: u32,
    vsync: bool,
    next_image: u32,
}

impl MockSwapchain {
    fn create_images(state: &SharedMockState, count: usize, width: u32, height: u32) -> Vec<Arc<dyn Texture>> {
        let mut state = state.lock().unwrap();
        (0..count)
            .map(|_| {
                let id = state.next_id();
                Arc::new(MockTexture::new(id, TextureInfo {
                    width,
                    height,
                    format: TextureFormat::R8G8B8A8_SRGB,
                    usage: TextureUsage::ColorAttachment,
                })) as Arc<dyn Texture>
            })
            .collect()
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, signal: SemaphoreHandle) -> Result<AcquireResult> {
        let mut state = self.state.lock().unwrap();
        state.acquires += 1;
        let result = match state.always_acquire {
            Some(result) => result,
            None => match state.acquire_script.pop_front() {
                Some(result) => result,
                None => {
                    let index = self.next_image;
                    self.next_image = (self.next_image + 1) % self.images.len() as u32;
                    AcquireResult::Acquired(index)
                }
            },
        };
        match result {
            AcquireResult::Acquired(_) | AcquireResult::Suboptimal(_) => state.signal_semaphore(signal)?,
            AcquireResult::OutOfDate => {}
        }
        Ok(result)
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentResult> {
        let mut state = self.state.lock().unwrap();
        state.consume_semaphore(wait)?;
        state.presents += 1;
        let result = state.present_script.pop_front().unwrap_or(PresentResult::Presented);
        if result == PresentResult::Presented {
            state.presented_images.push(image_index);
        }
        Ok(result)
    }

    fn recreate(&mut self, width: u32, height: u32, vsync: bool) -> Result<()> {
        let (granted, granted_vsync) = {
            let state = self.state.lock().unwrap();
            (state.granted_extent.unwrap_or((width, height)), state.granted_vsync.unwrap_or(vsync))
        };
        let count = self.images.len();
        self.images = Self::create_images(&self.state, count, granted.0, granted.1);
        (self.width, self.height) = granted;
        self.vsync = granted_vsync;
        self.next_image = 0;
        let mut state = self.state.lock().unwrap();
        state.recreations += 1;
        state.last_recreate = Some((width, height, vsync));
        state.events.push(MockEvent::SwapchainRecreated);
        Ok(())
    }

    fn image(&self, index: u32) -> Option<Arc<dyn Texture>> {
        self.images.get(index as usize).cloned()
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::R8G8B8A8_SRGB
    }

    fn vsync(&self) -> bool {
        self.vsync
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    state: SharedMockState,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(MockState::default())) }
    }

    /// Shared observation/scripting state
    pub fn state(&self) -> SharedMockState {
        Arc::clone(&self.state)
    }

    /// Swapchain sharing this device's semaphores
    pub fn create_swapchain(&self, width: u32, height: u32, image_count: usize) -> MockSwapchain {
        MockSwapchain {
            state: Arc::clone(&self.state),
            images: MockSwapchain::create_images(&self.state, image_count, width, height),
            width,
            height,
            vsync: true,
            next_image: 0,
        }
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_buffer {
            state.fail_next_buffer = false;
            return Err(Error::OutOfMemory);
        }
        if desc.size == 0 {
            return Err(Error::InvalidResource("zero-size buffer".to_string()));
        }
        let id = state.next_id();
        let address = if desc.device_address {
            let address = ADDRESS_BASE + state.next_address;
            // Keep fake allocations 256-byte aligned and non-overlapping
            state.next_address += (desc.size + 255) & !255;
            address
        } else {
            0
        };
        state.buffers_created += 1;
        state.live_buffers += 1;
        state.bytes_allocated += desc.size;
        Ok(Arc::new(MockBuffer {
            id,
            size: desc.size,
            usage: desc.usage,
            residency: desc.residency,
            address,
            data: Arc::new(Mutex::new(vec![0; desc.size as usize])),
            state: Arc::clone(&self.state),
        }))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        let mut state = self.state.lock().unwrap();
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource("zero-size texture".to_string()));
        }
        state.textures_created += 1;
        let id = state.next_id();
        Ok(Arc::new(MockTexture::new(id, TextureInfo {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
        })))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new()))
    }

    fn create_shader_program(&mut self, desc: ShaderProgramDesc) -> Result<Arc<dyn ShaderProgram>> {
        self.state.lock().unwrap().programs_created += 1;
        Ok(Arc::new(MockShaderProgram {
            stages: desc.stages.iter().map(|s| s.stage).collect(),
            push_constant_size: desc.push_constant_size,
            texture_count: desc.textures.len() as u32,
        }))
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.fences.insert(id, signaled);
        Ok(FenceHandle(id))
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        self.state.lock().unwrap().fences.remove(&fence.0);
    }

    fn wait_for_fence(&self, fence: FenceHandle, _timeout_ns: u64) -> Result<bool> {
        let state = self.state.lock().unwrap();
        match state.fences.get(&fence.0) {
            Some(signaled) => Ok(*signaled),
            None => Err(Error::InvalidResource(format!("unknown fence {}", fence.0))),
        }
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.fences.get_mut(&fence.0) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(Error::InvalidResource(format!("unknown fence {}", fence.0))),
        }
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.semaphores.insert(id, false);
        Ok(SemaphoreHandle(id))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        let mut state = self.state.lock().unwrap();
        if state.semaphores.remove(&semaphore.0).is_some() {
            state.semaphores_destroyed += 1;
            state.events.push(MockEvent::SemaphoreDestroyed(semaphore));
        }
    }

    fn submit(&self, desc: &SubmitDesc<'_>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_submit {
            state.fail_next_submit = false;
            engine_bail!(SOURCE, "submit failed: ERROR_DEVICE_LOST");
        }
        if let Some(fence) = desc.fence {
            if state.is_fence_signaled(fence) {
                engine_bail!(SOURCE, "fence {} submitted while signaled", fence.0);
            }
        }
        for (semaphore, _) in desc.wait_semaphores {
            state.consume_semaphore(*semaphore)?;
        }

        let mut command_count = 0;
        for cmd in desc.command_lists {
            let list = mock_command_list(*cmd);
            if list.recording {
                engine_bail!(SOURCE, "submitted command list is still recording");
            }
            command_count += list.commands.len();
            for command in &list.commands {
                match command {
                    MockCommand::CopyBuffer { src, dst, size } => {
                        let src = src.lock().unwrap();
                        let mut dst = dst.lock().unwrap();
                        let size = *size as usize;
                        dst[..size].copy_from_slice(&src[..size]);
                        state.copies_executed += 1;
                    }
                    MockCommand::CopyBufferToTexture { src, dst } => {
                        let src = src.lock().unwrap();
                        let mut dst = dst.lock().unwrap();
                        let size = dst.len();
                        dst.copy_from_slice(&src[..size]);
                        state.copies_executed += 1;
                    }
                    MockCommand::DrawMeshTasks(x, y, z) => state.draws.push((*x, *y, *z)),
                    _ => {}
                }
            }
        }

        for semaphore in desc.signal_semaphores {
            state.signal_semaphore(*semaphore)?;
        }
        if let Some(fence) = desc.fence {
            state.fences.insert(fence.0, true);
        }
        state.submissions.push(MockSubmission {
            command_count,
            wait_semaphores: desc.wait_semaphores.to_vec(),
            signal_semaphores: desc.signal_semaphores.to_vec(),
            fence: desc.fence,
        });
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.state.lock().unwrap().wait_idle_calls += 1;
        Ok(())
    }

    fn read_buffer(&self, buffer: &dyn Buffer) -> Result<Vec<u8>> {
        Ok(mock_buffer(buffer).data.lock().unwrap().clone())
    }

    fn depth_format(&self) -> TextureFormat {
        TextureFormat::D32_FLOAT
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
