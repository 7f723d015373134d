/// Frame orchestrator - acquire, record, submit, present, recover
///
/// ```text
/// Idle -> ImageAcquisition -> Recording -> Submitted -> Presented -> Idle
///                 \                                        /
///                  +-------> SwapchainInvalid -> Idle <---+
/// ```
///
/// Every step takes the frame slot explicitly; the orchestrator keeps no
/// "current frame" of its own. The caller drives the loop with the slot
/// returned by `render_frame`.

use std::sync::Arc;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_info, engine_warn};
use crate::graphics_device::{
    RenderContext, Swapchain, AcquireResult, PresentResult, CommandList, ShaderProgram,
    Texture, TextureDesc, TextureUsage, ImageBarrier, PipelineStages, SubmitDesc,
    ClearValue, Viewport, Rect2D, DynamicState,
};
use crate::resource::{GpuResourceAllocator, GpuImage};
use crate::upload::PushConstantData;
use crate::frame::{FrameSlot, FrameSyncManager, CommandRecorder, FRAMES_IN_FLIGHT};

const SOURCE: &str = "cluster3d::FrameOrchestrator";

// ============================================================================
// Frame value types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    ImageAcquisition,
    Recording,
    Submitted,
    Presented,
    /// The surface went stale; the swapchain is being recreated
    SwapchainInvalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    AcquireOutOfDate,
    AcquireSuboptimal,
    PresentOutOfDate,
    PresentSuboptimal,
    /// Zero-sized window, nothing can be presented
    Minimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Nothing was presented; the swapchain may have been recreated
    Abandoned(AbandonReason),
}

/// Outcome of one frame plus the slot the next frame must use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameResult {
    pub outcome: FrameOutcome,
    pub next_slot: FrameSlot,
}

/// Per-frame draw parameters
pub struct FrameInputs<'a> {
    pub program: &'a dyn ShaderProgram,
    pub push_constants: &'a PushConstantData,
    /// One task work group is dispatched per meshlet; 0 skips the draw
    pub meshlet_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_presented: u64,
    pub frames_abandoned: u64,
    pub swapchain_recreations: u64,
    pub submissions: u64,
    pub draws: u64,
}

/// Extra recording inside the frame's rendering scope, after the meshlet draw
pub trait FrameOverlay: Send {
    fn record(&mut self, cmd: &mut dyn CommandList, extent: (u32, u32)) -> Result<()>;
}

enum Acquisition {
    Image(u32),
    Lost(AbandonReason),
}

// ============================================================================
// FrameOrchestrator
// ============================================================================

pub struct FrameOrchestrator {
    context: RenderContext,
    allocator: GpuResourceAllocator,
    swapchain: Box<dyn Swapchain>,
    sync: FrameSyncManager,
    recorder: CommandRecorder,
    depth_images: Vec<GpuImage>,
    overlay: Option<Box<dyn FrameOverlay>>,
    clear_color: [f32; 4],
    clear_depth: f32,
    window_extent: (u32, u32),
    requested_vsync: bool,
    /// Last request handed to the swapchain; it may have granted less
    applied_extent: (u32, u32),
    applied_vsync: bool,
    state: FrameState,
    transitions: Vec<FrameState>,
    stats: FrameStats,
}

impl FrameOrchestrator {
    /// Take ownership of the swapchain and recorder and create the per-slot
    /// sync objects and depth images
    ///
    /// A vsync setting that differs from the swapchain's takes effect on the
    /// first frame.
    pub fn new(
        context: RenderContext,
        swapchain: Box<dyn Swapchain>,
        recorder: CommandRecorder,
        config: &Config,
    ) -> Result<Self> {
        let sync = FrameSyncManager::new(context.clone())?;
        let window_extent = swapchain.extent();
        let applied_vsync = swapchain.vsync();
        let mut orchestrator = Self {
            allocator: GpuResourceAllocator::new(context.clone()),
            context,
            swapchain,
            sync,
            recorder,
            depth_images: Vec::with_capacity(FRAMES_IN_FLIGHT),
            overlay: None,
            clear_color: config.clear_color,
            clear_depth: config.clear_depth,
            window_extent,
            requested_vsync: config.vsync,
            applied_extent: window_extent,
            applied_vsync,
            state: FrameState::Idle,
            transitions: Vec::new(),
            stats: FrameStats::default(),
        };
        orchestrator.create_depth_images()?;
        engine_info!(SOURCE, "frame loop ready: {}x{}, {} swapchain images, {} frames in flight",
            window_extent.0, window_extent.1, orchestrator.swapchain.image_count(), FRAMES_IN_FLIGHT);
        Ok(orchestrator)
    }

    /// Run one frame on `slot`
    ///
    /// # Errors
    ///
    /// Backend failures other than a stale surface. A stale or suboptimal
    /// surface is not an error: the swapchain is recreated and the frame is
    /// reported as abandoned.
    pub fn render_frame(&mut self, slot: FrameSlot, inputs: &FrameInputs<'_>) -> Result<FrameResult> {
        self.transitions.clear();
        self.enter(FrameState::Idle);

        if self.window_extent.0 == 0 || self.window_extent.1 == 0 {
            return Ok(self.abandon(slot, AbandonReason::Minimized));
        }
        if self.needs_recreation() {
            self.recreate_swapchain()?;
        }

        let image_index = match self.acquire(slot)? {
            Acquisition::Image(index) => index,
            Acquisition::Lost(reason) => return Ok(self.abandon(slot, reason)),
        };
        self.record(slot, image_index, inputs)?;
        self.submit(slot, image_index)?;
        if let Some(reason) = self.present(slot, image_index)? {
            return Ok(self.abandon(slot, reason));
        }
        let next_slot = self.finish(slot)?;

        self.enter(FrameState::Idle);
        Ok(FrameResult { outcome: FrameOutcome::Presented, next_slot })
    }

    fn acquire(&mut self, slot: FrameSlot) -> Result<Acquisition> {
        self.enter(FrameState::ImageAcquisition);
        let semaphore = self.sync.acquire_semaphore(slot);
        let reason = match self.swapchain.acquire_next_image(semaphore)? {
            AcquireResult::Acquired(index) => return Ok(Acquisition::Image(index)),
            AcquireResult::Suboptimal(_) => AbandonReason::AcquireSuboptimal,
            AcquireResult::OutOfDate => AbandonReason::AcquireOutOfDate,
        };
        self.enter(FrameState::SwapchainInvalid);
        self.recreate_swapchain()?;
        if reason == AbandonReason::AcquireSuboptimal {
            // Signaled by the acquire and never waited on. Only safe to destroy
            // once the old swapchain has been retired.
            self.sync.replace_acquire_semaphore(slot)?;
        }
        Ok(Acquisition::Lost(reason))
    }

    fn swapchain_image(&self, image_index: u32) -> Result<Arc<dyn Texture>> {
        self.swapchain.image(image_index).ok_or_else(|| {
            Error::BackendError(format!(
                "swapchain returned image {} of {}", image_index, self.swapchain.image_count()
            ))
        })
    }

    fn record(&mut self, slot: FrameSlot, image_index: u32, inputs: &FrameInputs<'_>) -> Result<()> {
        self.enter(FrameState::Recording);
        let color = self.swapchain_image(image_index)?;
        let (width, height) = self.swapchain.extent();
        let depth = self.depth_images[slot.index()].texture();
        let cmd = self.recorder.frame_list_mut(slot);

        cmd.begin()?;
        cmd.pipeline_barrier(&[
            ImageBarrier::color_attachment(color.as_ref()),
            ImageBarrier::depth_attachment(depth),
        ])?;
        cmd.begin_rendering(color.as_ref(), Some(depth), &[
            ClearValue::Color(self.clear_color),
            ClearValue::DepthStencil { depth: self.clear_depth, stencil: 0 },
        ])?;
        cmd.set_viewport(Viewport::full(width, height))?;
        cmd.set_scissor(Rect2D { x: 0, y: 0, width, height })?;
        cmd.set_dynamic_state(&DynamicState::mesh_shading())?;

        if inputs.meshlet_count > 0 {
            cmd.bind_shader_program(inputs.program)?;
            cmd.push_constants(inputs.program, inputs.push_constants.as_bytes())?;
            cmd.draw_mesh_tasks(inputs.meshlet_count, 1, 1)?;
            self.stats.draws += 1;
        }
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.record(cmd, (width, height))?;
        }

        cmd.end_rendering()
    }

    fn submit(&mut self, slot: FrameSlot, image_index: u32) -> Result<()> {
        let color = self.swapchain_image(image_index)?;
        let cmd = self.recorder.frame_list_mut(slot);
        cmd.pipeline_barrier(&[ImageBarrier::present(color.as_ref())])?;
        cmd.end()?;
        self.enter(FrameState::Submitted);

        let lists: [&dyn CommandList; 1] = [self.recorder.frame_list(slot)];
        self.context.device()?.submit(&SubmitDesc {
            command_lists: &lists,
            wait_semaphores: &[(self.sync.acquire_semaphore(slot), PipelineStages::COLOR_ATTACHMENT_OUTPUT)],
            signal_semaphores: &[self.sync.present_semaphore(slot)],
            fence: Some(self.sync.fence(slot)),
        })?;
        self.stats.submissions += 1;
        Ok(())
    }

    /// `Some(reason)` when the surface must be rebuilt
    fn present(&mut self, slot: FrameSlot, image_index: u32) -> Result<Option<AbandonReason>> {
        let reason = match self.swapchain.present(image_index, self.sync.present_semaphore(slot))? {
            PresentResult::Presented => {
                self.enter(FrameState::Presented);
                return Ok(None);
            }
            PresentResult::Suboptimal => AbandonReason::PresentSuboptimal,
            PresentResult::OutOfDate => AbandonReason::PresentOutOfDate,
        };

        // The slot is reused as-is for the next attempt
        self.enter(FrameState::SwapchainInvalid);
        self.sync.wait(slot)?;
        self.sync.reset(slot)?;
        self.recorder.reset_frame(slot)?;
        self.recreate_swapchain()?;
        Ok(Some(reason))
    }

    /// Advance to the next slot once its previous submission has completed
    fn finish(&mut self, slot: FrameSlot) -> Result<FrameSlot> {
        let next = slot.next();
        self.sync.wait(next)?;
        self.sync.reset(next)?;
        self.recorder.reset_frame(next)?;
        self.stats.frames_presented += 1;
        Ok(next)
    }

    fn abandon(&mut self, slot: FrameSlot, reason: AbandonReason) -> FrameResult {
        self.enter(FrameState::Idle);
        self.stats.frames_abandoned += 1;
        engine_debug!(SOURCE, "frame on slot {} abandoned: {:?}", slot.index(), reason);
        FrameResult { outcome: FrameOutcome::Abandoned(reason), next_slot: slot }
    }

    fn enter(&mut self, state: FrameState) {
        self.state = state;
        self.transitions.push(state);
    }

    // ========================================================================
    // Swapchain and depth images
    // ========================================================================

    /// Compared against the last applied request, not what the swapchain
    /// reports: a clamped extent or a FIFO-only surface would never match.
    fn needs_recreation(&self) -> bool {
        self.applied_extent != self.window_extent || self.applied_vsync != self.requested_vsync
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        self.context.device()?.wait_idle()?;
        let (width, height) = self.window_extent;
        self.swapchain.recreate(width, height, self.requested_vsync)?;
        self.applied_extent = self.window_extent;
        self.applied_vsync = self.requested_vsync;
        self.stats.swapchain_recreations += 1;

        for image in self.depth_images.drain(..) {
            self.allocator.destroy_image(image);
        }
        self.create_depth_images()?;
        engine_debug!(SOURCE, "swapchain recreated at {}x{}, vsync {}", width, height, self.requested_vsync);
        Ok(())
    }

    fn create_depth_images(&mut self) -> Result<()> {
        let format = self.context.device()?.depth_format();
        let (width, height) = self.swapchain.extent();
        for _ in FrameSlot::all() {
            let image = self.allocator.create_image(TextureDesc {
                width,
                height,
                format,
                usage: TextureUsage::DepthAttachment,
            })?;
            self.depth_images.push(image);
        }
        Ok(())
    }

    // ========================================================================
    // Controls and accessors
    // ========================================================================

    /// New window size, applied at the start of the next frame
    pub fn resize(&mut self, width: u32, height: u32) {
        self.window_extent = (width, height);
    }

    /// Request a present-mode change, applied at the start of the next frame
    pub fn set_vsync(&mut self, vsync: bool) {
        if vsync != self.requested_vsync {
            engine_debug!(SOURCE, "vsync {} requested", vsync);
        }
        self.requested_vsync = vsync;
    }

    pub fn vsync(&self) -> bool {
        self.requested_vsync
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn FrameOverlay>) {
        self.overlay = Some(overlay);
    }

    /// Current swapchain extent
    pub fn extent(&self) -> (u32, u32) {
        self.swapchain.extent()
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// States entered during the last `render_frame`
    pub fn transitions(&self) -> &[FrameState] {
        &self.transitions
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn depth_image(&self, slot: FrameSlot) -> &dyn Texture {
        self.depth_images[slot.index()].texture()
    }

    pub fn swapchain(&self) -> &dyn Swapchain {
        self.swapchain.as_ref()
    }

    pub fn sync(&self) -> &FrameSyncManager {
        &self.sync
    }

    pub fn recorder(&self) -> &CommandRecorder {
        &self.recorder
    }

    /// One-shot recording after the loop has started (for late uploads)
    pub fn recorder_mut(&mut self) -> &mut CommandRecorder {
        &mut self.recorder
    }
}

impl Drop for FrameOrchestrator {
    fn drop(&mut self) {
        let idle = self.context.device().and_then(|device| device.wait_idle());
        if let Err(e) = idle {
            engine_warn!(SOURCE, "wait_idle failed during shutdown: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "frame_orchestrator_tests.rs"]
mod tests;
