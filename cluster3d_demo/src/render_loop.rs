/// Render thread - scene preparation and the frame loop
///
/// The window thread owns the window and writes `SharedState`; this thread
/// owns every GPU object and only reads it.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use cluster_3d_engine::cluster3d::{Config, Error, Result};
use cluster_3d_engine::cluster3d::frame::{
    AbandonReason, CommandRecorder, FrameInputs, FrameOrchestrator, FrameOutcome, FrameSlot,
};
use cluster_3d_engine::cluster3d::mesh::MeshletBuilder;
use cluster_3d_engine::cluster3d::render::{
    GraphicsDevice, RenderContext, ShaderProgram, ShaderProgramDesc, ShaderStage, ShaderStageDesc,
};
use cluster_3d_engine::cluster3d::scene::{Camera, CameraInput, Scene, DEMO_LIGHT_SEED};
use cluster_3d_engine::cluster3d::upload::{PushConstantData, SceneBuffers, SceneUploadManager};
use cluster_3d_engine::glam::{Mat4, Vec3};
use cluster_3d_engine::{engine_error, engine_info, engine_warn};
use cluster_3d_engine_renderer_vulkan::cluster3d::{VulkanGraphicsDevice, VulkanSwapchain};
use crate::manifest::{Manifest, ShaderSection};

const SOURCE: &str = "cluster3d::demo";

/// Pause between attempts while the window has no drawable area
const MINIMIZED_BACKOFF: Duration = Duration::from_millis(16);

/// Window-thread to render-thread hand-off
#[derive(Debug, Default)]
pub struct SharedState {
    running: AtomicBool,
    /// Width in the high half, height in the low half
    extent: AtomicU64,
    vsync: AtomicBool,
    pub input: CameraInput,
}

impl SharedState {
    pub fn new(width: u32, height: u32, vsync: bool) -> Self {
        let state = Self::default();
        state.running.store(true, Ordering::Release);
        state.set_extent(width, height);
        state.set_vsync(vsync);
        state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn set_extent(&self, width: u32, height: u32) {
        self.extent.store((width as u64) << 32 | height as u64, Ordering::Relaxed);
    }

    pub fn extent(&self) -> (u32, u32) {
        let packed = self.extent.load(Ordering::Relaxed);
        ((packed >> 32) as u32, packed as u32)
    }

    pub fn set_vsync(&self, vsync: bool) {
        self.vsync.store(vsync, Ordering::Relaxed);
    }

    pub fn vsync(&self) -> bool {
        self.vsync.load(Ordering::Relaxed)
    }
}

/// Thread entry point; clears the running flag however it returns
pub fn run(
    device: VulkanGraphicsDevice,
    swapchain: VulkanSwapchain,
    manifest: Manifest,
    config: Config,
    shared: Arc<SharedState>,
) -> Result<()> {
    let device: Arc<Mutex<dyn GraphicsDevice>> = Arc::new(Mutex::new(device));
    let context = RenderContext::new(device);
    let result = render(&context, swapchain, &manifest, &config, &shared);
    shared.stop();
    if let Err(e) = &result {
        engine_error!(SOURCE, "render thread stopped: {}", e);
    }
    result
}

fn render(
    context: &RenderContext,
    swapchain: VulkanSwapchain,
    manifest: &Manifest,
    config: &Config,
    shared: &SharedState,
) -> Result<()> {
    let scene = load_scene(manifest)?;
    let geometry = MeshletBuilder::new(config.meshlet)?.build(
        scene.geometry().vertices(),
        scene.geometry().indices(),
        scene.geometry().submeshes(),
    )?;

    let mut recorder = CommandRecorder::new(context.clone())?;
    let mut uploads = SceneUploadManager::new(context.clone());
    let buffers = uploads.upload_scene(&mut recorder, &scene, &geometry)?;
    let program = create_program(context, &manifest.shaders, &buffers)?;

    let mut frames = FrameOrchestrator::new(context.clone(), Box::new(swapchain), recorder, config)?;
    let mut camera = Camera::new(config.camera);
    camera.teleport(Vec3::new(0.0, 0.0, 10.0));

    engine_info!(SOURCE, "ready: {} meshlets, {} lights",
        buffers.meshlet_count(), scene.lights().total());

    let looped = frame_loop(&mut frames, &mut camera, program.as_ref(), &buffers, shared);

    // Nothing may be in flight before the scene buffers go away
    let idle = context.device().and_then(|device| device.wait_idle());
    let stats = frames.stats();
    engine_info!(SOURCE, "{} frames presented, {} abandoned, {} swapchain recreations",
        stats.frames_presented, stats.frames_abandoned, stats.swapchain_recreations);
    uploads.release_all();
    looped.and(idle)
}

fn frame_loop(
    frames: &mut FrameOrchestrator,
    camera: &mut Camera,
    program: &dyn ShaderProgram,
    buffers: &SceneBuffers,
    shared: &SharedState,
) -> Result<()> {
    let mut slot = FrameSlot::FIRST;
    let mut last = Instant::now();
    let mut extent = shared.extent();

    while shared.is_running() {
        let now = Instant::now();
        camera.apply_input(&shared.input, (now - last).as_secs_f32());
        last = now;

        let requested = shared.extent();
        if requested != extent {
            frames.resize(requested.0, requested.1);
            extent = requested;
        }
        frames.set_vsync(shared.vsync());

        let (width, height) = frames.extent();
        let push_constants: PushConstantData =
            buffers.push_constants(camera.view_projection(width, height), Mat4::IDENTITY);
        let result = frames.render_frame(slot, &FrameInputs {
            program,
            push_constants: &push_constants,
            meshlet_count: buffers.meshlet_count(),
        })?;
        slot = result.next_slot;

        if result.outcome == FrameOutcome::Abandoned(AbandonReason::Minimized) {
            std::thread::sleep(MINIMIZED_BACKOFF);
        }
    }
    Ok(())
}

fn load_scene(manifest: &Manifest) -> Result<Scene> {
    let start = Instant::now();
    let mut scene = Scene::new();
    for model in &manifest.models {
        let stats = scene.load_gltf(&model.path, &model.transform())?;
        if stats.skipped_primitives > 0 {
            engine_warn!(SOURCE, "{}: {} non-triangle primitives skipped",
                model.path.display(), stats.skipped_primitives);
        }
    }
    if manifest.models.is_empty() {
        engine_warn!(SOURCE, "manifest lists no models");
    }
    if manifest.demo_lights {
        scene.lights_mut().spawn_demo_lights(DEMO_LIGHT_SEED);
    }
    engine_info!(SOURCE, "loaded {} models: {} vertices, {} triangles in {:.2} ms",
        manifest.models.len(), scene.geometry().vertices().len(), scene.geometry().triangle_count(),
        start.elapsed().as_secs_f64() * 1000.0);
    Ok(scene)
}

fn read_spirv(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::InitializationFailed(format!("shader {}: {}", path.display(), e)))
}

fn create_program(
    context: &RenderContext,
    shaders: &ShaderSection,
    buffers: &SceneBuffers,
) -> Result<Arc<dyn ShaderProgram>> {
    let stage = |stage: ShaderStage, path: &Path| -> Result<ShaderStageDesc> {
        Ok(ShaderStageDesc { stage, code: read_spirv(path)?, entry_point: "main".to_string() })
    };
    let desc = ShaderProgramDesc {
        stages: vec![
            stage(ShaderStage::Task, &shaders.task)?,
            stage(ShaderStage::Mesh, &shaders.mesh)?,
            stage(ShaderStage::Fragment, &shaders.fragment)?,
        ],
        push_constant_size: PushConstantData::SIZE,
        textures: buffers.textures.clone(),
    };
    context.device()?.create_shader_program(desc)
}

#[cfg(test)]
#[path = "render_loop_tests.rs"]
mod tests;
