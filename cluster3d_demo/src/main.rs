/// Cluster3D demo - loads the manifest's scenes and flies a camera through them
///
/// Usage: `cluster3d_demo [manifest.toml]` (default `cluster3d.toml`).
///
/// Controls: WASD to move, mouse to look, F toggles the mouse grab,
/// V toggles vsync, Escape quits.

mod manifest;
mod render_loop;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use cluster_3d_engine::cluster3d::{Config, Error, Result};
use cluster_3d_engine::{engine_error, engine_info, engine_warn};
use cluster_3d_engine_renderer_vulkan::cluster3d::VulkanGraphicsDevice;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Fullscreen, Window, WindowId};
use manifest::Manifest;
use render_loop::SharedState;

const SOURCE: &str = "cluster3d::demo";
const DEFAULT_MANIFEST: &str = "cluster3d.toml";

/// How often the window thread checks whether the render thread stopped
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Movement keys currently held
#[derive(Debug, Default, Clone, Copy)]
struct HeldKeys {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
}

impl HeldKeys {
    /// `(forward, sideward)`, positive sideward is left
    fn axes(&self) -> (f32, f32) {
        let axis = |positive: bool, negative: bool| positive as i32 as f32 - negative as i32 as f32;
        (axis(self.forward, self.back), axis(self.left, self.right))
    }
}

struct App {
    /// Taken when the render thread starts
    manifest: Option<Manifest>,
    config: Config,
    shared: Arc<SharedState>,
    window: Option<Window>,
    render_thread: Option<JoinHandle<Result<()>>>,
    held: HeldKeys,
    grab_mouse: bool,
    failure: Option<Error>,
}

impl App {
    fn new(manifest: Manifest) -> Self {
        let config = Config {
            vsync: manifest.window.vsync,
            app_name: manifest.window.title.clone(),
            ..Config::default()
        };
        let shared = Arc::new(SharedState::new(
            manifest.window.width,
            manifest.window.height,
            manifest.window.vsync,
        ));
        Self {
            manifest: Some(manifest),
            config,
            shared,
            window: None,
            render_thread: None,
            held: HeldKeys::default(),
            grab_mouse: true,
            failure: None,
        }
    }

    /// Create the window, the device and the swapchain, then hand the GPU
    /// objects to the render thread
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let Some(manifest) = self.manifest.take() else {
            return Ok(());
        };

        let mut attributes = Window::default_attributes()
            .with_title(manifest.window.title.clone())
            .with_inner_size(PhysicalSize::new(manifest.window.width, manifest.window.height));
        if manifest.window.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = event_loop
            .create_window(attributes)
            .map_err(|e| Error::InitializationFailed(format!("window: {}", e)))?;

        let size = window.inner_size();
        let device = VulkanGraphicsDevice::new(&window, &self.config)?;
        let swapchain = device.create_swapchain(&window, size.width, size.height, self.config.vsync)?;
        self.shared.set_extent(size.width, size.height);
        apply_mouse_grab(&window, self.grab_mouse);

        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("render".to_string())
            .spawn(move || render_loop::run(device, swapchain, manifest, config, shared))
            .map_err(|e| Error::InitializationFailed(format!("render thread: {}", e)))?;

        self.window = Some(window);
        self.render_thread = Some(handle);
        Ok(())
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;
        match code {
            KeyCode::KeyW => self.held.forward = pressed,
            KeyCode::KeyS => self.held.back = pressed,
            KeyCode::KeyA => self.held.left = pressed,
            KeyCode::KeyD => self.held.right = pressed,
            KeyCode::Escape if pressed => self.shutdown(event_loop),
            KeyCode::KeyF if pressed && !event.repeat => {
                self.grab_mouse = !self.grab_mouse;
                if let Some(window) = &self.window {
                    apply_mouse_grab(window, self.grab_mouse);
                }
            }
            KeyCode::KeyV if pressed && !event.repeat => {
                let vsync = !self.shared.vsync();
                self.shared.set_vsync(vsync);
                engine_info!(SOURCE, "vsync {}", if vsync { "on" } else { "off" });
            }
            _ => {}
        }
        let (forward, sideward) = self.held.axes();
        self.shared.input.set_movement(forward, sideward);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.shared.stop();
        event_loop.exit();
    }

    /// Join the render thread and keep its error, if any
    fn join_render_thread(&mut self) {
        let Some(handle) = self.render_thread.take() else {
            return;
        };
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.failure = Some(e),
            Err(_) => self.failure = Some(Error::BackendError("render thread panicked".to_string())),
        }
    }
}

fn apply_mouse_grab(window: &Window, grab: bool) {
    let result = if grab {
        window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
    } else {
        window.set_cursor_grab(CursorGrabMode::None)
    };
    if let Err(e) = result {
        engine_warn!(SOURCE, "cursor grab not available: {}", e);
    }
    window.set_cursor_visible(!grab);
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.start(event_loop) {
            engine_error!(SOURCE, "startup failed: {}", e);
            self.failure = Some(e);
            self.shutdown(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => self.shared.set_extent(size.width, size.height),
            WindowEvent::KeyboardInput { event, .. } => self.on_key(event_loop, event),
            WindowEvent::Focused(false) => {
                self.held = HeldKeys::default();
                self.shared.input.set_movement(0.0, 0.0);
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.grab_mouse {
                self.shared.input.add_look(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.render_thread.is_some() && !self.shared.is_running() {
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + POLL_INTERVAL));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shared.stop();
        self.join_render_thread();
    }
}

fn main() -> ExitCode {
    let manifest_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST));
    let manifest = match Manifest::load(&manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            engine_error!(SOURCE, "{}: {}", manifest_path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    engine_info!(SOURCE, "{} models from {}", manifest.models.len(), manifest_path.display());

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            engine_error!(SOURCE, "event loop: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut app = App::new(manifest);
    if let Err(e) = event_loop.run_app(&mut app) {
        engine_error!(SOURCE, "event loop: {}", e);
        app.failure.get_or_insert(Error::BackendError(e.to_string()));
    }
    // The window (and with it the surface) must outlive the render thread
    app.join_render_thread();

    #[cfg(feature = "vulkan-validation")]
    cluster_3d_engine_renderer_vulkan::cluster3d::print_validation_stats_report();

    match app.failure {
        Some(e) => {
            eprintln!("cluster3d_demo: {}", e);
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
