#![allow(dead_code)]
//! Shared GPU fixtures for the integration tests
//!
//! winit allows one event loop per process and cargo runs tests off the main
//! thread, so a single hidden window is created on first use (with the
//! platform's any-thread opt-in) and the device built on it is shared by
//! every GPU test in the binary.

use cluster_3d_engine::cluster3d::Config;
use cluster_3d_engine::cluster3d::render::{GraphicsDevice, RenderContext};
use cluster_3d_engine_renderer_vulkan::cluster3d::VulkanGraphicsDevice;
use std::sync::{Arc, Mutex, OnceLock};
use winit::event_loop::EventLoop;
use winit::window::Window;

static TEST_WINDOW: OnceLock<Window> = OnceLock::new();
static TEST_DEVICE: OnceLock<Arc<Mutex<VulkanGraphicsDevice>>> = OnceLock::new();

fn build_event_loop() -> EventLoop<()> {
    #[allow(unused_mut)]
    let mut builder = EventLoop::builder();
    #[cfg(target_os = "windows")]
    {
        use winit::platform::windows::EventLoopBuilderExtWindows;
        builder.with_any_thread(true);
    }
    #[cfg(all(unix, not(any(target_os = "macos", target_os = "ios", target_os = "android"))))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        builder.with_any_thread(true);
    }
    builder.build().expect("event loop for GPU tests")
}

/// Hidden 800x600 window that lives until the test binary exits
#[allow(deprecated)]
pub fn test_window() -> &'static Window {
    TEST_WINDOW.get_or_init(|| {
        let event_loop = build_event_loop();
        let attributes = Window::default_attributes()
            .with_title("cluster3d GPU tests")
            .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
            .with_visible(false);
        let window = event_loop.create_window(attributes).expect("hidden test window");
        // The window is only valid while its event loop exists
        std::mem::forget(event_loop);
        window
    })
}

/// Device without validation, created on first use
pub fn get_test_graphics_device() -> Arc<Mutex<VulkanGraphicsDevice>> {
    TEST_DEVICE
        .get_or_init(|| {
            let config = Config { enable_validation: false, ..Config::default() };
            let device = VulkanGraphicsDevice::new(test_window(), &config)
                .expect("mesh-shading Vulkan device for tests");
            Arc::new(Mutex::new(device))
        })
        .clone()
}

pub fn get_test_render_context() -> RenderContext {
    let device: Arc<Mutex<dyn GraphicsDevice>> = get_test_graphics_device();
    RenderContext::new(device)
}
