/// Graphics device module - the seam between the engine and a GPU backend

// Module declarations
pub mod graphics_device;
pub mod texture;
pub mod buffer;
pub mod command_list;
pub mod swapchain;
pub mod shader_program;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use texture::*;
pub use buffer::*;
pub use command_list::*;
pub use swapchain::*;
pub use shader_program::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
