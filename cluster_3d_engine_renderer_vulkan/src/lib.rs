/*!
# Cluster 3D Engine - Vulkan Backend

Vulkan 1.3 implementation of the cluster_3d_engine graphics device traits,
using Ash for the bindings and gpu-allocator for memory management.

Drawing goes through `VK_EXT_mesh_shader` and `VK_EXT_shader_object` inside
dynamic rendering scopes; barriers and submissions use synchronization2, and
shaders reach their data through buffer device addresses.

```no_run
use cluster_3d_engine::cluster3d::Config;
use cluster_3d_engine_renderer_vulkan::cluster3d::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> cluster_3d_engine::cluster3d::Result<()> {
let config = Config::default();
let device = VulkanGraphicsDevice::new(window, &config)?;
let swapchain = device.create_swapchain(window, 1280, 720, config.vsync)?;
# Ok(())
# }
```
*/

// Vulkan implementation modules
mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_command_list;
mod vulkan_shader_program;
mod vulkan_swapchain;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub mod cluster3d {
    pub use crate::vulkan::VulkanGraphicsDevice;
    pub use crate::vulkan_swapchain::Swapchain as VulkanSwapchain;
    pub use crate::vulkan_command_list::CommandList as VulkanCommandList;
    pub use crate::vulkan_buffer::Buffer as VulkanBuffer;
    pub use crate::vulkan_texture::Texture as VulkanTexture;
    pub use crate::vulkan_shader_program::ShaderProgram as VulkanShaderProgram;

    // Validation statistics
    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{ValidationStats, get_validation_stats, print_validation_stats_report};
}
