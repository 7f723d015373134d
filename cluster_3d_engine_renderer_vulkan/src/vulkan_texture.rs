/// Texture - Vulkan implementation of the engine Texture trait

use cluster_3d_engine::cluster3d::render::{Texture as RendererTexture, TextureInfo};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan texture implementation
///
/// Swapchain images are wrapped without an allocation: only their view
/// belongs to the texture, the image itself belongs to the swapchain.
pub struct Texture {
    /// Shared GPU context
    ctx: Arc<GpuContext>,
    /// Vulkan image
    pub(crate) image: vk::Image,
    /// Vulkan image view
    pub(crate) view: vk::ImageView,
    /// GPU memory allocation (None for swapchain images)
    pub(crate) allocation: Option<Allocation>,
    /// Read-only texture properties
    pub(crate) info: TextureInfo,
}

impl Texture {
    /// Wrap an allocated image and its view
    pub fn new(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        allocation: Allocation,
        info: TextureInfo,
    ) -> Self {
        Self { ctx, image, view, allocation: Some(allocation), info }
    }

    /// Wrap a swapchain image; the image is not destroyed on drop
    pub fn borrowed(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        info: TextureInfo,
    ) -> Self {
        Self { ctx, image, view, allocation: None, info }
    }
}

impl RendererTexture for Texture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            // Destroy image view
            self.ctx.device.destroy_image_view(self.view, None);

            // Owned images: free GPU memory, then the image
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}
