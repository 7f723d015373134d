/// Swapchain - Vulkan implementation of the engine Swapchain trait

use cluster_3d_engine::cluster3d::{Result, Error};
use cluster_3d_engine::cluster3d::render::{
    Swapchain as RendererSwapchain,
    Texture as RendererTexture,
    TextureFormat, TextureInfo, TextureUsage,
    SemaphoreHandle, AcquireResult, PresentResult,
};
use cluster_3d_engine::{engine_debug, engine_error, engine_err, engine_info};
use ash::vk;
use ash::vk::Handle;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::vk_format_to_texture_format;
use crate::vulkan_texture::Texture;

/// Images requested from the presentation engine
const PREFERRED_IMAGE_COUNT: u32 = 2;

/// Vulkan swapchain implementation
///
/// Owns the window surface. Acquire and present take the semaphores of
/// the calling frame slot, the swapchain itself holds no sync objects.
pub struct Swapchain {
    /// Shared GPU context
    ctx: Arc<GpuContext>,

    /// Surface
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    /// Swapchain
    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain_format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    swapchain_extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,

    /// Swapchain images wrapped as color attachment textures
    images: Vec<Arc<dyn RendererTexture>>,
}

impl Swapchain {
    /// Create a new swapchain
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared GPU context
    /// * `surface` - Window surface (ownership is taken)
    /// * `width` - Initial width, used when the surface leaves the extent open
    /// * `height` - Initial height
    /// * `vsync` - Present with FIFO when true
    pub fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        let surface_loader = ash::khr::surface::Instance::new(ctx.entry(), ctx.instance());
        let swapchain_loader = ash::khr::swapchain::Device::new(ctx.instance(), &ctx.device);

        let (format, color_space) = match choose_surface_format(&ctx, &surface_loader, surface) {
            Ok(choice) => choice,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let mut swapchain = Self {
            ctx,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            swapchain_format: format,
            color_space,
            swapchain_extent: vk::Extent2D { width, height },
            present_mode: vk::PresentModeKHR::FIFO,
            images: Vec::new(),
        };

        // Drop releases the surface if building fails
        swapchain.build(width, height, vsync)?;

        engine_info!("cluster3d::vulkan", "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            swapchain.swapchain_extent.width, swapchain.swapchain_extent.height,
            swapchain.images.len(), swapchain.swapchain_format, swapchain.present_mode);

        Ok(swapchain)
    }

    /// (Re)build the swapchain and its image views, retiring the previous one
    fn build(&mut self, width: u32, height: u32, vsync: bool) -> Result<()> {
        unsafe {
            // Query surface capabilities with the current window size
            let surface_capabilities = self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
                .map_err(|e| {
                    engine_error!("cluster3d::vulkan", "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
                })?;

            let present_modes = self.surface_loader
                .get_physical_device_surface_present_modes(self.ctx.physical_device, self.surface)
                .map_err(|e| {
                    engine_error!("cluster3d::vulkan", "Failed to get present modes: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
                })?;
            let present_mode = choose_present_mode(&present_modes, vsync).ok_or_else(|| {
                engine_error!("cluster3d::vulkan", "Surface does not support FIFO presentation");
                Error::InitializationFailed("FIFO present mode not supported".to_string())
            })?;

            let extent = choose_extent(&surface_capabilities, width, height);

            let mut image_count = PREFERRED_IMAGE_COUNT.max(surface_capabilities.min_image_count);
            if surface_capabilities.max_image_count > 0 {
                image_count = image_count.min(surface_capabilities.max_image_count);
            }

            let old_swapchain = self.swapchain;
            let swapchain_create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(image_count)
                .image_format(self.swapchain_format)
                .image_color_space(self.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(surface_capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self.swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(|e| {
                    engine_error!("cluster3d::vulkan", "Failed to create swapchain: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
                })?;

            // Old image views go first, then the retired swapchain
            self.images.clear();
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.swapchain_extent = extent;
            self.present_mode = present_mode;

            // Get swapchain images
            let swapchain_images = self.swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| {
                    engine_error!("cluster3d::vulkan", "Failed to get swapchain images: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
                })?;

            let format = vk_format_to_texture_format(self.swapchain_format)
                .unwrap_or(TextureFormat::B8G8R8A8_SRGB);

            for image in swapchain_images {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.swapchain_format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                let view = self.ctx.device.create_image_view(&create_info, None)
                    .map_err(|e| {
                        engine_error!("cluster3d::vulkan", "Failed to create swapchain image view: {:?}", e);
                        Error::InitializationFailed(format!("Failed to create image view: {:?}", e))
                    })?;

                let info = TextureInfo {
                    width: extent.width,
                    height: extent.height,
                    format,
                    usage: TextureUsage::ColorAttachment,
                };
                self.images.push(Arc::new(Texture::borrowed(self.ctx.clone(), image, view, info)));
            }

            Ok(())
        }
    }
}

/// Pick an sRGB RGBA/BGRA surface format
fn choose_surface_format(
    ctx: &GpuContext,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::Format, vk::ColorSpaceKHR)> {
    let surface_formats = unsafe {
        surface_loader.get_physical_device_surface_formats(ctx.physical_device, surface)
    }
    .map_err(|e| {
        engine_error!("cluster3d::vulkan", "Failed to query surface formats: {:?}", e);
        Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
    })?;

    [vk::Format::R8G8B8A8_SRGB, vk::Format::B8G8R8A8_SRGB]
        .iter()
        .find_map(|&wanted| {
            surface_formats.iter()
                .find(|f| f.format == wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
                .map(|f| (f.format, f.color_space))
        })
        .ok_or_else(|| {
            engine_error!("cluster3d::vulkan", "No sRGB surface format among {:?}",
                surface_formats.iter().map(|f| f.format).collect::<Vec<_>>());
            Error::InitializationFailed("Surface supports no sRGB RGBA/BGRA format".to_string())
        })
}

/// FIFO for vsync, otherwise the lowest-latency mode available
///
/// FIFO must be exposed by the surface in both cases.
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> Option<vk::PresentModeKHR> {
    if !modes.contains(&vk::PresentModeKHR::FIFO) {
        return None;
    }
    if vsync {
        return Some(vk::PresentModeKHR::FIFO);
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .or(Some(vk::PresentModeKHR::FIFO))
}

/// Surface extent, or the requested size clamped to the surface limits
pub(crate) fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

impl RendererSwapchain for Swapchain {
    fn acquire_next_image(&mut self, signal: SemaphoreHandle) -> Result<AcquireResult> {
        let semaphore = vk::Semaphore::from_raw(signal.0);
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, false)) => Ok(AcquireResult::Acquired(image_index)),
            Ok((image_index, true)) => Ok(AcquireResult::Suboptimal(image_index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("cluster3d::vulkan", "Swapchain out of date during acquire");
                Ok(AcquireResult::OutOfDate)
            }
            Err(e) => Err(engine_err!("cluster3d::vulkan", "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentResult> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [vk::Semaphore::from_raw(wait.0)];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader.queue_present(self.ctx.graphics_queue, &present_info)
        };

        match result {
            Ok(false) => Ok(PresentResult::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentResult::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("cluster3d::vulkan", "Swapchain out of date during present");
                Ok(PresentResult::OutOfDate)
            }
            Err(e) => Err(engine_err!("cluster3d::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    fn recreate(&mut self, width: u32, height: u32, vsync: bool) -> Result<()> {
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to wait idle before swapchain recreate: {:?}", e))?;
        }

        self.build(width, height, vsync)?;

        engine_debug!("cluster3d::vulkan", "Swapchain recreated: {}x{}, {:?}",
            self.swapchain_extent.width, self.swapchain_extent.height, self.present_mode);
        Ok(())
    }

    fn image(&self, index: u32) -> Option<Arc<dyn RendererTexture>> {
        self.images.get(index as usize).cloned()
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> (u32, u32) {
        (self.swapchain_extent.width, self.swapchain_extent.height)
    }

    fn format(&self) -> TextureFormat {
        vk_format_to_texture_format(self.swapchain_format).unwrap_or(TextureFormat::B8G8R8A8_SRGB)
    }

    fn vsync(&self) -> bool {
        self.present_mode == vk::PresentModeKHR::FIFO
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            // Wait for device to finish
            self.ctx.device.device_wait_idle().ok();

            // Destroy image views
            self.images.clear();

            // Destroy swapchain
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }

            // Destroy surface
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
