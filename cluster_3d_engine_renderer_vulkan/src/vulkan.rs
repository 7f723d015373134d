/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait

use cluster_3d_engine::cluster3d::{Config, Result, Error};
use cluster_3d_engine::cluster3d::render::{
    GraphicsDevice,
    Buffer as RendererBuffer, BufferDesc, BufferUsage, MemoryResidency,
    Texture as RendererTexture, TextureDesc, TextureFormat, TextureInfo,
    CommandList as RendererCommandList,
    ShaderProgram as RendererShaderProgram, ShaderProgramDesc,
    FenceHandle, SemaphoreHandle, SubmitDesc, WAIT_FOREVER,
};
use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc, AllocationCreateDesc, AllocationScheme};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashSet;
use std::ffi::{CStr, CString};
use std::sync::Arc;
use cluster_3d_engine::{engine_debug, engine_info, engine_warn, engine_error, engine_err};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::{CommandList, vk_command_list};
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    buffer_usage_to_vk, residency_to_location, texture_format_to_vk, texture_usage_to_vk,
    vk_format_to_texture_format, view_aspect, pipeline_stages_to_vk,
};
use crate::vulkan_shader_program::ShaderProgram;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_texture::Texture;

/// Device extensions the renderer cannot run without
pub(crate) const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 3] = [
    ash::khr::swapchain::NAME,
    ash::ext::mesh_shader::NAME,
    ash::ext::shader_object::NAME,
];

/// Depth formats in order of preference
const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Device features the renderer requires, as reported by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FeatureSupport {
    pub mesh_shader: bool,
    pub task_shader: bool,
    pub shader_object: bool,
    pub synchronization2: bool,
    pub dynamic_rendering: bool,
    pub buffer_device_address: bool,
    pub runtime_descriptor_array: bool,
}

impl FeatureSupport {
    /// Names of the required features the device lacks
    pub(crate) fn missing(&self) -> Vec<&'static str> {
        [
            (self.mesh_shader, "meshShader"),
            (self.task_shader, "taskShader"),
            (self.shader_object, "shaderObject"),
            (self.synchronization2, "synchronization2"),
            (self.dynamic_rendering, "dynamicRendering"),
            (self.buffer_device_address, "bufferDeviceAddress"),
            (self.runtime_descriptor_array, "runtimeDescriptorArray"),
        ]
        .into_iter()
        .filter(|(supported, _)| !supported)
        .map(|(_, name)| name)
        .collect()
    }
}

/// Required extensions absent from `available`
pub(crate) fn missing_extensions(available: &[&CStr]) -> Vec<&'static CStr> {
    REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .copied()
        .filter(|required| !available.contains(required))
        .collect()
}

/// First candidate depth format accepted by `supports`
pub(crate) fn pick_depth_format(supports: impl Fn(vk::Format) -> bool) -> Option<vk::Format> {
    DEPTH_FORMAT_CANDIDATES.iter().copied().find(|&format| supports(format))
}

/// Discrete GPUs first, then integrated, then anything else
fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        _ => 3,
    }
}

fn vk_buffer(buffer: &dyn RendererBuffer) -> &Buffer {
    unsafe { &*(buffer as *const dyn RendererBuffer as *const Buffer) }
}

/// Vulkan graphics device implementation
///
/// Central object for creating resources and submitting commands.
/// Presentation lives in `Swapchain`, created through `create_swapchain()`.
pub struct VulkanGraphicsDevice {
    /// Shared GPU context for all resources
    ctx: Arc<GpuContext>,
    /// Depth attachment format chosen at startup
    depth_format: TextureFormat,
    /// Name reported by the driver
    device_name: String,
    /// Fences created through this device, destroyed on drop
    fences: FxHashSet<u64>,
    /// Semaphores created through this device, destroyed on drop
    semaphores: FxHashSet<u64>,
}

impl VulkanGraphicsDevice {
    /// Create the instance, pick a mesh-shading capable GPU and create the device
    ///
    /// # Arguments
    ///
    /// * `window` - Window used to check presentation support
    /// * `config` - Engine configuration (validation, severity, application name)
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when no GPU offers the required extensions,
    /// features and a graphics queue able to present to the window.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

        let validation = Self::validation_requested(&entry, config);

        let display_handle = window.display_handle()
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
        let window_handle = window.window_handle()
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;

        let app_name = CString::new(config.app_name.as_str())
            .unwrap_or_else(|_| c"Cluster3D Application".to_owned());

        // Application Info
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Cluster3D")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to get required extensions: {}", e);
                Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
            })?
            .to_vec();
        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layer_names = if validation { vec![VALIDATION_LAYER.as_ptr()] } else { vec![] };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

        #[cfg(feature = "vulkan-validation")]
        let (debug_utils_loader, debug_messenger) = if validation {
            match Self::create_debug_messenger(&entry, &instance, config) {
                Ok((loader, messenger)) => (Some(loader), Some(messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            (None, None)
        };
        #[cfg(not(feature = "vulkan-validation"))]
        let (debug_utils_loader, debug_messenger) =
            (None::<ash::ext::debug_utils::Instance>, None::<vk::DebugUtilsMessengerEXT>);

        // Temporary surface, only for the presentation support query
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        let selection = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle.as_raw(), window_handle.as_raw(), None)
        }
        .map_err(|e| {
            engine_error!("cluster3d::vulkan", "Failed to create surface: {:?}", e);
            Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
        })
        .and_then(|surface| {
            let selection = Self::select_physical_device(&instance, &surface_loader, surface);
            unsafe { surface_loader.destroy_surface(surface, None) };
            selection
        })
        .and_then(|(physical_device, family)| {
            Self::create_logical_device(&instance, physical_device, family)
                .map(|device| (physical_device, family, device))
        });

        let (physical_device, graphics_queue_family, device) = match selection {
            Ok(selection) => selection,
            Err(e) => {
                unsafe {
                    if let (Some(loader), Some(messenger)) = (&debug_utils_loader, debug_messenger) {
                        loader.destroy_debug_utils_messenger(messenger, None);
                    }
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

        // From here on GpuContext owns teardown, as soon as it exists
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!("cluster3d::vulkan", "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        let readback_pool_create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let readback_command_pool = unsafe { device.create_command_pool(&readback_pool_create_info, None) }
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to create readback command pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create readback command pool: {:?}", e))
            })?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        let depth_vk_format = pick_depth_format(|format| {
            let props = unsafe { instance.get_physical_device_format_properties(physical_device, format) };
            props.optimal_tiling_features.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        });

        let ctx = Arc::new(GpuContext::new(
            entry,
            instance,
            physical_device,
            device,
            allocator,
            graphics_queue,
            graphics_queue_family,
            readback_command_pool,
            debug_utils_loader,
            debug_messenger,
        ));

        let depth_format = depth_vk_format
            .and_then(vk_format_to_texture_format)
            .ok_or_else(|| {
                engine_error!("cluster3d::vulkan", "No supported depth attachment format");
                Error::InitializationFailed("No supported depth attachment format".to_string())
            })?;

        engine_info!("cluster3d::vulkan", "Vulkan device '{}' ready (queue family {}, depth {:?}, validation {})",
            device_name, graphics_queue_family, depth_format, validation);

        Ok(Self {
            ctx,
            depth_format,
            device_name,
            fences: FxHashSet::default(),
            semaphores: FxHashSet::default(),
        })
    }

    /// Validation is on when configured, compiled in and the layer is installed
    fn validation_requested(entry: &ash::Entry, config: &Config) -> bool {
        if !config.enable_validation {
            return false;
        }
        if !cfg!(feature = "vulkan-validation") {
            engine_warn!("cluster3d::vulkan",
                "Validation requested but the `vulkan-validation` feature is not compiled in");
            return false;
        }

        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let available = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().map_or(false, |name| name == VALIDATION_LAYER));
        if !available {
            engine_warn!("cluster3d::vulkan", "{:?} is not installed, running without validation", VALIDATION_LAYER);
        }
        available
    }

    #[cfg(feature = "vulkan-validation")]
    fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &Config,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        crate::debug::init_debug_config(crate::debug::Config {
            severity: config.debug_severity,
            enable_stats: true,
        });

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&debug_info, None) }
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to create debug messenger: {:?}", e);
                Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
            })?;

        Ok((debug_utils, messenger))
    }

    /// Pick the best GPU with the required extensions, features and a
    /// graphics queue family that can present to `surface`
    fn select_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to enumerate physical devices: {:?}", e);
                Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
            })?;

        let mut candidates = Vec::new();
        for physical_device in physical_devices {
            let properties = unsafe { instance.get_physical_device_properties(physical_device) };
            let name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            if properties.api_version < vk::API_VERSION_1_3 {
                engine_warn!("cluster3d::vulkan", "Skipping '{}': Vulkan 1.3 not supported", name);
                continue;
            }

            let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device) }
                .unwrap_or_default();
            let available: Vec<&CStr> = extensions
                .iter()
                .filter_map(|ext| ext.extension_name_as_c_str().ok())
                .collect();
            let missing = missing_extensions(&available);
            if !missing.is_empty() {
                engine_warn!("cluster3d::vulkan", "Skipping '{}': missing extensions {:?}", name, missing);
                continue;
            }

            let missing = Self::query_features(instance, physical_device).missing();
            if !missing.is_empty() {
                engine_warn!("cluster3d::vulkan", "Skipping '{}': missing features {:?}", name, missing);
                continue;
            }

            let queue_families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
            let family = queue_families
                .iter()
                .enumerate()
                .find(|(i, qf)| {
                    qf.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                        && unsafe {
                            surface_loader
                                .get_physical_device_surface_support(physical_device, *i as u32, surface)
                                .unwrap_or(false)
                        }
                })
                .map(|(i, _)| i as u32);

            match family {
                Some(family) => {
                    engine_debug!("cluster3d::vulkan", "Candidate GPU '{}' ({:?})", name, properties.device_type);
                    candidates.push((device_type_rank(properties.device_type), physical_device, family));
                }
                None => {
                    engine_warn!("cluster3d::vulkan", "Skipping '{}': no graphics queue with present support", name);
                }
            }
        }

        candidates
            .into_iter()
            .min_by_key(|(rank, _, _)| *rank)
            .map(|(_, physical_device, family)| (physical_device, family))
            .ok_or_else(|| {
                engine_error!("cluster3d::vulkan", "No GPU supports mesh shading with shader objects");
                Error::InitializationFailed("No suitable Vulkan device found".to_string())
            })
    }

    fn query_features(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> FeatureSupport {
        let mut vulkan12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut vulkan13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut mesh_shader = vk::PhysicalDeviceMeshShaderFeaturesEXT::default();
        let mut shader_object = vk::PhysicalDeviceShaderObjectFeaturesEXT::default();
        {
            let mut features2 = vk::PhysicalDeviceFeatures2::default()
                .push_next(&mut vulkan12)
                .push_next(&mut vulkan13)
                .push_next(&mut mesh_shader)
                .push_next(&mut shader_object);
            unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        }

        FeatureSupport {
            mesh_shader: mesh_shader.mesh_shader == vk::TRUE,
            task_shader: mesh_shader.task_shader == vk::TRUE,
            shader_object: shader_object.shader_object == vk::TRUE,
            synchronization2: vulkan13.synchronization2 == vk::TRUE,
            dynamic_rendering: vulkan13.dynamic_rendering == vk::TRUE,
            buffer_device_address: vulkan12.buffer_device_address == vk::TRUE,
            runtime_descriptor_array: vulkan12.runtime_descriptor_array == vk::TRUE,
        }
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        family: u32,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(family)
            .queue_priorities(&queue_priorities)];

        let device_extension_names: Vec<*const std::os::raw::c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let mut vulkan12 = vk::PhysicalDeviceVulkan12Features::default()
            .buffer_device_address(true)
            .runtime_descriptor_array(true);
        let mut vulkan13 = vk::PhysicalDeviceVulkan13Features::default()
            .synchronization2(true)
            .dynamic_rendering(true);
        let mut mesh_shader = vk::PhysicalDeviceMeshShaderFeaturesEXT::default()
            .mesh_shader(true)
            .task_shader(true);
        let mut shader_object = vk::PhysicalDeviceShaderObjectFeaturesEXT::default()
            .shader_object(true);
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut vulkan12)
            .push_next(&mut vulkan13)
            .push_next(&mut mesh_shader)
            .push_next(&mut shader_object);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .push_next(&mut features2);

        unsafe { instance.create_device(physical_device, &device_create_info, None) }
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to create logical device: {:?}", e);
                Error::InitializationFailed(format!("Failed to create device: {:?}", e))
            })
    }

    /// Create a swapchain presenting to `window`
    ///
    /// # Arguments
    ///
    /// * `window` - Window to present to (the one passed to `new()`)
    /// * `width` - Window width in pixels
    /// * `height` - Window height in pixels
    /// * `vsync` - FIFO when true
    pub fn create_swapchain<W: HasDisplayHandle + HasWindowHandle>(
        &self,
        window: &W,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Swapchain> {
        let display_handle = window.display_handle()
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to get display handle for swapchain: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
        let window_handle = window.window_handle()
            .map_err(|e| {
                engine_error!("cluster3d::vulkan", "Failed to get window handle for swapchain: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;

        let surface = unsafe {
            ash_window::create_surface(
                self.ctx.entry(),
                self.ctx.instance(),
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| {
            engine_error!("cluster3d::vulkan", "Failed to create surface for swapchain: {:?}", e);
            Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
        })?;

        Swapchain::new(Arc::clone(&self.ctx), surface, width, height, vsync)
    }

    /// Name of the selected GPU
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Create and bind a buffer (shared by `create_buffer` and readbacks)
    fn allocate_buffer(&self, desc: &BufferDesc) -> Result<Buffer> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("buffer size must be greater than zero".to_string()));
        }

        let device = &self.ctx.device;
        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage, desc.device_address))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = device.create_buffer(&buffer_create_info, None)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create buffer of size {} bytes: {:?}", desc.size, e))?;

            let requirements = device.get_buffer_memory_requirements(buffer);

            let allocation = self.ctx.allocator
                .lock()
                .map_err(|_| Error::BackendError("allocator mutex poisoned".to_string()))
                .and_then(|mut allocator| {
                    allocator.allocate(&AllocationCreateDesc {
                        name: "buffer",
                        requirements,
                        location: residency_to_location(desc.residency),
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|_e| {
                        let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                        engine_error!("cluster3d::vulkan", "Out of GPU memory for buffer (required: {:.2} MB)", size_mb);
                        Error::OutOfMemory
                    })
                });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
                device.destroy_buffer(buffer, None);
                return Err(engine_err!("cluster3d::vulkan", "Failed to bind buffer memory: {:?}", e));
            }

            let address = if desc.device_address {
                let info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
                device.get_buffer_device_address(&info)
            } else {
                0
            };

            Ok(Buffer::new(
                Arc::clone(&self.ctx),
                buffer,
                allocation,
                desc.size,
                address,
                desc.usage,
                desc.residency,
            ))
        }
    }

    /// Record, submit and wait for a single buffer-to-buffer copy
    fn blocking_copy(&self, src: vk::Buffer, dst: vk::Buffer, size: u64) -> Result<()> {
        let device = &self.ctx.device;
        let pool = self.ctx.readback_command_pool
            .lock()
            .map_err(|_| Error::BackendError("readback command pool mutex poisoned".to_string()))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = device.allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to allocate readback command buffer: {:?}", e))?
                .first()
                .copied()
                .ok_or_else(|| engine_err!("cluster3d::vulkan", "Readback command buffer allocation returned nothing"))?;

            let fence = device.create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create readback fence: {:?}", e));

            let result = fence.and_then(|fence| {
                let recorded = device
                    .begin_command_buffer(
                        command_buffer,
                        &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                    )
                    .and_then(|_| {
                        device.cmd_copy_buffer(command_buffer, src, dst, &[vk::BufferCopy { src_offset: 0, dst_offset: 0, size }]);
                        device.end_command_buffer(command_buffer)
                    })
                    .and_then(|_| {
                        let command_buffers = [command_buffer];
                        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                        device.queue_submit(self.ctx.graphics_queue, &[submit_info], fence)
                    })
                    .and_then(|_| device.wait_for_fences(&[fence], true, WAIT_FOREVER))
                    .map_err(|e| engine_err!("cluster3d::vulkan", "Readback copy failed: {:?}", e));
                device.destroy_fence(fence, None);
                recorded
            });

            device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn RendererBuffer>> {
        let buffer = self.allocate_buffer(&desc)?;
        engine_debug!("cluster3d::vulkan", "Created {:?} buffer of {} bytes ({:?})", desc.usage, desc.size, desc.residency);
        Ok(Arc::new(buffer))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn RendererTexture>> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!("texture extent {}x{} is empty", desc.width, desc.height)));
        }

        let device = &self.ctx.device;
        let format = texture_format_to_vk(desc.format);
        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create {}x{} image: {:?}", desc.width, desc.height, e))?;

            let requirements = device.get_image_memory_requirements(image);
            let allocation = self.ctx.allocator
                .lock()
                .map_err(|_| Error::BackendError("allocator mutex poisoned".to_string()))
                .and_then(|mut allocator| {
                    allocator.allocate(&AllocationCreateDesc {
                        name: "texture",
                        requirements,
                        location: gpu_allocator::MemoryLocation::GpuOnly,
                        linear: false,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|_e| {
                        let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                        engine_error!("cluster3d::vulkan", "Out of GPU memory for texture (required: {:.2} MB)", size_mb);
                        Error::OutOfMemory
                    })
                });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let view = device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .and_then(|_| {
                    let view_create_info = vk::ImageViewCreateInfo::default()
                        .image(image)
                        .view_type(vk::ImageViewType::TYPE_2D)
                        .format(format)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: view_aspect(desc.format),
                            base_mip_level: 0,
                            level_count: 1,
                            base_array_layer: 0,
                            layer_count: 1,
                        });
                    device.create_image_view(&view_create_info, None)
                });
            let view = match view {
                Ok(view) => view,
                Err(e) => {
                    if let Ok(mut allocator) = self.ctx.allocator.lock() {
                        allocator.free(allocation).ok();
                    }
                    device.destroy_image(image, None);
                    return Err(engine_err!("cluster3d::vulkan", "Failed to bind image memory or create view: {:?}", e));
                }
            };

            let info = TextureInfo {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                usage: desc.usage,
            };
            engine_debug!("cluster3d::vulkan", "Created {}x{} {:?} texture", desc.width, desc.height, desc.format);

            Ok(Arc::new(Texture::new(Arc::clone(&self.ctx), image, view, allocation, info)))
        }
    }

    fn create_command_list(&self) -> Result<Box<dyn RendererCommandList>> {
        Ok(Box::new(CommandList::new(Arc::clone(&self.ctx))?))
    }

    fn create_shader_program(&mut self, desc: ShaderProgramDesc) -> Result<Arc<dyn RendererShaderProgram>> {
        Ok(Arc::new(ShaderProgram::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { self.ctx.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
            .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create fence: {:?}", e))?;
        self.fences.insert(fence.as_raw());
        Ok(FenceHandle(fence.as_raw()))
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        if self.fences.remove(&fence.0) {
            unsafe { self.ctx.device.destroy_fence(vk::Fence::from_raw(fence.0), None) };
        }
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<bool> {
        let fences = [vk::Fence::from_raw(fence.0)];
        match unsafe { self.ctx.device.wait_for_fences(&fences, true, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(engine_err!("cluster3d::vulkan", "Failed to wait for fence: {:?}", e)),
        }
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> Result<()> {
        unsafe { self.ctx.device.reset_fences(&[vk::Fence::from_raw(fence.0)]) }
            .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to reset fence: {:?}", e))
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe { self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create semaphore: {:?}", e))?;
        self.semaphores.insert(semaphore.as_raw());
        Ok(SemaphoreHandle(semaphore.as_raw()))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        if self.semaphores.remove(&semaphore.0) {
            unsafe { self.ctx.device.destroy_semaphore(vk::Semaphore::from_raw(semaphore.0), None) };
        }
    }

    fn submit(&self, desc: &SubmitDesc<'_>) -> Result<()> {
        let command_buffer_infos: Vec<vk::CommandBufferSubmitInfo> = desc.command_lists
            .iter()
            .map(|cmd| vk::CommandBufferSubmitInfo::default().command_buffer(vk_command_list(*cmd).command_buffer()))
            .collect();
        let wait_infos: Vec<vk::SemaphoreSubmitInfo> = desc.wait_semaphores
            .iter()
            .map(|(semaphore, stages)| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(vk::Semaphore::from_raw(semaphore.0))
                    .stage_mask(pipeline_stages_to_vk(*stages))
            })
            .collect();
        let signal_infos: Vec<vk::SemaphoreSubmitInfo> = desc.signal_semaphores
            .iter()
            .map(|semaphore| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(vk::Semaphore::from_raw(semaphore.0))
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            })
            .collect();

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_infos);
        let fence = desc.fence.map_or(vk::Fence::null(), |f| vk::Fence::from_raw(f.0));

        unsafe { self.ctx.device.queue_submit2(self.ctx.graphics_queue, &[submit_info], fence) }
            .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to submit commands to GPU queue: {:?}", e))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to wait idle: {:?}", e))
    }

    fn read_buffer(&self, buffer: &dyn RendererBuffer) -> Result<Vec<u8>> {
        let src = vk_buffer(buffer);
        if let Some(bytes) = src.mapped_bytes() {
            return Ok(bytes.to_vec());
        }

        let staging = self.allocate_buffer(&BufferDesc {
            size: src.size,
            usage: BufferUsage::Readback,
            residency: MemoryResidency::GpuToCpu,
            device_address: false,
        })?;
        self.blocking_copy(src.buffer, staging.buffer, src.size)?;

        staging
            .mapped_bytes()
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| engine_err!("cluster3d::vulkan", "Readback buffer is not host-visible"))
    }

    fn depth_format(&self) -> TextureFormat {
        self.depth_format
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            // Wait for device to finish
            self.ctx.device.device_wait_idle().ok();

            for &fence in &self.fences {
                self.ctx.device.destroy_fence(vk::Fence::from_raw(fence), None);
            }
            for &semaphore in &self.semaphores {
                self.ctx.device.destroy_semaphore(vk::Semaphore::from_raw(semaphore), None);
            }
        }
        // The device itself goes with the last GpuContext reference
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
