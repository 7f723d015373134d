/// GpuContext - Shared GPU objects for all Vulkan resources
///
/// Contains everything needed for GPU operations:
/// - Device and the mesh shader / shader object loaders
/// - Allocator for memory management
/// - Queue for command submission
/// - Command pool for blocking readbacks

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

/// Shared GPU context for all Vulkan resources.
///
/// Shared (via `Arc`) by the device, the swapchain and every buffer,
/// texture, command list and shader program. The last owner to go away
/// tears down the allocator, the logical device and the instance, so no
/// resource can outlive the device it was created from.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue for submission and presentation
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Physical device the logical device was created on
    pub physical_device: vk::PhysicalDevice,

    /// `VK_EXT_mesh_shader` entry points
    pub mesh_shader: ash::ext::mesh_shader::Device,

    /// `VK_EXT_shader_object` entry points (also carries the extended dynamic state setters)
    pub shader_object: ash::ext::shader_object::Device,

    /// Command pool for one-shot readback copies
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub readback_command_pool: Mutex<vk::CommandPool>,

    /// Vulkan entry, kept alive as long as the instance
    pub(crate) entry: ash::Entry,

    /// Vulkan instance
    pub(crate) instance: ash::Instance,

    /// Debug utils loader (for validation layers)
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    /// Create a new GPU context
    ///
    /// # Arguments
    ///
    /// * `entry` - Loaded Vulkan entry
    /// * `instance` - Vulkan instance
    /// * `physical_device` - Selected physical device
    /// * `device` - Vulkan logical device
    /// * `allocator` - GPU memory allocator
    /// * `graphics_queue` - Graphics queue for command submission
    /// * `graphics_queue_family` - Graphics queue family index
    /// * `readback_command_pool` - Command pool for readback operations
    /// * `debug_utils_loader` - Debug utils loader (if validation enabled)
    /// * `debug_messenger` - Debug messenger handle (if validation enabled)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        readback_command_pool: vk::CommandPool,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Self {
        let mesh_shader = ash::ext::mesh_shader::Device::new(&instance, &device);
        let shader_object = ash::ext::shader_object::Device::new(&instance, &device);
        Self {
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family,
            physical_device,
            mesh_shader,
            shader_object,
            readback_command_pool: Mutex::new(readback_command_pool),
            entry,
            instance,
            debug_utils_loader,
            debug_messenger,
        }
    }

    /// Vulkan instance (surface and swapchain loaders are built from it)
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Vulkan entry
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Readback pool
            if let Ok(pool) = self.readback_command_pool.get_mut() {
                if *pool != vk::CommandPool::null() {
                    self.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }

            // 2. Free VkDeviceMemory pages BEFORE destroying the device
            ManuallyDrop::drop(&mut self.allocator);

            // 3. Stop routing validation messages
            #[cfg(feature = "vulkan-validation")]
            crate::debug::cleanup_debug_config();

            // 4. Debug messenger BEFORE device and instance
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils_loader, self.debug_messenger.take())
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            // 5. Device and instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
