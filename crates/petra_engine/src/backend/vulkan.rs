//! Vulkan implementation of the render backend
//!
//! Owns the loaded entry point, instance/device function tables and the
//! extension loaders, and holds the window the surface is created against.
//! Supports one logical device at a time, which is all this prototype's
//! bootstrap needs.

use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Entry, Instance};

use crate::backend::{
    AdapterInfo, BackendError, BackendResult, CreatedInstance, CreatedSwapchain, RenderBackend,
    SurfaceSupport, SwapchainRequest,
};
use crate::window::Window;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Render backend backed by ash and a GLFW window
pub struct VulkanBackend {
    window: Window,
    entry: Entry,
    instance: Option<Instance>,
    debug_utils: Option<DebugUtils>,
    surface_loader: Option<Surface>,
    device: Option<ash::Device>,
    swapchain_loader: Option<SwapchainLoader>,
}

impl VulkanBackend {
    /// Load the Vulkan library and wrap the given window
    pub fn new(window: Window) -> BackendResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| BackendError::Loader(format!("{:?}", e)))?;

        Ok(Self {
            window,
            entry,
            instance: None,
            debug_utils: None,
            surface_loader: None,
            device: None,
            swapchain_loader: None,
        })
    }

    /// The window the surface is created against
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Mutable access to the window, for event polling
    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    fn instance(&self) -> &Instance {
        self.instance
            .as_ref()
            .expect("instance rule must be dispatched before dependent rules")
    }

    fn surface_loader(&self) -> &Surface {
        self.surface_loader
            .as_ref()
            .expect("instance rule must be dispatched before surface queries")
    }

    fn device_table(&self) -> &ash::Device {
        self.device
            .as_ref()
            .expect("device rule must be dispatched before device-scoped rules")
    }

    fn validation_layer_available(&self) -> BackendResult<bool> {
        let layers = self
            .entry
            .enumerate_instance_layer_properties()
            .map_err(BackendError::Api)?;

        Ok(layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_string_lossy() == VALIDATION_LAYER
        }))
    }
}

impl RenderBackend for VulkanBackend {
    fn create_instance(
        &mut self,
        application_name: &str,
        application_version: (u32, u32, u32),
        enable_validation: bool,
    ) -> BackendResult<CreatedInstance> {
        let validation_enabled = enable_validation && self.validation_layer_available()?;

        let app_name = CString::new(application_name).unwrap();
        let engine_name = CString::new("PetraEngine").unwrap();
        let (major, minor, patch) = application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        // Get required extensions from GLFW
        let required_extensions = self
            .window
            .get_required_instance_extensions()
            .map_err(|e| BackendError::Window(e.to_string()))?;

        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()).unwrap())
            .collect();

        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        if validation_enabled {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if validation_enabled {
            vec![CString::new(VALIDATION_LAYER).unwrap()]
        } else {
            vec![]
        };

        let layer_names_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            self.entry
                .create_instance(&create_info, None)
                .map_err(BackendError::Api)?
        };

        let handle = instance.handle();
        self.surface_loader = Some(Surface::new(&self.entry, &instance));
        if validation_enabled {
            self.debug_utils = Some(DebugUtils::new(&self.entry, &instance));
        }
        self.instance = Some(instance);

        Ok(CreatedInstance {
            instance: handle,
            validation_enabled,
        })
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        debug_assert_eq!(self.instance().handle(), instance);

        self.swapchain_loader = None;
        self.surface_loader = None;
        self.debug_utils = None;
        if let Some(instance) = self.instance.take() {
            unsafe {
                instance.destroy_instance(None);
            }
        }
    }

    fn create_debug_messenger(
        &mut self,
        _instance: vk::Instance,
    ) -> BackendResult<vk::DebugUtilsMessengerEXT> {
        let debug_utils = self
            .debug_utils
            .as_ref()
            .expect("debug messenger requires a validation-enabled instance");

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(BackendError::Api)
        }
    }

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
        }
    }

    fn enumerate_adapters(&mut self, _instance: vk::Instance) -> BackendResult<Vec<AdapterInfo>> {
        let instance = self.instance();
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(BackendError::Api)?
        };

        Ok(devices
            .into_iter()
            .map(|device| {
                let properties = unsafe { instance.get_physical_device_properties(device) };
                let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned();
                AdapterInfo { device, name }
            })
            .collect())
    }

    fn create_surface(&mut self, instance: vk::Instance) -> BackendResult<vk::SurfaceKHR> {
        self.window
            .create_vulkan_surface(instance)
            .map_err(|e| BackendError::Window(e.to_string()))
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        unsafe {
            self.surface_loader().destroy_surface(surface, None);
        }
    }

    fn query_surface_support(
        &mut self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> BackendResult<SurfaceSupport> {
        let loader = self.surface_loader();

        let capabilities = unsafe {
            loader
                .get_physical_device_surface_capabilities(adapter, surface)
                .map_err(BackendError::Api)?
        };
        let formats = unsafe {
            loader
                .get_physical_device_surface_formats(adapter, surface)
                .map_err(BackendError::Api)?
        };
        let present_modes = unsafe {
            loader
                .get_physical_device_surface_present_modes(adapter, surface)
                .map_err(BackendError::Api)?
        };

        Ok(SurfaceSupport {
            capabilities,
            formats,
            present_modes,
        })
    }

    fn queue_family_properties(
        &mut self,
        adapter: vk::PhysicalDevice,
    ) -> BackendResult<Vec<vk::QueueFamilyProperties>> {
        Ok(unsafe {
            self.instance()
                .get_physical_device_queue_family_properties(adapter)
        })
    }

    fn queue_family_supports_present(
        &mut self,
        adapter: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> BackendResult<bool> {
        unsafe {
            self.surface_loader()
                .get_physical_device_surface_support(adapter, family, surface)
                .map_err(BackendError::Api)
        }
    }

    fn create_device(
        &mut self,
        adapter: vk::PhysicalDevice,
        queue_families: &[u32],
    ) -> BackendResult<vk::Device> {
        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            self.instance()
                .create_device(adapter, &create_info, None)
                .map_err(BackendError::Api)?
        };

        let handle = device.handle();
        self.swapchain_loader = Some(SwapchainLoader::new(self.instance(), &device));
        self.device = Some(device);

        Ok(handle)
    }

    fn destroy_device(&mut self, device: vk::Device) {
        debug_assert_eq!(self.device_table().handle(), device);

        self.swapchain_loader = None;
        if let Some(device) = self.device.take() {
            unsafe {
                // Ensure device is idle before destruction
                let _ = device.device_wait_idle();
                device.destroy_device(None);
            }
        }
    }

    fn get_queue(&mut self, device: vk::Device, family: u32) -> BackendResult<vk::Queue> {
        debug_assert_eq!(self.device_table().handle(), device);

        Ok(unsafe { self.device_table().get_device_queue(family, 0) })
    }

    fn create_swapchain(
        &mut self,
        device: vk::Device,
        request: &SwapchainRequest,
    ) -> BackendResult<CreatedSwapchain> {
        debug_assert_eq!(self.device_table().handle(), device);

        let loader = self
            .swapchain_loader
            .as_ref()
            .expect("device rule must be dispatched before the swapchain rule");

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(request.surface)
            .min_image_count(request.min_image_count)
            .image_format(request.format.format)
            .image_color_space(request.format.color_space)
            .image_extent(request.extent)
            .image_array_layers(1)
            .image_usage(request.image_usage)
            .image_sharing_mode(request.sharing_mode)
            .queue_family_indices(&request.queue_family_indices)
            .pre_transform(request.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(request.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(BackendError::Api)?
        };

        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(BackendError::Api)?
        };

        Ok(CreatedSwapchain { swapchain, images })
    }

    fn destroy_swapchain(&mut self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        if let Some(loader) = &self.swapchain_loader {
            unsafe {
                loader.destroy_swapchain(swapchain, None);
            }
        }
    }

    fn create_image_view(
        &mut self,
        device: vk::Device,
        image: vk::Image,
        format: vk::Format,
    ) -> BackendResult<vk::ImageView> {
        debug_assert_eq!(self.device_table().handle(), device);

        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
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

        unsafe {
            self.device_table()
                .create_image_view(&create_info, None)
                .map_err(BackendError::Api)
        }
    }

    fn destroy_image_view(&mut self, _device: vk::Device, view: vk::ImageView) {
        unsafe {
            self.device_table().destroy_image_view(view, None);
        }
    }

    fn create_shader_module(
        &mut self,
        device: vk::Device,
        code: &[u32],
    ) -> BackendResult<vk::ShaderModule> {
        debug_assert_eq!(self.device_table().handle(), device);

        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        unsafe {
            self.device_table()
                .create_shader_module(&create_info, None)
                .map_err(BackendError::Api)
        }
    }

    fn destroy_shader_module(&mut self, _device: vk::Device, module: vk::ShaderModule) {
        unsafe {
            self.device_table().destroy_shader_module(module, None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}
