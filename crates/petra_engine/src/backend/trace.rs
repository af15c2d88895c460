//! Recording backend for tests
//!
//! Fabricates numbered handles, serves configurable adapter and surface
//! data, and records every call in order so tests can assert on dispatch
//! and teardown sequencing without a GPU.

use ash::vk;
use ash::vk::Handle;

use crate::backend::{
    AdapterInfo, BackendError, BackendResult, CreatedInstance, CreatedSwapchain, RenderBackend,
    SurfaceSupport, SwapchainRequest,
};

pub(crate) struct TraceBackend {
    /// Every backend call, in invocation order
    pub calls: Vec<String>,
    /// Whether `VK_LAYER_KHRONOS_validation` is "installed"
    pub validation_layers_available: bool,
    /// Adapter names served by enumeration
    pub adapter_names: Vec<String>,
    /// Queue family table served for every adapter
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Per-family present support
    pub present_support: Vec<bool>,
    /// Surface capabilities served by `query_surface_support`
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Surface formats served by `query_surface_support`
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Present modes served by `query_surface_support`
    pub present_modes: Vec<vk::PresentModeKHR>,
    /// Every swapchain request received, for selection-policy assertions
    pub swapchain_requests: Vec<SwapchainRequest>,
    /// Queue family lists received by `create_device`
    pub device_requests: Vec<Vec<u32>>,
    next_raw: u64,
}

fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: 1,
        ..Default::default()
    }
}

impl Default for TraceBackend {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            validation_layers_available: true,
            adapter_names: vec!["Trace GPU".to_string()],
            queue_families: vec![family(
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            )],
            present_support: vec![true],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: 640,
                    height: 480,
                },
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            swapchain_requests: Vec::new(),
            device_requests: Vec::new(),
            next_raw: 0,
        }
    }
}

impl TraceBackend {
    /// Replace the queue family table and per-family present support
    pub fn with_queue_families(
        mut self,
        families: Vec<vk::QueueFamilyProperties>,
        present: Vec<bool>,
    ) -> Self {
        assert_eq!(families.len(), present.len());
        self.queue_families = families;
        self.present_support = present;
        self
    }

    /// Build a queue family entry with the given capability flags
    pub fn queue_family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        family(flags)
    }

    /// Number of times a call was recorded
    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == call).count()
    }

    /// Position of the first occurrence of a call; panics if absent
    pub fn position(&self, call: &str) -> usize {
        self.calls
            .iter()
            .position(|c| c.as_str() == call)
            .unwrap_or_else(|| panic!("call {call:?} was never recorded"))
    }

    /// The recorded calls starting with `destroy_`, in order
    pub fn destroy_calls(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|c| c.starts_with("destroy_"))
            .map(String::as_str)
            .collect()
    }

    fn next_handle(&mut self) -> u64 {
        self.next_raw += 1;
        self.next_raw
    }
}

impl RenderBackend for TraceBackend {
    fn create_instance(
        &mut self,
        _application_name: &str,
        _application_version: (u32, u32, u32),
        enable_validation: bool,
    ) -> BackendResult<CreatedInstance> {
        self.calls.push("create_instance".to_string());
        let raw = self.next_handle();
        Ok(CreatedInstance {
            instance: vk::Instance::from_raw(raw),
            validation_enabled: enable_validation && self.validation_layers_available,
        })
    }

    fn destroy_instance(&mut self, _instance: vk::Instance) {
        self.calls.push("destroy_instance".to_string());
    }

    fn create_debug_messenger(
        &mut self,
        _instance: vk::Instance,
    ) -> BackendResult<vk::DebugUtilsMessengerEXT> {
        self.calls.push("create_debug_messenger".to_string());
        let raw = self.next_handle();
        Ok(vk::DebugUtilsMessengerEXT::from_raw(raw))
    }

    fn destroy_debug_messenger(&mut self, _messenger: vk::DebugUtilsMessengerEXT) {
        self.calls.push("destroy_debug_messenger".to_string());
    }

    fn enumerate_adapters(&mut self, _instance: vk::Instance) -> BackendResult<Vec<AdapterInfo>> {
        self.calls.push("enumerate_adapters".to_string());
        let adapters = self
            .adapter_names
            .clone()
            .into_iter()
            .map(|name| AdapterInfo {
                device: vk::PhysicalDevice::from_raw(self.next_handle()),
                name,
            })
            .collect();
        Ok(adapters)
    }

    fn create_surface(&mut self, _instance: vk::Instance) -> BackendResult<vk::SurfaceKHR> {
        self.calls.push("create_surface".to_string());
        let raw = self.next_handle();
        Ok(vk::SurfaceKHR::from_raw(raw))
    }

    fn destroy_surface(&mut self, _surface: vk::SurfaceKHR) {
        self.calls.push("destroy_surface".to_string());
    }

    fn query_surface_support(
        &mut self,
        _adapter: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> BackendResult<SurfaceSupport> {
        self.calls.push("query_surface_support".to_string());
        Ok(SurfaceSupport {
            capabilities: self.capabilities,
            formats: self.formats.clone(),
            present_modes: self.present_modes.clone(),
        })
    }

    fn queue_family_properties(
        &mut self,
        _adapter: vk::PhysicalDevice,
    ) -> BackendResult<Vec<vk::QueueFamilyProperties>> {
        self.calls.push("queue_family_properties".to_string());
        Ok(self.queue_families.clone())
    }

    fn queue_family_supports_present(
        &mut self,
        _adapter: vk::PhysicalDevice,
        family: u32,
        _surface: vk::SurfaceKHR,
    ) -> BackendResult<bool> {
        self.calls.push("present_support".to_string());
        Ok(self.present_support[family as usize])
    }

    fn create_device(
        &mut self,
        _adapter: vk::PhysicalDevice,
        queue_families: &[u32],
    ) -> BackendResult<vk::Device> {
        self.calls.push("create_device".to_string());
        self.device_requests.push(queue_families.to_vec());
        let raw = self.next_handle();
        Ok(vk::Device::from_raw(raw))
    }

    fn destroy_device(&mut self, _device: vk::Device) {
        self.calls.push("destroy_device".to_string());
    }

    fn get_queue(&mut self, _device: vk::Device, _family: u32) -> BackendResult<vk::Queue> {
        self.calls.push("get_queue".to_string());
        let raw = self.next_handle();
        Ok(vk::Queue::from_raw(raw))
    }

    fn create_swapchain(
        &mut self,
        _device: vk::Device,
        request: &SwapchainRequest,
    ) -> BackendResult<CreatedSwapchain> {
        self.calls.push("create_swapchain".to_string());
        self.swapchain_requests.push(request.clone());

        let image_count = request.min_image_count;
        let images = (0..image_count)
            .map(|_| vk::Image::from_raw(self.next_handle()))
            .collect();
        let raw = self.next_handle();
        Ok(CreatedSwapchain {
            swapchain: vk::SwapchainKHR::from_raw(raw),
            images,
        })
    }

    fn destroy_swapchain(&mut self, _device: vk::Device, _swapchain: vk::SwapchainKHR) {
        self.calls.push("destroy_swapchain".to_string());
    }

    fn create_image_view(
        &mut self,
        _device: vk::Device,
        _image: vk::Image,
        _format: vk::Format,
    ) -> BackendResult<vk::ImageView> {
        self.calls.push("create_image_view".to_string());
        let raw = self.next_handle();
        Ok(vk::ImageView::from_raw(raw))
    }

    fn destroy_image_view(&mut self, _device: vk::Device, _view: vk::ImageView) {
        self.calls.push("destroy_image_view".to_string());
    }

    fn create_shader_module(
        &mut self,
        _device: vk::Device,
        code: &[u32],
    ) -> BackendResult<vk::ShaderModule> {
        if code.is_empty() {
            return Err(BackendError::Api(vk::Result::ERROR_INITIALIZATION_FAILED));
        }
        self.calls.push("create_shader_module".to_string());
        let raw = self.next_handle();
        Ok(vk::ShaderModule::from_raw(raw))
    }

    fn destroy_shader_module(&mut self, _device: vk::Device, _module: vk::ShaderModule) {
        self.calls.push("destroy_shader_module".to_string());
    }
}
