//! Graphics backend seam
//!
//! The rule graph never talks to the graphics API directly. Every create,
//! destroy and query it needs goes through [`RenderBackend`], expressed over
//! plain `vk` handles so the same rule logic runs against the real Vulkan
//! implementation or a recording test double.

use ash::vk;
use thiserror::Error;

pub mod vulkan;

#[cfg(test)]
pub(crate) mod trace;

/// Backend-level errors
#[derive(Error, Debug)]
pub enum BackendError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The Vulkan loader could not be initialized
    #[error("failed to load Vulkan: {0}")]
    Loader(String),

    /// Windowing-layer failure surfaced during a backend operation
    #[error("window error: {0}")]
    Window(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// An instance as realized by the backend
///
/// `validation_enabled` reports what was actually negotiated, which may be
/// less than what was requested.
#[derive(Debug, Clone, Copy)]
pub struct CreatedInstance {
    /// Raw instance handle
    pub instance: vk::Instance,
    /// Whether validation layers ended up enabled
    pub validation_enabled: bool,
}

/// A physical device as reported by adapter enumeration
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Raw physical device handle
    pub device: vk::PhysicalDevice,
    /// Driver-reported device name
    pub name: String,
}

/// Everything a surface reports about itself on a given adapter
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Surface capabilities (image counts, extents, transforms)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Fully resolved swapchain creation parameters
///
/// All selection policy (format, extent, image count, sharing mode) has
/// already been applied by the time a backend sees this.
#[derive(Debug, Clone)]
pub struct SwapchainRequest {
    /// Target surface
    pub surface: vk::SurfaceKHR,
    /// Minimum number of swapchain images
    pub min_image_count: u32,
    /// Image format and color space
    pub format: vk::SurfaceFormatKHR,
    /// Image extent in pixels
    pub extent: vk::Extent2D,
    /// Image usage flags
    pub image_usage: vk::ImageUsageFlags,
    /// Exclusive or concurrent queue-family sharing
    pub sharing_mode: vk::SharingMode,
    /// Queue families sharing the images (empty for exclusive sharing)
    pub queue_family_indices: Vec<u32>,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Surface pre-transform
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// A swapchain as realized by the backend, with its retrieved images
#[derive(Debug, Clone)]
pub struct CreatedSwapchain {
    /// Raw swapchain handle
    pub swapchain: vk::SwapchainKHR,
    /// Images owned by the swapchain
    pub images: Vec<vk::Image>,
}

/// The set of graphics-API operations the rule graph dispatches through
///
/// Creation methods may fail with a backend-specific error; destruction
/// methods are infallible, mirroring the underlying API. Callers are
/// responsible for ordering: a handle passed to a method must have been
/// produced by this backend and not yet destroyed. The rule graph's
/// dispatch/teardown ordering provides exactly that guarantee.
pub trait RenderBackend {
    /// Create the API instance
    ///
    /// A validation-layer request is soft: when the layers are unavailable
    /// the instance is created without them and the returned
    /// [`CreatedInstance::validation_enabled`] reports the downgrade.
    fn create_instance(
        &mut self,
        application_name: &str,
        application_version: (u32, u32, u32),
        enable_validation: bool,
    ) -> BackendResult<CreatedInstance>;

    /// Destroy the API instance
    fn destroy_instance(&mut self, instance: vk::Instance);

    /// Create a debug messenger on a validation-enabled instance
    fn create_debug_messenger(
        &mut self,
        instance: vk::Instance,
    ) -> BackendResult<vk::DebugUtilsMessengerEXT>;

    /// Destroy a debug messenger
    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT);

    /// Enumerate physical devices with their driver-reported names
    fn enumerate_adapters(&mut self, instance: vk::Instance) -> BackendResult<Vec<AdapterInfo>>;

    /// Create a platform surface bound to the backend's window
    fn create_surface(&mut self, instance: vk::Instance) -> BackendResult<vk::SurfaceKHR>;

    /// Destroy a platform surface
    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    /// Query capabilities, formats and present modes of a surface
    fn query_surface_support(
        &mut self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> BackendResult<SurfaceSupport>;

    /// Queue family properties of an adapter
    fn queue_family_properties(
        &mut self,
        adapter: vk::PhysicalDevice,
    ) -> BackendResult<Vec<vk::QueueFamilyProperties>>;

    /// Whether a queue family can present to a surface
    fn queue_family_supports_present(
        &mut self,
        adapter: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> BackendResult<bool>;

    /// Create a logical device with one queue per listed family
    fn create_device(
        &mut self,
        adapter: vk::PhysicalDevice,
        queue_families: &[u32],
    ) -> BackendResult<vk::Device>;

    /// Destroy a logical device
    fn destroy_device(&mut self, device: vk::Device);

    /// Fetch the first queue of a family from a device
    fn get_queue(&mut self, device: vk::Device, family: u32) -> BackendResult<vk::Queue>;

    /// Create a swapchain and retrieve its images
    fn create_swapchain(
        &mut self,
        device: vk::Device,
        request: &SwapchainRequest,
    ) -> BackendResult<CreatedSwapchain>;

    /// Destroy a swapchain
    fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR);

    /// Create an image view over a swapchain image
    fn create_image_view(
        &mut self,
        device: vk::Device,
        image: vk::Image,
        format: vk::Format,
    ) -> BackendResult<vk::ImageView>;

    /// Destroy an image view
    fn destroy_image_view(&mut self, device: vk::Device, view: vk::ImageView);

    /// Create a shader module from SPIR-V words
    fn create_shader_module(
        &mut self,
        device: vk::Device,
        code: &[u32],
    ) -> BackendResult<vk::ShaderModule>;

    /// Destroy a shader module
    fn destroy_shader_module(&mut self, device: vk::Device, module: vk::ShaderModule);
}
