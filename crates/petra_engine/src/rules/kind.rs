//! Rule kind catalogue
//!
//! One configuration variant and one state variant per kind. Configuration
//! is fixed at registration and never read across rules; state is written
//! once by the kind's build function and is the only thing a dependent rule
//! may read.

use std::path::PathBuf;

use ash::vk;

/// The category of resource a rule represents
///
/// Selects the build and teardown behavior applied to the rule. The
/// dependency list of each kind is positional; the expected kind at every
/// position is documented on the corresponding `add_*_rule` factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// API instance
    Instance,
    /// Validation-layer debug messenger
    DebugMessenger,
    /// Selected physical device
    PhysicalDevice,
    /// Platform surface
    Surface,
    /// Queried surface capabilities, formats and present modes
    SurfaceCapabilities,
    /// Selected queue family index
    QueueFamily,
    /// De-duplicated set of queue family indices
    QueueFamilyGroup,
    /// Logical device
    Device,
    /// Device queue
    Queue,
    /// Swapchain with its images
    Swapchain,
    /// One image view per swapchain image
    SwapchainImageViews,
    /// SPIR-V shader module
    ShaderModule,
}

/// Configuration for an Instance rule
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Application name reported to the driver
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Request validation layers; silently downgraded when unavailable
    pub enable_validation: bool,
}

impl InstanceConfig {
    /// Instance configuration with version 0.1.0 and build-type validation
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            application_version: (0, 1, 0),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

/// Configuration for a PhysicalDevice rule
#[derive(Debug, Clone, Default)]
pub struct PhysicalDeviceConfig {
    /// Substring match against the driver-reported adapter name;
    /// `None` selects the first enumerated adapter
    pub adapter_name: Option<String>,
}

/// Configuration for a QueueFamily rule
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilyConfig {
    /// Capability flags the family must all support
    pub required_flags: vk::QueueFlags,
    /// Whether the family must be able to present to the surface
    /// wired as dependency 1
    pub needs_present: bool,
}

/// Configuration for a Swapchain rule
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    /// Usage flags for the swapchain images
    pub image_usage: vk::ImageUsageFlags,
    /// Present mode to use when the surface supports it; falls back to FIFO
    pub preferred_present_mode: vk::PresentModeKHR,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            preferred_present_mode: vk::PresentModeKHR::FIFO,
        }
    }
}

/// Configuration for a ShaderModule rule
#[derive(Debug, Clone)]
pub struct ShaderModuleConfig {
    /// Path to the SPIR-V file
    pub source_path: PathBuf,
}

/// Kind-tagged rule configuration
///
/// Kinds whose build behavior is fully determined by their dependencies
/// carry no payload.
#[derive(Debug, Clone)]
pub enum RuleConfig {
    /// Instance configuration
    Instance(InstanceConfig),
    /// Debug messenger (no configuration)
    DebugMessenger,
    /// Physical device selection configuration
    PhysicalDevice(PhysicalDeviceConfig),
    /// Surface (no configuration)
    Surface,
    /// Surface capabilities query (no configuration)
    SurfaceCapabilities,
    /// Queue family selection configuration
    QueueFamily(QueueFamilyConfig),
    /// Queue family group (no configuration)
    QueueFamilyGroup,
    /// Logical device (no configuration)
    Device,
    /// Queue fetch (no configuration)
    Queue,
    /// Swapchain configuration
    Swapchain(SwapchainConfig),
    /// Swapchain image views (no configuration)
    SwapchainImageViews,
    /// Shader module configuration
    ShaderModule(ShaderModuleConfig),
}

impl RuleConfig {
    /// The kind this configuration selects
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Instance(_) => RuleKind::Instance,
            Self::DebugMessenger => RuleKind::DebugMessenger,
            Self::PhysicalDevice(_) => RuleKind::PhysicalDevice,
            Self::Surface => RuleKind::Surface,
            Self::SurfaceCapabilities => RuleKind::SurfaceCapabilities,
            Self::QueueFamily(_) => RuleKind::QueueFamily,
            Self::QueueFamilyGroup => RuleKind::QueueFamilyGroup,
            Self::Device => RuleKind::Device,
            Self::Queue => RuleKind::Queue,
            Self::Swapchain(_) => RuleKind::Swapchain,
            Self::SwapchainImageViews => RuleKind::SwapchainImageViews,
            Self::ShaderModule(_) => RuleKind::ShaderModule,
        }
    }
}

/// State produced by an Instance rule
#[derive(Debug, Clone, Copy)]
pub struct InstanceState {
    /// Raw instance handle
    pub instance: vk::Instance,
    /// Whether validation layers were actually enabled
    ///
    /// May be false even when requested; the downgrade is logged at build
    /// time, never treated as a failure.
    pub validation_enabled: bool,
}

/// State produced by a DebugMessenger rule
#[derive(Debug, Clone, Copy)]
pub struct DebugMessengerState {
    /// Messenger handle; null when validation layers ended up disabled
    pub messenger: vk::DebugUtilsMessengerEXT,
}

/// State produced by a PhysicalDevice rule
#[derive(Debug, Clone)]
pub struct PhysicalDeviceState {
    /// Selected physical device handle
    pub device: vk::PhysicalDevice,
    /// Driver-reported device name
    pub name: String,
}

/// State produced by a Surface rule
#[derive(Debug, Clone, Copy)]
pub struct SurfaceState {
    /// Platform surface handle
    pub surface: vk::SurfaceKHR,
}

/// State produced by a SurfaceCapabilities rule
#[derive(Debug, Clone)]
pub struct SurfaceCapabilitiesState {
    /// Surface capabilities
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// State produced by a QueueFamily rule
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilyState {
    /// Physical queue family index
    pub index: u32,
}

/// State produced by a QueueFamilyGroup rule
#[derive(Debug, Clone)]
pub struct QueueFamilyGroupState {
    /// Distinct family indices, first occurrence first, each value once
    pub indices: Vec<u32>,
}

/// State produced by a Device rule
#[derive(Debug, Clone, Copy)]
pub struct DeviceState {
    /// Logical device handle
    pub device: vk::Device,
}

/// State produced by a Queue rule
#[derive(Debug, Clone, Copy)]
pub struct QueueState {
    /// Queue handle
    pub queue: vk::Queue,
}

/// State produced by a Swapchain rule
#[derive(Debug, Clone)]
pub struct SwapchainState {
    /// Swapchain handle
    pub swapchain: vk::SwapchainKHR,
    /// Retrieved swapchain images
    pub images: Vec<vk::Image>,
    /// Chosen surface format
    pub format: vk::SurfaceFormatKHR,
    /// Chosen image extent
    pub extent: vk::Extent2D,
}

/// State produced by a SwapchainImageViews rule
#[derive(Debug, Clone)]
pub struct SwapchainImageViewsState {
    /// One view per swapchain image, in image order
    pub views: Vec<vk::ImageView>,
}

/// State produced by a ShaderModule rule
#[derive(Debug, Clone, Copy)]
pub struct ShaderModuleState {
    /// Shader module handle
    pub module: vk::ShaderModule,
}

/// Kind-tagged rule state
///
/// Undefined before the rule's build function runs, immutable afterwards.
#[derive(Debug, Clone)]
pub enum RuleState {
    /// Instance state
    Instance(InstanceState),
    /// Debug messenger state
    DebugMessenger(DebugMessengerState),
    /// Physical device state
    PhysicalDevice(PhysicalDeviceState),
    /// Surface state
    Surface(SurfaceState),
    /// Surface capabilities state
    SurfaceCapabilities(SurfaceCapabilitiesState),
    /// Queue family state
    QueueFamily(QueueFamilyState),
    /// Queue family group state
    QueueFamilyGroup(QueueFamilyGroupState),
    /// Device state
    Device(DeviceState),
    /// Queue state
    Queue(QueueState),
    /// Swapchain state
    Swapchain(SwapchainState),
    /// Swapchain image views state
    SwapchainImageViews(SwapchainImageViewsState),
    /// Shader module state
    ShaderModule(ShaderModuleState),
}

macro_rules! state_accessor {
    ($name:ident, $variant:ident, $state:ty) => {
        /// Kind-checked view of this state
        ///
        /// # Panics
        /// Panics when the state belongs to a different kind; requesting the
        /// wrong kind is a bug in the graph's construction, not a runtime
        /// condition.
        pub fn $name(&self) -> &$state {
            match self {
                Self::$variant(state) => state,
                other => panic!(
                    "expected {:?} state, found {:?}",
                    RuleKind::$variant,
                    other.kind()
                ),
            }
        }
    };
}

impl RuleState {
    /// The kind this state belongs to
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Instance(_) => RuleKind::Instance,
            Self::DebugMessenger(_) => RuleKind::DebugMessenger,
            Self::PhysicalDevice(_) => RuleKind::PhysicalDevice,
            Self::Surface(_) => RuleKind::Surface,
            Self::SurfaceCapabilities(_) => RuleKind::SurfaceCapabilities,
            Self::QueueFamily(_) => RuleKind::QueueFamily,
            Self::QueueFamilyGroup(_) => RuleKind::QueueFamilyGroup,
            Self::Device(_) => RuleKind::Device,
            Self::Queue(_) => RuleKind::Queue,
            Self::Swapchain(_) => RuleKind::Swapchain,
            Self::SwapchainImageViews(_) => RuleKind::SwapchainImageViews,
            Self::ShaderModule(_) => RuleKind::ShaderModule,
        }
    }

    state_accessor!(as_instance, Instance, InstanceState);
    state_accessor!(as_debug_messenger, DebugMessenger, DebugMessengerState);
    state_accessor!(as_physical_device, PhysicalDevice, PhysicalDeviceState);
    state_accessor!(as_surface, Surface, SurfaceState);
    state_accessor!(
        as_surface_capabilities,
        SurfaceCapabilities,
        SurfaceCapabilitiesState
    );
    state_accessor!(as_queue_family, QueueFamily, QueueFamilyState);
    state_accessor!(as_queue_family_group, QueueFamilyGroup, QueueFamilyGroupState);
    state_accessor!(as_device, Device, DeviceState);
    state_accessor!(as_queue, Queue, QueueState);
    state_accessor!(as_swapchain, Swapchain, SwapchainState);
    state_accessor!(
        as_swapchain_image_views,
        SwapchainImageViews,
        SwapchainImageViewsState
    );
    state_accessor!(as_shader_module, ShaderModule, ShaderModuleState);
}
