//! Per-kind build functions
//!
//! Each function realizes one rule's resource: it reads its own
//! configuration, reads dependency state through the registry's typed
//! accessor, drives the backend, and returns the state to record. All
//! selection policy lives here; backends only execute fully resolved
//! requests.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

use crate::backend::{BackendError, RenderBackend, SwapchainRequest};
use crate::rules::kind::{
    DebugMessengerState, DeviceState, InstanceConfig, InstanceState, PhysicalDeviceConfig,
    PhysicalDeviceState, QueueFamilyConfig, QueueFamilyGroupState, QueueFamilyState, QueueState,
    RuleConfig, RuleKind, RuleState, ShaderModuleConfig, ShaderModuleState,
    SurfaceCapabilitiesState, SurfaceState, SwapchainConfig, SwapchainImageViewsState,
    SwapchainState,
};
use crate::rules::registry::Registry;
use crate::rules::RuleHandle;

/// Extent used when a surface reports the undefined-extent sentinel
pub const FALLBACK_EXTENT: vk::Extent2D = vk::Extent2D {
    width: 500,
    height: 500,
};

/// Why a single rule failed to build
#[derive(Error, Debug)]
pub enum BuildError {
    /// The backend reported a resource-creation failure
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Adapter enumeration returned nothing
    #[error("no Vulkan-capable adapters found")]
    NoAdapters,

    /// No enumerated adapter name contains the requested string
    #[error("no adapter matching \"{requested}\"")]
    NoMatchingAdapter {
        /// The requested name fragment
        requested: String,
    },

    /// No queue family satisfies the required capabilities
    #[error("no queue family matches flags {required:?} (present required: {needs_present})")]
    NoMatchingQueueFamily {
        /// Flags every candidate had to support
        required: vk::QueueFlags,
        /// Whether present support was also required
        needs_present: bool,
    },

    /// The surface reports no formats at all
    #[error("surface reports no formats")]
    NoSurfaceFormat,

    /// A shader file could not be read
    #[error("failed to read shader {}: {source}", path.display())]
    ShaderIo {
        /// The file that failed to read
        path: PathBuf,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A shader file is not u32-aligned SPIR-V
    #[error("shader {} is not valid SPIR-V", path.display())]
    InvalidSpirv {
        /// The offending file
        path: PathBuf,
    },
}

/// Build the rule identified by `handle` and return its state
pub(crate) fn build_rule(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
) -> Result<RuleState, BuildError> {
    match registry.config(handle) {
        RuleConfig::Instance(config) => build_instance(backend, config),
        RuleConfig::DebugMessenger => build_debug_messenger(registry, backend, handle),
        RuleConfig::PhysicalDevice(config) => {
            build_physical_device(registry, backend, handle, config)
        }
        RuleConfig::Surface => build_surface(registry, backend, handle),
        RuleConfig::SurfaceCapabilities => build_surface_capabilities(registry, backend, handle),
        RuleConfig::QueueFamily(config) => build_queue_family(registry, backend, handle, *config),
        RuleConfig::QueueFamilyGroup => build_queue_family_group(registry, handle),
        RuleConfig::Device => build_device(registry, backend, handle),
        RuleConfig::Queue => build_queue(registry, backend, handle),
        RuleConfig::Swapchain(config) => build_swapchain(registry, backend, handle, *config),
        RuleConfig::SwapchainImageViews => build_swapchain_image_views(registry, backend, handle),
        RuleConfig::ShaderModule(config) => build_shader_module(registry, backend, handle, config),
    }
}

fn build_instance(
    backend: &mut dyn RenderBackend,
    config: &InstanceConfig,
) -> Result<RuleState, BuildError> {
    let created = backend.create_instance(
        &config.application_name,
        config.application_version,
        config.enable_validation,
    )?;

    if config.enable_validation && !created.validation_enabled {
        log::warn!("validation layers requested but unavailable; continuing without them");
    }

    Ok(RuleState::Instance(InstanceState {
        instance: created.instance,
        validation_enabled: created.validation_enabled,
    }))
}

fn build_debug_messenger(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
) -> Result<RuleState, BuildError> {
    let instance = registry
        .dependency_state(handle, 0, RuleKind::Instance)
        .as_instance();

    let messenger = if instance.validation_enabled {
        backend.create_debug_messenger(instance.instance)?
    } else {
        log::debug!("validation disabled; skipping debug messenger");
        vk::DebugUtilsMessengerEXT::null()
    };

    Ok(RuleState::DebugMessenger(DebugMessengerState { messenger }))
}

fn build_physical_device(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
    config: &PhysicalDeviceConfig,
) -> Result<RuleState, BuildError> {
    let instance = registry
        .dependency_state(handle, 0, RuleKind::Instance)
        .as_instance()
        .instance;

    let adapters = backend.enumerate_adapters(instance)?;
    let selected = match &config.adapter_name {
        Some(requested) => adapters
            .into_iter()
            .find(|adapter| adapter.name.contains(requested.as_str()))
            .ok_or_else(|| BuildError::NoMatchingAdapter {
                requested: requested.clone(),
            })?,
        None => adapters.into_iter().next().ok_or(BuildError::NoAdapters)?,
    };

    log::info!("selected GPU: {}", selected.name);

    Ok(RuleState::PhysicalDevice(PhysicalDeviceState {
        device: selected.device,
        name: selected.name,
    }))
}

fn build_surface(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
) -> Result<RuleState, BuildError> {
    let instance = registry
        .dependency_state(handle, 0, RuleKind::Instance)
        .as_instance()
        .instance;

    let surface = backend.create_surface(instance)?;

    Ok(RuleState::Surface(SurfaceState { surface }))
}

fn build_surface_capabilities(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
) -> Result<RuleState, BuildError> {
    let adapter = registry
        .dependency_state(handle, 0, RuleKind::PhysicalDevice)
        .as_physical_device()
        .device;
    let surface = registry
        .dependency_state(handle, 1, RuleKind::Surface)
        .as_surface()
        .surface;

    let support = backend.query_surface_support(adapter, surface)?;

    Ok(RuleState::SurfaceCapabilities(SurfaceCapabilitiesState {
        capabilities: support.capabilities,
        formats: support.formats,
        present_modes: support.present_modes,
    }))
}

fn build_queue_family(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
    config: QueueFamilyConfig,
) -> Result<RuleState, BuildError> {
    let adapter = registry
        .dependency_state(handle, 0, RuleKind::PhysicalDevice)
        .as_physical_device()
        .device;

    let families = backend.queue_family_properties(adapter)?;

    for (index, family) in families.iter().enumerate() {
        // Every required capability bit must be set
        if !family.queue_flags.contains(config.required_flags) {
            continue;
        }

        if config.needs_present {
            let surface = registry
                .dependency_state(handle, 1, RuleKind::Surface)
                .as_surface()
                .surface;
            if !backend.queue_family_supports_present(adapter, index as u32, surface)? {
                continue;
            }
        }

        return Ok(RuleState::QueueFamily(QueueFamilyState {
            index: index as u32,
        }));
    }

    Err(BuildError::NoMatchingQueueFamily {
        required: config.required_flags,
        needs_present: config.needs_present,
    })
}

fn build_queue_family_group(
    registry: &Registry,
    handle: RuleHandle,
) -> Result<RuleState, BuildError> {
    // Duplicate indices collapse to one entry, first occurrence first
    let mut indices: Vec<u32> = Vec::new();
    for position in 0..registry.dependency_count(handle) {
        let index = registry
            .dependency_state(handle, position, RuleKind::QueueFamily)
            .as_queue_family()
            .index;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }

    Ok(RuleState::QueueFamilyGroup(QueueFamilyGroupState { indices }))
}

fn build_device(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
) -> Result<RuleState, BuildError> {
    let adapter = registry
        .dependency_state(handle, 0, RuleKind::PhysicalDevice)
        .as_physical_device()
        .device;
    let group = registry
        .dependency_state(handle, 1, RuleKind::QueueFamilyGroup)
        .as_queue_family_group();

    let device = backend.create_device(adapter, &group.indices)?;

    Ok(RuleState::Device(DeviceState { device }))
}

fn build_queue(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
) -> Result<RuleState, BuildError> {
    let device = registry
        .dependency_state(handle, 0, RuleKind::Device)
        .as_device()
        .device;
    let family = registry
        .dependency_state(handle, 1, RuleKind::QueueFamily)
        .as_queue_family()
        .index;

    let queue = backend.get_queue(device, family)?;

    Ok(RuleState::Queue(QueueState { queue }))
}

fn build_swapchain(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
    config: SwapchainConfig,
) -> Result<RuleState, BuildError> {
    let surface = registry
        .dependency_state(handle, 0, RuleKind::Surface)
        .as_surface()
        .surface;
    let support = registry
        .dependency_state(handle, 1, RuleKind::SurfaceCapabilities)
        .as_surface_capabilities();
    let group = registry
        .dependency_state(handle, 2, RuleKind::QueueFamilyGroup)
        .as_queue_family_group();
    let device = registry
        .dependency_state(handle, 3, RuleKind::Device)
        .as_device()
        .device;

    let capabilities = &support.capabilities;

    let format = support
        .formats
        .iter()
        .find(|sf| {
            sf.format == vk::Format::B8G8R8A8_SRGB
                && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| support.formats.first())
        .copied()
        .ok_or(BuildError::NoSurfaceFormat)?;

    let present_mode = if support.present_modes.contains(&config.preferred_present_mode) {
        config.preferred_present_mode
    } else {
        vk::PresentModeKHR::FIFO
    };

    let extent = if capabilities.current_extent.width == u32::MAX {
        log::warn!(
            "surface reports undefined extent, falling back to {}x{}",
            FALLBACK_EXTENT.width,
            FALLBACK_EXTENT.height
        );
        FALLBACK_EXTENT
    } else {
        capabilities.current_extent
    };

    let min_image_count = if capabilities.min_image_count == capabilities.max_image_count {
        capabilities.min_image_count
    } else {
        capabilities.min_image_count + 1
    };

    // One distinct family owns the images exclusively; otherwise they are
    // shared concurrently across every family in the group
    let (sharing_mode, queue_family_indices) = if group.indices.len() == 1 {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, group.indices.clone())
    };

    let request = SwapchainRequest {
        surface,
        min_image_count,
        format,
        extent,
        image_usage: config.image_usage,
        sharing_mode,
        queue_family_indices,
        present_mode,
        pre_transform: capabilities.current_transform,
    };

    let created = backend.create_swapchain(device, &request)?;

    log::debug!(
        "swapchain created: {} images, {}x{}, {:?}, {:?}",
        created.images.len(),
        extent.width,
        extent.height,
        format.format,
        present_mode
    );

    Ok(RuleState::Swapchain(SwapchainState {
        swapchain: created.swapchain,
        images: created.images,
        format,
        extent,
    }))
}

fn build_swapchain_image_views(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
) -> Result<RuleState, BuildError> {
    let device = registry
        .dependency_state(handle, 0, RuleKind::Device)
        .as_device()
        .device;
    let swapchain = registry
        .dependency_state(handle, 1, RuleKind::Swapchain)
        .as_swapchain();

    let mut views = Vec::with_capacity(swapchain.images.len());
    for &image in &swapchain.images {
        match backend.create_image_view(device, image, swapchain.format.format) {
            Ok(view) => views.push(view),
            Err(err) => {
                // Release the views created so far; this rule never owned
                // them through state
                for &view in &views {
                    backend.destroy_image_view(device, view);
                }
                return Err(err.into());
            }
        }
    }

    Ok(RuleState::SwapchainImageViews(SwapchainImageViewsState {
        views,
    }))
}

fn build_shader_module(
    registry: &Registry,
    backend: &mut dyn RenderBackend,
    handle: RuleHandle,
    config: &ShaderModuleConfig,
) -> Result<RuleState, BuildError> {
    let device = registry
        .dependency_state(handle, 0, RuleKind::Device)
        .as_device()
        .device;

    let bytes = std::fs::read(&config.source_path).map_err(|source| BuildError::ShaderIo {
        path: config.source_path.clone(),
        source,
    })?;

    // SPIR-V is a stream of u32 words
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(BuildError::InvalidSpirv {
            path: config.source_path.clone(),
        });
    }
    let (prefix, words, suffix) = unsafe { bytes.align_to::<u32>() };
    if !prefix.is_empty() || !suffix.is_empty() {
        return Err(BuildError::InvalidSpirv {
            path: config.source_path.clone(),
        });
    }

    let module = backend.create_shader_module(device, words)?;

    Ok(RuleState::ShaderModule(ShaderModuleState { module }))
}
