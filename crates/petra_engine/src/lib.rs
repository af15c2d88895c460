//! # Petra Engine
//!
//! A Vulkan renderer prototype built around a declarative GPU-resource
//! rule graph.
//!
//! Instead of a hand-ordered bootstrap sequence, renderer setup is declared
//! as a set of *rules*, one per GPU resource, each naming the rules it
//! depends on. A single dispatch pass realizes every resource in
//! registration order, and a single teardown pass releases them in exact
//! reverse order, so dependencies always outlive their dependents.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use petra_engine::prelude::*;
//! use petra_engine::vk;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let window = Window::new("Demo", 800, 600)?;
//!     let mut backend = VulkanBackend::new(window)?;
//!     let mut graph = RuleGraph::new();
//!
//!     let instance = graph.add_instance_rule(InstanceConfig::new("Demo"));
//!     let adapter = graph.add_physical_device_rule(instance, None);
//!     let surface = graph.add_surface_rule(instance);
//!     let capabilities = graph.add_surface_capabilities_rule(adapter, surface);
//!     let graphics = graph.add_queue_family_rule(adapter, vk::QueueFlags::GRAPHICS, None);
//!     let families = graph.add_queue_family_group_rule(&[graphics]);
//!     let device = graph.add_device_rule(adapter, families);
//!     let _queue = graph.add_queue_rule(device, graphics);
//!     let swapchain = graph.add_swapchain_rule(
//!         surface, capabilities, families, device, SwapchainConfig::default(),
//!     );
//!     let _views = graph.add_swapchain_image_views_rule(device, swapchain);
//!
//!     graph.dispatch_all(&mut backend)?;
//!     // ... run ...
//!     graph.teardown_all(&mut backend);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod backend;
pub mod config;
pub mod foundation;
pub mod rules;
pub mod window;

pub use ash::vk;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        backend::{vulkan::VulkanBackend, BackendError, RenderBackend},
        config::{Config, ConfigError, RendererConfig},
        rules::{
            DispatchError, InstanceConfig, PhysicalDeviceConfig, QueueFamilyConfig, RuleGraph,
            RuleHandle, RuleKind, SwapchainConfig,
        },
        window::{Window, WindowError},
    };
}
