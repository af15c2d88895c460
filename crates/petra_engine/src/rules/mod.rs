//! Declarative GPU-resource rule graph
//!
//! Renderer bootstrap is declared as a set of *rules*, one per resource.
//! Each rule carries a kind, an immutable configuration, a dependency list
//! over previously added rules, and, once dispatched, the realized state
//! dependents read through a kind-checked accessor.
//!
//! Rules may only depend on rules added before them, so registration order
//! is a valid topological order by construction: dispatch walks the rules
//! ascending, teardown walks them in exact reverse. There is no cycle
//! detection and no sorting because neither can ever be needed.
//!
//! Wiring mistakes (forward references, kind mismatches, phase misuse) are
//! bugs in the calling code and panic. Resource-creation failures are
//! returned as [`DispatchError`]; the first one aborts the pass after the
//! already-built rules have been torn down.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

use crate::backend::RenderBackend;

mod build;
mod kind;
mod registry;
mod teardown;

pub use build::{BuildError, FALLBACK_EXTENT};
pub use kind::{
    DebugMessengerState, DeviceState, InstanceConfig, InstanceState, PhysicalDeviceConfig,
    PhysicalDeviceState, QueueFamilyConfig, QueueFamilyGroupState, QueueFamilyState, QueueState,
    RuleConfig, RuleKind, RuleState, ShaderModuleConfig, ShaderModuleState,
    SurfaceCapabilitiesState, SurfaceState, SwapchainConfig, SwapchainImageViewsState,
    SwapchainState,
};

use registry::Registry;

/// Stable identity of a rule, assigned at registration
///
/// Handles increase monotonically from 0 and double as the rule's position
/// in topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleHandle(pub(crate) usize);

impl RuleHandle {
    /// Registration index of this rule
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for RuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A rule failed to build
///
/// Identifies the failing rule and wraps the underlying cause. By the time
/// this is returned, rules dispatched before the failing one have already
/// been torn down.
#[derive(Debug, Error)]
#[error("rule {handle} ({kind:?}) failed to build: {source}")]
pub struct DispatchError {
    /// The rule that failed
    pub handle: RuleHandle,
    /// Its kind
    pub kind: RuleKind,
    /// What went wrong
    #[source]
    pub source: BuildError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Declaring,
    Dispatched,
    TornDown,
}

/// The rule graph: registry, dispatcher and teardown driver in one
///
/// Lifecycle: add rules, [`dispatch_all`](Self::dispatch_all) once, read
/// realized state, [`teardown_all`](Self::teardown_all) once. Both drivers
/// must be given the same backend the graph was dispatched against.
pub struct RuleGraph {
    registry: Registry,
    phase: Phase,
}

impl Default for RuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            phase: Phase::Declaring,
        }
    }

    /// Number of registered rules
    pub fn rule_count(&self) -> usize {
        self.registry.len()
    }

    /// Kind of a registered rule
    pub fn kind(&self, handle: RuleHandle) -> RuleKind {
        self.registry.kind(handle)
    }

    /// Realized state of a dispatched rule
    ///
    /// # Panics
    /// Panics when the rule has not been dispatched.
    pub fn state(&self, handle: RuleHandle) -> &RuleState {
        self.registry.state(handle)
    }

    fn register(&mut self, config: RuleConfig) -> RuleHandle {
        assert_eq!(
            self.phase,
            Phase::Declaring,
            "rules may only be added before dispatch"
        );
        self.registry.register(config)
    }

    fn assert_kind(&self, handle: RuleHandle, expected: RuleKind) {
        let actual = self.registry.kind(handle);
        assert_eq!(
            actual, expected,
            "dependency {handle} is {actual:?}, expected {expected:?}"
        );
    }

    /// Add an Instance rule. No dependencies.
    pub fn add_instance_rule(&mut self, config: InstanceConfig) -> RuleHandle {
        self.register(RuleConfig::Instance(config))
    }

    /// Add a DebugMessenger rule. Dependency 0: Instance.
    ///
    /// Produces a null messenger when validation layers ended up disabled.
    pub fn add_debug_messenger_rule(&mut self, instance: RuleHandle) -> RuleHandle {
        self.assert_kind(instance, RuleKind::Instance);
        let handle = self.register(RuleConfig::DebugMessenger);
        self.registry.add_dependency(handle, instance);
        handle
    }

    /// Add a PhysicalDevice rule. Dependency 0: Instance.
    ///
    /// `adapter_name` restricts selection to adapters whose name contains
    /// the given string; `None` selects the first enumerated adapter.
    pub fn add_physical_device_rule(
        &mut self,
        instance: RuleHandle,
        adapter_name: Option<String>,
    ) -> RuleHandle {
        self.assert_kind(instance, RuleKind::Instance);
        let handle = self.register(RuleConfig::PhysicalDevice(PhysicalDeviceConfig {
            adapter_name,
        }));
        self.registry.add_dependency(handle, instance);
        handle
    }

    /// Add a Surface rule. Dependency 0: Instance.
    pub fn add_surface_rule(&mut self, instance: RuleHandle) -> RuleHandle {
        self.assert_kind(instance, RuleKind::Instance);
        let handle = self.register(RuleConfig::Surface);
        self.registry.add_dependency(handle, instance);
        handle
    }

    /// Add a SurfaceCapabilities rule.
    /// Dependencies: 0 = PhysicalDevice, 1 = Surface.
    pub fn add_surface_capabilities_rule(
        &mut self,
        physical_device: RuleHandle,
        surface: RuleHandle,
    ) -> RuleHandle {
        self.assert_kind(physical_device, RuleKind::PhysicalDevice);
        self.assert_kind(surface, RuleKind::Surface);
        let handle = self.register(RuleConfig::SurfaceCapabilities);
        self.registry.add_dependency(handle, physical_device);
        self.registry.add_dependency(handle, surface);
        handle
    }

    /// Add a QueueFamily rule.
    /// Dependencies: 0 = PhysicalDevice, 1 = Surface (only when
    /// `present_surface` is given).
    ///
    /// Selects the first family supporting every bit of `required_flags`
    /// and, when `present_surface` is given, presentation to that surface.
    pub fn add_queue_family_rule(
        &mut self,
        physical_device: RuleHandle,
        required_flags: vk::QueueFlags,
        present_surface: Option<RuleHandle>,
    ) -> RuleHandle {
        self.assert_kind(physical_device, RuleKind::PhysicalDevice);
        if let Some(surface) = present_surface {
            self.assert_kind(surface, RuleKind::Surface);
        }
        let handle = self.register(RuleConfig::QueueFamily(QueueFamilyConfig {
            required_flags,
            needs_present: present_surface.is_some(),
        }));
        self.registry.add_dependency(handle, physical_device);
        if let Some(surface) = present_surface {
            self.registry.add_dependency(handle, surface);
        }
        handle
    }

    /// Add a QueueFamilyGroup rule. Dependencies: 0..N-1 = QueueFamily.
    ///
    /// Collapses the resolved family indices to distinct values in first
    /// occurrence order.
    pub fn add_queue_family_group_rule(&mut self, families: &[RuleHandle]) -> RuleHandle {
        assert!(!families.is_empty(), "a queue family group needs at least one family");
        for &family in families {
            self.assert_kind(family, RuleKind::QueueFamily);
        }
        let handle = self.register(RuleConfig::QueueFamilyGroup);
        for &family in families {
            self.registry.add_dependency(handle, family);
        }
        handle
    }

    /// Add a Device rule.
    /// Dependencies: 0 = PhysicalDevice, 1 = QueueFamilyGroup.
    ///
    /// The device is created with one queue per distinct family in the
    /// group.
    pub fn add_device_rule(
        &mut self,
        physical_device: RuleHandle,
        queue_family_group: RuleHandle,
    ) -> RuleHandle {
        self.assert_kind(physical_device, RuleKind::PhysicalDevice);
        self.assert_kind(queue_family_group, RuleKind::QueueFamilyGroup);
        let handle = self.register(RuleConfig::Device);
        self.registry.add_dependency(handle, physical_device);
        self.registry.add_dependency(handle, queue_family_group);
        handle
    }

    /// Add a Queue rule. Dependencies: 0 = Device, 1 = QueueFamily.
    pub fn add_queue_rule(&mut self, device: RuleHandle, queue_family: RuleHandle) -> RuleHandle {
        self.assert_kind(device, RuleKind::Device);
        self.assert_kind(queue_family, RuleKind::QueueFamily);
        let handle = self.register(RuleConfig::Queue);
        self.registry.add_dependency(handle, device);
        self.registry.add_dependency(handle, queue_family);
        handle
    }

    /// Add a Swapchain rule.
    /// Dependencies: 0 = Surface, 1 = SurfaceCapabilities,
    /// 2 = QueueFamilyGroup, 3 = Device.
    ///
    /// Sharing is exclusive when the group resolves to one distinct family,
    /// concurrent across all of them otherwise.
    pub fn add_swapchain_rule(
        &mut self,
        surface: RuleHandle,
        surface_capabilities: RuleHandle,
        queue_family_group: RuleHandle,
        device: RuleHandle,
        config: SwapchainConfig,
    ) -> RuleHandle {
        self.assert_kind(surface, RuleKind::Surface);
        self.assert_kind(surface_capabilities, RuleKind::SurfaceCapabilities);
        self.assert_kind(queue_family_group, RuleKind::QueueFamilyGroup);
        self.assert_kind(device, RuleKind::Device);
        let handle = self.register(RuleConfig::Swapchain(config));
        self.registry.add_dependency(handle, surface);
        self.registry.add_dependency(handle, surface_capabilities);
        self.registry.add_dependency(handle, queue_family_group);
        self.registry.add_dependency(handle, device);
        handle
    }

    /// Add a SwapchainImageViews rule.
    /// Dependencies: 0 = Device, 1 = Swapchain.
    pub fn add_swapchain_image_views_rule(
        &mut self,
        device: RuleHandle,
        swapchain: RuleHandle,
    ) -> RuleHandle {
        self.assert_kind(device, RuleKind::Device);
        self.assert_kind(swapchain, RuleKind::Swapchain);
        let handle = self.register(RuleConfig::SwapchainImageViews);
        self.registry.add_dependency(handle, device);
        self.registry.add_dependency(handle, swapchain);
        handle
    }

    /// Add a ShaderModule rule. Dependency 0: Device.
    pub fn add_shader_module_rule(
        &mut self,
        device: RuleHandle,
        source_path: impl Into<PathBuf>,
    ) -> RuleHandle {
        self.assert_kind(device, RuleKind::Device);
        let handle = self.register(RuleConfig::ShaderModule(ShaderModuleConfig {
            source_path: source_path.into(),
        }));
        self.registry.add_dependency(handle, device);
        handle
    }

    /// Build every rule once, in registration order
    ///
    /// On the first failure the rules already built are torn down in
    /// reverse order and the error is returned; the graph is then spent.
    ///
    /// # Panics
    /// Panics when called twice or after teardown.
    pub fn dispatch_all(&mut self, backend: &mut dyn RenderBackend) -> Result<(), DispatchError> {
        assert_eq!(
            self.phase,
            Phase::Declaring,
            "dispatch_all runs exactly once, before teardown"
        );

        log::info!("dispatching {} rules", self.registry.len());

        for index in 0..self.registry.len() {
            let handle = RuleHandle(index);
            let kind = self.registry.kind(handle);
            log::debug!("dispatching rule {handle} ({kind:?})");

            match build::build_rule(&self.registry, backend, handle) {
                Ok(state) => self.registry.set_state(handle, state),
                Err(source) => {
                    let err = DispatchError {
                        handle,
                        kind,
                        source,
                    };
                    log::error!("{err}; tearing down {index} already-built rules");
                    teardown::teardown_range(&self.registry, backend, index);
                    self.phase = Phase::TornDown;
                    return Err(err);
                }
            }
        }

        self.phase = Phase::Dispatched;
        Ok(())
    }

    /// Destroy every rule once, in exact reverse registration order
    ///
    /// # Panics
    /// Panics unless the graph was dispatched and not yet torn down.
    pub fn teardown_all(&mut self, backend: &mut dyn RenderBackend) {
        assert_eq!(
            self.phase,
            Phase::Dispatched,
            "teardown_all requires a dispatched graph"
        );

        log::info!("tearing down {} rules", self.registry.len());
        teardown::teardown_range(&self.registry, backend, self.registry.len());
        self.phase = Phase::TornDown;
    }
}
