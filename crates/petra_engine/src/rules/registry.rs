//! Rule registry
//!
//! Append-only storage for all rules. A rule's handle is its registration
//! index, so ascending handle order is a valid topological order by
//! construction and no sort step exists anywhere in the system.

use crate::rules::kind::{RuleConfig, RuleKind, RuleState};
use crate::rules::RuleHandle;

struct Rule {
    config: RuleConfig,
    state: Option<RuleState>,
    dependencies: Vec<RuleHandle>,
}

/// Storage and identity management for all rules
pub(crate) struct Registry {
    rules: Vec<Rule>,
}

impl Registry {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule, returning its handle
    pub fn register(&mut self, config: RuleConfig) -> RuleHandle {
        let handle = RuleHandle(self.rules.len());
        self.rules.push(Rule {
            config,
            state: None,
            dependencies: Vec::new(),
        });
        handle
    }

    /// Record that `rule` reads state from `dependency`
    ///
    /// # Panics
    /// Panics unless `dependency` was registered before `rule`. A forward
    /// reference would mean a cycle or an out-of-order declaration, both of
    /// which this system rejects by design.
    pub fn add_dependency(&mut self, rule: RuleHandle, dependency: RuleHandle) {
        assert!(
            dependency.0 < rule.0,
            "rule {rule} may only depend on rules registered before it, got {dependency}"
        );
        self.rules[rule.0].dependencies.push(dependency);
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn kind(&self, handle: RuleHandle) -> RuleKind {
        self.entry(handle).config.kind()
    }

    pub fn config(&self, handle: RuleHandle) -> &RuleConfig {
        &self.entry(handle).config
    }

    /// The rule's realized state
    ///
    /// # Panics
    /// Panics when the rule has not been dispatched yet.
    pub fn state(&self, handle: RuleHandle) -> &RuleState {
        self.entry(handle)
            .state
            .as_ref()
            .unwrap_or_else(|| panic!("rule {handle} has not been dispatched"))
    }

    /// Record the state produced by the rule's build function
    ///
    /// # Panics
    /// Panics when the state kind does not match the rule's kind, or when
    /// the rule already holds state; state is write-once.
    pub fn set_state(&mut self, handle: RuleHandle, state: RuleState) {
        let entry = &mut self.rules[handle.0];
        assert_eq!(
            entry.config.kind(),
            state.kind(),
            "state kind must match the rule's kind"
        );
        assert!(
            entry.state.is_none(),
            "rule {handle} was dispatched twice; state is write-once"
        );
        entry.state = Some(state);
    }

    pub fn dependency_count(&self, handle: RuleHandle) -> usize {
        self.entry(handle).dependencies.len()
    }

    /// Resolve the dependency at `position` and return its state
    ///
    /// This is the sole read channel between rules. The dependency must be
    /// of `expected` kind and must already be dispatched; either violation
    /// is a bug in the graph's construction and panics.
    pub fn dependency_state(
        &self,
        handle: RuleHandle,
        position: usize,
        expected: RuleKind,
    ) -> &RuleState {
        let entry = self.entry(handle);
        let dependency = *entry.dependencies.get(position).unwrap_or_else(|| {
            panic!(
                "rule {handle} declares {} dependencies, position {position} requested",
                entry.dependencies.len()
            )
        });

        let actual = self.kind(dependency);
        assert_eq!(
            actual, expected,
            "rule {handle} dependency {position} is {actual:?}, expected {expected:?}"
        );

        self.state(dependency)
    }

    fn entry(&self, handle: RuleHandle) -> &Rule {
        self.rules
            .get(handle.0)
            .unwrap_or_else(|| panic!("unknown rule {handle}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::kind::{InstanceConfig, InstanceState, SurfaceState};
    use ash::vk;
    use ash::vk::Handle;

    fn instance_config() -> RuleConfig {
        RuleConfig::Instance(InstanceConfig::new("test"))
    }

    fn instance_state() -> RuleState {
        RuleState::Instance(InstanceState {
            instance: vk::Instance::from_raw(1),
            validation_enabled: false,
        })
    }

    #[test]
    fn test_handles_are_registration_order() {
        let mut registry = Registry::new();
        let first = registry.register(instance_config());
        let second = registry.register(RuleConfig::Surface);
        let third = registry.register(RuleConfig::Device);

        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!(third.index(), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_dependencies_accepted_in_topological_order() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        let surface = registry.register(RuleConfig::Surface);
        registry.add_dependency(surface, instance);

        assert_eq!(registry.dependency_count(surface), 1);
    }

    #[test]
    #[should_panic(expected = "may only depend on rules registered before it")]
    fn test_forward_dependency_rejected() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        registry.add_dependency(instance, RuleHandle(5));
    }

    #[test]
    #[should_panic(expected = "may only depend on rules registered before it")]
    fn test_self_dependency_rejected() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        registry.add_dependency(instance, instance);
    }

    #[test]
    fn test_state_write_once_read_back() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        registry.set_state(instance, instance_state());

        assert_eq!(registry.state(instance).as_instance().instance.as_raw(), 1);
    }

    #[test]
    #[should_panic(expected = "state is write-once")]
    fn test_double_state_write_rejected() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        registry.set_state(instance, instance_state());
        registry.set_state(instance, instance_state());
    }

    #[test]
    #[should_panic(expected = "state kind must match")]
    fn test_mismatched_state_kind_rejected() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        registry.set_state(
            instance,
            RuleState::Surface(SurfaceState {
                surface: vk::SurfaceKHR::from_raw(2),
            }),
        );
    }

    #[test]
    #[should_panic(expected = "has not been dispatched")]
    fn test_state_before_dispatch_rejected() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        let _ = registry.state(instance);
    }

    #[test]
    fn test_dependency_state_resolves_by_position() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        let messenger = registry.register(RuleConfig::DebugMessenger);
        registry.add_dependency(messenger, instance);
        registry.set_state(instance, instance_state());

        let state = registry.dependency_state(messenger, 0, RuleKind::Instance);
        assert!(state.as_instance().instance.as_raw() == 1);
    }

    #[test]
    #[should_panic(expected = "is Instance, expected Surface")]
    fn test_dependency_state_rejects_kind_mismatch() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        let messenger = registry.register(RuleConfig::DebugMessenger);
        registry.add_dependency(messenger, instance);
        registry.set_state(instance, instance_state());

        let _ = registry.dependency_state(messenger, 0, RuleKind::Surface);
    }

    #[test]
    #[should_panic(expected = "position 1 requested")]
    fn test_dependency_state_rejects_missing_position() {
        let mut registry = Registry::new();
        let instance = registry.register(instance_config());
        let messenger = registry.register(RuleConfig::DebugMessenger);
        registry.add_dependency(messenger, instance);

        let _ = registry.dependency_state(messenger, 1, RuleKind::Instance);
    }
}
