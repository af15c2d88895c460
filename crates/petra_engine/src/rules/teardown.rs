//! Per-kind teardown
//!
//! Rules are destroyed in exact reverse registration order, which is safe
//! precisely because dependencies always precede dependents. Every kind has
//! an explicit arm here; kinds that own no destroyable handle are spelled
//! out as no-ops rather than defaulted.

use ash::vk;

use crate::backend::RenderBackend;
use crate::rules::kind::{RuleKind, RuleState};
use crate::rules::registry::Registry;
use crate::rules::RuleHandle;

/// Destroy the first `count` rules in reverse registration order
pub(crate) fn teardown_range(registry: &Registry, backend: &mut dyn RenderBackend, count: usize) {
    for index in (0..count).rev() {
        teardown_rule(registry, backend, RuleHandle(index));
    }
}

fn teardown_rule(registry: &Registry, backend: &mut dyn RenderBackend, handle: RuleHandle) {
    log::debug!("tearing down rule {handle} ({:?})", registry.kind(handle));

    match registry.state(handle) {
        RuleState::Instance(state) => backend.destroy_instance(state.instance),

        RuleState::DebugMessenger(state) => {
            // Null when validation layers ended up disabled
            if state.messenger != vk::DebugUtilsMessengerEXT::null() {
                backend.destroy_debug_messenger(state.messenger);
            }
        }

        // Owns no destroyable handle
        RuleState::PhysicalDevice(_) => {}

        RuleState::Surface(state) => backend.destroy_surface(state.surface),

        // Owns no destroyable handle
        RuleState::SurfaceCapabilities(_) => {}

        // Owns no destroyable handle
        RuleState::QueueFamily(_) => {}

        // Owns no destroyable handle
        RuleState::QueueFamilyGroup(_) => {}

        RuleState::Device(state) => backend.destroy_device(state.device),

        // Queues belong to the device; nothing to release
        RuleState::Queue(_) => {}

        RuleState::Swapchain(state) => {
            let device = registry
                .dependency_state(handle, 3, RuleKind::Device)
                .as_device()
                .device;
            backend.destroy_swapchain(device, state.swapchain);
        }

        RuleState::SwapchainImageViews(state) => {
            let device = registry
                .dependency_state(handle, 0, RuleKind::Device)
                .as_device()
                .device;
            for &view in &state.views {
                backend.destroy_image_view(device, view);
            }
        }

        RuleState::ShaderModule(state) => {
            let device = registry
                .dependency_state(handle, 0, RuleKind::Device)
                .as_device()
                .device;
            backend.destroy_shader_module(device, state.module);
        }
    }
}
