//! Viewer demo application
//!
//! Bootstraps the full Vulkan device stack through the rule graph:
//! instance, debug messenger, adapter, surface, queue families, device,
//! queues, swapchain and image views. Reports what was realized, idles
//! until the window closes, then tears everything down in reverse order.

use ash::vk;
use glfw::{Action, Key, WindowEvent};
use thiserror::Error;

use petra_engine::backend::vulkan::VulkanBackend;
use petra_engine::backend::BackendError;
use petra_engine::config::{Config, RendererConfig};
use petra_engine::foundation::logging;
use petra_engine::rules::{DispatchError, InstanceConfig, RuleGraph, SwapchainConfig};
use petra_engine::window::{Window, WindowError};

const CONFIG_PATH: &str = "viewer.toml";

#[derive(Error, Debug)]
enum ViewerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

fn main() {
    logging::init();

    if let Err(err) = run() {
        log::error!("renderer setup failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), ViewerError> {
    let config = load_config();
    config
        .validate()
        .map_err(ViewerError::InvalidConfig)?;

    let window = Window::new(
        &config.application_name,
        config.window.width,
        config.window.height,
    )?;
    let mut backend = VulkanBackend::new(window)?;

    let mut graph = RuleGraph::new();

    let instance = graph.add_instance_rule(InstanceConfig {
        application_name: config.application_name.clone(),
        application_version: config.application_version,
        enable_validation: config.effective_validation(),
    });
    let _messenger = graph.add_debug_messenger_rule(instance);
    let adapter = graph.add_physical_device_rule(instance, config.adapter_name.clone());
    let surface = graph.add_surface_rule(instance);
    let capabilities = graph.add_surface_capabilities_rule(adapter, surface);
    let graphics_family = graph.add_queue_family_rule(adapter, vk::QueueFlags::GRAPHICS, None);
    let present_family = graph.add_queue_family_rule(adapter, vk::QueueFlags::empty(), Some(surface));
    let family_group = graph.add_queue_family_group_rule(&[graphics_family, present_family]);
    let device = graph.add_device_rule(adapter, family_group);
    let _graphics_queue = graph.add_queue_rule(device, graphics_family);
    let _present_queue = graph.add_queue_rule(device, present_family);
    let swapchain = graph.add_swapchain_rule(
        surface,
        capabilities,
        family_group,
        device,
        SwapchainConfig {
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            preferred_present_mode: if config.vsync {
                vk::PresentModeKHR::FIFO
            } else {
                vk::PresentModeKHR::MAILBOX
            },
        },
    );
    let _views = graph.add_swapchain_image_views_rule(device, swapchain);

    graph.dispatch_all(&mut backend)?;

    let built = graph.state(swapchain).as_swapchain();
    log::info!(
        "swapchain ready: {} images, {}x{}, {:?}",
        built.images.len(),
        built.extent.width,
        built.extent.height,
        built.format.format
    );

    while !backend.window().should_close() {
        for (_, event) in backend.window_mut().drain_events() {
            if let WindowEvent::Key(Key::Escape, _, Action::Press, _) = event {
                backend.window_mut().set_should_close(true);
            }
        }
    }

    graph.teardown_all(&mut backend);

    Ok(())
}

fn load_config() -> RendererConfig {
    match RendererConfig::load_from_file(CONFIG_PATH) {
        Ok(config) => {
            log::info!("loaded configuration from {CONFIG_PATH}");
            config
        }
        Err(err) => {
            log::debug!("no usable {CONFIG_PATH} ({err}); using defaults");
            RendererConfig::default()
        }
    }
}
