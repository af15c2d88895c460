//! Renderer configuration
//!
//! Settings consumed by the viewer application and by the rule factories:
//! application identity for instance creation, window dimensions, adapter
//! selection and validation-layer policy.

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Window dimensions for the renderer surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window width in screen coordinates
    pub width: u32,
    /// Window height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Configuration for the Vulkan renderer prototype
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Window settings
    pub window: WindowConfig,
    /// Whether to enable Vulkan validation layers
    ///
    /// `None` auto-detects based on build type. Note that even an explicit
    /// `Some(true)` is a request, not a guarantee: the instance rule
    /// downgrades to disabled with a warning when the layers are not
    /// installed.
    pub enable_validation: Option<bool>,
    /// Substring match against the driver-reported adapter name;
    /// `None` selects the first enumerated adapter
    pub adapter_name: Option<String>,
    /// Prefer FIFO presentation (vsync) over MAILBOX
    pub vsync: bool,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (0, 1, 0),
            window: WindowConfig::default(),
            enable_validation: None,
            adapter_name: None,
            vsync: true,
        }
    }

    /// Set application version
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set window dimensions
    pub fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window = WindowConfig { width, height };
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Restrict adapter selection to names containing the given string
    pub fn with_adapter(mut self, name: impl Into<String>) -> Self {
        self.adapter_name = Some(name.into());
        self
    }

    /// Resolve the validation request, defaulting by build type
    pub fn effective_validation(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err("Window dimensions must be non-zero".to_string());
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Petra Viewer")
    }
}

impl Config for RendererConfig {}
