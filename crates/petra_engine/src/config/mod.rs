//! Configuration system
//!
//! File-backed settings with TOML and RON support, selected by extension.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

mod renderer;

pub use renderer::{RendererConfig, WindowConfig};

/// Configuration trait
///
/// Implementors get file loading and saving for free; the format is picked
/// from the file extension.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        match extension(path) {
            Some("toml") => {
                toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file contents did not parse as the expected type
    #[error("Parse error: {0}")]
    Parse(String),

    /// The value could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// The file extension maps to no supported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
