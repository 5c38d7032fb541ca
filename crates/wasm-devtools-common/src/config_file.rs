//! Configuration file loading for wasm-devtools.
//!
//! A configuration file is a TOML document whose sections mirror
//! [`ToolsConfig`]. Every section and every field is optional.
//!
//! # Example
//!
//! ```toml
//! [engine]
//! opt_level = "speed"
//!
//! [smoke]
//! module_path = "./fixtures/smoke.wasm"
//! entry_point = "test"
//!
//! [fetch]
//! endpoint = "ws://127.0.0.1:9944"
//! pallet = "Paras"
//! storage_map = "CodeByHash"
//! output_dir = "./wasm"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ToolsConfig;

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Tool settings, flattened so sections live at the top level.
    #[serde(flatten)]
    pub tools: ToolsConfig,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        debug!(path = %path.display(), "Loaded config file");

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }

    /// Consume the file and return the tool settings.
    pub fn into_config(self) -> ToolsConfig {
        self.tools
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}
