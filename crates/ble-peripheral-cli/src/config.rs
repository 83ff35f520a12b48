//! CLI configuration management
//!
//! Configuration is read from a TOML file, or a JSON file when the path ends
//! in `.json`, and then overridden by command-line arguments.

use std::path::Path;

use ble_peripheral_core::AdvertiseConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the CLI application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Advertising session, completed or replaced by command-line arguments
    pub advertise: Option<AdvertiseConfig>,

    /// Runtime behavior
    pub runtime: RuntimeConfig,
}

/// Runtime behavior configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How long to wait for the native stack to confirm a start, in seconds
    pub start_timeout_secs: u64,

    /// Always use the in-memory stack
    pub simulate: bool,

    /// Default advertising duration in seconds; unset runs until interrupted
    pub duration_secs: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            start_timeout_secs: 10,
            simulate: false,
            duration_secs: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML or JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, is_json(path))
    }

    fn parse(contents: &str, json: bool) -> Result<Self> {
        if json {
            Ok(serde_json::from_str(contents)?)
        } else {
            Ok(toml::from_str(contents)?)
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
