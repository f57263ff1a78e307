//! Configuration module for the operator flow engine
//!
//! An [`EngineConfig`] bundles scheduler, buffer pool and logging settings.
//! It can be stored as TOML (`.toml` extension) or JSON (anything else).
//!
//! # Config Location
//!
//! The default file lives in the platform config directory:
//! - **Linux**: `~/.config/operator-flow/engine.toml`
//! - **macOS**: `~/Library/Application Support/operator-flow/engine.toml`
//! - **Windows**: `%APPDATA%\operator-flow\engine.toml`
//!
//! # Example
//!
//! ```ignore
//! use operator_flow::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default("engine.toml");
//! let scheduler = FlowScheduler::new(config);
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{FlowError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "operator-flow";

/// Default config filename
pub const CONFIG_FILE: &str = "engine.toml";

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionSettings,

    #[serde(default)]
    pub pool: PoolSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Serialization format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Path of the default config file, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

impl EngineConfig {
    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        match ConfigFormat::for_path(path) {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| {
                FlowError::Config(format!("Failed to parse {}: {}", path.display(), e))
            }),
            ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| {
                FlowError::Config(format!("Failed to parse {}: {}", path.display(), e))
            }),
        }
    }

    /// Load a config file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to a file, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                FlowError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = match ConfigFormat::for_path(path) {
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| FlowError::Serialization(e.to_string()))?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| FlowError::Serialization(e.to_string()))?,
        };

        std::fs::write(path, content)
            .map_err(FlowError::from)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
