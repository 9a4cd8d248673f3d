//! Plugin configuration storage.
//!
//! Plugin options are persisted per plugin id as a small JSON document:
//!
//! ```json
//! { "enabled": true, "configuration": { "limit": 1, "restpaths": { ... } } }
//! ```
//!
//! Two backends are provided:
//! - `FileConfigStorage` keeps one file per plugin under
//!   `<config dir>/plugin-config-data/<id>.json`
//! - `MemoryConfigStorage` keeps everything in a map (tests, embedded use)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration was not found.
    #[error("Configuration not found: {0}")]
    NotFound(String),
    /// Failed to read configuration.
    #[error("Read error: {0}")]
    ReadError(String),
    /// Failed to write configuration.
    #[error("Write error: {0}")]
    WriteError(String),
    /// Configuration data is invalid.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Persisted state of one plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfigData {
    /// Whether the plugin should be started.
    #[serde(default)]
    pub enabled: bool,

    /// Plugin-specific options handed to `start`.
    #[serde(default)]
    pub configuration: serde_json::Value,
}

/// Abstract plugin configuration storage.
///
/// All methods are synchronous; async wrappers can be added at the framework layer.
pub trait ConfigStorage: Send + Sync {
    /// Load configuration for a specific plugin.
    fn load_plugin_config(&self, plugin_id: &str) -> Result<PluginConfigData, ConfigError>;

    /// Save configuration for a specific plugin.
    fn save_plugin_config(
        &self,
        plugin_id: &str,
        config: &PluginConfigData,
    ) -> Result<(), ConfigError>;
}

/// File-based storage rooted at a SignalK config directory (usually `~/.signalk`).
#[derive(Debug, Clone)]
pub struct FileConfigStorage {
    plugin_dir: PathBuf,
}

impl FileConfigStorage {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            plugin_dir: config_dir.as_ref().join("plugin-config-data"),
        }
    }

    fn plugin_file(&self, plugin_id: &str) -> PathBuf {
        self.plugin_dir.join(format!("{}.json", plugin_id))
    }
}

impl ConfigStorage for FileConfigStorage {
    fn load_plugin_config(&self, plugin_id: &str) -> Result<PluginConfigData, ConfigError> {
        let file = self.plugin_file(plugin_id);
        let text = match std::fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(plugin_id.to_string()))
            }
            Err(e) => return Err(ConfigError::ReadError(format!("{}: {}", file.display(), e))),
        };
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::InvalidData(format!("{}: {}", file.display(), e)))
    }

    fn save_plugin_config(
        &self,
        plugin_id: &str,
        config: &PluginConfigData,
    ) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.plugin_dir)
            .map_err(|e| ConfigError::WriteError(format!("{}: {}", self.plugin_dir.display(), e)))?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        let file = self.plugin_file(plugin_id);
        std::fs::write(&file, json)
            .map_err(|e| ConfigError::WriteError(format!("{}: {}", file.display(), e)))
    }
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryConfigStorage {
    data: RwLock<HashMap<String, PluginConfigData>>,
}

impl MemoryConfigStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a plugin's configuration.
    pub fn with_plugin(self, plugin_id: &str, config: PluginConfigData) -> Self {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(plugin_id.to_string(), config);
        self
    }
}

impl ConfigStorage for MemoryConfigStorage {
    fn load_plugin_config(&self, plugin_id: &str) -> Result<PluginConfigData, ConfigError> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(plugin_id.to_string()))
    }

    fn save_plugin_config(
        &self,
        plugin_id: &str,
        config: &PluginConfigData,
    ) -> Result<(), ConfigError> {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(plugin_id.to_string(), config.clone());
        Ok(())
    }
}
