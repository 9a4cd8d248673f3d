use signalk_core::ConfigError;
use thiserror::Error;

/// Errors surfaced by plugins and the plugin host.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The options object does not have the expected shape.
    #[error("Invalid plugin options: {0}")]
    InvalidOptions(String),

    /// Reading or writing persisted options failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Another plugin already owns this PUT target.
    #[error("PUT handler for '{context}.{path}' (source {source_label:?}) already registered by '{owner}'")]
    HandlerConflict {
        context: String,
        path: String,
        source_label: Option<String>,
        owner: String,
    },

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),
}
