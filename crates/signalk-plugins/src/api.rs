//! The contract between the server and its plugins.

use std::sync::Arc;

use serde_json::Value;
use signalk_core::Delta;
use signalk_protocol::PutResult;

use crate::error::PluginError;

/// Callback accepting a write for one (context, path).
///
/// Arguments are the server API, the request context, the dotted path and
/// the requested value. The server API is passed in rather than captured so
/// handlers never keep the host alive.
pub type PutHandler = Arc<dyn Fn(&dyn ServerApi, &str, &str, &Value) -> PutResult + Send + Sync>;

/// Wrap a closure as a [`PutHandler`].
pub fn put_handler<F>(f: F) -> PutHandler
where
    F: Fn(&dyn ServerApi, &str, &str, &Value) -> PutResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Capabilities the server offers to plugins.
///
/// All methods are synchronous and take `&self`; implementations handle
/// their own interior mutability.
pub trait ServerApi: Send + Sync {
    /// Current leaf under `vessels.self`, shaped `{ "value", "$source", "timestamp", "meta"? }`.
    fn get_self_path(&self, path: &str) -> Option<Value>;

    /// Publish a delta on behalf of `provider_id`.
    ///
    /// Missing `$source` defaults to `provider_id`, missing timestamps to now
    /// and a missing context to `vessels.self`.
    fn handle_message(&self, provider_id: &str, delta: Delta);

    /// Register a write handler for `context` + `path`, optionally scoped to a source label.
    fn register_put_handler(
        &self,
        plugin_id: &str,
        context: &str,
        path: &str,
        source: Option<&str>,
        handler: PutHandler,
    ) -> Result<(), PluginError>;

    /// Remove every write handler owned by `plugin_id`.
    fn unregister_put_handlers(&self, plugin_id: &str);

    fn set_plugin_status(&self, plugin_id: &str, message: &str);

    fn set_plugin_error(&self, plugin_id: &str, message: &str);

    /// The plugin's persisted options (empty object if none were saved).
    fn read_plugin_options(&self, plugin_id: &str) -> Result<Value, PluginError>;

    /// Persist the plugin's options, keeping its enabled flag.
    fn save_plugin_options(&self, plugin_id: &str, options: &Value) -> Result<(), PluginError>;
}

/// A server plugin.
///
/// Plugins are shared between the host and their PUT handlers, so lifecycle
/// methods take `&self` and keep mutable state behind a lock.
pub trait Plugin: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema describing the options object.
    fn schema(&self) -> Value;

    /// Rendering hints for the schema.
    fn ui_schema(&self) -> Value {
        Value::Object(Default::default())
    }

    fn start(&self, app: &dyn ServerApi, options: &Value) -> Result<(), PluginError>;

    fn stop(&self, app: &dyn ServerApi) -> Result<(), PluginError>;
}
