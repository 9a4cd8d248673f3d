//! In-process plugin host.
//!
//! `PluginHost` implements [`ServerApi`] on top of a `MemoryStore` and a
//! `ConfigStorage`. It owns the PUT handler registry, tracks plugin status
//! and broadcasts every published delta to interested listeners.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use signalk_core::{
    ConfigError, ConfigStorage, Delta, MemoryStore, PluginConfigData, SignalKStore, SELF_CONTEXT,
};
use signalk_protocol::PutResult;

use crate::api::{Plugin, PutHandler, ServerApi};
use crate::error::PluginError;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Last status reported by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginStatus {
    pub message: String,
    pub is_error: bool,
}

/// Plugin listing entry, shaped like the `/skServer/plugins` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub status_is_error: bool,
    pub schema: Value,
    pub ui_schema: Value,
    pub data: Value,
}

struct Registration {
    plugin_id: String,
    source: Option<String>,
    handler: PutHandler,
}

/// Handlers keyed by (normalized context, path).
type HandlerRegistry = HashMap<(String, String), Vec<Registration>>;

pub struct PluginHost {
    store: RwLock<MemoryStore>,
    storage: Arc<dyn ConfigStorage>,
    handlers: RwLock<HandlerRegistry>,
    statuses: RwLock<HashMap<String, PluginStatus>>,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    running: RwLock<HashSet<String>>,
    delta_tx: broadcast::Sender<Delta>,
}

impl PluginHost {
    pub fn new(self_urn: &str, storage: Arc<dyn ConfigStorage>) -> Self {
        let (delta_tx, _) = broadcast::channel(1024);
        Self {
            store: RwLock::new(MemoryStore::new(self_urn)),
            storage,
            handlers: RwLock::new(HashMap::new()),
            statuses: RwLock::new(HashMap::new()),
            plugins: RwLock::new(Vec::new()),
            running: RwLock::new(HashSet::new()),
            delta_tx,
        }
    }

    /// Receive every delta published through the host from now on.
    pub fn subscribe_deltas(&self) -> broadcast::Receiver<Delta> {
        self.delta_tx.subscribe()
    }

    pub fn self_urn(&self) -> String {
        read(&self.store).self_urn().to_string()
    }

    pub fn full_model(&self) -> Value {
        read(&self.store).full_model().clone()
    }

    /// Value at an absolute dotted path; `vessels.self` is resolved to the self URN.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let store = read(&self.store);
        match path.strip_prefix(SELF_CONTEXT) {
            Some("") => store.get_context(SELF_CONTEXT),
            Some(rest) if rest.starts_with('.') => store.get_self_path(&rest[1..]),
            _ => store.get_path(path),
        }
    }

    fn normalize_context(&self, context: &str) -> String {
        if read(&self.store).is_self_context(context) {
            SELF_CONTEXT.to_string()
        } else {
            context.to_string()
        }
    }

    /// Dispatch a write to the handler registered for `context` + `path`.
    ///
    /// With a `source`, the handler registered for that source is preferred.
    pub fn put(&self, context: &str, path: &str, value: &Value, source: Option<&str>) -> PutResult {
        let key = (self.normalize_context(context), path.to_string());

        let handler = {
            let handlers = read(&self.handlers);
            handlers.get(&key).and_then(|regs| {
                source
                    .and_then(|s| regs.iter().find(|r| r.source.as_deref() == Some(s)))
                    .or_else(|| regs.first())
                    .map(|r| r.handler.clone())
            })
        };

        match handler {
            Some(handler) => {
                debug!("Dispatching PUT {}.{} = {}", key.0, path, value);
                let app: &dyn ServerApi = self;
                handler(app, &key.0, path, value)
            }
            None => {
                debug!("No PUT handler for {}.{}", key.0, path);
                PutResult::failed(405, format!("PUT not supported for {}", path))
            }
        }
    }

    /// Add a plugin to the host without starting it.
    pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) {
        info!("Loaded plugin '{}' ({})", plugin.id(), plugin.name());
        write(&self.plugins).push(plugin);
    }

    fn plugin(&self, plugin_id: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        read(&self.plugins)
            .iter()
            .find(|p| p.id() == plugin_id)
            .cloned()
            .ok_or_else(|| PluginError::UnknownPlugin(plugin_id.to_string()))
    }

    fn load_config(&self, plugin_id: &str) -> Result<PluginConfigData, PluginError> {
        match self.storage.load_plugin_config(plugin_id) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(PluginConfigData::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_running(&self, plugin_id: &str) -> bool {
        read(&self.running).contains(plugin_id)
    }

    /// Start a plugin from its persisted configuration.
    ///
    /// Returns `Ok(false)` when the plugin is disabled.
    pub fn start_plugin(&self, plugin_id: &str) -> Result<bool, PluginError> {
        let plugin = self.plugin(plugin_id)?;
        let config = self.load_config(plugin_id)?;
        if !config.enabled {
            info!("Plugin '{}' is disabled", plugin_id);
            return Ok(false);
        }
        if self.is_running(plugin_id) {
            self.stop_plugin(plugin_id)?;
        }

        let options = match config.configuration {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        match plugin.start(self, &options) {
            Ok(()) => {
                write(&self.running).insert(plugin_id.to_string());
                info!("Plugin '{}' started", plugin_id);
                Ok(true)
            }
            Err(e) => {
                self.unregister_put_handlers(plugin_id);
                self.set_plugin_error(plugin_id, &e.to_string());
                Err(e)
            }
        }
    }

    /// Start every enabled plugin; failures are logged and reported as plugin errors.
    pub fn start_all(&self) {
        let ids: Vec<String> = read(&self.plugins).iter().map(|p| p.id().to_string()).collect();
        for id in ids {
            if let Err(e) = self.start_plugin(&id) {
                error!("Plugin '{}' failed to start: {}", id, e);
            }
        }
    }

    pub fn stop_plugin(&self, plugin_id: &str) -> Result<(), PluginError> {
        let plugin = self.plugin(plugin_id)?;
        let result = plugin.stop(self);
        self.unregister_put_handlers(plugin_id);
        write(&self.running).remove(plugin_id);
        info!("Plugin '{}' stopped", plugin_id);
        result
    }

    pub fn stop_all(&self) {
        let ids: Vec<String> = read(&self.running).iter().cloned().collect();
        for id in ids {
            if let Err(e) = self.stop_plugin(&id) {
                warn!("Plugin '{}' failed to stop cleanly: {}", id, e);
            }
        }
    }

    /// Persist new configuration and restart (or stop) the plugin accordingly.
    pub fn configure_plugin(
        &self,
        plugin_id: &str,
        enabled: bool,
        configuration: Value,
    ) -> Result<(), PluginError> {
        self.plugin(plugin_id)?;
        if self.is_running(plugin_id) {
            self.stop_plugin(plugin_id)?;
        }
        self.storage.save_plugin_config(
            plugin_id,
            &PluginConfigData {
                enabled,
                configuration,
            },
        )?;
        if enabled {
            self.start_plugin(plugin_id)?;
        }
        Ok(())
    }

    pub fn plugin_status(&self, plugin_id: &str) -> Option<PluginStatus> {
        read(&self.statuses).get(plugin_id).cloned()
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        let plugins: Vec<Arc<dyn Plugin>> = read(&self.plugins).clone();
        plugins
            .into_iter()
            .map(|plugin| {
                let id = plugin.id().to_string();
                let config = self.load_config(&id).unwrap_or_default();
                let status = self.plugin_status(&id);
                PluginInfo {
                    name: plugin.name().to_string(),
                    description: plugin.description().to_string(),
                    enabled: config.enabled,
                    running: self.is_running(&id),
                    status_message: status.as_ref().map(|s| s.message.clone()),
                    status_is_error: status.map(|s| s.is_error).unwrap_or(false),
                    schema: plugin.schema(),
                    ui_schema: plugin.ui_schema(),
                    data: config.configuration,
                    id,
                }
            })
            .collect()
    }

    fn set_status(&self, plugin_id: &str, message: &str, is_error: bool) {
        write(&self.statuses).insert(
            plugin_id.to_string(),
            PluginStatus {
                message: message.to_string(),
                is_error,
            },
        );
    }
}

impl ServerApi for PluginHost {
    fn get_self_path(&self, path: &str) -> Option<Value> {
        read(&self.store).get_self_path(path)
    }

    fn handle_message(&self, provider_id: &str, mut delta: Delta) {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        if delta.context.is_none() {
            delta.context = Some(SELF_CONTEXT.to_string());
        }
        for update in &mut delta.updates {
            if update.source_ref.is_none() && update.source.is_none() {
                update.source_ref = Some(provider_id.to_string());
            }
            if update.timestamp.is_none() {
                update.timestamp = Some(now.clone());
            }
        }

        write(&self.store).apply_delta(&delta);
        // No receivers is fine
        let _ = self.delta_tx.send(delta);
    }

    fn register_put_handler(
        &self,
        plugin_id: &str,
        context: &str,
        path: &str,
        source: Option<&str>,
        handler: PutHandler,
    ) -> Result<(), PluginError> {
        let key = (self.normalize_context(context), path.to_string());
        let mut handlers = write(&self.handlers);
        let regs = handlers.entry(key.clone()).or_default();

        if let Some(existing) = regs.iter_mut().find(|r| r.source.as_deref() == source) {
            if existing.plugin_id != plugin_id {
                return Err(PluginError::HandlerConflict {
                    context: key.0,
                    path: key.1,
                    source_label: source.map(String::from),
                    owner: existing.plugin_id.clone(),
                });
            }
            existing.handler = handler;
        } else {
            regs.push(Registration {
                plugin_id: plugin_id.to_string(),
                source: source.map(String::from),
                handler,
            });
        }

        debug!("PUT handler for {}.{} registered by '{}'", key.0, key.1, plugin_id);
        Ok(())
    }

    fn unregister_put_handlers(&self, plugin_id: &str) {
        let mut handlers = write(&self.handlers);
        for regs in handlers.values_mut() {
            regs.retain(|r| r.plugin_id != plugin_id);
        }
        handlers.retain(|_, regs| !regs.is_empty());
    }

    fn set_plugin_status(&self, plugin_id: &str, message: &str) {
        debug!("{}: {}", plugin_id, message);
        self.set_status(plugin_id, message, false);
    }

    fn set_plugin_error(&self, plugin_id: &str, message: &str) {
        error!("{}: {}", plugin_id, message);
        self.set_status(plugin_id, message, true);
    }

    fn read_plugin_options(&self, plugin_id: &str) -> Result<Value, PluginError> {
        Ok(match self.load_config(plugin_id)?.configuration {
            Value::Null => Value::Object(Default::default()),
            other => other,
        })
    }

    fn save_plugin_options(&self, plugin_id: &str, options: &Value) -> Result<(), PluginError> {
        let mut config = self.load_config(plugin_id)?;
        config.enabled = config.enabled || self.is_running(plugin_id);
        config.configuration = options.clone();
        self.storage.save_plugin_config(plugin_id, &config)?;
        Ok(())
    }
}
