//! The `rest-provider-signalk` plugin.
//!
//! On start every enabled slot gets an initial value on the bus and a PUT
//! handler. Accepted writes are recorded, published and persisted back into
//! the slot's `value` so they survive a restart.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use signalk_core::{Delta, Meta, PathMeta, PathValue, SELF_CONTEXT};
use signalk_plugins::{put_handler, Plugin, PluginError, ServerApi};
use signalk_protocol::PutResult;

use crate::options::ProviderOptions;
use crate::schema::build_schema;

pub const PLUGIN_ID: &str = "rest-provider-signalk";
pub const PLUGIN_NAME: &str = "REST Endpoint Provider";
pub const PLUGIN_DESCRIPTION: &str = "Provide RESTful endpoint for selected SignalK paths";

/// Placeholder published for a path that has no value yet.
pub const WAITING: &str = "waiting ...";

/// Coarse type of a JSON value, as a dynamic `typeof` would report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    String,
    Boolean,
    /// Objects, arrays and null
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Null | Value::Array(_) | Value::Object(_) => ValueKind::Object,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Object => "object",
        })
    }
}

fn is_waiting(value: &Value) -> bool {
    value.as_str() == Some(WAITING)
}

/// Bookkeeping for one configured slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathRecord {
    /// 1-based slot number
    pub index: usize,
    pub enabled: bool,
    /// Full dotted path; empty for disabled slots
    pub path: String,
    /// Value most recently published for the path
    pub value: Value,
    pub unit: Option<String>,
    pub interval: Option<f64>,
    pub source: Option<String>,
    /// Bus value before the last accepted write
    pub last: Option<Value>,
    /// RFC 3339 time of the last accepted write, `None` if never written
    pub updated: Option<String>,
}

impl PathRecord {
    fn disabled(index: usize) -> Self {
        Self {
            index,
            enabled: false,
            path: String::new(),
            value: Value::Null,
            unit: None,
            interval: None,
            source: None,
            last: None,
            updated: None,
        }
    }
}

/// Name used as `$source` for deltas published from slot `index`.
pub fn handler_name(index: usize) -> String {
    format!("{}.{}", PLUGIN_ID, index)
}

#[derive(Debug, Default)]
struct ProviderState {
    configured_paths: usize,
    records: Vec<PathRecord>,
    /// Options as last started, patched with accepted writes
    options: Value,
}

/// The REST endpoint provider plugin.
#[derive(Debug, Clone, Default)]
pub struct RestProvider {
    state: Arc<Mutex<ProviderState>>,
}

fn lock(state: &Mutex<ProviderState>) -> MutexGuard<'_, ProviderState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn current_value(app: &dyn ServerApi, path: &str) -> Option<Value> {
    app.get_self_path(path)
        .and_then(|leaf| leaf.get("value").cloned())
        .filter(|v| !v.is_null())
}

impl RestProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the slot records.
    pub fn records(&self) -> Vec<PathRecord> {
        lock(&self.state).records.clone()
    }

    /// Slot count from the last start.
    pub fn configured_paths(&self) -> usize {
        lock(&self.state).configured_paths
    }

    fn init(&self, app: &dyn ServerApi, options: &Value) -> Result<(), PluginError> {
        app.set_plugin_status(PLUGIN_ID, "Initializing");
        debug!("Configuring REST Provider ...");

        let parsed = ProviderOptions::from_value(options)?;
        let mut records = Vec::with_capacity(parsed.limit);
        let mut values = Vec::new();
        let mut metas = Vec::new();

        for (i, slot) in parsed.slots.iter().enumerate() {
            let index = i + 1;
            let Some(shaped) = slot.as_ref().and_then(|s| s.shape(index)) else {
                records.push(PathRecord::disabled(index));
                continue;
            };

            let path = shaped.path.to_string();
            let current = current_value(app, &path);
            let initial = shaped
                .value
                .clone()
                .or_else(|| current.clone())
                .unwrap_or_else(|| json!(WAITING));

            values.push(PathValue::new(&path, initial.clone()));
            if shaped.unit.is_some() || shaped.interval.is_some() {
                metas.push(PathMeta {
                    path: path.clone(),
                    value: Meta {
                        units: shaped.unit.clone(),
                        timeout: shaped.interval,
                        supports_put: Some(true),
                        ..Default::default()
                    },
                });
            }

            records.push(PathRecord {
                index,
                enabled: true,
                path,
                value: initial,
                unit: shaped.unit,
                interval: shaped.interval,
                source: shaped.source,
                last: current,
                updated: None,
            });
        }

        debug!("REST Provider records: {:?}", records);
        {
            let mut state = lock(&self.state);
            state.configured_paths = parsed.limit;
            state.records = records;
            state.options = options.clone();
        }

        if !values.is_empty() {
            app.handle_message(PLUGIN_ID, Delta::self_values(values));
        }
        if !metas.is_empty() {
            app.handle_message(PLUGIN_ID, Delta::self_meta(metas));
        }

        app.set_plugin_status(PLUGIN_ID, "Done initializing");
        Ok(())
    }

    fn register(&self, app: &dyn ServerApi) -> Result<(), PluginError> {
        app.set_plugin_status(PLUGIN_ID, "Registering");
        debug!("Registering active PUT Handler(s) ...");

        for record in self.records().into_iter().filter(|r| r.enabled) {
            let state = self.state.clone();
            let index = record.index;
            app.register_put_handler(
                PLUGIN_ID,
                SELF_CONTEXT,
                &record.path,
                record.source.as_deref(),
                put_handler(move |app, context, path, value| {
                    handle_put(&state, app, index, context, path, value)
                }),
            )?;
            debug!(
                "{}: handler for '{}' registered for {}",
                handler_name(index),
                record.path,
                record.source.as_deref().unwrap_or("any source")
            );
        }

        app.set_plugin_status(PLUGIN_ID, "Registered");
        Ok(())
    }
}

/// Accept or reject a write to slot `index`.
fn handle_put(
    state: &Mutex<ProviderState>,
    app: &dyn ServerApi,
    index: usize,
    context: &str,
    path: &str,
    value: &Value,
) -> PutResult {
    let handler = handler_name(index);

    if context != SELF_CONTEXT {
        debug!("{}: ignoring write for context '{}'", handler, context);
        return PutResult::completed();
    }

    let mut guard = lock(state);
    let Some(record) = guard.records.iter_mut().find(|r| r.index == index && r.enabled) else {
        return PutResult::failed(404, format!("{} is not configured", path));
    };

    let current = current_value(app, path)
        .or_else(|| Some(record.value.clone()).filter(|v| !v.is_null()));
    if let Some(current) = current.as_ref().filter(|v| !is_waiting(v)) {
        let (new_kind, current_kind) = (ValueKind::of(value), ValueKind::of(current));
        if new_kind != current_kind {
            let message = format!("Type mismatch: '{}' doesn't match '{}'", new_kind, current_kind);
            debug!("{}: couldn't update '{}', error: {}", handler, path, message);
            return PutResult::rejected(400, message);
        }
    }

    record.last = current;
    record.updated = Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
    record.value = value.clone();

    if let Some(slot) = guard
        .options
        .get_mut("restpaths")
        .and_then(|paths| paths.get_mut(index.to_string().as_str()))
        .and_then(Value::as_object_mut)
    {
        slot.insert("value".to_string(), value.clone());
    }
    let options = guard.options.clone();
    drop(guard);

    app.handle_message(&handler, Delta::self_values(vec![PathValue::new(path, value.clone())]));
    debug!("{}: {} = {}", handler, path, value);

    if let Err(e) = app.save_plugin_options(PLUGIN_ID, &options) {
        warn!("{}: couldn't persist value for '{}': {}", handler, path, e);
    }

    PutResult::completed()
}

impl Plugin for RestProvider {
    fn id(&self) -> &str {
        PLUGIN_ID
    }

    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn description(&self) -> &str {
        PLUGIN_DESCRIPTION
    }

    fn schema(&self) -> Value {
        build_schema(self.configured_paths())
    }

    fn start(&self, app: &dyn ServerApi, options: &Value) -> Result<(), PluginError> {
        debug!("Plugin starting ...");
        self.init(app, options)?;
        if self.configured_paths() > 0 {
            self.register(app)?;
        }
        let enabled = self.records().iter().filter(|r| r.enabled).count();
        info!("{} started with {} path(s)", PLUGIN_ID, enabled);
        app.set_plugin_status(PLUGIN_ID, "Started");
        Ok(())
    }

    fn stop(&self, app: &dyn ServerApi) -> Result<(), PluginError> {
        app.unregister_put_handlers(PLUGIN_ID);
        {
            let mut state = lock(&self.state);
            state.records.clear();
            state.configured_paths = 0;
            state.options = Value::Null;
        }
        debug!("Plugin stopped");
        app.set_plugin_status(PLUGIN_ID, "Stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_kind_matches_typeof() {
        assert_eq!(ValueKind::of(&json!(1.5)), ValueKind::Number);
        assert_eq!(ValueKind::of(&json!(3)), ValueKind::Number);
        assert_eq!(ValueKind::of(&json!("on")), ValueKind::String);
        assert_eq!(ValueKind::of(&json!(true)), ValueKind::Boolean);
        assert_eq!(ValueKind::of(&json!({"latitude": 1.0})), ValueKind::Object);
        assert_eq!(ValueKind::of(&json!([1, 2])), ValueKind::Object);
        assert_eq!(ValueKind::of(&Value::Null), ValueKind::Object);
        assert_eq!(ValueKind::String.to_string(), "string");
    }

    #[test]
    fn test_waiting_placeholder() {
        assert!(is_waiting(&json!(WAITING)));
        assert!(!is_waiting(&json!("waiting")));
        assert!(!is_waiting(&json!(0)));
    }

    #[test]
    fn test_handler_name() {
        assert_eq!(handler_name(3), "rest-provider-signalk.3");
    }
}
