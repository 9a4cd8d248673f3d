//! SignalK data store.
//!
//! The store maintains the current state of all SignalK data and provides
//! methods for querying and updating it. Leaves are kept in the usual
//! `{ "value", "$source", "timestamp", "meta" }` shape.

use crate::model::{Delta, SELF_CONTEXT};
use serde_json::{Map, Value};

/// Trait for SignalK data storage implementations.
pub trait SignalKStore: Send + Sync {
    /// Apply a delta to the store, merging values and metadata into the tree.
    fn apply_delta(&mut self, delta: &Delta);

    /// Get value at an absolute path (e.g., "vessels.self.navigation.position").
    fn get_path(&self, path: &str) -> Option<Value>;

    /// Get value relative to self vessel (e.g., "navigation.position").
    fn get_self_path(&self, path: &str) -> Option<Value>;

    /// Get the full state for a context (e.g., "vessels.self").
    fn get_context(&self, context: &str) -> Option<Value>;

    /// Get the self vessel identifier.
    fn self_urn(&self) -> &str;

    /// Get the full data model as JSON.
    fn full_model(&self) -> &Value;
}

/// In-memory SignalK store implementation.
///
/// Stores the full SignalK tree as a nested JSON structure.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    /// The full SignalK data tree
    data: Value,
    /// The self vessel URN
    self_urn: String,
}

impl MemoryStore {
    /// Create a new empty store with the given self vessel URN.
    ///
    /// The self_urn should be in the format "vessels.urn:mrn:signalk:uuid:..."
    /// as Signal K expects. A bare "urn:..." is accepted and prefixed.
    pub fn new(self_urn: &str) -> Self {
        let self_urn = if self_urn.starts_with("vessels.") {
            self_urn.to_string()
        } else {
            format!("vessels.{}", self_urn)
        };
        let urn_key = self_urn.trim_start_matches("vessels.").to_string();

        let data = serde_json::json!({
            "version": "1.7.0",
            "self": self_urn,
            "vessels": {
                urn_key: {}
            },
            "sources": {}
        });

        Self { data, self_urn }
    }

    /// True if `context` addresses the self vessel, either as
    /// "vessels.self" or by its full URN.
    pub fn is_self_context(&self, context: &str) -> bool {
        context == SELF_CONTEXT || context == self.self_urn
    }

    /// Resolve "vessels.self" to the actual vessel URN.
    fn resolve_context(&self, context: &str) -> String {
        if context == SELF_CONTEXT {
            self.self_urn.clone()
        } else {
            context.to_string()
        }
    }

    /// Walk to the object at `full_path`, creating missing objects on the way.
    ///
    /// Returns `None` when the walk hits a non-object, so a path reaching
    /// into a leaf's `value` never overwrites it.
    fn object_at_mut(&mut self, full_path: &str) -> Option<&mut Map<String, Value>> {
        let mut current = &mut self.data;

        for segment in full_path.split('.') {
            current = current
                .as_object_mut()?
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        current.as_object_mut()
    }

    /// Get a value at a path.
    fn get_path_value(&self, path: &str) -> Option<Value> {
        let mut current = &self.data;

        for segment in path.split('.') {
            match current {
                Value::Object(map) => {
                    current = map.get(segment)?;
                }
                _ => return None,
            }
        }

        Some(current.clone())
    }
}

impl SignalKStore for MemoryStore {
    fn apply_delta(&mut self, delta: &Delta) {
        // Resolve context - "vessels.self" becomes the actual URN path
        let context = delta
            .context
            .as_deref()
            .map(|c| self.resolve_context(c))
            .unwrap_or_else(|| self.self_urn.clone());

        for update in &delta.updates {
            for pv in &update.values {
                let full_path = format!("{}.{}", context, pv.path);
                if let Some(leaf) = self.object_at_mut(&full_path) {
                    // Existing "meta" survives value updates
                    leaf.insert("value".to_string(), pv.value.clone());
                    leaf.insert(
                        "$source".to_string(),
                        serde_json::to_value(&update.source_ref).unwrap_or(Value::Null),
                    );
                    leaf.insert(
                        "timestamp".to_string(),
                        serde_json::to_value(&update.timestamp).unwrap_or(Value::Null),
                    );
                }
            }

            for pm in update.meta.iter().flatten() {
                let full_path = format!("{}.{}", context, pm.path);
                let meta = serde_json::to_value(&pm.value).unwrap_or(Value::Null);
                if let Some(leaf) = self.object_at_mut(&full_path) {
                    leaf.insert("meta".to_string(), meta);
                }
            }
        }
    }

    fn get_path(&self, path: &str) -> Option<Value> {
        self.get_path_value(path)
    }

    fn get_self_path(&self, path: &str) -> Option<Value> {
        // self_urn is already "vessels.urn:...", so just append the path
        let full_path = format!("{}.{}", self.self_urn, path);
        self.get_path_value(&full_path)
    }

    fn get_context(&self, context: &str) -> Option<Value> {
        let resolved = self.resolve_context(context);
        self.get_path_value(&resolved)
    }

    fn self_urn(&self) -> &str {
        &self.self_urn
    }

    fn full_model(&self) -> &Value {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Meta, PathMeta, PathValue, Update};

    const URN: &str = "vessels.urn:mrn:signalk:uuid:test-vessel";

    fn value_delta(source: &str, path: &str, value: Value) -> Delta {
        Delta {
            context: Some("vessels.self".to_string()),
            updates: vec![Update {
                source_ref: Some(source.to_string()),
                timestamp: Some("2024-01-17T10:30:00.000Z".to_string()),
                values: vec![PathValue::new(path, value)],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_new_store() {
        let store = MemoryStore::new(URN);
        assert_eq!(store.self_urn(), URN);

        let full = store.full_model();
        assert_eq!(full["version"], "1.7.0");
        assert_eq!(full["self"], URN);
        assert!(full["vessels"]["urn:mrn:signalk:uuid:test-vessel"].is_object());
        assert!(full["sources"].is_object());
    }

    #[test]
    fn test_new_store_prefixes_bare_urn() {
        let store = MemoryStore::new("urn:mrn:signalk:uuid:test-vessel");
        assert_eq!(store.self_urn(), URN);
        assert!(store.is_self_context(URN));
        assert!(store.is_self_context("vessels.self"));
        assert!(!store.is_self_context("vessels.urn:mrn:signalk:uuid:other"));
    }

    #[test]
    fn test_apply_delta() {
        let mut store = MemoryStore::new(URN);
        store.apply_delta(&value_delta(
            "test.source",
            "navigation.speedOverGround",
            serde_json::json!(3.85),
        ));

        let value = store.get_self_path("navigation.speedOverGround").unwrap();
        assert_eq!(value["value"], serde_json::json!(3.85));
        assert_eq!(value["$source"], "test.source");
        assert_eq!(value["timestamp"], "2024-01-17T10:30:00.000Z");
    }

    #[test]
    fn test_multiple_updates_same_path() {
        let mut store = MemoryStore::new(URN);
        store.apply_delta(&value_delta(
            "gps1",
            "navigation.speedOverGround",
            serde_json::json!(3.85),
        ));
        store.apply_delta(&value_delta(
            "gps2",
            "navigation.speedOverGround",
            serde_json::json!(4.12),
        ));

        let value = store.get_self_path("navigation.speedOverGround").unwrap();
        assert_eq!(value["value"], serde_json::json!(4.12));
        assert_eq!(value["$source"], "gps2");
    }

    #[test]
    fn test_meta_survives_value_update() {
        let mut store = MemoryStore::new(URN);
        store.apply_delta(&Delta::self_meta(vec![PathMeta {
            path: "environment.water.temperature".to_string(),
            value: Meta {
                units: Some("K".to_string()),
                ..Default::default()
            },
        }]));
        store.apply_delta(&value_delta(
            "rest",
            "environment.water.temperature",
            serde_json::json!(291.15),
        ));

        let leaf = store.get_self_path("environment.water.temperature").unwrap();
        assert_eq!(leaf["value"], 291.15);
        assert_eq!(leaf["meta"]["units"], "K");
    }

    #[test]
    fn test_write_into_leaf_value_is_skipped() {
        let mut store = MemoryStore::new(URN);
        store.apply_delta(&value_delta("rest", "sensors.tank", serde_json::json!(0.4)));
        store.apply_delta(&value_delta("rest", "sensors.tank.value", serde_json::json!(9)));
        store.apply_delta(&value_delta(
            "rest",
            "sensors.tank.value.level",
            serde_json::json!(9),
        ));

        let leaf = store.get_self_path("sensors.tank").unwrap();
        assert_eq!(leaf["value"], 0.4);
        assert_eq!(leaf["$source"], "rest");
    }

    #[test]
    fn test_get_path_absolute_and_context() {
        let mut store = MemoryStore::new(URN);
        store.apply_delta(&value_delta(
            "test",
            "navigation.speedOverGround",
            serde_json::json!(3.85),
        ));

        let value = store
            .get_path("vessels.urn:mrn:signalk:uuid:test-vessel.navigation.speedOverGround")
            .unwrap();
        assert_eq!(value["value"], 3.85);

        let context = store.get_context("vessels.self").unwrap();
        assert_eq!(context["navigation"]["speedOverGround"]["value"], 3.85);
    }

    #[test]
    fn test_get_path_nonexistent() {
        let store = MemoryStore::new(URN);
        assert!(store.get_self_path("navigation.nonexistent").is_none());
    }

    #[test]
    fn test_other_context_kept_apart() {
        let mut store = MemoryStore::new(URN);
        store.apply_delta(&value_delta(
            "test",
            "navigation.speedOverGround",
            serde_json::json!(3.85),
        ));

        let mut other = value_delta("ais", "navigation.speedOverGround", serde_json::json!(5.2));
        other.context = Some("vessels.urn:mrn:signalk:uuid:other-vessel".to_string());
        store.apply_delta(&other);

        assert_eq!(store.get_self_path("navigation.speedOverGround").unwrap()["value"], 3.85);
        let other_speed = store
            .get_path("vessels.urn:mrn:signalk:uuid:other-vessel.navigation.speedOverGround")
            .unwrap();
        assert_eq!(other_speed["value"], 5.2);
    }
}
