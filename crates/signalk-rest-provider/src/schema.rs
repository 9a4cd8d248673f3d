//! JSON schema for the options form.
//!
//! The form only offers `limit` until the plugin has been started with a
//! non-zero limit; after that it grows one "Path i" group per slot.

use serde_json::{json, Map, Value};

use crate::options::{Prefix, MAX_PATHS};

pub fn build_schema(configured_paths: usize) -> Value {
    let mut schema = json!({
        "type": "object",
        "title": "Handler Configuration",
        "description": "Configure SignalK paths to receive updates via REST calls",
        "properties": {
            "limit": {
                "type": "number",
                "title": "Limit",
                "description": format!("maximum {}", MAX_PATHS),
                "default": 0
            }
        }
    });

    if configured_paths > 0 {
        schema["properties"]["restpaths"] = rest_paths_schema(configured_paths);
    }
    schema
}

fn rest_paths_schema(configured_paths: usize) -> Value {
    let properties: Map<String, Value> = (1..=configured_paths.min(MAX_PATHS))
        .map(|i| (i.to_string(), path_schema(i)))
        .collect();

    json!({
        "type": "object",
        "title": "Paths provided with REST handlers",
        "properties": properties
    })
}

fn path_schema(index: usize) -> Value {
    let prefixes: Vec<&str> = Prefix::ALL.iter().map(Prefix::as_str).collect();

    json!({
        "type": "object",
        "title": format!("Path {}", index),
        "required": ["prefix", "label"],
        "properties": {
            "enabled": {
                "type": "boolean",
                "title": "Enable the SignalK path for PUT calls",
                "default": false
            },
            "prefix": {
                "type": "string",
                "title": "SignalK Root Path",
                "description": "Rootlevel path",
                "enum": prefixes
            },
            "label": {
                "type": "string",
                "title": "SignalK Path",
                "description": "Sublevel path to receive data"
            },
            "source": {
                "type": "string",
                "title": "Data Source",
                "description": "Specify the source (service) for the data item",
                "default": "undefined"
            },
            "unit": {
                "type": "string",
                "title": "Unit",
                "description": "SI unit published as path metadata"
            },
            "interval": {
                "type": "number",
                "title": "Interval",
                "description": "Seconds after which the value is considered stale"
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_schema_without_paths() {
        let schema = build_schema(0);
        assert_eq!(schema["properties"]["limit"]["description"], "maximum 9");
        assert_eq!(schema["properties"]["limit"]["default"], 0);
        assert!(schema["properties"].get("restpaths").is_none());
    }

    #[test]
    fn test_schema_with_paths() {
        let schema = build_schema(2);
        let paths = schema["properties"]["restpaths"]["properties"].as_object().unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths["1"]["title"], "Path 1");
        assert_eq!(paths["2"]["required"], json!(["prefix", "label"]));
        assert_eq!(
            paths["2"]["properties"]["prefix"]["enum"],
            json!(["navigation", "environment", "sensors"])
        );
    }

    #[test]
    fn test_schema_caps_slot_count() {
        let schema = build_schema(20);
        let paths = schema["properties"]["restpaths"]["properties"].as_object().unwrap();
        assert_eq!(paths.len(), MAX_PATHS);
        assert!(paths.contains_key("9"));
    }
}
