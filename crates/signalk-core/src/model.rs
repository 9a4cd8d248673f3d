//! SignalK data model types.
//!
//! These types represent the parts of the SignalK data model a write
//! provider produces:
//! - Delta messages carrying new values and metadata
//! - Source tracking so consumers can tell providers apart

use serde::{Deserialize, Serialize};

/// Context used for the local vessel.
pub const SELF_CONTEXT: &str = "vessels.self";

/// A SignalK delta message containing one or more updates.
///
/// Deltas are the primary mechanism for transmitting changes in SignalK.
/// They contain a context (which vessel/object) and a list of updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// The context path (e.g., "vessels.urn:mrn:signalk:uuid:...")
    /// If None, defaults to "vessels.self"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// The list of updates in this delta
    pub updates: Vec<Update>,
}

impl Delta {
    /// Build a self-vessel delta holding a single update of values.
    pub fn self_values(values: Vec<PathValue>) -> Self {
        Self {
            context: Some(SELF_CONTEXT.to_string()),
            updates: vec![Update::with_values(values)],
        }
    }

    /// Build a self-vessel delta holding a single metadata update.
    pub fn self_meta(meta: Vec<PathMeta>) -> Self {
        Self {
            context: Some(SELF_CONTEXT.to_string()),
            updates: vec![Update::with_meta(meta)],
        }
    }
}

/// A single update within a delta, containing values from one source at one timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Reference to source in /sources (e.g., "rest-provider-signalk.1")
    #[serde(rename = "$source", skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,

    /// Embedded source object (alternative to $source)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    /// ISO 8601 timestamp (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// The path-value pairs in this update
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<PathValue>,

    /// Metadata updates (separate from values)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<PathMeta>>,
}

impl Update {
    /// An update carrying only values; source and timestamp are left to the publisher.
    pub fn with_values(values: Vec<PathValue>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    /// An update carrying only metadata.
    pub fn with_meta(meta: Vec<PathMeta>) -> Self {
        Self {
            meta: Some(meta),
            ..Default::default()
        }
    }
}

/// A single path-value pair within an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    /// The SignalK path (e.g., "navigation.anchor.currentRadius")
    pub path: String,

    /// The value at this path
    pub value: serde_json::Value,
}

impl PathValue {
    pub fn new(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }
}

/// Metadata for a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMeta {
    /// The SignalK path this metadata applies to
    pub path: String,

    /// The metadata value
    pub value: Meta,
}

/// Source information describing where data originated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Label identifying the source (e.g., "rest-provider-signalk")
    pub label: String,

    /// Type of source (e.g., "NMEA0183", "NMEA2000", "signalk")
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

/// Metadata describing a SignalK path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Display name for gauges (no units)
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// SI unit string (e.g., "m/s", "rad", "K")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    /// Timeout in seconds after which data is stale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    /// Indicates this path supports PUT requests
    #[serde(rename = "supportsPut", skip_serializing_if = "Option::is_none")]
    pub supports_put: Option<bool>,
}
