//! Plugin options: parsing, clamping and per-slot validation.
//!
//! ```json
//! {
//!   "limit": 2,
//!   "restpaths": {
//!     "1": { "enabled": true, "prefix": "navigation", "label": "anchor.maxRadius",
//!            "source": "anchor-app", "unit": "m", "interval": 5 },
//!     "2": { "enabled": false, "prefix": "sensors", "label": "" }
//!   }
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use signalk_core::Path;
use signalk_plugins::PluginError;
use tracing::warn;

/// Upper bound on configurable path slots.
pub const MAX_PATHS: usize = 9;

/// Root levels a provided path may live under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prefix {
    Navigation,
    Environment,
    Sensors,
}

impl Prefix {
    pub const ALL: [Prefix; 3] = [Prefix::Navigation, Prefix::Environment, Prefix::Sensors];

    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::Navigation => "navigation",
            Prefix::Environment => "environment",
            Prefix::Sensors => "sensors",
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prefix {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Prefix::ALL.into_iter().find(|p| p.as_str() == s).ok_or(())
    }
}

/// One `restpaths` slot exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Seconds after which the value counts as stale.
    #[serde(default)]
    pub interval: Option<f64>,
    /// Initial value; accepted writes are persisted here.
    #[serde(default)]
    pub value: Option<Value>,
}

/// A slot that passed validation and is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedPath {
    pub path: Path,
    pub source: Option<String>,
    pub unit: Option<String>,
    pub interval: Option<f64>,
    pub value: Option<Value>,
}

/// Keys of a data model leaf; a label may not address inside one.
const LEAF_KEYS: [&str; 4] = ["value", "values", "meta", "timestamp"];

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl PathOptions {
    /// Validate an enabled slot; disabled or malformed slots yield `None`.
    pub fn shape(&self, index: usize) -> Option<ShapedPath> {
        if !self.enabled {
            return None;
        }

        let (Some(prefix), Some(label)) = (non_blank(&self.prefix), non_blank(&self.label)) else {
            warn!("Path {}: prefix and label are required, slot disabled", index);
            return None;
        };
        let Ok(prefix) = prefix.parse::<Prefix>() else {
            warn!("Path {}: unknown prefix '{}', slot disabled", index, prefix);
            return None;
        };
        let label = match Path::parse(label) {
            Ok(label) => label,
            Err(e) => {
                warn!("Path {}: {}, slot disabled", index, e);
                return None;
            }
        };
        if let Some(key) = label
            .segments()
            .iter()
            .find(|s| LEAF_KEYS.contains(&s.as_str()))
        {
            warn!("Path {}: '{}' is reserved in labels, slot disabled", index, key);
            return None;
        }

        // Schema default for an unset source
        let source = non_blank(&self.source)
            .filter(|s| *s != "undefined")
            .map(String::from);

        Some(ShapedPath {
            path: Path::new(prefix.as_str()).join(&label),
            source,
            unit: non_blank(&self.unit).map(String::from),
            interval: self.interval.filter(|i| i.is_finite() && *i > 0.0),
            value: self.value.clone().filter(|v| !v.is_null()),
        })
    }
}

/// Parsed options: the configured slot count and one entry per slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderOptions {
    pub limit: usize,
    /// `slots[i]` holds slot `i + 1`; `None` when the slot is absent.
    pub slots: Vec<Option<PathOptions>>,
}

impl ProviderOptions {
    pub fn from_value(options: &Value) -> Result<Self, PluginError> {
        let options = match options {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(PluginError::InvalidOptions(format!(
                    "expected an object, got {}",
                    other
                )))
            }
        };

        let limit = parse_limit(options.get("limit"));

        let restpaths = match options.get("restpaths") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                return Err(PluginError::InvalidOptions(format!(
                    "restpaths must be an object, got {}",
                    other
                )))
            }
        };

        let slots = (1..=limit)
            .map(|i| {
                restpaths
                    .and_then(|paths| paths.get(&i.to_string()))
                    .filter(|slot| !slot.is_null())
                    .map(|slot| {
                        PathOptions::deserialize(slot).map_err(|e| {
                            PluginError::InvalidOptions(format!("restpaths.{}: {}", i, e))
                        })
                    })
                    .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { limit, slots })
    }
}

fn parse_limit(limit: Option<&Value>) -> usize {
    let requested = limit
        .and_then(Value::as_f64)
        .filter(|l| l.is_finite() && *l > 0.0)
        .map(|l| l.floor() as usize)
        .unwrap_or(0);

    if requested > MAX_PATHS {
        warn!("limit {} exceeds maximum {}, using {}", requested, MAX_PATHS, MAX_PATHS);
        MAX_PATHS
    } else {
        requested
    }
}
