//! # signalk-rest-provider
//!
//! A SignalK plugin that exposes up to nine user-selected paths as PUT
//! targets. Each enabled path gets an initial value on the bus and a write
//! handler; accepted writes are published as deltas, writes whose value type
//! disagrees with the current value are refused with `400`.

pub mod options;
pub mod provider;
pub mod schema;

pub use options::{PathOptions, Prefix, ProviderOptions, MAX_PATHS};
pub use provider::{PathRecord, RestProvider, ValueKind, PLUGIN_ID, WAITING};
