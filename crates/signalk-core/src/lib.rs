//! # signalk-core
//!
//! Core SignalK data model and store implementation.
//!
//! This crate provides:
//! - Data model types (Delta, Update, PathValue, Meta, etc.)
//! - Path validation and URL/dotted conversion
//! - In-memory store implementation
//! - Plugin configuration storage (file and memory backends)
//!
//! This crate is intentionally runtime-agnostic and contains no async code.

pub mod config;
pub mod model;
pub mod path;
pub mod store;

pub use config::{
    ConfigError, ConfigStorage, FileConfigStorage, MemoryConfigStorage, PluginConfigData,
};
pub use model::*;
pub use path::{Path, PathError};
pub use store::{MemoryStore, SignalKStore};
