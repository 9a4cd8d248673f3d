//! # signalk-plugins
//!
//! Plugin API for SignalK server plugins written in Rust.
//!
//! A plugin implements [`Plugin`] and talks to the server only through the
//! narrow [`ServerApi`] surface: read a value, publish a delta, register PUT
//! handlers, report status and persist its options. [`PluginHost`] is an
//! in-process implementation of that surface backed by a `MemoryStore`.

pub mod api;
pub mod error;
pub mod host;

pub use api::{put_handler, Plugin, PutHandler, ServerApi};
pub use error::PluginError;
pub use host::{PluginHost, PluginInfo, PluginStatus};
