//! # signalk-protocol
//!
//! SignalK protocol message types for PUT requests and REST discovery.

pub mod messages;

pub use messages::*;
