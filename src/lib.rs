//! Bridge between Foundry VTT position updates and Mumble's Link plugin.
//!
//! A WebSocket listener accepts JSON position messages, the record encoder
//! turns each one into the fixed 2048-byte link record, and the update sink
//! writes it into the shared memory region the voice client polls.

pub mod config;
pub mod errors;
pub mod link;
pub mod server;
pub mod sink;

pub use config::BridgeConfig;
pub use errors::{BridgeError, Result};
