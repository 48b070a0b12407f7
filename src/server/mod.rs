//! Network side of the bridge.
//!
//! Accepts WebSocket connections from the Foundry VTT module and forwards
//! every decoded message to the [`UpdateSink`](crate::sink::UpdateSink).

pub mod listener;
pub mod registry;

pub use listener::{bind, handle_payload, router, serve, ListenerState};
pub use registry::{ClientInfo, ClientRegistry};
