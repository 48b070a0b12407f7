//! Mumble Link record model, encoding, and shared memory access.
//!
//! - [`message`] — inbound position message as sent by the browser module.
//! - [`record`] — byte-exact 2048-byte link record layout and encoder.
//! - [`platform`] — per-OS region naming.
//! - [`region`] — the writable region capability and its backends.

pub mod message;
pub mod platform;
pub mod record;
pub mod region;

pub use message::PositionMessage;
pub use platform::LinkLocation;
pub use record::{encode, LinkRecord, LinkSnapshot, RecordEncoder, RECORD_SIZE};
pub use region::{open_region, LinkRegion};
