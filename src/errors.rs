//! Error types shared across the bridge.

use std::fmt::{Display, Formatter};

/// Shared bridge result type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error enumeration covering all failure modes.
///
/// Only [`BridgeError::UnsupportedPlatform`] (and configuration or bind
/// failures at startup) ever reach the process exit code. Every other
/// variant is logged and absorbed where it occurs.
#[derive(Debug)]
pub enum BridgeError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// No link region name can be derived for this operating system.
    UnsupportedPlatform(String),
    /// The link region does not exist (voice client not running).
    NotFound(String),
    /// Inbound payload is not a valid position message.
    MalformedMessage(String),
    /// Mapping, reading, or writing the link region failed.
    Region(String),
    /// Listener bind or serve failure.
    Transport(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::UnsupportedPlatform(msg) => write!(f, "unsupported platform: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::MalformedMessage(msg) => write!(f, "malformed message: {msg}"),
            Self::Region(msg) => write!(f, "region: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
