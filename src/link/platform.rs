//! Where the voice client publishes its link region on each platform.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::{BridgeError, Result};

/// Name of the Windows file mapping and prefix of the Unix shm file.
pub const LINK_NAME: &str = "MumbleLink";

/// Backing resource of the link region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkLocation {
    /// Named file mapping in the Windows object namespace.
    Named(String),
    /// File that is memory-mapped (Linux `/dev/shm`, macOS `/tmp`).
    Path(PathBuf),
}

impl Display for LinkLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Derive the link region for an operating system identifier.
///
/// `os` is compared case-insensitively; `macos` is accepted as an alias of
/// `darwin`. `uid` is only used on Unix-like systems.
///
/// # Errors
///
/// Returns `BridgeError::UnsupportedPlatform` for any other identifier.
pub fn link_location(os: &str, uid: u32) -> Result<LinkLocation> {
    match os.to_ascii_lowercase().as_str() {
        "windows" => Ok(LinkLocation::Named(LINK_NAME.to_owned())),
        "linux" => Ok(LinkLocation::Path(PathBuf::from(format!(
            "/dev/shm/{LINK_NAME}.{uid}"
        )))),
        "darwin" | "macos" => Ok(LinkLocation::Path(PathBuf::from(format!(
            "/tmp/{LINK_NAME}.{uid}"
        )))),
        other => Err(BridgeError::UnsupportedPlatform(other.to_owned())),
    }
}

/// Identifier of the running operating system.
#[must_use]
pub fn current_os_identifier() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Real user id of this process.
#[cfg(unix)]
#[must_use]
pub fn current_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

/// Real user id of this process; always 0 where uids do not apply.
#[cfg(not(unix))]
#[must_use]
pub fn current_uid() -> u32 {
    0
}

/// Link region for the running process.
///
/// # Errors
///
/// Returns `BridgeError::UnsupportedPlatform` when the OS has no known
/// link region.
pub fn resolve_current() -> Result<LinkLocation> {
    link_location(current_os_identifier(), current_uid())
}
