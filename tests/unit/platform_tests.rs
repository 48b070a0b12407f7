//! Unit tests for per-platform link region naming.

use std::path::PathBuf;

use mumble_link_bridge::link::platform::{current_os_identifier, link_location, LinkLocation};
use mumble_link_bridge::BridgeError;

#[test]
fn windows_uses_named_mapping() {
    assert_eq!(
        link_location("windows", 1000).expect("supported"),
        LinkLocation::Named("MumbleLink".into())
    );
}

#[test]
fn linux_uses_dev_shm_with_uid() {
    assert_eq!(
        link_location("linux", 1000).expect("supported"),
        LinkLocation::Path(PathBuf::from("/dev/shm/MumbleLink.1000"))
    );
}

#[test]
fn darwin_uses_tmp_with_uid() {
    assert_eq!(
        link_location("darwin", 501).expect("supported"),
        LinkLocation::Path(PathBuf::from("/tmp/MumbleLink.501"))
    );
}

#[test]
fn macos_is_an_alias_of_darwin() {
    assert_eq!(
        link_location("macos", 501).expect("supported"),
        link_location("darwin", 501).expect("supported")
    );
}

#[test]
fn identifiers_are_case_insensitive() {
    assert_eq!(
        link_location("Linux", 0).expect("supported"),
        link_location("linux", 0).expect("supported")
    );
    assert!(link_location("WINDOWS", 0).is_ok());
}

#[test]
fn unknown_platform_is_unsupported() {
    let err = link_location("plan9", 0).expect_err("must fail");
    assert!(matches!(err, BridgeError::UnsupportedPlatform(ref os) if os == "plan9"));
}

#[test]
fn current_os_never_reports_macos() {
    assert_ne!(current_os_identifier(), "macos");
}

#[test]
fn location_display_is_the_name_or_path() {
    assert_eq!(LinkLocation::Named("MumbleLink".into()).to_string(), "MumbleLink");
    assert_eq!(
        LinkLocation::Path(PathBuf::from("/dev/shm/MumbleLink.7")).to_string(),
        "/dev/shm/MumbleLink.7"
    );
}
