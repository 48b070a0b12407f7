//! Unit tests for inbound message decoding.

use mumble_link_bridge::link::PositionMessage;
use mumble_link_bridge::BridgeError;

#[test]
fn parses_link_field_names() {
    let msg = PositionMessage::from_json(
        r#"{
            "uiVersion": 2,
            "fAvatarPosition": [1.5, 2, 3],
            "fAvatarFront": [0, 0, 1],
            "fAvatarTop": [0, 1, 0],
            "fCameraPosition": [4, 5, 6],
            "fCameraFront": [1, 0, 0],
            "fCameraTop": [0, 0, 1],
            "name": "Alice",
            "identity": "{\"token\":\"abc\"}",
            "context": [1, 2, 255],
            "description": "Session zero"
        }"#,
    )
    .expect("valid message");

    assert_eq!(msg.version, Some(2));
    assert_eq!(msg.avatar_position, Some(vec![1.5, 2.0, 3.0]));
    assert_eq!(msg.camera_position, Some(vec![4.0, 5.0, 6.0]));
    assert_eq!(msg.camera_top, Some(vec![0.0, 0.0, 1.0]));
    assert_eq!(msg.name.as_deref(), Some("Alice"));
    assert_eq!(msg.identity.as_deref(), Some(r#"{"token":"abc"}"#));
    assert_eq!(msg.context, Some(vec![1, 2, 255]));
    assert_eq!(msg.description.as_deref(), Some("Session zero"));
}

#[test]
fn version_alias_is_accepted() {
    let msg = PositionMessage::from_json(r#"{"version": 3}"#).expect("valid message");
    assert_eq!(msg.version, Some(3));
}

#[test]
fn empty_object_leaves_everything_unset() {
    let msg = PositionMessage::from_json("{}").expect("valid message");
    assert_eq!(msg, PositionMessage::default());
    assert_eq!(msg.display_name(), "Unknown");
}

#[test]
fn unknown_keys_are_ignored() {
    let msg = PositionMessage::from_json(r#"{"name":"Bob","sceneId":"abc"}"#)
        .expect("valid message");
    assert_eq!(msg.display_name(), "Bob");
}

#[test]
fn null_fields_count_as_missing() {
    let msg = PositionMessage::from_json(r#"{"name":null,"fCameraPosition":null}"#)
        .expect("valid message");
    assert!(msg.name.is_none());
    assert!(msg.camera_position.is_none());
}

#[test]
fn invalid_json_is_malformed() {
    let err = PositionMessage::from_json("{not json").expect_err("must fail");
    assert!(matches!(err, BridgeError::MalformedMessage(_)));
}

#[test]
fn non_object_is_malformed() {
    for payload in ["[1, 2, 3]", "[]", "[5]", "[null, [9, 9, 9]]", r#""str""#, "42", "null", "true"] {
        let err = PositionMessage::from_json(payload).expect_err(payload);
        assert!(
            matches!(err, BridgeError::MalformedMessage(_)),
            "{payload} must be malformed"
        );
    }
}

#[test]
fn array_error_names_the_json_kind() {
    let err = PositionMessage::from_json("[5]").expect_err("must fail");
    assert_eq!(
        err.to_string(),
        "malformed message: expected a JSON object, got an array"
    );
}

#[test]
fn wrongly_typed_field_is_malformed() {
    let err = PositionMessage::from_json(r#"{"fAvatarPosition":"here"}"#).expect_err("must fail");
    assert!(matches!(err, BridgeError::MalformedMessage(_)));
}

#[test]
fn out_of_range_context_byte_is_malformed() {
    let err = PositionMessage::from_json(r#"{"context":[1, 256]}"#).expect_err("must fail");
    assert!(matches!(err, BridgeError::MalformedMessage(_)));
}
