//! Inbound position message.
//!
//! Keys follow the voice client's `LinkedMem` field names so the browser
//! module can send its state without renaming. Every field is optional;
//! the encoder substitutes defaults for whatever is missing.

use serde::{Deserialize, Serialize};

use crate::{BridgeError, Result};

/// Semantic position and identity update for one link record.
///
/// Vectors are kept as loosely-sized lists: shorter lists are zero-filled
/// and extra elements are ignored when encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionMessage {
    /// Link protocol version.
    #[serde(rename = "uiVersion", alias = "version", default)]
    pub version: Option<u32>,
    /// Avatar position in world units.
    #[serde(rename = "fAvatarPosition", default)]
    pub avatar_position: Option<Vec<f32>>,
    /// Unit vector the avatar faces.
    #[serde(rename = "fAvatarFront", default)]
    pub avatar_front: Option<Vec<f32>>,
    /// Unit vector pointing up from the avatar.
    #[serde(rename = "fAvatarTop", default)]
    pub avatar_top: Option<Vec<f32>>,
    /// Camera position; falls back to the avatar position.
    #[serde(rename = "fCameraPosition", default)]
    pub camera_position: Option<Vec<f32>>,
    /// Camera front; falls back to the avatar front.
    #[serde(rename = "fCameraFront", default)]
    pub camera_front: Option<Vec<f32>>,
    /// Camera top; falls back to the avatar top.
    #[serde(rename = "fCameraTop", default)]
    pub camera_top: Option<Vec<f32>>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Player identity, usually a JSON string.
    #[serde(default)]
    pub identity: Option<String>,
    /// Context bytes; players sharing a context hear each other positionally.
    #[serde(default)]
    pub context: Option<Vec<u8>>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl PositionMessage {
    /// Parse a message from a JSON text payload.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::MalformedMessage` if the payload is not a JSON
    /// object or a field has the wrong shape.
    pub fn from_json(payload: &str) -> Result<Self> {
        // Derived `Deserialize` also accepts sequences and fills fields by
        // position; only key-value objects are messages.
        let value: serde_json::Value = serde_json::from_str(payload)?;
        match value {
            serde_json::Value::Object(fields) => {
                Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
            }
            other => Err(BridgeError::MalformedMessage(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Display name for logging.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
