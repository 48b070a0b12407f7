//! Fixed-layout Mumble Link record.
//!
//! The voice client polls a `LinkedMem` structure in shared memory. This
//! module owns the byte-exact layout of that structure as the bridge maps
//! it: 2048 bytes, little-endian numbers, UTF-16LE text.
//!
//! | Offset | Size | Field              |
//! |-------:|-----:|--------------------|
//! |      0 |    4 | `uiVersion`        |
//! |      4 |    4 | `uiTick`           |
//! |      8 |   12 | `fAvatarPosition`  |
//! |     20 |   12 | `fAvatarFront`     |
//! |     32 |   12 | `fAvatarTop`       |
//! |     44 |  512 | `name`             |
//! |    556 |   12 | `fCameraPosition`  |
//! |    568 |   12 | `fCameraFront`     |
//! |    580 |   12 | `fCameraTop`       |
//! |    592 |  512 | `identity`         |
//! |   1104 |    4 | `context_len`      |
//! |   1108 |  256 | `context`          |
//! |   1364 | 4096 | `description`      |
//!
//! The description nominally spans 4096 bytes but only the first
//! [`DESCRIPTION_WINDOW`] bytes fall inside the mapped record; the encoder
//! never writes past [`RECORD_SIZE`].

use serde::Serialize;

use super::message::PositionMessage;

/// Size of the mapped link record in bytes.
pub const RECORD_SIZE: usize = 2048;

/// Offset of `uiVersion`.
pub const VERSION_OFFSET: usize = 0;
/// Offset of `uiTick`.
pub const TICK_OFFSET: usize = 4;
/// Offset of `fAvatarPosition`.
pub const AVATAR_POSITION_OFFSET: usize = 8;
/// Offset of `fAvatarFront`.
pub const AVATAR_FRONT_OFFSET: usize = 20;
/// Offset of `fAvatarTop`.
pub const AVATAR_TOP_OFFSET: usize = 32;
/// Offset of `name`.
pub const NAME_OFFSET: usize = 44;
/// Offset of `fCameraPosition`.
pub const CAMERA_POSITION_OFFSET: usize = 556;
/// Offset of `fCameraFront`.
pub const CAMERA_FRONT_OFFSET: usize = 568;
/// Offset of `fCameraTop`.
pub const CAMERA_TOP_OFFSET: usize = 580;
/// Offset of `identity`.
pub const IDENTITY_OFFSET: usize = 592;
/// Offset of `context_len`.
pub const CONTEXT_LEN_OFFSET: usize = 1104;
/// Offset of `context`.
pub const CONTEXT_OFFSET: usize = 1108;
/// Offset of `description`.
pub const DESCRIPTION_OFFSET: usize = 1364;

/// Byte size of the `name` and `identity` fields.
pub const WIDE_FIELD_LEN: usize = 512;
/// Byte size of the `context` field.
pub const CONTEXT_LEN: usize = 256;
/// Nominal byte size of the `description` field.
pub const DESCRIPTION_LEN: usize = 4096;
/// Bytes of the description that fit inside the record.
pub const DESCRIPTION_WINDOW: usize = RECORD_SIZE - DESCRIPTION_OFFSET;

/// Version written when a message does not carry one.
pub const DEFAULT_VERSION: u32 = 4;

const DEFAULT_POSITION: [f32; 3] = [0.0, 0.0, 0.0];
const DEFAULT_FRONT: [f32; 3] = [0.0, 0.0, 1.0];
const DEFAULT_TOP: [f32; 3] = [0.0, 1.0, 0.0];

// Character caps applied before the byte budgets: the nominal field size
// in UTF-16 units, less one for the terminator.
const WIDE_FIELD_MAX_UNITS: usize = WIDE_FIELD_LEN / 2 - 1;
const DESCRIPTION_MAX_UNITS: usize = DESCRIPTION_LEN / 2 - 1;

/// Text substituted for fields a message leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderDefaults {
    /// Default display name.
    pub name: String,
    /// Default identity.
    pub identity: String,
    /// Default description.
    pub description: String,
}

impl Default for EncoderDefaults {
    fn default() -> Self {
        Self {
            name: "Foundry VTT User".into(),
            identity: "{}".into(),
            description: "Foundry VTT".into(),
        }
    }
}

/// One complete link record.
#[derive(Clone, PartialEq, Eq)]
pub struct LinkRecord {
    bytes: [u8; RECORD_SIZE],
}

impl std::fmt::Debug for LinkRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkRecord")
            .field("version", &self.version())
            .field("tick", &self.tick())
            .finish_non_exhaustive()
    }
}

impl Default for LinkRecord {
    fn default() -> Self {
        Self {
            bytes: [0; RECORD_SIZE],
        }
    }
}

impl LinkRecord {
    /// Wrap raw record bytes, e.g. read back from a region.
    #[must_use]
    pub fn from_bytes(bytes: [u8; RECORD_SIZE]) -> Self {
        Self { bytes }
    }

    /// Raw record bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; RECORD_SIZE] {
        &self.bytes
    }

    /// Stored `uiVersion`.
    #[must_use]
    pub fn version(&self) -> u32 {
        read_u32(&self.bytes, VERSION_OFFSET)
    }

    /// Stored `uiTick`.
    #[must_use]
    pub fn tick(&self) -> u32 {
        read_u32(&self.bytes, TICK_OFFSET)
    }

    /// Decode every field into a readable snapshot.
    #[must_use]
    pub fn decode(&self) -> LinkSnapshot {
        let context_len = read_u32(&self.bytes, CONTEXT_LEN_OFFSET);
        let context_bytes = usize::try_from(context_len)
            .unwrap_or(CONTEXT_LEN)
            .min(CONTEXT_LEN);

        LinkSnapshot {
            version: self.version(),
            tick: self.tick(),
            avatar_position: read_vec3(&self.bytes, AVATAR_POSITION_OFFSET),
            avatar_front: read_vec3(&self.bytes, AVATAR_FRONT_OFFSET),
            avatar_top: read_vec3(&self.bytes, AVATAR_TOP_OFFSET),
            name: read_wide(&self.bytes[NAME_OFFSET..NAME_OFFSET + WIDE_FIELD_LEN]),
            camera_position: read_vec3(&self.bytes, CAMERA_POSITION_OFFSET),
            camera_front: read_vec3(&self.bytes, CAMERA_FRONT_OFFSET),
            camera_top: read_vec3(&self.bytes, CAMERA_TOP_OFFSET),
            identity: read_wide(&self.bytes[IDENTITY_OFFSET..IDENTITY_OFFSET + WIDE_FIELD_LEN]),
            context_len,
            context: self.bytes[CONTEXT_OFFSET..CONTEXT_OFFSET + context_bytes].to_vec(),
            description: read_wide(&self.bytes[DESCRIPTION_OFFSET..RECORD_SIZE]),
        }
    }
}

/// Decoded view of a link record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSnapshot {
    /// `uiVersion`.
    pub version: u32,
    /// `uiTick`.
    pub tick: u32,
    /// `fAvatarPosition`.
    pub avatar_position: [f32; 3],
    /// `fAvatarFront`.
    pub avatar_front: [f32; 3],
    /// `fAvatarTop`.
    pub avatar_top: [f32; 3],
    /// `name`, up to the first NUL.
    pub name: String,
    /// `fCameraPosition`.
    pub camera_position: [f32; 3],
    /// `fCameraFront`.
    pub camera_front: [f32; 3],
    /// `fCameraTop`.
    pub camera_top: [f32; 3],
    /// `identity`, up to the first NUL.
    pub identity: String,
    /// Stored `context_len`.
    pub context_len: u32,
    /// The first `context_len` context bytes (at most 256).
    pub context: Vec<u8>,
    /// `description`, up to the first NUL.
    pub description: String,
}

/// Converts position messages into link records.
///
/// Pure: holds only the text defaults and performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct RecordEncoder {
    defaults: EncoderDefaults,
}

impl RecordEncoder {
    /// Create an encoder with custom text defaults.
    #[must_use]
    pub fn new(defaults: EncoderDefaults) -> Self {
        Self { defaults }
    }

    /// Encode `message` as the record following `previous_tick`.
    ///
    /// Returns the record and the tick it carries (`previous_tick + 1`,
    /// wrapping at `u32::MAX`).
    #[must_use]
    pub fn encode(&self, message: &PositionMessage, previous_tick: u32) -> (LinkRecord, u32) {
        let tick = previous_tick.wrapping_add(1);
        let mut bytes = [0u8; RECORD_SIZE];

        write_u32(
            &mut bytes,
            VERSION_OFFSET,
            message.version.unwrap_or(DEFAULT_VERSION),
        );
        write_u32(&mut bytes, TICK_OFFSET, tick);

        let avatar_position = vec3_or(message.avatar_position.as_deref(), DEFAULT_POSITION);
        let avatar_front = vec3_or(message.avatar_front.as_deref(), DEFAULT_FRONT);
        let avatar_top = vec3_or(message.avatar_top.as_deref(), DEFAULT_TOP);
        write_vec3(&mut bytes, AVATAR_POSITION_OFFSET, avatar_position);
        write_vec3(&mut bytes, AVATAR_FRONT_OFFSET, avatar_front);
        write_vec3(&mut bytes, AVATAR_TOP_OFFSET, avatar_top);

        let name = message.name.as_deref().unwrap_or(&self.defaults.name);
        write_wide(
            &mut bytes[NAME_OFFSET..NAME_OFFSET + WIDE_FIELD_LEN],
            name,
            WIDE_FIELD_MAX_UNITS,
        );

        write_vec3(
            &mut bytes,
            CAMERA_POSITION_OFFSET,
            vec3_or(message.camera_position.as_deref(), avatar_position),
        );
        write_vec3(
            &mut bytes,
            CAMERA_FRONT_OFFSET,
            vec3_or(message.camera_front.as_deref(), avatar_front),
        );
        write_vec3(
            &mut bytes,
            CAMERA_TOP_OFFSET,
            vec3_or(message.camera_top.as_deref(), avatar_top),
        );

        let identity = message
            .identity
            .as_deref()
            .unwrap_or(&self.defaults.identity);
        write_wide(
            &mut bytes[IDENTITY_OFFSET..IDENTITY_OFFSET + WIDE_FIELD_LEN],
            identity,
            WIDE_FIELD_MAX_UNITS,
        );

        let context = message.context.as_deref().unwrap_or_default();
        let context = &context[..context.len().min(CONTEXT_LEN)];
        let context_len = u32::try_from(context.len()).unwrap_or_default();
        write_u32(&mut bytes, CONTEXT_LEN_OFFSET, context_len);
        bytes[CONTEXT_OFFSET..CONTEXT_OFFSET + context.len()].copy_from_slice(context);

        let description = message
            .description
            .as_deref()
            .unwrap_or(&self.defaults.description);
        write_wide(
            &mut bytes[DESCRIPTION_OFFSET..RECORD_SIZE],
            description,
            DESCRIPTION_MAX_UNITS,
        );

        (LinkRecord { bytes }, tick)
    }
}

/// Encode with the stock defaults.
#[must_use]
pub fn encode(message: &PositionMessage, previous_tick: u32) -> (LinkRecord, u32) {
    RecordEncoder::default().encode(message, previous_tick)
}

/// Largest number of UTF-16 units a text field of `field_len` bytes holds,
/// keeping one unit for the terminator.
#[must_use]
pub fn text_budget_units(field_len: usize, max_units: usize) -> usize {
    (field_len / 2).saturating_sub(1).min(max_units)
}

fn vec3_or(values: Option<&[f32]>, default: [f32; 3]) -> [f32; 3] {
    let Some(values) = values else {
        return default;
    };
    let mut out = [0.0; 3];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = *value;
    }
    out
}

fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn write_vec3(bytes: &mut [u8], offset: usize, values: [f32; 3]) {
    for (index, value) in values.iter().enumerate() {
        let at = offset + index * 4;
        bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

fn read_vec3(bytes: &[u8], offset: usize) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (index, slot) in out.iter_mut().enumerate() {
        *slot = f32::from_bits(read_u32(bytes, offset + index * 4));
    }
    out
}

/// Write `text` as UTF-16LE into `field`, truncated on a character
/// boundary so at least one NUL unit remains. The rest stays zeroed.
fn write_wide(field: &mut [u8], text: &str, max_units: usize) {
    let budget = text_budget_units(field.len(), max_units);
    let mut units = 0;
    let mut cursor = 0;

    for ch in text.chars() {
        let mut buf = [0u16; 2];
        let encoded = ch.encode_utf16(&mut buf);
        if units + encoded.len() > budget {
            break;
        }
        for unit in &*encoded {
            field[cursor..cursor + 2].copy_from_slice(&unit.to_le_bytes());
            cursor += 2;
        }
        units += encoded.len();
    }
}

fn read_wide(field: &[u8]) -> String {
    let units: Vec<u16> = field
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}
