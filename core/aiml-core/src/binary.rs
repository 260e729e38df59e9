//! Tagged binary envelope for full-fidelity snapshots.
//!
//! # Layout
//!
//! ```text
//! offset 0   8 bytes   magic  b"AIMLBIN\0"
//! offset 8   1 byte    kind   (table = 1, project = 2, app state = 3)
//! offset 9   1 byte    format version (currently 1)
//! offset 10  ..        compact JSON encoding of the object graph
//! ```
//!
//! Unlike the human-readable JSON exports, the binary form always carries the
//! tabular payloads. Files written by another kind or format version are
//! rejected with [`AimlError::CorruptBinary`].

use crate::error::{AimlError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

const MAGIC: &[u8; 8] = b"AIMLBIN\0";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2;

/// What a binary envelope contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    Table = 1,
    Project = 2,
    AppState = 3,
}

impl BinaryKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Table),
            2 => Some(Self::Project),
            3 => Some(Self::AppState),
            _ => None,
        }
    }
}

/// Encodes `value` into a binary envelope of the given kind.
pub fn encode<T: Serialize>(kind: BinaryKind, value: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(value)
        .map_err(|e| AimlError::json(format!("encoding {:?} envelope", kind), e))?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(MAGIC);
    out.push(kind as u8);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decodes a binary envelope, checking magic, kind and format version.
pub fn decode<T: DeserializeOwned>(expected: BinaryKind, bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(AimlError::CorruptBinary("missing AIMLBIN header".to_string()));
    }

    let kind = BinaryKind::from_byte(bytes[MAGIC.len()]);
    if kind != Some(expected) {
        return Err(AimlError::CorruptBinary(format!(
            "expected {:?} envelope, found kind byte {}",
            expected,
            bytes[MAGIC.len()]
        )));
    }

    let version = bytes[MAGIC.len() + 1];
    if version != FORMAT_VERSION {
        return Err(AimlError::CorruptBinary(format!(
            "unsupported format version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    serde_json::from_slice(&bytes[HEADER_LEN..])
        .map_err(|e| AimlError::json(format!("decoding {:?} envelope", expected), e))
}
