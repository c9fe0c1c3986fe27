//! Operation codec: one stored form per edit operation.
//!
//! Wire format:
//! ```text
//! ┌────────────┬──────────────────┐
//! │ format tag │ bincode body     │
//! │ 1 byte     │ variable         │
//! └────────────┴──────────────────┘
//! ```
//!
//! Pure data transcoding — the codec knows nothing about document content.
//! `decode(encode(op))` is exact for any operation valid under the format;
//! decoding bytes written under a different format fails with
//! [`CodecError::FormatMismatch`] instead of producing a garbage operation.

use quill_core::{FormatVersion, Operation};

#[derive(Debug, Clone)]
pub enum CodecError {
    /// The stored tag names a different (or unknown) format version.
    FormatMismatch { expected: FormatVersion, found: u8 },
    Encode(String),
    Decode(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::FormatMismatch { expected, found } => {
                write!(f, "Operation format mismatch: expected {expected}, found tag {found}")
            }
            CodecError::Encode(e) => write!(f, "Operation encode failed: {e}"),
            CodecError::Decode(e) => write!(f, "Operation decode failed: {e}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Encode `op` for storage under `format`.
pub fn encode(format: FormatVersion, op: &Operation) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serde::encode_to_vec(op, bincode::config::standard())
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(format.tag());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a stored operation, verifying it was written under `format`.
pub fn decode(format: FormatVersion, bytes: &[u8]) -> Result<Operation, CodecError> {
    let (&tag, body) = bytes
        .split_first()
        .ok_or_else(|| CodecError::Decode("empty payload".into()))?;
    if tag != format.tag() {
        return Err(CodecError::FormatMismatch { expected: format, found: tag });
    }
    let (op, _) = bincode::serde::decode_from_slice(body, bincode::config::standard())
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok(op)
}
