//! The document-engine seam.
//!
//! The versioning layer treats document content as opaque: everything it
//! needs — the empty document, applying an operation, rebasing pending
//! operations, snapshot (de)serialization — goes through [`DocumentEngine`].
//! Each [`FormatVersion`] names one algebra/schema pair and is immutable for
//! the lifetime of a document.

use serde::{Deserialize, Serialize};

use crate::document::Snapshot;
use crate::operation::Operation;

/// Identifies which operation algebra and snapshot schema a document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FormatVersion {
    /// Plain text with formatting marks (the built-in engine).
    RichTextV1 = 1,
}

impl FormatVersion {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(FormatVersion::RichTextV1),
            _ => None,
        }
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatVersion::RichTextV1 => write!(f, "rich-text-v1"),
        }
    }
}

/// Engine-level errors.
#[derive(Debug, Clone)]
pub enum ModelError {
    Serialization(String),
    Deserialization(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Serialization(e) => write!(f, "Snapshot serialization failed: {e}"),
            ModelError::Deserialization(e) => write!(f, "Snapshot deserialization failed: {e}"),
        }
    }
}

impl std::error::Error for ModelError {}

/// One operation algebra plus its snapshot codec.
///
/// `apply` is total: replaying a stored history never fails, positions are
/// clamped by the model. `transform` rebases pending operations so they
/// apply after `committed`, oldest committed operation first.
pub trait DocumentEngine: Send + Sync {
    fn format(&self) -> FormatVersion;

    /// The defined empty document for this format.
    fn empty(&self) -> Snapshot;

    /// Apply one operation, producing the next state.
    fn apply(&self, snapshot: &Snapshot, op: &Operation) -> Snapshot;

    /// Rebase `pending` (not yet committed) over `committed` (already in
    /// the log, in log order).
    fn transform(&self, pending: &[Operation], committed: &[Operation]) -> Vec<Operation>;

    fn serialize(&self, snapshot: &Snapshot) -> Result<Vec<u8>, ModelError>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Snapshot, ModelError>;
}

/// Built-in engine for [`FormatVersion::RichTextV1`].
pub struct RichTextEngine;

impl DocumentEngine for RichTextEngine {
    fn format(&self) -> FormatVersion {
        FormatVersion::RichTextV1
    }

    fn empty(&self) -> Snapshot {
        Snapshot::default()
    }

    fn apply(&self, snapshot: &Snapshot, op: &Operation) -> Snapshot {
        let mut next = snapshot.clone();
        match op {
            Operation::InsertText { at, content } => next.insert_text(*at, content),
            Operation::DeleteText { from, to } => next.delete_range(*from, *to),
            Operation::AddMark { from, to, mark } => next.add_mark(*from, *to, *mark),
            Operation::RemoveMark { from, to, mark } => next.remove_mark(*from, *to, *mark),
        }
        next
    }

    fn transform(&self, pending: &[Operation], committed: &[Operation]) -> Vec<Operation> {
        pending
            .iter()
            .map(|op| {
                committed
                    .iter()
                    .fold(op.clone(), |acc, c| acc.transformed_against(c))
            })
            .collect()
    }

    fn serialize(&self, snapshot: &Snapshot) -> Result<Vec<u8>, ModelError> {
        bincode::serde::encode_to_vec(snapshot, bincode::config::standard())
            .map_err(|e| ModelError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Snapshot, ModelError> {
        let (snapshot, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ModelError::Deserialization(e.to_string()))?;
        Ok(snapshot)
    }
}

static RICH_TEXT_V1: RichTextEngine = RichTextEngine;

/// Resolve the engine for a format version.
pub fn engine_for(format: FormatVersion) -> &'static dyn DocumentEngine {
    match format {
        FormatVersion::RichTextV1 => &RICH_TEXT_V1,
    }
}
