//! Error taxonomy for the versioning engine.
//!
//! `Conflict` is deliberately absent: a rejected conditional append is a
//! routine [`AppendOutcome`](crate::store::AppendOutcome) handled inside the
//! write coordinator, and only ever reaches callers as the cause of an
//! eventual [`CollabError::Aborted`].

use quill_core::{FormatVersion, ModelError};
use uuid::Uuid;

use crate::codec::CodecError;
use crate::store::StoreError;

#[derive(Debug, Clone)]
pub enum CollabError {
    /// The document has no history or record where the caller expected one.
    NotFound(Uuid),
    /// The document existed but has been deleted.
    Deleted(Uuid),
    /// The user may not edit this document. Never retried.
    PermissionDenied { doc_id: Uuid, user_id: Uuid },
    /// Stored data disagrees with the document's format version.
    FormatMismatch { expected: FormatVersion, found: u8 },
    /// Retries exhausted; the caller should re-invoke from a fresh read.
    Aborted { attempts: u32 },
    /// Underlying storage failure.
    Storage(String),
}

impl std::fmt::Display for CollabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollabError::NotFound(id) => write!(f, "Document not found: {id}"),
            CollabError::Deleted(id) => write!(f, "Document deleted: {id}"),
            CollabError::PermissionDenied { doc_id, user_id } => {
                write!(f, "User {user_id} may not edit document {doc_id}")
            }
            CollabError::FormatMismatch { expected, found } => {
                write!(f, "Format mismatch: expected {expected}, found tag {found}")
            }
            CollabError::Aborted { attempts } => {
                write!(f, "Write aborted after {attempts} attempts")
            }
            CollabError::Storage(e) => write!(f, "Storage error: {e}"),
        }
    }
}

impl std::error::Error for CollabError {}

impl From<StoreError> for CollabError {
    fn from(e: StoreError) -> Self {
        CollabError::Storage(e.to_string())
    }
}

impl From<CodecError> for CollabError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::FormatMismatch { expected, found } => {
                CollabError::FormatMismatch { expected, found }
            }
            other => CollabError::Storage(other.to_string()),
        }
    }
}

impl From<ModelError> for CollabError {
    fn from(e: ModelError) -> Self {
        CollabError::Storage(e.to_string())
    }
}
