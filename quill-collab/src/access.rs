//! Seams to the collaborators outside this engine.
//!
//! Document existence, ownership and permissions live elsewhere; the
//! engine only needs a yes/no (plus the document's format version) before
//! a write, and a best-effort way to hand freshly checkpointed content
//! back for derived-metadata refresh.

use quill_core::{FormatVersion, Snapshot};
use uuid::Uuid;

use crate::error::CollabError;

/// What the engine needs to know about a document it is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Immutable for the lifetime of the document.
    pub format: FormatVersion,
}

/// Delegated existence/permission check.
pub trait AccessControl: Send + Sync {
    /// Resolve the document and confirm `user_id` may edit it.
    ///
    /// Expected failures: [`CollabError::NotFound`],
    /// [`CollabError::Deleted`], [`CollabError::PermissionDenied`].
    fn verify_editable(&self, doc_id: Uuid, user_id: Uuid) -> Result<DocumentInfo, CollabError>;
}

/// Permits every caller. For tests and single-tenant embedding where the
/// surrounding application already gates access.
pub struct AllowAll {
    pub format: FormatVersion,
}

impl AccessControl for AllowAll {
    fn verify_editable(&self, _doc_id: Uuid, _user_id: Uuid) -> Result<DocumentInfo, CollabError> {
        Ok(DocumentInfo { format: self.format })
    }
}

/// Fire-and-forget notification that a checkpoint materialized.
///
/// Implementations must not fail the caller; anything slow belongs on the
/// implementor's side of the seam.
pub trait MetadataHook: Send + Sync {
    fn on_checkpointed(&self, doc_id: Uuid, snapshot: &Snapshot);
}
