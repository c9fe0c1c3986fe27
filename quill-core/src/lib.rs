//! # quill-core — Document model for Quill
//!
//! The document model and the swappable engine seam used by the
//! versioning layer (`quill-collab`):
//!
//! - [`document`] — [`Snapshot`]: plain text plus formatting mark spans
//! - [`operation`] — [`Operation`]: the tagged edit-operation variants
//! - [`engine`] — [`DocumentEngine`] trait, [`FormatVersion`], and the
//!   built-in [`RichTextEngine`]
//!
//! The versioning layer never inspects document content; everything it
//! needs goes through [`DocumentEngine`], so a new operation algebra is a
//! new [`FormatVersion`] plus one trait impl.

pub mod document;
pub mod engine;
pub mod operation;

pub use document::{MarkKind, MarkSpan, Snapshot};
pub use engine::{engine_for, DocumentEngine, FormatVersion, ModelError, RichTextEngine};
pub use operation::Operation;
