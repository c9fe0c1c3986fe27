//! Storage layer for version logs and checkpoints.
//!
//! Architecture:
//! ```text
//! ┌──────────────────┐   append_batch    ┌─────────────────────────────┐
//! │ WriteCoordinator │ ────────────────► │ VersionLog                  │
//! │                  │   (conditional)   │   per-doc append-only log   │
//! └────────┬─────────┘                   └─────────────────────────────┘
//!          │ reconstruct / checkpoint    ┌─────────────────────────────┐
//!          └─────────────────────────────► CheckpointStore             │
//!                                        │   sparse snapshots by index │
//!                                        └─────────────────────────────┘
//!
//! Backends: MemoryStore (tests, embedding)  RocksStore (persistent)
//! ```
//!
//! The only cross-writer coordination in the engine is
//! [`VersionLog::append_batch`]: an atomic "append only if the log's last
//! index is exactly `start_index - 1`" primitive. Everything else is plain
//! reads, so readers never block writers.
//!
//! Expected control-flow outcomes ([`AppendOutcome`], [`CreateOutcome`])
//! are tri-state values, not errors; [`StoreError`] is reserved for real
//! storage failures.

pub mod memory;
pub mod rocks;

pub use memory::MemoryStore;
pub use rocks::{RocksStore, StoreConfig};

use quill_core::FormatVersion;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Sentinel index meaning "the document has no history yet".
/// The first committed entry gets `NO_VERSION + 1 == 0`.
pub const NO_VERSION: i64 = -1;

/// One committed operation. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub doc_id: Uuid,
    /// Position in the document's history; unique per document, dense.
    pub index: i64,
    /// Attribution of the writer (see [`crate::identity::client_id`]).
    pub client_id: Uuid,
    /// Codec-encoded operation payload.
    pub operation: Vec<u8>,
    /// Stamped by the storage backend at commit time (epoch seconds).
    pub created_at: u64,
}

/// A materialized snapshot of a document at a version index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub doc_id: Uuid,
    /// Index of the last operation folded into `content`.
    pub index: i64,
    pub format: FormatVersion,
    /// Engine-serialized snapshot bytes.
    pub content: Vec<u8>,
    pub created_at: u64,
}

/// Outcome of a conditional append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The whole batch was written.
    Committed,
    /// Another writer already advanced the log; nothing was written.
    Conflict,
}

/// Outcome of a create-if-absent checkpoint write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Storage failures.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Backend I/O or engine error.
    Backend(String),
    /// Stored bytes failed to decode.
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Backend(e) => write!(f, "Storage backend error: {e}"),
            StoreError::Corrupt(e) => write!(f, "Corrupt stored record: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Append-only, per-document ordered operation log.
pub trait VersionLog: Send + Sync {
    /// Entries with `after_exclusive < index <= upto` (unbounded when
    /// `upto` is `None`), in strictly increasing index order, no gaps.
    fn read_range(
        &self,
        doc_id: Uuid,
        after_exclusive: i64,
        upto: Option<i64>,
    ) -> Result<Vec<VersionEntry>, StoreError>;

    /// The highest-index entry, or `None` for an empty log.
    fn read_last(&self, doc_id: Uuid) -> Result<Option<VersionEntry>, StoreError>;

    /// Atomically append one entry per operation at
    /// `start_index, start_index + 1, …` — but only if the log's last
    /// index is exactly `start_index - 1` at commit time. On
    /// [`AppendOutcome::Conflict`] nothing is written.
    fn append_batch(
        &self,
        doc_id: Uuid,
        start_index: i64,
        client_id: Uuid,
        operations: Vec<Vec<u8>>,
    ) -> Result<AppendOutcome, StoreError>;
}

/// Sparse per-document snapshot collection.
pub trait CheckpointStore: Send + Sync {
    /// The checkpoint with the largest index, or `None`.
    fn latest_checkpoint(&self, doc_id: Uuid) -> Result<Option<Checkpoint>, StoreError>;

    /// Create-if-absent: a checkpoint already present at `index` is a
    /// harmless no-op, so duplicate or out-of-order triggers are safe.
    fn create_checkpoint(
        &self,
        doc_id: Uuid,
        index: i64,
        format: FormatVersion,
        content: &[u8],
    ) -> Result<CreateOutcome, StoreError>;
}

/// Commit-time timestamp, epoch seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
