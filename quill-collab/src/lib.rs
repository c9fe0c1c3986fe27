//! # quill-collab — Collaborative document versioning engine
//!
//! Many concurrent editors append small edit operations to a shared
//! document; current state is reconstructed from a checkpoint plus the log
//! tail instead of replaying full history; conflicting concurrent writes
//! are detected by a conditional append and resolved by bounded
//! rebase-and-retry.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  edit fns   ┌──────────────────────────────┐
//! │ Request handler  │ ──────────► │ WriteCoordinator             │
//! │ (auth'd, out of  │             │  reconstruct → compute →     │
//! │  scope)          │             │  conditional append → rebase │
//! └──────────────────┘             └──────┬───────────────┬───────┘
//!                                         │ append        │ on committed
//!                                         ▼               ▼
//!                            ┌─────────────────┐  ┌────────────────────┐
//!                            │ VersionLog      │  │ CheckpointScheduler│
//!                            │ (append-only,   │  │  every N entries:  │
//!                            │  conditional)   │  │  reconstruct +     │
//!                            └─────────────────┘  │  create-if-absent  │
//!                            ┌─────────────────┐  └────────────────────┘
//!                            │ CheckpointStore │ ◄─────────┘
//!                            │ (sparse snaps)  │
//!                            └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`codec`] — operation ⇄ stored bytes, format-tagged
//! - [`store`] — log/checkpoint traits, [`MemoryStore`], [`RocksStore`]
//! - [`reconstruct`] — checkpoint + replay, pure reads
//! - [`checkpoint`] — interval scheduler, idempotent and best-effort
//! - [`coordinator`] — optimistic writes with bounded rebase-and-retry
//! - [`access`] — seams to the permission and metadata collaborators
//! - [`identity`] — deterministic writer attribution
//!
//! The per-document index total order in the version log is the single
//! source of truth; the conditional append is the only cross-writer
//! coordination, so there are no in-process locks across requests and
//! readers never block writers.

pub mod access;
pub mod checkpoint;
pub mod codec;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod reconstruct;
pub mod store;

// Re-exports for convenience
pub use access::{AccessControl, AllowAll, DocumentInfo, MetadataHook};
pub use checkpoint::{CheckpointPolicy, CheckpointScheduler, DEFAULT_CHECKPOINT_INTERVAL};
pub use coordinator::{
    Commit, CoordinatorConfig, CoordinatorStats, EditFn, EditOptions, EditSession,
    WriteCoordinator, MAX_ATTEMPTS, MAX_RETRIES,
};
pub use error::CollabError;
pub use identity::client_id;
pub use reconstruct::reconstruct;
pub use store::{
    AppendOutcome, Checkpoint, CheckpointStore, CreateOutcome, MemoryStore, RocksStore,
    StoreConfig, StoreError, VersionEntry, VersionLog, NO_VERSION,
};
