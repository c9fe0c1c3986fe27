//! Optimistic write coordination: read-modify-conditional-write with
//! bounded rebase-and-retry.
//!
//! Both entry points share one commit loop:
//! ```text
//! Reconstructing ─► Computing ─► Appending ─┬─► Committed
//!                                  ▲        └─► Conflicted ─► Rebasing ─┐
//!                                  └──────────────────────────────────┘
//!                                  (bounded; exhaustion ─► Aborted)
//! ```
//! A conflict is routine — another writer advanced the log — so the loop
//! re-reads the winning range, rebases the pending operations through the
//! document engine's transform, and tries again from the new tail. The
//! base index is always re-derived from storage, never trusted across an
//! I/O suspension point.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quill_core::{engine_for, FormatVersion, Operation, Snapshot};
use uuid::Uuid;

use crate::access::AccessControl;
use crate::checkpoint::CheckpointScheduler;
use crate::codec;
use crate::error::CollabError;
use crate::reconstruct::reconstruct;
use crate::store::{AppendOutcome, CheckpointStore, VersionLog};

/// Default append attempts per interactive edit call.
pub const MAX_RETRIES: u32 = 5;
/// Default append attempts per async command commit.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub max_retries: u32,
    pub max_attempts: u32,
    /// Delay before each append attempt, coalescing rapid keystrokes into
    /// fewer commits. Zero (the default) disables it; purely a latency
    /// trade-off, not a correctness mechanism.
    pub coalesce_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            max_attempts: MAX_ATTEMPTS,
            coalesce_delay: Duration::ZERO,
        }
    }
}

/// Write-path counters.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStats {
    pub commits: u64,
    pub conflicts: u64,
    pub rebases: u64,
    pub aborts: u64,
    pub noop_batches: u64,
}

/// A committed (or explicitly empty) write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Index of the last appended entry; the unchanged base index for a
    /// batch that produced no operations.
    pub index: i64,
    /// Number of operations appended.
    pub operations: usize,
    /// Append attempts used (1 = committed without conflict, 0 = nothing
    /// to append).
    pub attempts: u32,
}

/// Caller constraints for an interactive edit.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditOptions {
    /// Fail with `FormatMismatch` unless the document uses this format.
    pub required_format: Option<FormatVersion>,
    /// Fail with `Aborted` unless the reconstructed base is exactly this
    /// index — for callers that computed UI state against a known base.
    pub required_base_index: Option<i64>,
}

/// An editable view seeded from a reconstructed snapshot.
///
/// Edit closures read the current state through [`snapshot`](Self::snapshot)
/// and record operations with [`apply`](Self::apply); each recorded
/// operation is folded into the session immediately so later closures in
/// the same batch observe earlier effects.
pub struct EditSession {
    format: FormatVersion,
    snapshot: Snapshot,
    base_index: i64,
    ops: Vec<Operation>,
}

impl EditSession {
    fn new(format: FormatVersion, snapshot: Snapshot, base_index: i64) -> Self {
        Self { format, snapshot, base_index, ops: Vec::new() }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The version index this session was seeded from.
    pub fn base_index(&self) -> i64 {
        self.base_index
    }

    /// Record `op` and fold it into the session state.
    pub fn apply(&mut self, op: Operation) {
        self.snapshot = engine_for(self.format).apply(&self.snapshot, &op);
        self.ops.push(op);
    }

    fn into_operations(self) -> Vec<Operation> {
        self.ops
    }
}

/// An edit step run against an [`EditSession`].
pub type EditFn = Box<dyn Fn(&mut EditSession) + Send + Sync>;

/// Orchestrates reconstruct → compute → conditional append → rebase.
pub struct WriteCoordinator<S> {
    store: Arc<S>,
    scheduler: CheckpointScheduler<S>,
    access: Arc<dyn AccessControl>,
    config: CoordinatorConfig,
    stats: Mutex<CoordinatorStats>,
}

impl<S> WriteCoordinator<S>
where
    S: VersionLog + CheckpointStore,
{
    pub fn new(
        store: Arc<S>,
        scheduler: CheckpointScheduler<S>,
        access: Arc<dyn AccessControl>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            access,
            config,
            stats: Mutex::new(CoordinatorStats::default()),
        }
    }

    /// The checkpoint scheduler driving this coordinator. Upstream code
    /// that appends outside the coordinator must call
    /// [`CheckpointScheduler::on_operation_appended`] itself.
    pub fn scheduler(&self) -> &CheckpointScheduler<S> {
        &self.scheduler
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn bump(&self, f: impl FnOnce(&mut CoordinatorStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    /// Interactive edit: reconstruct the latest state, run the edit
    /// closures against it, and commit the resulting operations with
    /// rebase-and-retry bounded by `max_retries`.
    ///
    /// Permission checks belong to the request handler invoking this; the
    /// document's format comes from the already-verified document record.
    pub async fn apply_edits(
        &self,
        doc_id: Uuid,
        format: FormatVersion,
        client_id: Uuid,
        edits: &[EditFn],
        options: EditOptions,
    ) -> Result<Commit, CollabError> {
        if let Some(required) = options.required_format {
            if required != format {
                return Err(CollabError::FormatMismatch {
                    expected: required,
                    found: format.tag(),
                });
            }
        }

        let (snapshot, base_index) = reconstruct(self.store.as_ref(), doc_id, format, None)?;

        if let Some(required) = options.required_base_index {
            if required != base_index {
                self.bump(|s| s.aborts += 1);
                log::debug!(
                    "Edit on {doc_id} required base {required} but log is at {base_index}"
                );
                return Err(CollabError::Aborted { attempts: 0 });
            }
        }

        let mut session = EditSession::new(format, snapshot, base_index);
        for edit in edits {
            edit(&mut session);
        }
        let pending = session.into_operations();

        if pending.is_empty() {
            // The edit closures ran and produced nothing; an explicit
            // no-op success rather than an error (see DESIGN.md).
            self.bump(|s| s.noop_batches += 1);
            log::debug!("Edit batch for {doc_id} produced no operations");
            return Ok(Commit { index: base_index, operations: 0, attempts: 0 });
        }

        self.commit_loop(
            doc_id,
            format,
            client_id,
            pending,
            base_index,
            self.config.max_retries,
        )
        .await
    }

    /// Long-running server command: validate editability, run the heavy
    /// compute with no base pinned, re-validate, then commit its output
    /// through the same loop bounded by `max_attempts`.
    ///
    /// Separating compute from commit keeps unrelated editors from
    /// serializing behind slow work, at the cost of one rebase when the
    /// operations finally land.
    pub async fn apply_async_command<F, Fut>(
        &self,
        doc_id: Uuid,
        user_id: Uuid,
        client_id: Uuid,
        compute: F,
    ) -> Result<Commit, CollabError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EditFn, CollabError>>,
    {
        // Cheap gate before paying for the compute.
        self.access.verify_editable(doc_id, user_id)?;

        let generate = compute().await?;

        // The document may have vanished or locked while computing.
        let info = self.access.verify_editable(doc_id, user_id)?;
        let format = info.format;

        let (snapshot, base_index) = reconstruct(self.store.as_ref(), doc_id, format, None)?;
        let mut session = EditSession::new(format, snapshot, base_index);
        generate(&mut session);
        let pending = session.into_operations();

        if pending.is_empty() {
            self.bump(|s| s.noop_batches += 1);
            log::debug!("Async command for {doc_id} produced no operations");
            return Ok(Commit { index: base_index, operations: 0, attempts: 0 });
        }

        self.commit_loop(
            doc_id,
            format,
            client_id,
            pending,
            base_index,
            self.config.max_attempts,
        )
        .await
    }

    /// The single bounded retry loop shared by both entry points.
    /// Terminal outcomes: `Ok(Commit)` or `Err(Aborted)`.
    async fn commit_loop(
        &self,
        doc_id: Uuid,
        format: FormatVersion,
        client_id: Uuid,
        mut pending: Vec<Operation>,
        mut base_index: i64,
        bound: u32,
    ) -> Result<Commit, CollabError> {
        for attempt in 1..=bound {
            if !self.config.coalesce_delay.is_zero() {
                tokio::time::sleep(self.config.coalesce_delay).await;
            }

            let encoded = pending
                .iter()
                .map(|op| codec::encode(format, op))
                .collect::<Result<Vec<_>, _>>()?;

            match self
                .store
                .append_batch(doc_id, base_index + 1, client_id, encoded)?
            {
                AppendOutcome::Committed => {
                    let first = base_index + 1;
                    let last = base_index + pending.len() as i64;
                    self.bump(|s| s.commits += 1);
                    log::debug!(
                        "Committed {} operation(s) to {doc_id} at {first}..={last} (attempt {attempt})",
                        pending.len()
                    );
                    for index in first..=last {
                        self.scheduler.on_operation_appended(doc_id, format, index);
                    }
                    return Ok(Commit {
                        index: last,
                        operations: pending.len(),
                        attempts: attempt,
                    });
                }
                AppendOutcome::Conflict => {
                    self.bump(|s| s.conflicts += 1);

                    // Fetch the entries that won the race and rebase the
                    // still-unwritten operations past them.
                    let won = self.store.read_range(doc_id, base_index, None)?;
                    if won.is_empty() {
                        // Conflicted but nothing visible past our base yet;
                        // retry against the same tail.
                        continue;
                    }
                    let committed_ops = won
                        .iter()
                        .map(|e| codec::decode(format, &e.operation))
                        .collect::<Result<Vec<_>, _>>()?;
                    pending = engine_for(format).transform(&pending, &committed_ops);
                    base_index = won.last().map(|e| e.index).unwrap_or(base_index);
                    self.bump(|s| s.rebases += 1);
                    log::debug!(
                        "Append conflict on {doc_id}: rebased {} operation(s) onto index {base_index} (attempt {attempt})",
                        pending.len()
                    );
                }
            }
        }

        self.bump(|s| s.aborts += 1);
        log::warn!("Write to {doc_id} aborted after {bound} attempts");
        Err(CollabError::Aborted { attempts: bound })
    }
}
