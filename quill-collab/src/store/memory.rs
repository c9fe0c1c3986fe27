//! In-memory backend.
//!
//! The default for tests and for embedding without persistence (the same
//! role the in-memory mode plays for the sync server). The conditional
//! append holds the write lock across check-and-write, which is exactly the
//! isolation the trait contract demands.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use quill_core::FormatVersion;
use uuid::Uuid;

use super::{
    unix_now, AppendOutcome, Checkpoint, CheckpointStore, CreateOutcome, StoreError, VersionEntry,
    VersionLog, NO_VERSION,
};

#[derive(Default)]
struct DocRecords {
    /// Entry with index `i` lives at position `i`.
    entries: Vec<VersionEntry>,
    checkpoints: BTreeMap<i64, Checkpoint>,
}

/// In-memory version log + checkpoint store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<Uuid, DocRecords>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries across all documents (test observability).
    pub fn entry_count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.values().map(|d| d.entries.len()).sum())
            .unwrap_or(0)
    }
}

impl VersionLog for MemoryStore {
    fn read_range(
        &self,
        doc_id: Uuid,
        after_exclusive: i64,
        upto: Option<i64>,
    ) -> Result<Vec<VersionEntry>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        let Some(doc) = inner.get(&doc_id) else {
            return Ok(Vec::new());
        };
        Ok(doc
            .entries
            .iter()
            .filter(|e| e.index > after_exclusive && upto.map_or(true, |hi| e.index <= hi))
            .cloned()
            .collect())
    }

    fn read_last(&self, doc_id: Uuid) -> Result<Option<VersionEntry>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(inner.get(&doc_id).and_then(|d| d.entries.last().cloned()))
    }

    fn append_batch(
        &self,
        doc_id: Uuid,
        start_index: i64,
        client_id: Uuid,
        operations: Vec<Vec<u8>>,
    ) -> Result<AppendOutcome, StoreError> {
        if operations.is_empty() {
            return Ok(AppendOutcome::Committed);
        }
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        let doc = inner.entry(doc_id).or_default();

        let last = doc.entries.last().map(|e| e.index).unwrap_or(NO_VERSION);
        if last + 1 != start_index {
            return Ok(AppendOutcome::Conflict);
        }

        let created_at = unix_now();
        for (offset, operation) in operations.into_iter().enumerate() {
            doc.entries.push(VersionEntry {
                doc_id,
                index: start_index + offset as i64,
                client_id,
                operation,
                created_at,
            });
        }
        Ok(AppendOutcome::Committed)
    }
}

impl CheckpointStore for MemoryStore {
    fn latest_checkpoint(&self, doc_id: Uuid) -> Result<Option<Checkpoint>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(inner
            .get(&doc_id)
            .and_then(|d| d.checkpoints.values().next_back().cloned()))
    }

    fn create_checkpoint(
        &self,
        doc_id: Uuid,
        index: i64,
        format: FormatVersion,
        content: &[u8],
    ) -> Result<CreateOutcome, StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        let doc = inner.entry(doc_id).or_default();
        if doc.checkpoints.contains_key(&index) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        doc.checkpoints.insert(
            index,
            Checkpoint {
                doc_id,
                index,
                format,
                content: content.to_vec(),
                created_at: unix_now(),
            },
        );
        Ok(CreateOutcome::Created)
    }
}
