//! Persistence integration tests for the RocksDB backend.
//!
//! Verifies:
//! - version log and checkpoints survive a close/reopen cycle
//! - the conditional append stays conditional across restarts
//! - the full coordinator + scheduler stack over persistent storage
//! - multi-document isolation under one database
//! - concurrent writers against the persistent conditional append

use std::sync::Arc;

use quill_collab::{
    client_id, reconstruct, AllowAll, AppendOutcome, CheckpointPolicy, CheckpointScheduler,
    CheckpointStore, CoordinatorConfig, EditFn, EditOptions, EditSession, RocksStore, StoreConfig,
    VersionLog, WriteCoordinator, NO_VERSION,
};
use quill_core::{FormatVersion, Operation};
use tempfile::tempdir;
use uuid::Uuid;

const FORMAT: FormatVersion = FormatVersion::RichTextV1;

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn insert_edit(at: usize, content: &str) -> EditFn {
    let content = content.to_owned();
    Box::new(move |session: &mut EditSession| {
        session.apply(Operation::InsertText { at, content: content.clone() });
    })
}

fn coordinator_over(store: Arc<RocksStore>, interval: i64) -> WriteCoordinator<RocksStore> {
    let scheduler = CheckpointScheduler::new(store.clone(), CheckpointPolicy::every(interval));
    WriteCoordinator::new(
        store,
        scheduler,
        Arc::new(AllowAll { format: FORMAT }),
        CoordinatorConfig::default(),
    )
}

// ─── Restart Survival ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_document_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("db");
    let doc = Uuid::new_v4();
    let client = client_id(Uuid::new_v4(), Uuid::new_v4());

    // Phase 1: edit through the full stack, then drop the store.
    {
        let store = Arc::new(RocksStore::open(StoreConfig::for_testing(db_path.clone())).unwrap());
        let coord = coordinator_over(store.clone(), 3);
        for (i, word) in ["alpha ", "beta ", "gamma ", "delta"].iter().enumerate() {
            let at = if i == 0 { 0 } else { usize::MAX }; // clamped to end
            coord
                .apply_edits(doc, FORMAT, client, &[insert_edit(at, word)], EditOptions::default())
                .await
                .unwrap();
        }
        store.flush().unwrap();
    }

    // Phase 2: reopen and verify log, checkpoint and reconstruction.
    let store = RocksStore::open(StoreConfig::for_testing(db_path)).unwrap();
    let (snap, index) = reconstruct(&store, doc, FORMAT, None).unwrap();
    assert_eq!(index, 3);
    assert_eq!(snap.text, "alpha beta gamma delta");

    let cp = store.latest_checkpoint(doc).unwrap().unwrap();
    assert_eq!(cp.index, 3);
    assert_eq!(cp.format, FORMAT);

    // The tail condition still holds against persisted state.
    let outcome = store
        .append_batch(doc, 0, Uuid::new_v4(), vec![vec![FORMAT.tag()]])
        .unwrap();
    assert_eq!(outcome, AppendOutcome::Conflict);
}

#[tokio::test]
async fn test_editing_resumes_after_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("db");
    let doc = Uuid::new_v4();
    let client = client_id(Uuid::new_v4(), Uuid::new_v4());

    {
        let store = Arc::new(RocksStore::open(StoreConfig::for_testing(db_path.clone())).unwrap());
        let coord = coordinator_over(store, 10);
        coord
            .apply_edits(doc, FORMAT, client, &[insert_edit(0, "before")], EditOptions::default())
            .await
            .unwrap();
    }

    let store = Arc::new(RocksStore::open(StoreConfig::for_testing(db_path)).unwrap());
    let coord = coordinator_over(store.clone(), 10);
    let commit = coord
        .apply_edits(
            doc,
            FORMAT,
            client,
            &[insert_edit(usize::MAX, " after")],
            EditOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(commit.index, 1);
    let (snap, _) = reconstruct(store.as_ref(), doc, FORMAT, None).unwrap();
    assert_eq!(snap.text, "before after");
}

// ─── Isolation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_documents_are_isolated_in_one_database() {
    let dir = tempdir().unwrap();
    let store = Arc::new(RocksStore::open(StoreConfig::for_testing(dir.path().join("db"))).unwrap());
    let coord = coordinator_over(store.clone(), 2);

    let doc_a = Uuid::new_v4();
    let doc_b = Uuid::new_v4();
    let client = Uuid::new_v4();

    for i in 0..5 {
        coord
            .apply_edits(doc_a, FORMAT, client, &[insert_edit(i, "a")], EditOptions::default())
            .await
            .unwrap();
    }
    for i in 0..3 {
        coord
            .apply_edits(doc_b, FORMAT, client, &[insert_edit(i, "b")], EditOptions::default())
            .await
            .unwrap();
    }

    let (snap_a, index_a) = reconstruct(store.as_ref(), doc_a, FORMAT, None).unwrap();
    let (snap_b, index_b) = reconstruct(store.as_ref(), doc_b, FORMAT, None).unwrap();
    assert_eq!((snap_a.text.as_str(), index_a), ("aaaaa", 4));
    assert_eq!((snap_b.text.as_str(), index_b), ("bbb", 2));

    // Each document advanced its own checkpoint sequence.
    assert_eq!(store.latest_checkpoint(doc_a).unwrap().unwrap().index, 4);
    assert_eq!(store.latest_checkpoint(doc_b).unwrap().unwrap().index, 2);
}

// ─── Concurrency Against the Persistent Append ───────────────────────────────

#[test]
fn test_concurrent_appends_on_rocks_single_winner() {
    let dir = tempdir().unwrap();
    let store = Arc::new(RocksStore::open(StoreConfig::for_testing(dir.path().join("db"))).unwrap());
    let doc = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(std::thread::spawn(move || {
            store
                .append_batch(doc, NO_VERSION + 1, Uuid::new_v4(), vec![vec![1u8, 2, 3]])
                .unwrap()
        }));
    }
    let outcomes: Vec<AppendOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let committed = outcomes
        .iter()
        .filter(|o| **o == AppendOutcome::Committed)
        .count();
    assert_eq!(committed, 1);

    let entries = store.read_range(doc, NO_VERSION, None).unwrap();
    assert_eq!(entries.len(), 1);
}
