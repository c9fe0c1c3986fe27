//! Property: checkpointing never changes reconstruction, only its cost.
//!
//! Random operation sequences are appended to a log; reconstruction of the
//! latest state must be identical no matter which (or how many) checkpoint
//! boundaries were materialized along the way.

use proptest::prelude::*;

use quill_collab::{codec, reconstruct, CheckpointStore, MemoryStore, VersionLog};
use quill_core::{engine_for, FormatVersion, MarkKind, Operation};
use uuid::Uuid;

const FORMAT: FormatVersion = FormatVersion::RichTextV1;

fn arb_mark() -> impl Strategy<Value = MarkKind> {
    prop_oneof![
        Just(MarkKind::Bold),
        Just(MarkKind::Italic),
        Just(MarkKind::Strikethrough),
        Just(MarkKind::Code),
    ]
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (0usize..64, "[a-z ]{1,8}")
            .prop_map(|(at, content)| Operation::InsertText { at, content }),
        (0usize..64, 0usize..12)
            .prop_map(|(from, len)| Operation::DeleteText { from, to: from + len }),
        (0usize..64, 1usize..12, arb_mark())
            .prop_map(|(from, len, mark)| Operation::AddMark { from, to: from + len, mark }),
        (0usize..64, 1usize..12, arb_mark())
            .prop_map(|(from, len, mark)| Operation::RemoveMark { from, to: from + len, mark }),
    ]
}

fn seed_log(ops: &[Operation]) -> (MemoryStore, Uuid) {
    let store = MemoryStore::new();
    let doc = Uuid::new_v4();
    let encoded = ops
        .iter()
        .map(|op| codec::encode(FORMAT, op).unwrap())
        .collect();
    store
        .append_batch(doc, 0, Uuid::new_v4(), encoded)
        .unwrap();
    (store, doc)
}

/// Materialize a checkpoint at log index `index` the way the scheduler
/// does: reconstruct up to it, serialize, create-if-absent.
fn materialize_at(store: &MemoryStore, doc: Uuid, index: i64) {
    let (snapshot, resolved) = reconstruct(store, doc, FORMAT, Some(index)).unwrap();
    let content = engine_for(FORMAT).serialize(&snapshot).unwrap();
    store
        .create_checkpoint(doc, resolved, FORMAT, &content)
        .unwrap();
}

proptest! {
    #[test]
    fn checkpointing_is_transparent(
        ops in prop::collection::vec(arb_operation(), 1..40),
        boundaries in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let (plain, plain_doc) = seed_log(&ops);
        let (checkpointed, cp_doc) = seed_log(&ops);

        for boundary in &boundaries {
            let index = boundary.index(ops.len()) as i64;
            materialize_at(&checkpointed, cp_doc, index);
        }

        let baseline = reconstruct(&plain, plain_doc, FORMAT, None).unwrap();
        let with_checkpoints = reconstruct(&checkpointed, cp_doc, FORMAT, None).unwrap();

        prop_assert_eq!(with_checkpoints.0, baseline.0);
        prop_assert_eq!(with_checkpoints.1, baseline.1);
        prop_assert_eq!(baseline.1, ops.len() as i64 - 1);
    }

    #[test]
    fn partial_reconstruction_matches_prefix_replay(
        ops in prop::collection::vec(arb_operation(), 1..30),
        cut in any::<prop::sample::Index>(),
    ) {
        let (store, doc) = seed_log(&ops);
        let upto = cut.index(ops.len()) as i64;

        let (snap, resolved) = reconstruct(&store, doc, FORMAT, Some(upto)).unwrap();
        prop_assert_eq!(resolved, upto);

        // Folding the prefix by hand must agree.
        let engine = engine_for(FORMAT);
        let expected = ops[..=upto as usize]
            .iter()
            .fold(engine.empty(), |s, op| engine.apply(&s, op));
        prop_assert_eq!(snap, expected);
    }
}
