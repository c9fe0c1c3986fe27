//! Document reconstruction: latest checkpoint plus log replay.
//!
//! Pure reads — reconstruction never writes, so it can run concurrently
//! with writers and with checkpoint schedulers for the same document.
//! Checkpointing only changes the cost of this function, never its result.

use quill_core::{engine_for, FormatVersion, Snapshot};
use uuid::Uuid;

use crate::codec;
use crate::error::CollabError;
use crate::store::{CheckpointStore, VersionLog, NO_VERSION};

/// Rebuild the document state at `upto` (inclusive), or at the latest
/// index when `upto` is `None`.
///
/// Returns the snapshot and the resolved index: the index of the last
/// operation folded in, or the checkpoint/`NO_VERSION` base if the
/// requested range was empty.
pub fn reconstruct<S>(
    store: &S,
    doc_id: Uuid,
    format: FormatVersion,
    upto: Option<i64>,
) -> Result<(Snapshot, i64), CollabError>
where
    S: VersionLog + CheckpointStore + ?Sized,
{
    let engine = engine_for(format);

    let (mut snapshot, base_index) = match store.latest_checkpoint(doc_id)? {
        Some(checkpoint) => {
            if checkpoint.format != format {
                return Err(CollabError::FormatMismatch {
                    expected: format,
                    found: checkpoint.format.tag(),
                });
            }
            (engine.deserialize(&checkpoint.content)?, checkpoint.index)
        }
        None => (engine.empty(), NO_VERSION),
    };

    let entries = store.read_range(doc_id, base_index, upto)?;
    let mut resolved = base_index;
    for entry in &entries {
        let op = codec::decode(format, &entry.operation)?;
        snapshot = engine.apply(&snapshot, &op);
        resolved = entry.index;
    }

    log::trace!(
        "Reconstructed {doc_id} at index {resolved} ({} replayed past base {base_index})",
        entries.len()
    );
    Ok((snapshot, resolved))
}
