//! Writer attribution.

use uuid::Uuid;

/// Derive the attribution id for a `(user, ephemeral session)` pair.
///
/// Deterministic so a writer can recognize its own entries when it re-reads
/// a range during rebase. Attribution only — never an authorization
/// principal.
pub fn client_id(user_id: Uuid, session_id: Uuid) -> Uuid {
    Uuid::new_v5(&user_id, session_id.as_bytes())
}
