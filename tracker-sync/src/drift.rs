use crate::snapshot::RemoteSnapshot;
use crate::state::PersistentState;
use tracing::{info, warn};

/// Purge mappings whose remote id is absent from `snapshot`.
///
/// The stored fingerprint goes with each mapping so the record re-enters the
/// change set and is re-resolved or re-created this run. Returns the number of
/// purged mappings.
pub fn clean_stale_mappings(state: &mut PersistentState, snapshot: &RemoteSnapshot) -> usize {
    let stale: Vec<(String, String)> = state
        .identity_map
        .iter()
        .filter(|(_, remote_id)| !snapshot.contains(remote_id))
        .map(|(key, remote_id)| (key.clone(), remote_id.clone()))
        .collect();

    for (key, remote_id) in &stale {
        state.unbind(key);
        info!(key = %key, remote_id = %remote_id, "Removed stale mapping");
    }

    if snapshot.is_degraded() && !stale.is_empty() {
        warn!(
            purged = stale.len(),
            "Snapshot degraded: every mapping was purged; records whose title also changed \
             this run cannot be matched and will be created again"
        );
    }

    stale.len()
}
