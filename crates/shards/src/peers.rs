//! Parsing of initial member lists

use proven_raft_host::ReplicaId;
use std::collections::BTreeMap;
use tracing::debug;

/// Replica ID to raft address
pub type PeerAddressMap = BTreeMap<ReplicaId, String>;

/// Parse a comma separated `id@address` list into a member map
///
/// Tokens are trimmed and split at the first `@`. Tokens whose ID is not an
/// unsigned integer or whose address is missing are skipped; a later token for
/// the same ID overrides an earlier one. Never fails.
pub fn parse_peer_list(peers: &str) -> PeerAddressMap {
    let mut members = PeerAddressMap::new();

    for token in peers.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let Some((id, address)) = token.split_once('@') else {
            debug!("Skipping peer entry without address: {}", token);
            continue;
        };

        let Ok(id) = id.trim().parse::<u64>() else {
            debug!("Skipping peer entry with invalid id: {}", token);
            continue;
        };

        let address = address.trim();
        if address.is_empty() {
            debug!("Skipping peer entry without address: {}", token);
            continue;
        }

        members.insert(ReplicaId::new(id), address.to_string());
    }

    members
}
