//! State of a single group hosted in memory

use bytes::Bytes;
use proven_raft_host::{
    Entry, GroupConfig, GroupId, LeaderInfo, ReplicaId, StateMachine, StateMachineResult,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Snapshot retained for a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Last log index covered by the snapshot
    pub index: u64,

    /// Serialized state machine state
    pub data: Bytes,
}

pub(crate) struct MemoryGroup {
    config: GroupConfig,
    members: BTreeMap<ReplicaId, String>,
    config_change_id: u64,
    leader_id: ReplicaId,
    term: u64,
    last_index: u64,
    state_machine: Arc<dyn StateMachine>,
    snapshot: Option<Snapshot>,
    stopped: bool,
}

impl MemoryGroup {
    pub(crate) fn new(
        config: GroupConfig,
        members: BTreeMap<ReplicaId, String>,
        state_machine: Arc<dyn StateMachine>,
    ) -> Self {
        Self {
            config,
            members,
            config_change_id: 0,
            leader_id: ReplicaId::NONE,
            term: 0,
            last_index: 0,
            state_machine,
            snapshot: None,
            stopped: false,
        }
    }

    pub(crate) fn group_id(&self) -> GroupId {
        self.config.group_id
    }

    pub(crate) fn members(&self) -> &BTreeMap<ReplicaId, String> {
        &self.members
    }

    pub(crate) fn config_change_id(&self) -> u64 {
        self.config_change_id
    }

    pub(crate) fn leader_id(&self) -> ReplicaId {
        self.leader_id
    }

    pub(crate) fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub(crate) fn state_machine(&self) -> &Arc<dyn StateMachine> {
        &self.state_machine
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn stop(&mut self) {
        self.stopped = true;
    }

    /// Record a leadership change and build the event describing it
    pub(crate) fn set_leader(&mut self, leader_id: ReplicaId) -> LeaderInfo {
        if leader_id != self.leader_id && !leader_id.is_none() {
            self.term += 1;
        }
        self.leader_id = leader_id;

        LeaderInfo {
            group_id: self.config.group_id,
            replica_id: self.config.replica_id,
            term: self.term,
            leader_id,
        }
    }

    /// Append a membership change entry; the new change token is its log index
    pub(crate) fn add_member(&mut self, replica_id: ReplicaId, address: String) {
        self.last_index += 1;
        self.config_change_id = self.last_index;
        self.members.insert(replica_id, address);
    }

    /// Append and apply a proposed entry
    pub(crate) fn apply(&mut self, cmd: Bytes) -> StateMachineResult {
        self.last_index += 1;
        let entry = Entry {
            index: self.last_index,
            cmd,
        };
        let result = self.state_machine.update(self.config.group_id, entry);

        self.maybe_snapshot();
        result
    }

    fn maybe_snapshot(&mut self) {
        let every = self.config.snapshot_entries;
        if every == 0 {
            return;
        }

        let since = self.last_index - self.snapshot.as_ref().map_or(0, |s| s.index);
        if since < every {
            return;
        }

        match self.state_machine.save_snapshot(self.config.group_id) {
            Ok(data) => {
                debug!(
                    "Saved snapshot for {} at index {}",
                    self.config.group_id, self.last_index
                );
                self.snapshot = Some(Snapshot {
                    index: self.last_index,
                    data,
                });
            }
            Err(e) => {
                warn!(
                    "Failed to snapshot {} at index {}: {}",
                    self.config.group_id, self.last_index, e
                );
            }
        }
    }
}
