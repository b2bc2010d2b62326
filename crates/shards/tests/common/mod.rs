//! Shared helpers for shard manager integration tests

#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use proven_raft_host::{
    Entry, GroupId, ReplicaId, StateMachine, StateMachineError, StateMachineResult,
};
use proven_raft_host_memory::{MemoryHostAdaptor, MemoryHostOptions};
use proven_shards::{ShardManager, ShardManagerConfig};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;

static NEXT_PORT: AtomicU64 = AtomicU64::new(7000);

/// A raft address no other node in this test binary uses
pub fn unique_address() -> String {
    format!("127.0.0.1:{}", NEXT_PORT.fetch_add(1, Ordering::Relaxed))
}

/// Counts applied entries per group
#[derive(Debug, Default)]
pub struct CounterStateMachine {
    counts: Mutex<BTreeMap<GroupId, u64>>,
}

impl CounterStateMachine {
    pub fn count(&self, group_id: GroupId) -> u64 {
        self.counts.lock().get(&group_id).copied().unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }
}

impl StateMachine for CounterStateMachine {
    fn update(&self, group_id: GroupId, entry: Entry) -> StateMachineResult {
        let mut counts = self.counts.lock();
        let count = counts.entry(group_id).or_default();
        *count += 1;

        StateMachineResult {
            value: *count,
            data: entry.cmd,
        }
    }

    fn lookup(&self, group_id: GroupId, _query: &[u8]) -> Result<Bytes, StateMachineError> {
        Ok(Bytes::from(self.count(group_id).to_string()))
    }

    fn save_snapshot(&self, group_id: GroupId) -> Result<Bytes, StateMachineError> {
        Ok(Bytes::from(self.count(group_id).to_string()))
    }
}

/// One shard manager backed by the in-memory host
pub struct TestNode {
    pub manager: ShardManager<MemoryHostAdaptor>,
    pub state_machine: Arc<CounterStateMachine>,
    pub address: String,
    pub dir: TempDir,
}

impl TestNode {
    pub async fn start(node_id: u64) -> Self {
        Self::start_with(node_id, MemoryHostOptions::default()).await
    }

    pub async fn start_with(node_id: u64, options: MemoryHostOptions) -> Self {
        let dir = TempDir::new().unwrap();
        let address = unique_address();
        let config = ShardManagerConfig::new(node_id, address.clone(), dir.path());
        let state_machine = Arc::new(CounterStateMachine::default());

        let manager = ShardManager::init(
            config,
            &MemoryHostAdaptor::new(options),
            state_machine.clone(),
        )
        .await
        .expect("failed to init shard manager");

        Self {
            manager,
            state_machine,
            address,
            dir,
        }
    }

    /// Bootstrap `groups` with this node as the only initial member and wait
    /// for each to elect it
    pub async fn bootstrap(&self, groups: &[u64]) -> Vec<GroupId> {
        let groups = group_ids(groups);
        self.manager.bind_cluster("", false, &groups).await.unwrap();

        for group_id in &groups {
            self.manager
                .tracker()
                .wait_for_leader(*group_id, Duration::from_secs(5))
                .await
                .unwrap();
        }

        groups
    }

    /// Wait until `group_id` is led by `leader`
    pub async fn wait_for_leader_to_be(&self, group_id: GroupId, leader: ReplicaId) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.manager.tracker().leader_of(group_id) != Some(leader) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("leader did not change in time");
    }
}

pub fn group_ids(ids: &[u64]) -> Vec<GroupId> {
    ids.iter().copied().map(GroupId::new).collect()
}
