//! Integration tests for the in-memory node host

use bytes::Bytes;
use parking_lot::Mutex;
use proven_raft_host::{
    CompressionType, Entry, GroupConfig, GroupId, HostAdaptor, HostAdaptorError, HostConfig,
    HostErrorKind, LeaderInfo, NodeHost, RaftEventListener, ReplicaId, RequestResult,
    StateMachine, StateMachineError, StateMachineResult, shared_factory,
};
use proven_raft_host_memory::{MemoryHost, MemoryHostAdaptor, MemoryHostOptions};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use tracing_test::traced_test;

/// Counts applied entries per group
#[derive(Default)]
struct CounterStateMachine {
    counts: Mutex<HashMap<GroupId, u64>>,
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
        let count = self.counts.lock().get(&group_id).copied().unwrap_or(0);
        Ok(Bytes::from(count.to_string()))
    }

    fn save_snapshot(&self, group_id: GroupId) -> Result<Bytes, StateMachineError> {
        self.lookup(group_id, &[])
    }
}

/// Forwards leader events to a channel
struct ChannelListener {
    tx: mpsc::UnboundedSender<LeaderInfo>,
}

impl RaftEventListener for ChannelListener {
    fn leader_updated(&self, info: LeaderInfo) {
        let _ = self.tx.send(info);
    }
}

struct Fixture {
    host: MemoryHost,
    events: mpsc::UnboundedReceiver<LeaderInfo>,
    state_machine: Arc<CounterStateMachine>,
    _dir: TempDir,
}

fn host_config(dir: &TempDir, address: &str) -> HostConfig {
    let path = dir.path().join("node-1");
    HostConfig {
        wal_dir: path.clone(),
        node_host_dir: path,
        rtt: Duration::from_millis(300),
        raft_address: address.to_string(),
    }
}

fn group_config(group_id: u64, snapshot_entries: u64) -> GroupConfig {
    GroupConfig {
        replica_id: ReplicaId::new(1),
        group_id: GroupId::new(group_id),
        election_rtt: 10,
        heartbeat_rtt: 1,
        check_quorum: true,
        snapshot_entries,
        compaction_overhead: 1,
        entry_compression: CompressionType::Snappy,
        snapshot_compression: CompressionType::Snappy,
    }
}

fn self_members(address: &str) -> BTreeMap<ReplicaId, String> {
    BTreeMap::from([(ReplicaId::new(1), address.to_string())])
}

async fn fixture(address: &str, options: MemoryHostOptions) -> Fixture {
    let dir = TempDir::new().unwrap();
    let (tx, events) = mpsc::unbounded_channel();
    let host = MemoryHostAdaptor::new(options)
        .create_host(host_config(&dir, address), Arc::new(ChannelListener { tx }))
        .await
        .unwrap();

    Fixture {
        host,
        events,
        state_machine: Arc::new(CounterStateMachine::default()),
        _dir: dir,
    }
}

impl Fixture {
    async fn start(&self, group_id: u64, join: bool) {
        self.start_with_snapshots(group_id, join, 0).await;
    }

    async fn start_with_snapshots(&self, group_id: u64, join: bool, snapshot_entries: u64) {
        self.host
            .start_group(
                self_members(self.host.raft_address()),
                join,
                shared_factory(self.state_machine.clone()),
                group_config(group_id, snapshot_entries),
            )
            .await
            .unwrap();
    }

    async fn next_event(&mut self) -> LeaderInfo {
        timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for leader event")
            .expect("listener dropped")
    }
}

#[traced_test]
#[tokio::test]
async fn test_address_is_claimed_until_stopped() {
    let fixture = fixture("memory-host-test:1", MemoryHostOptions::default()).await;

    let dir = TempDir::new().unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let err = MemoryHostAdaptor::default()
        .create_host(
            host_config(&dir, "memory-host-test:1"),
            Arc::new(ChannelListener { tx: tx.clone() }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Network);

    fixture.host.stop().await;

    let host = MemoryHostAdaptor::default()
        .create_host(
            host_config(&dir, "memory-host-test:1"),
            Arc::new(ChannelListener { tx: tx.clone() }),
        )
        .await
        .expect("address should be free after stop");
    drop(host);

    MemoryHostAdaptor::default()
        .create_host(
            host_config(&dir, "memory-host-test:1"),
            Arc::new(ChannelListener { tx }),
        )
        .await
        .expect("address should be free after drop");
}

#[tokio::test]
async fn test_unusable_storage_path() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, b"occupied").unwrap();

    let config = HostConfig {
        wal_dir: file.join("node-1"),
        node_host_dir: file.join("node-1"),
        rtt: Duration::from_millis(300),
        raft_address: "memory-host-test:2".to_string(),
    };
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = MemoryHostAdaptor::default()
        .create_host(config, Arc::new(ChannelListener { tx }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Storage);
}

#[traced_test]
#[tokio::test]
async fn test_bootstrap_elects_local_replica() {
    let mut fixture = fixture("memory-host-test:3", MemoryHostOptions::default()).await;
    fixture.start(1, false).await;

    let event = fixture.next_event().await;
    assert_eq!(event.group_id, GroupId::new(1));
    assert_eq!(event.leader_id, ReplicaId::new(1));
    assert_eq!(event.term, 1);
    assert_eq!(fixture.host.leader(GroupId::new(1)), Some(ReplicaId::new(1)));
}

#[tokio::test]
async fn test_start_group_validation() {
    let fixture = fixture("memory-host-test:4", MemoryHostOptions::default()).await;

    // Bootstrapping without the local replica
    let err = fixture
        .host
        .start_group(
            BTreeMap::from([(ReplicaId::new(2), "elsewhere:1".to_string())]),
            false,
            shared_factory(fixture.state_machine.clone()),
            group_config(1, 0),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::InvalidConfig);

    // Bad timing ratio
    let mut config = group_config(1, 0);
    config.election_rtt = 1;
    let err = fixture
        .host
        .start_group(
            self_members(fixture.host.raft_address()),
            false,
            shared_factory(fixture.state_machine.clone()),
            config,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::InvalidConfig);

    fixture.start(1, false).await;
    let err = fixture
        .host
        .start_group(
            self_members(fixture.host.raft_address()),
            false,
            shared_factory(fixture.state_machine.clone()),
            group_config(1, 0),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::GroupAlreadyExists);
    assert_eq!(fixture.host.group_ids(), vec![GroupId::new(1)]);
}

#[tokio::test]
async fn test_membership_change_token() {
    let fixture = fixture("memory-host-test:5", MemoryHostOptions::default()).await;
    fixture.start(1, false).await;
    let group_id = GroupId::new(1);
    let deadline = Instant::now() + Duration::from_secs(2);

    let membership = fixture.host.get_membership(group_id, deadline).await.unwrap();
    assert_eq!(membership.nodes.len(), 1);

    fixture
        .host
        .request_add_node(
            group_id,
            ReplicaId::new(2),
            "peer:2".to_string(),
            membership.config_change_id,
            deadline,
        )
        .await
        .unwrap();

    let updated = fixture.host.get_membership(group_id, deadline).await.unwrap();
    assert_eq!(updated.nodes.len(), 2);
    assert!(updated.config_change_id > membership.config_change_id);

    // Reusing the old token is rejected
    let err = fixture
        .host
        .request_add_node(
            group_id,
            ReplicaId::new(3),
            "peer:3".to_string(),
            membership.config_change_id,
            deadline,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Rejected);

    // Adding an existing member is rejected
    let err = fixture
        .host
        .request_add_node(
            group_id,
            ReplicaId::new(2),
            "peer:2".to_string(),
            updated.config_change_id,
            deadline,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Rejected);
}

#[tokio::test]
async fn test_elapsed_deadline_times_out() {
    let fixture = fixture("memory-host-test:6", MemoryHostOptions::default()).await;
    fixture.start(1, false).await;
    let expired = Instant::now() - Duration::from_millis(1);

    let err = fixture
        .host
        .get_membership(GroupId::new(1), expired)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Timeout);

    let err = fixture
        .host
        .request_add_node(GroupId::new(1), ReplicaId::new(2), "peer:2".into(), 0, expired)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Timeout);
}

#[traced_test]
#[tokio::test]
async fn test_leader_transfer() {
    let mut fixture = fixture("memory-host-test:7", MemoryHostOptions::default()).await;
    fixture.start(1, false).await;
    fixture.next_event().await;

    let group_id = GroupId::new(1);
    let deadline = Instant::now() + Duration::from_secs(2);
    let membership = fixture.host.get_membership(group_id, deadline).await.unwrap();
    fixture
        .host
        .request_add_node(
            group_id,
            ReplicaId::new(4),
            "peer:4".into(),
            membership.config_change_id,
            deadline,
        )
        .await
        .unwrap();

    fixture
        .host
        .request_leader_transfer(group_id, ReplicaId::new(4))
        .unwrap();
    let event = fixture.next_event().await;
    assert_eq!(event.leader_id, ReplicaId::new(4));
    assert_eq!(event.term, 2);

    let err = fixture
        .host
        .request_leader_transfer(group_id, ReplicaId::new(9))
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Rejected);

    let err = fixture
        .host
        .request_leader_transfer(GroupId::new(42), ReplicaId::new(4))
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::GroupNotFound);
}

#[tokio::test]
async fn test_propose_outcomes() {
    let mut fixture = fixture("memory-host-test:8", MemoryHostOptions::default()).await;
    fixture.start(1, false).await;
    fixture.start(2, true).await;
    fixture.next_event().await;

    let session = fixture.host.noop_session(GroupId::new(1));
    assert_eq!(session.group_id(), GroupId::new(1));
    let result = fixture
        .host
        .propose(&session, Bytes::from_static(b"a"), Duration::from_secs(1))
        .unwrap()
        .result()
        .await;
    assert_eq!(
        result,
        RequestResult::Completed(StateMachineResult {
            value: 1,
            data: Bytes::from_static(b"a"),
        })
    );
    assert_eq!(
        fixture.host.stale_read(GroupId::new(1), b"count").unwrap(),
        Bytes::from_static(b"1")
    );

    // Joined group never elects a leader in memory
    let session = fixture.host.noop_session(GroupId::new(2));
    let result = fixture
        .host
        .propose(&session, Bytes::from_static(b"b"), Duration::from_secs(1))
        .unwrap()
        .result()
        .await;
    assert_eq!(result, RequestResult::Dropped);

    let err = fixture
        .host
        .propose(
            &fixture.host.noop_session(GroupId::new(3)),
            Bytes::new(),
            Duration::from_secs(1),
        )
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::GroupNotFound);
}

#[tokio::test]
async fn test_slow_apply_times_out() {
    let options = MemoryHostOptions {
        election_delay: Duration::ZERO,
        apply_delay: Duration::from_millis(200),
    };
    let mut fixture = fixture("memory-host-test:9", options).await;
    fixture.start(1, false).await;
    fixture.next_event().await;

    let session = fixture.host.noop_session(GroupId::new(1));
    let result = fixture
        .host
        .propose(&session, Bytes::from_static(b"slow"), Duration::from_millis(20))
        .unwrap()
        .result()
        .await;
    assert_eq!(result, RequestResult::Timeout);
}

#[tokio::test]
async fn test_snapshot_every_n_entries() {
    let mut fixture = fixture("memory-host-test:10", MemoryHostOptions::default()).await;
    fixture.start_with_snapshots(1, false, 3).await;
    fixture.next_event().await;

    let group_id = GroupId::new(1);
    let session = fixture.host.noop_session(group_id);
    for _ in 0..4 {
        let result = fixture
            .host
            .propose(&session, Bytes::from_static(b"x"), Duration::from_secs(1))
            .unwrap()
            .result()
            .await;
        assert!(result.is_completed());
    }

    let snapshot = fixture.host.latest_snapshot(group_id).expect("snapshot");
    assert_eq!(snapshot.index, 3);
    assert_eq!(snapshot.data, Bytes::from_static(b"3"));
}

#[tokio::test]
async fn test_stopped_host_is_closed() {
    let fixture = fixture("memory-host-test:11", MemoryHostOptions::default()).await;
    fixture.start(1, false).await;
    fixture.host.stop().await;

    let err = fixture
        .host
        .get_membership(GroupId::new(1), Instant::now() + Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Closed);
    assert!(fixture.host.group_ids().is_empty());
}

#[tokio::test]
async fn test_simulated_leader_loss() {
    let mut fixture = fixture("memory-host-test:12", MemoryHostOptions::default()).await;
    fixture.start(1, false).await;
    fixture.next_event().await;

    fixture
        .host
        .simulate_leader_change(GroupId::new(1), ReplicaId::NONE)
        .unwrap();
    let event = fixture.next_event().await;
    assert!(event.leader_id.is_none());
    assert_eq!(fixture.host.leader(GroupId::new(1)), None);
}
