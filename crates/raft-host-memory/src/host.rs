//! In-memory node host

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet, mapref::entry::Entry as MapEntry};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use proven_raft_host::{
    GroupConfig, GroupId, HostAdaptor, HostConfig, Membership, NodeHost, RaftEventListener,
    ReplicaId, RequestResult, RequestState, Session, StateMachineFactory,
};
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::Error;
use crate::group::{MemoryGroup, Snapshot};

/// Raft addresses claimed by live hosts in this process
static BOUND_ADDRESSES: Lazy<DashSet<String>> = Lazy::new(DashSet::new);

/// Timing knobs for the simulated engine
#[derive(Debug, Clone)]
pub struct MemoryHostOptions {
    /// Delay between a group bootstrapping (or a transfer request) and the
    /// resulting leader event
    pub election_delay: Duration,

    /// Delay before a proposal is applied
    pub apply_delay: Duration,
}

impl Default for MemoryHostOptions {
    fn default() -> Self {
        Self {
            election_delay: Duration::from_millis(10),
            apply_delay: Duration::ZERO,
        }
    }
}

/// Creates in-memory node hosts
#[derive(Debug, Clone, Default)]
pub struct MemoryHostAdaptor {
    options: MemoryHostOptions,
}

impl MemoryHostAdaptor {
    /// Create an adaptor producing hosts with the given options
    pub fn new(options: MemoryHostOptions) -> Self {
        Self { options }
    }

    /// Release every claimed raft address (useful for tests)
    pub fn clear_global_state() {
        BOUND_ADDRESSES.clear();
    }
}

async fn prepare_dir(path: &Path) -> Result<(), Error> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| Error::Storage {
            path: path.to_path_buf(),
            source,
        })
}

#[async_trait]
impl HostAdaptor for MemoryHostAdaptor {
    type Error = Error;
    type Host = MemoryHost;

    async fn create_host(
        &self,
        config: HostConfig,
        listener: Arc<dyn RaftEventListener>,
    ) -> Result<MemoryHost, Error> {
        if config.raft_address.trim().is_empty() {
            return Err(Error::InvalidAddress(config.raft_address));
        }

        prepare_dir(&config.node_host_dir).await?;
        if config.wal_dir != config.node_host_dir {
            prepare_dir(&config.wal_dir).await?;
        }

        if !BOUND_ADDRESSES.insert(config.raft_address.clone()) {
            return Err(Error::AddressInUse(config.raft_address));
        }

        info!(
            "Created memory node host at {} (dir: {:?})",
            config.raft_address, config.node_host_dir
        );

        Ok(MemoryHost {
            config,
            options: self.options.clone(),
            listener,
            groups: DashMap::new(),
            closed: AtomicBool::new(false),
        })
    }
}

/// Node host that keeps every group in process memory
///
/// Leadership is simulated: a bootstrapped group elects the local replica, and
/// transfers always succeed towards current members. Must be used from within a
/// tokio runtime.
pub struct MemoryHost {
    config: HostConfig,
    options: MemoryHostOptions,
    listener: Arc<dyn RaftEventListener>,
    groups: DashMap<GroupId, Arc<Mutex<MemoryGroup>>>,
    closed: AtomicBool,
}

impl MemoryHost {
    /// Raft address claimed by this host
    pub fn raft_address(&self) -> &str {
        &self.config.raft_address
    }

    /// Configuration this host was created with
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Groups running on this host, in ascending order
    pub fn group_ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<_> = self.groups.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Current leader of a group, if any
    pub fn leader(&self, group_id: GroupId) -> Option<ReplicaId> {
        let group = self.group(group_id).ok()?;
        let leader = group.lock().leader_id();
        (!leader.is_none()).then_some(leader)
    }

    /// Most recent snapshot taken for a group
    pub fn latest_snapshot(&self, group_id: GroupId) -> Option<Snapshot> {
        let group = self.group(group_id).ok()?;
        let snapshot = group.lock().snapshot().cloned();
        snapshot
    }

    /// Query the local state machine without going through the log
    pub fn stale_read(&self, group_id: GroupId, query: &[u8]) -> Result<Bytes, Error> {
        let group = self.group(group_id)?;
        let state_machine = Arc::clone(group.lock().state_machine());
        Ok(state_machine.lookup(group_id, query)?)
    }

    /// Force a leader event for a group, as if the engine had elected `leader_id`
    ///
    /// `ReplicaId::NONE` reports the leader as lost.
    pub fn simulate_leader_change(
        &self,
        group_id: GroupId,
        leader_id: ReplicaId,
    ) -> Result<(), Error> {
        let group = self.group(group_id)?;
        let info = group.lock().set_leader(leader_id);
        self.listener.leader_updated(info);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn group(&self, group_id: GroupId) -> Result<Arc<Mutex<MemoryGroup>>, Error> {
        self.ensure_open()?;
        self.groups
            .get(&group_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(Error::GroupNotFound(group_id))
    }

    fn schedule_leader_change(&self, group: Arc<Mutex<MemoryGroup>>, leader_id: ReplicaId) {
        let listener = Arc::clone(&self.listener);
        let delay = self.options.election_delay;

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let info = {
                let mut group = group.lock();
                if group.is_stopped() {
                    return;
                }
                group.set_leader(leader_id)
            };

            debug!(
                "{} elected {} in term {}",
                info.group_id, info.leader_id, info.term
            );
            listener.leader_updated(info);
        });
    }

    fn release_address(&self) {
        BOUND_ADDRESSES.remove(&self.config.raft_address);
    }
}

impl Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("raft_address", &self.config.raft_address)
            .field("groups", &self.groups.len())
            .finish_non_exhaustive()
    }
}

impl Drop for MemoryHost {
    fn drop(&mut self) {
        if !*self.closed.get_mut() {
            self.release_address();
        }
    }
}

#[async_trait]
impl NodeHost for MemoryHost {
    type Error = Error;

    async fn start_group(
        &self,
        initial_members: BTreeMap<ReplicaId, String>,
        join: bool,
        factory: StateMachineFactory,
        config: GroupConfig,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        config.validate()?;

        let group_id = config.group_id;
        let replica_id = config.replica_id;

        let members = if join {
            BTreeMap::from([(replica_id, self.config.raft_address.clone())])
        } else {
            if !initial_members.contains_key(&replica_id) {
                return Err(Error::InvalidMembers(format!(
                    "{replica_id} is not among the initial members of {group_id}"
                )));
            }
            initial_members
        };

        let group = match self.groups.entry(group_id) {
            MapEntry::Occupied(_) => return Err(Error::GroupAlreadyExists(group_id)),
            MapEntry::Vacant(vacant) => {
                let state_machine = factory(group_id, replica_id);
                let group = Arc::new(Mutex::new(MemoryGroup::new(config, members, state_machine)));
                vacant.insert(Arc::clone(&group));
                group
            }
        };

        info!("Started {} as {} (join: {})", group_id, replica_id, join);

        if !join {
            self.schedule_leader_change(group, replica_id);
        }

        Ok(())
    }

    async fn get_membership(
        &self,
        group_id: GroupId,
        deadline: Instant,
    ) -> Result<Membership, Error> {
        if Instant::now() >= deadline {
            return Err(Error::Timeout);
        }

        let group = self.group(group_id)?;
        let group = group.lock();

        Ok(Membership {
            config_change_id: group.config_change_id(),
            nodes: group.members().clone(),
            removed: Default::default(),
        })
    }

    async fn request_add_node(
        &self,
        group_id: GroupId,
        replica_id: ReplicaId,
        address: String,
        config_change_id: u64,
        deadline: Instant,
    ) -> Result<(), Error> {
        if Instant::now() >= deadline {
            return Err(Error::Timeout);
        }

        if replica_id.is_none() {
            return Err(Error::InvalidMembers(format!(
                "cannot add {replica_id} to {group_id}"
            )));
        }

        let group = self.group(group_id)?;
        let mut group = group.lock();

        if group.config_change_id() != config_change_id {
            return Err(Error::StaleConfigChange {
                group_id,
                provided: config_change_id,
                current: group.config_change_id(),
            });
        }

        if group.members().contains_key(&replica_id) {
            return Err(Error::DuplicateMember {
                group_id,
                replica_id,
            });
        }

        group.add_member(replica_id, address);
        debug!(
            "Added {} to {} (config change {})",
            replica_id,
            group_id,
            group.config_change_id()
        );

        Ok(())
    }

    fn request_leader_transfer(&self, group_id: GroupId, target: ReplicaId) -> Result<(), Error> {
        let group = self.group(group_id)?;

        if !group.lock().members().contains_key(&target) {
            return Err(Error::InvalidTarget { group_id, target });
        }

        debug!("Transferring leadership of {} to {}", group_id, target);
        self.schedule_leader_change(group, target);
        Ok(())
    }

    fn noop_session(&self, group_id: GroupId) -> Session {
        Session::noop(group_id)
    }

    fn propose(
        &self,
        session: &Session,
        cmd: Bytes,
        timeout: Duration,
    ) -> Result<RequestState, Error> {
        let group = self.group(session.group_id())?;
        let (result_tx, state) = RequestState::new();
        let apply_delay = self.options.apply_delay;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, tokio::time::sleep(apply_delay)).await
            {
                Err(_) => RequestResult::Timeout,
                Ok(()) => {
                    let mut group = group.lock();
                    if group.is_stopped() {
                        RequestResult::Terminated
                    } else if group.leader_id().is_none() {
                        RequestResult::Dropped
                    } else {
                        RequestResult::Completed(group.apply(cmd))
                    }
                }
            };

            if result_tx.send(result).is_err() {
                debug!("Proposal result discarded, requester went away");
            }
        });

        Ok(state)
    }

    async fn stop(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for entry in self.groups.iter() {
            let mut group = entry.value().lock();
            group.stop();
            debug!("Stopped {}", group.group_id());
        }
        self.groups.clear();
        self.release_address();

        info!("Memory node host {} stopped", self.config.raft_address);
    }
}
