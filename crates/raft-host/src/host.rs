//! Node host traits implemented by consensus engines

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::{
    GroupConfig, GroupId, HostAdaptorError, HostConfig, Membership, RaftEventListener, ReplicaId,
    RequestState, Session, StateMachineFactory,
};

/// Creates node hosts
///
/// An adaptor is the entry point of a consensus engine implementation. The
/// listener passed to `create_host` is the only receiver of the host's events.
#[async_trait]
pub trait HostAdaptor: Debug + Send + Sync + 'static {
    /// Error type of this engine
    type Error: HostAdaptorError;

    /// Host type produced by this adaptor
    type Host: NodeHost<Error = Self::Error>;

    /// Create a host bound to `config.raft_address`, storing its state under the
    /// configured directories
    async fn create_host(
        &self,
        config: HostConfig,
        listener: Arc<dyn RaftEventListener>,
    ) -> Result<Self::Host, Self::Error>;
}

/// Handle to a running consensus engine hosting any number of groups
#[async_trait]
pub trait NodeHost: Send + Sync + 'static {
    /// Error type of this engine
    type Error: HostAdaptorError;

    /// Start (or join) a group
    ///
    /// When `join` is false the initial members must include the local replica.
    async fn start_group(
        &self,
        initial_members: BTreeMap<ReplicaId, String>,
        join: bool,
        factory: StateMachineFactory,
        config: GroupConfig,
    ) -> Result<(), Self::Error>;

    /// Read the current membership of a group
    async fn get_membership(
        &self,
        group_id: GroupId,
        deadline: Instant,
    ) -> Result<Membership, Self::Error>;

    /// Add a voting member, guarded by the change token from `get_membership`
    async fn request_add_node(
        &self,
        group_id: GroupId,
        replica_id: ReplicaId,
        address: String,
        config_change_id: u64,
        deadline: Instant,
    ) -> Result<(), Self::Error>;

    /// Ask the group to hand leadership to `target`
    ///
    /// Returns once the request is accepted; the change itself is reported
    /// later through the event listener.
    fn request_leader_transfer(&self, group_id: GroupId, target: ReplicaId)
    -> Result<(), Self::Error>;

    /// Session that does not deduplicate retries
    fn noop_session(&self, group_id: GroupId) -> Session;

    /// Submit a proposal; the returned state resolves once the entry is applied
    /// or `timeout` elapses inside the engine
    fn propose(
        &self,
        session: &Session,
        cmd: Bytes,
        timeout: Duration,
    ) -> Result<RequestState, Self::Error>;

    /// Stop every group and release the host's resources
    async fn stop(&self);
}
