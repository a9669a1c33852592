use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::error::PipelineErrorKind;
use crate::world::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicationId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    #[error("this peer does not hold network authority")]
    NotAuthority,
    #[error("network rejected replication of node {node:?}: {reason}")]
    Rejected { node: NodeId, reason: String },
    #[error("replication id {0:?} is not registered")]
    UnknownId(ReplicationId),
}

impl ReplicationError {
    pub fn kind(&self) -> PipelineErrorKind {
        PipelineErrorKind::ReplicationRegistrationFailure
    }
}

pub trait NetworkCapability {
    fn is_authority(&self) -> bool;

    fn spawn_replicated(&mut self, node: NodeId) -> Result<ReplicationId, ReplicationError>;

    fn despawn_replicated(&mut self, id: ReplicationId) -> Result<(), ReplicationError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineNetwork;

impl NetworkCapability for OfflineNetwork {
    fn is_authority(&self) -> bool {
        false
    }

    fn spawn_replicated(&mut self, _node: NodeId) -> Result<ReplicationId, ReplicationError> {
        Err(ReplicationError::NotAuthority)
    }

    fn despawn_replicated(&mut self, _id: ReplicationId) -> Result<(), ReplicationError> {
        Err(ReplicationError::NotAuthority)
    }
}

#[derive(Debug)]
pub struct LocalServer {
    started: bool,
    next_id: u32,
    spawned: BTreeMap<ReplicationId, NodeId>,
    reject_reason: Option<String>,
}

impl Default for LocalServer {
    fn default() -> Self {
        Self::started()
    }
}

impl LocalServer {
    pub fn started() -> Self {
        Self {
            started: true,
            next_id: 1,
            spawned: BTreeMap::new(),
            reject_reason: None,
        }
    }

    pub fn client() -> Self {
        Self {
            started: false,
            ..Self::started()
        }
    }

    /// Every following registration is rejected with `reason`.
    pub fn fail_registrations_with(&mut self, reason: &str) {
        self.reject_reason = Some(reason.to_string());
    }

    pub fn accept_registrations(&mut self) {
        self.reject_reason = None;
    }

    pub fn stop(&mut self) {
        self.started = false;
    }

    pub fn spawned_count(&self) -> usize {
        self.spawned.len()
    }

    pub fn node_for(&self, id: ReplicationId) -> Option<NodeId> {
        self.spawned.get(&id).copied()
    }
}

impl NetworkCapability for LocalServer {
    fn is_authority(&self) -> bool {
        self.started
    }

    fn spawn_replicated(&mut self, node: NodeId) -> Result<ReplicationId, ReplicationError> {
        if !self.started {
            return Err(ReplicationError::NotAuthority);
        }
        if let Some(reason) = &self.reject_reason {
            return Err(ReplicationError::Rejected {
                node,
                reason: reason.clone(),
            });
        }
        let id = ReplicationId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.spawned.insert(id, node);
        debug!(replication_id = id.0, node = node.0, "replicated_spawn_registered");
        Ok(id)
    }

    fn despawn_replicated(&mut self, id: ReplicationId) -> Result<(), ReplicationError> {
        if !self.started {
            return Err(ReplicationError::NotAuthority);
        }
        self.spawned
            .remove(&id)
            .map(|_| ())
            .ok_or(ReplicationError::UnknownId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_network_never_has_authority() {
        let mut net = OfflineNetwork;
        assert!(!net.is_authority());
        assert_eq!(
            net.spawn_replicated(NodeId(1)),
            Err(ReplicationError::NotAuthority)
        );
    }

    #[test]
    fn local_server_issues_distinct_ids_and_forgets_despawned() {
        let mut server = LocalServer::started();
        let a = server.spawn_replicated(NodeId(1)).expect("a");
        let b = server.spawn_replicated(NodeId(2)).expect("b");
        assert_ne!(a, b);
        assert_eq!(server.node_for(b), Some(NodeId(2)));

        server.despawn_replicated(a).expect("despawn");
        assert_eq!(server.spawned_count(), 1);
        assert_eq!(
            server.despawn_replicated(a),
            Err(ReplicationError::UnknownId(a))
        );
    }

    #[test]
    fn rejection_and_client_mode_fail_registration() {
        let mut server = LocalServer::started();
        server.fail_registrations_with("pool exhausted");
        assert!(matches!(
            server.spawn_replicated(NodeId(3)),
            Err(ReplicationError::Rejected { .. })
        ));

        let mut client = LocalServer::client();
        assert!(!client.is_authority());
        assert_eq!(
            client.spawn_replicated(NodeId(3)),
            Err(ReplicationError::NotAuthority)
        );
    }
}
