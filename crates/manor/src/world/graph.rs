use thiserror::Error;

use crate::content::PrefabAsset;

use super::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldGraphError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("cannot parent {node:?} under {parent:?}: parent is the node or one of its descendants")]
    WouldCreateCycle { node: NodeId, parent: NodeId },
    #[error("instantiating prefab '{prefab}' failed: {reason}")]
    InstantiateRejected { prefab: String, reason: String },
}

/// The host's hierarchy of spatial nodes.
pub trait WorldGraph {
    fn instantiate(&mut self, prefab: &PrefabAsset) -> Result<NodeId, WorldGraphError>;

    /// Removes the node and its whole subtree. Returns `false` if the node did not exist.
    fn destroy(&mut self, node: NodeId) -> bool;

    fn contains(&self, node: NodeId) -> bool;

    fn name(&self, node: NodeId) -> Option<&str>;

    fn rename(&mut self, node: NodeId, name: &str) -> bool;

    fn has_replication_identity(&self, node: NodeId) -> bool;

    fn find_node_by_path(&self, path: &str) -> Option<NodeId>;

    /// Depth-first pre-order search strictly below `root`; first match wins.
    fn find_descendant_by_name(&self, root: NodeId, name: &str) -> Option<NodeId>;

    fn reparent(
        &mut self,
        node: NodeId,
        new_parent: Option<NodeId>,
        keep_world_transform: bool,
    ) -> Result<(), WorldGraphError>;

    fn set_active(&mut self, node: NodeId, active: bool) -> bool;

    fn is_active(&self, node: NodeId) -> Option<bool>;

    fn world_transform(&self, node: NodeId) -> Option<Transform>;
}
