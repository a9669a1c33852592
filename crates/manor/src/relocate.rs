use thiserror::Error;
use tracing::info;

use crate::error::PipelineErrorKind;
use crate::world::{NodeId, WorldGraph, WorldGraphError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocated {
    pub node: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelocationError {
    #[error("no node named '{name}' below {root:?}")]
    SourceNotFound { name: String, root: NodeId },
    #[error("no node at path '{path}'")]
    TargetNotFound { path: String },
    #[error("node at '{path}' cannot take '{name}': {source}")]
    TargetRejected {
        name: String,
        path: String,
        #[source]
        source: WorldGraphError,
    },
}

impl RelocationError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            Self::SourceNotFound { .. } => PipelineErrorKind::RelocationSourceNotFound,
            Self::TargetNotFound { .. } | Self::TargetRejected { .. } => {
                PipelineErrorKind::RelocationTargetNotFound
            }
        }
    }
}

/// Moves the first node named `name` below `root` under the node at `target_path`, keeping
/// its world placement, and activates it.
pub fn relocate(
    world: &mut dyn WorldGraph,
    root: NodeId,
    name: &str,
    target_path: &str,
) -> Result<Relocated, RelocationError> {
    let node = world
        .find_descendant_by_name(root, name)
        .ok_or_else(|| RelocationError::SourceNotFound {
            name: name.to_string(),
            root,
        })?;
    let target = world
        .find_node_by_path(target_path)
        .ok_or_else(|| RelocationError::TargetNotFound {
            path: target_path.to_string(),
        })?;

    world
        .reparent(node, Some(target), true)
        .map_err(|source| RelocationError::TargetRejected {
            name: name.to_string(),
            path: target_path.to_string(),
            source,
        })?;
    world.set_active(node, true);
    info!(
        sub_object = name,
        node = node.0,
        target = target_path,
        "sub_object_relocated"
    );
    Ok(Relocated { node, target })
}
