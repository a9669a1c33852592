use thiserror::Error;
use tracing::{debug, info, warn};

use crate::content::PrefabAsset;
use crate::error::PipelineErrorKind;
use crate::net::{NetworkCapability, ReplicationId};
use crate::world::{NodeId, WorldGraph, WorldGraphError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnMode {
    Networked,
    Local,
}

impl SpawnMode {
    fn suffix(self) -> &'static str {
        match self {
            Self::Networked => "NetworkInstance",
            Self::Local => "LocalInstance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnedInstance {
    pub root: NodeId,
    pub name: String,
    pub mode: SpawnMode,
    pub replication: Option<ReplicationId>,
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("an instance of '{prefab}' already exists as '{existing}'")]
    AlreadySpawned { prefab: String, existing: String },
    #[error("failed to instantiate '{prefab}': {source}")]
    Instantiation {
        prefab: String,
        #[source]
        source: WorldGraphError,
    },
}

impl SpawnError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            Self::AlreadySpawned { .. } => PipelineErrorKind::AlreadySpawned,
            Self::Instantiation { .. } => PipelineErrorKind::InstantiationFailure,
        }
    }
}

#[derive(Debug, Default)]
pub struct SpawnOrchestrator {
    current: Option<SpawnedInstance>,
}

impl SpawnOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SpawnedInstance> {
        self.current.as_ref()
    }

    pub fn spawn(
        &mut self,
        prefab: &PrefabAsset,
        world: &mut dyn WorldGraph,
        net: &mut dyn NetworkCapability,
    ) -> Result<&SpawnedInstance, SpawnError> {
        if let Some(existing) = &self.current {
            return Err(SpawnError::AlreadySpawned {
                prefab: prefab.name.clone(),
                existing: existing.name.clone(),
            });
        }

        let networked = if net.is_authority() && prefab.replicable {
            spawn_networked(prefab, world, net)
        } else {
            debug!(
                prefab = %prefab.name,
                authority = net.is_authority(),
                replicable = prefab.replicable,
                "spawn_networked_not_attempted"
            );
            None
        };

        let (root, mode, replication) = match networked {
            Some((root, id)) => (root, SpawnMode::Networked, Some(id)),
            None => {
                let root = world
                    .instantiate(prefab)
                    .map_err(|source| SpawnError::Instantiation {
                        prefab: prefab.name.clone(),
                        source,
                    })?;
                (root, SpawnMode::Local, None)
            }
        };

        let name = format!("{}_{}", prefab.name, mode.suffix());
        world.rename(root, &name);
        match mode {
            SpawnMode::Networked => info!(
                instance = %name,
                root = root.0,
                replication_id = replication.map(|id| id.0),
                "spawn_networked"
            ),
            SpawnMode::Local => info!(instance = %name, root = root.0, "spawn_local"),
        }

        Ok(self.current.insert(SpawnedInstance {
            root,
            name,
            mode,
            replication,
        }))
    }

    pub fn despawn(
        &mut self,
        world: &mut dyn WorldGraph,
        net: &mut dyn NetworkCapability,
    ) -> Option<SpawnedInstance> {
        let instance = self.current.take()?;
        if let Some(id) = instance.replication {
            if net.is_authority() {
                match net.despawn_replicated(id) {
                    Ok(()) => debug!(
                        instance = %instance.name,
                        replication_id = id.0,
                        "replicated_despawn"
                    ),
                    Err(err) => warn!(
                        instance = %instance.name,
                        replication_id = id.0,
                        error = %err,
                        "replicated_despawn_failed_destroying_locally"
                    ),
                }
            } else {
                warn!(
                    instance = %instance.name,
                    replication_id = id.0,
                    "authority_lost_destroying_locally"
                );
            }
        }
        let destroyed = world.destroy(instance.root);
        info!(instance = %instance.name, destroyed, "instance_despawned");
        Some(instance)
    }
}

/// Returns `None` whenever the caller should fall back to a local instance. Nothing of a
/// failed attempt is left in the world.
fn spawn_networked(
    prefab: &PrefabAsset,
    world: &mut dyn WorldGraph,
    net: &mut dyn NetworkCapability,
) -> Option<(NodeId, ReplicationId)> {
    let root = match world.instantiate(prefab) {
        Ok(root) => root,
        Err(err) => {
            warn!(
                prefab = %prefab.name,
                kind = %PipelineErrorKind::InstantiationFailure,
                error = %err,
                "spawn_networked_instantiate_failed"
            );
            return None;
        }
    };

    if !world.has_replication_identity(root) {
        world.destroy(root);
        warn!(
            prefab = %prefab.name,
            kind = %PipelineErrorKind::MissingReplicationCapability,
            "spawn_networked_missing_identity_falling_back"
        );
        return None;
    }

    match net.spawn_replicated(root) {
        Ok(id) => Some((root, id)),
        Err(err) => {
            world.destroy(root);
            warn!(
                prefab = %prefab.name,
                kind = %err.kind(),
                error = %err,
                "spawn_networked_registration_failed_falling_back"
            );
            None
        }
    }
}
