use std::fmt;

/// Stable failure codes shared by every pipeline stage, used as the `kind` log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineErrorKind {
    AssetNotFound,
    AssetCorrupt,
    AssetMissing,
    AlreadySpawned,
    MissingReplicationCapability,
    InstantiationFailure,
    ReplicationRegistrationFailure,
    EntityNotResolved,
    RelocationSourceNotFound,
    RelocationTargetNotFound,
}

impl PipelineErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssetNotFound => "asset_not_found",
            Self::AssetCorrupt => "asset_corrupt",
            Self::AssetMissing => "asset_missing",
            Self::AlreadySpawned => "already_spawned",
            Self::MissingReplicationCapability => "missing_replication_capability",
            Self::InstantiationFailure => "instantiation_failure",
            Self::ReplicationRegistrationFailure => "replication_registration_failure",
            Self::EntityNotResolved => "entity_not_resolved",
            Self::RelocationSourceNotFound => "relocation_source_not_found",
            Self::RelocationTargetNotFound => "relocation_target_not_found",
        }
    }
}

impl fmt::Display for PipelineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
