use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod config;
pub mod content;
mod error;
pub mod lifecycle;
pub mod net;
pub mod property;
mod relocate;
mod settings;
pub mod spawn;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    apply_configuration, apply_to_registry, release_configuration, AppliedFlag, BoundConfiguration,
    CollectionPolicies, ConfigurationRecord, MergeError, MergeOutcome, MergePolicy, SkipReason,
};
pub use content::{
    decode_bundle, encode_bundle, AssetPackage, AssetProvisioner, BundleError, BundleSource,
    LoadMode, PendingBundle, PrefabAsset, PrefabNode, ProvisionError,
};
pub use error::PipelineErrorKind;
pub use lifecycle::{
    HostContext, LifecycleController, LifecycleEvent, LifecycleEvents, LifecycleReport,
    LifecycleState,
};
pub use net::{LocalServer, NetworkCapability, OfflineNetwork, ReplicationError, ReplicationId};
pub use property::{
    ChangeFlag, EntityRegistry, EntryGate, InteractableToggleable, LoadingDock, ModularSwitch,
    Property, PropertyStore,
};
pub use relocate::{relocate, Relocated, RelocationError};
pub use settings::{read_settings, BundleSourceKind, ModSettings, SettingsError, SETTINGS_FILE_NAME};
pub use spawn::{SpawnError, SpawnMode, SpawnOrchestrator, SpawnedInstance};
pub use world::{NodeId, SceneGraph, Transform, Vec3, WorldGraph, WorldGraphError};

pub const ROOT_ENV_VAR: &str = "MANOR_MOD_ROOT";

#[derive(Debug, Clone)]
pub struct ModPaths {
    pub root: PathBuf,
    pub bundles_dir: PathBuf,
    pub settings_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{env_var} is set but does not point to a mod install directory: {path}\n\
A valid install directory is an existing directory, usually containing {settings} or bundles/."
    )]
    InvalidEnvRoot {
        path: PathBuf,
        env_var: &'static str,
        settings: &'static str,
    },
}

pub fn resolve_mod_paths() -> Result<ModPaths, StartupError> {
    let root = resolve_root()?;
    Ok(mod_paths_for_root(root))
}

pub fn mod_paths_for_root(root: PathBuf) -> ModPaths {
    let bundles_dir = root.join("bundles");
    let settings_path = root.join(SETTINGS_FILE_NAME);
    ModPaths {
        root,
        bundles_dir,
        settings_path,
    }
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if normalized.is_dir() {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    path: normalized,
                    env_var: ROOT_ENV_VAR,
                    settings: SETTINGS_FILE_NAME,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_install_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            // A mod without any settings or bundles on disk still runs from its own directory.
            Ok(normalize_path(&exe_dir))
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_install_marker(path: &Path) -> bool {
    path.join(SETTINGS_FILE_NAME).is_file() || path.join("bundles").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
