use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::error::PipelineErrorKind;

use super::bundle::{decode_bundle, AssetPackage, BundleError};
use super::pending::PendingBundle;
use super::prefab::PrefabAsset;

#[derive(Debug, Clone)]
pub enum BundleSource {
    Embedded { name: String, bytes: Arc<[u8]> },
    File { relative_path: PathBuf },
}

impl BundleSource {
    pub fn embedded(name: &str, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Embedded {
            name: name.to_string(),
            bytes: bytes.into(),
        }
    }

    pub fn file(relative_path: impl Into<PathBuf>) -> Self {
        Self::File {
            relative_path: relative_path.into(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Embedded { name, .. } => format!("embedded:{name}"),
            Self::File { relative_path } => format!("file:{}", relative_path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    #[default]
    Sync,
    Async,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("embedded bundle '{name}' is empty")]
    EmptyEmbedded { name: String },
    #[error("bundle file not found at {path}")]
    FileNotFound { path: PathBuf },
    #[error("failed to read bundle file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Corrupt(#[from] BundleError),
    #[error("bundle load for {origin} stopped before delivering a result")]
    WorkerLost { origin: String },
    #[error("no bundle is loaded; cannot extract '{asset}'")]
    NoPackage { asset: String },
    #[error("bundle '{bundle}' has no asset named '{asset}'")]
    AssetMissing { bundle: String, asset: String },
}

impl ProvisionError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            Self::EmptyEmbedded { .. }
            | Self::FileNotFound { .. }
            | Self::ReadFile { .. }
            | Self::WorkerLost { .. }
            | Self::NoPackage { .. } => PipelineErrorKind::AssetNotFound,
            Self::Corrupt(_) => PipelineErrorKind::AssetCorrupt,
            Self::AssetMissing { .. } => PipelineErrorKind::AssetMissing,
        }
    }
}

#[derive(Debug)]
pub struct AssetProvisioner {
    install_root: PathBuf,
    package: Option<AssetPackage>,
    prefabs: HashMap<String, Arc<PrefabAsset>>,
}

impl AssetProvisioner {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            package: None,
            prefabs: HashMap::new(),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn is_loaded(&self) -> bool {
        self.package.is_some()
    }

    pub fn package(&self) -> Option<&AssetPackage> {
        self.package.as_ref()
    }

    pub fn cached_prefab_count(&self) -> usize {
        self.prefabs.len()
    }

    pub fn load(&mut self, source: &BundleSource) -> Result<&AssetPackage, ProvisionError> {
        let package = match self.package.take() {
            Some(package) => {
                debug!(bundle = package.name(), "bundle_already_resident");
                package
            }
            None => {
                let result = load_package(source, &self.install_root);
                log_load_result(&source.describe(), &result);
                result?
            }
        };
        Ok(self.package.insert(package))
    }

    /// Starts a load on a worker thread. Embedded bundles are already in memory and resolve
    /// on the first poll.
    pub fn begin_load(&self, source: &BundleSource) -> PendingBundle {
        let origin = source.describe();
        match source {
            BundleSource::Embedded { .. } => {
                PendingBundle::ready(origin, load_package(source, &self.install_root))
            }
            BundleSource::File { .. } => {
                let source = source.clone();
                let root = self.install_root.clone();
                PendingBundle::spawn(origin, move || load_package(&source, &root))
            }
        }
    }

    pub fn finish_load(
        &mut self,
        origin: &str,
        result: Result<AssetPackage, ProvisionError>,
    ) -> Result<&AssetPackage, ProvisionError> {
        log_load_result(origin, &result);
        let loaded = result?;
        let package = match self.package.take() {
            Some(resident) => {
                debug!(
                    bundle = resident.name(),
                    late = loaded.name(),
                    "bundle_already_resident_dropping_late_load"
                );
                resident
            }
            None => loaded,
        };
        Ok(self.package.insert(package))
    }

    pub fn extract(&mut self, asset: &str) -> Result<Arc<PrefabAsset>, ProvisionError> {
        if let Some(prefab) = self.prefabs.get(asset) {
            return Ok(Arc::clone(prefab));
        }
        let Some(package) = self.package.as_ref() else {
            let err = ProvisionError::NoPackage {
                asset: asset.to_string(),
            };
            error!(kind = %err.kind(), error = %err, "prefab_extract_failed");
            return Err(err);
        };
        let Some(prefab) = package.asset(asset) else {
            let err = ProvisionError::AssetMissing {
                bundle: package.name().to_string(),
                asset: asset.to_string(),
            };
            error!(kind = %err.kind(), error = %err, "prefab_extract_failed");
            return Err(err);
        };
        debug!(
            bundle = package.name(),
            asset,
            node_count = prefab.node_count(),
            replicable = prefab.replicable,
            "prefab_extracted"
        );
        self.prefabs.insert(asset.to_string(), Arc::clone(&prefab));
        Ok(prefab)
    }

    pub fn unload(&mut self) -> bool {
        self.prefabs.clear();
        match self.package.take() {
            Some(package) => {
                info!(bundle = package.name(), "bundle_unloaded");
                true
            }
            None => false,
        }
    }
}

fn load_package(
    source: &BundleSource,
    install_root: &Path,
) -> Result<AssetPackage, ProvisionError> {
    match source {
        BundleSource::Embedded { name, bytes } => {
            if bytes.is_empty() {
                return Err(ProvisionError::EmptyEmbedded { name: name.clone() });
            }
            Ok(decode_bundle(bytes, &format!("embedded:{name}"))?)
        }
        BundleSource::File { relative_path } => {
            let path = install_root.join(relative_path);
            let bytes = fs::read(&path).map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    ProvisionError::FileNotFound { path: path.clone() }
                } else {
                    ProvisionError::ReadFile {
                        path: path.clone(),
                        source,
                    }
                }
            })?;
            Ok(decode_bundle(&bytes, &path.display().to_string())?)
        }
    }
}

fn log_load_result(origin: &str, result: &Result<AssetPackage, ProvisionError>) {
    match result {
        Ok(package) => info!(
            origin,
            bundle = package.name(),
            asset_count = package.asset_count(),
            payload_hash = package.payload_hash_sha256_hex(),
            "bundle_loaded"
        ),
        Err(err) => error!(origin, kind = %err.kind(), error = %err, "bundle_load_failed"),
    }
}
