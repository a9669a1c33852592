use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::content::{BundleSource, LoadMode};

pub const SETTINGS_FILE_NAME: &str = "manor_mod.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleSourceKind {
    #[default]
    Embedded,
    File,
}

/// Every tunable name, path and mode of the pipeline. Missing fields take the manor defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModSettings {
    pub bundle_source: BundleSourceKind,
    pub bundle_name: String,
    pub bundle_file: PathBuf,
    pub load_mode: LoadMode,
    pub prefab_name: String,
    pub target_context: String,
    pub property_code: String,
    pub listing_poster_name: String,
    pub whiteboard_path: String,
    pub disable_originals: Vec<String>,
    pub attach_to_property: bool,
}

impl Default for ModSettings {
    fn default() -> Self {
        Self {
            bundle_source: BundleSourceKind::Embedded,
            bundle_name: "chloemanorsetup".to_string(),
            bundle_file: PathBuf::from("bundles").join("chloemanorsetup"),
            load_mode: LoadMode::Sync,
            prefab_name: "ManorSetup-Chloe".to_string(),
            target_context: "Main".to_string(),
            property_code: "manor".to_string(),
            listing_poster_name: "PropertyListing Hilltop Manor".to_string(),
            whiteboard_path: "/Map/Container/RE Office/Interior/Whiteboard".to_string(),
            disable_originals: vec![
                "@Properties/Manor/House/Door Frames/Mansion Door Frame".to_string(),
                "@Properties/Manor/House/MansionDoor".to_string(),
                "@Properties/Manor/House/mansion/DoorFrame".to_string(),
            ],
            attach_to_property: true,
        }
    }
}

impl ModSettings {
    /// Builds the bundle source. `embedded` is the bundle compiled into the mod binary and is
    /// only consulted for [`BundleSourceKind::Embedded`].
    pub fn bundle_source(&self, embedded: &[u8]) -> BundleSource {
        match self.bundle_source {
            BundleSourceKind::Embedded => BundleSource::embedded(&self.bundle_name, embedded),
            BundleSourceKind::File => BundleSource::file(self.bundle_file.clone()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings {path} at {}: {}", .source.path(), .source.inner())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
}

pub fn read_settings(path: &Path) -> Result<ModSettings, SettingsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "settings_missing_using_defaults");
            return Ok(ModSettings::default());
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    let settings = serde_path_to_error::deserialize::<_, ModSettings>(&mut deserializer).map_err(
        |source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        },
    )?;
    info!(
        path = %path.display(),
        prefab = %settings.prefab_name,
        load_mode = ?settings.load_mode,
        "settings_loaded"
    );
    Ok(settings)
}
