use std::env;

use manor::{read_settings, resolve_mod_paths, ModPaths, ModSettings, SettingsError, StartupError};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub(crate) const NETWORK_MODE_ENV_VAR: &str = "MANOR_NETWORK_MODE";

/// How the demo host presents its network session to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NetworkMode {
    Offline,
    Server,
    Client,
}

impl NetworkMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "offline" => Some(Self::Offline),
            "server" | "host" => Some(Self::Server),
            "client" => Some(Self::Client),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub(crate) struct AppWiring {
    pub(crate) paths: ModPaths,
    pub(crate) settings: ModSettings,
    pub(crate) network_mode: NetworkMode,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Manor Host Startup ===");

    let paths = resolve_mod_paths()?;
    let settings = read_settings(&paths.settings_path)?;
    let network_mode = resolve_network_mode();
    info!(
        root = %paths.root.display(),
        bundle_source = ?settings.bundle_source,
        load_mode = ?settings.load_mode,
        network_mode = ?network_mode,
        "host_configured"
    );

    Ok(AppWiring {
        paths,
        settings,
        network_mode,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn resolve_network_mode() -> NetworkMode {
    match env::var(NETWORK_MODE_ENV_VAR) {
        Ok(value) => NetworkMode::parse(&value).unwrap_or_else(|| {
            warn!(
                env_var = NETWORK_MODE_ENV_VAR,
                value = value.as_str(),
                "invalid network mode; falling back to server"
            );
            NetworkMode::Server
        }),
        Err(env::VarError::NotPresent) => NetworkMode::Server,
        Err(err) => {
            warn!(
                env_var = NETWORK_MODE_ENV_VAR,
                error = %err,
                "unable to read network mode; falling back to server"
            );
            NetworkMode::Server
        }
    }
}
