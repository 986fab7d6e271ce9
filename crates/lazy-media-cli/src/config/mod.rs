//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use lazy_media::{MediaConfig, MediaResult};

/// Env var naming a config file.
pub const CONFIG_ENV: &str = "LAZY_MEDIA_CONFIG";
/// Env var overriding the image host.
pub const HOST_ENV: &str = "LAZY_MEDIA_HOST";
/// Config file picked up from the working directory.
pub const LOCAL_CONFIG: &str = ".lazy-media.json";

/// Resolve the config file path: explicit flag, then env var, then a local
/// file if one exists. `None` means run on defaults.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.trim().is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }

    None
}

/// Load the effective configuration for this process.
pub fn resolve_config(explicit: Option<&str>, host: Option<&str>) -> MediaResult<MediaConfig> {
    let env_host = std::env::var(HOST_ENV).ok();
    load_config(
        resolve_config_path(explicit).as_deref(),
        host.or(env_host.as_deref()),
    )
}

/// Load `path` (or the defaults) and apply a host override.
pub fn load_config(path: Option<&Path>, host: Option<&str>) -> MediaResult<MediaConfig> {
    let config = match path {
        Some(path) => MediaConfig::from_json_file(path)?,
        None => MediaConfig::default(),
    };
    match host.map(str::trim).filter(|h| !h.is_empty()) {
        Some(host) => {
            tracing::debug!("Image host overridden to {host}");
            config.with_host(host)
        }
        None => Ok(config),
    }
}
