//! Config loading and default on-disk locations.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cache::FileEndpointCache;
use crate::config::Config;
use crate::error::DiscoveryError;

/// Load configuration from the given path, or the default location.
///
/// A missing file yields defaults; a present but invalid file is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, DiscoveryError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path(),
    };

    let config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| DiscoveryError::Config(format!("failed to read config: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DiscoveryError::Config(format!("failed to parse config: {e}")))?;
        info!(path = %config_path.display(), "loaded config");
        config
    } else {
        info!("no config file found, using defaults");
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// The endpoint cache described by `config`.
pub fn endpoint_cache(config: &Config) -> FileEndpointCache {
    let path = config
        .cache
        .path
        .clone()
        .unwrap_or_else(default_cache_path);
    FileEndpointCache::new(path)
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("netguardian")
}

/// Get the default data directory path, where the endpoint cache lives.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(config_dir)
        .join("netguardian")
}

fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn default_cache_path() -> PathBuf {
    data_dir().join("endpoint.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(config.discovery.port, 49152);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[discovery]\nbatch_size = 0\n").unwrap();
        assert!(matches!(
            load_config(Some(path.as_path())),
            Err(DiscoveryError::Config(_))
        ));
    }

    #[test]
    fn cache_path_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cache_path = dir.path().join("cache").join("endpoint.toml");
        std::fs::write(
            &path,
            format!("[cache]\npath = {:?}\n", cache_path.display().to_string()),
        )
        .unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(endpoint_cache(&config).path(), cache_path);
    }
}
