use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env::apply_process_env, schema::CalbridgeConfig};

pub const CONFIG_FILE_NAME: &str = "calbridge.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "calbridge", "calbridge")
}

/// Platform config directory (`~/.config/calbridge` on Linux).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Platform data directory (`~/.local/share/calbridge` on Linux).
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// First existing config file: `./calbridge.toml`, then the config dir.
#[must_use]
pub fn find_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

/// Existing config path, or where a new one would be written.
#[must_use]
pub fn find_or_default_config_path() -> PathBuf {
    find_config_path().unwrap_or_else(|| {
        config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILE_NAME)
    })
}

pub fn load_config(path: &Path) -> Result<CalbridgeConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the discovered config file (defaults when none exists) and overlay the
/// process environment. A broken file is logged and replaced by defaults.
#[must_use]
pub fn discover_and_load() -> CalbridgeConfig {
    let mut config = match find_config_path() {
        Some(path) => match load_config(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                config
            },
            Err(e) => {
                warn!(error = %e, "ignoring unreadable config, using defaults");
                CalbridgeConfig::default()
            },
        },
        None => {
            debug!("no config file found, using defaults");
            CalbridgeConfig::default()
        },
    };
    apply_process_env(&mut config);
    config
}

pub fn save_config(config: &CalbridgeConfig) -> Result<PathBuf, ConfigError> {
    let path = find_or_default_config_path();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &CalbridgeConfig, path: &Path) -> Result<(), ConfigError> {
    let body = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, body).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
