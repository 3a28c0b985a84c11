use std::fs;
use std::path::{Path, PathBuf};

use crate::io::store::atomic_write;
use crate::model::config::Config;

const CONFIG_FILE: &str = "config.toml";

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "PATHLIST_DIR";

/// Error type for configuration I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not serialize config.toml: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("no data directory: set {DATA_DIR_ENV} or HOME")]
    NoDataDir,
}

/// Read config.toml from the data directory. A missing file gives the
/// defaults.
pub fn read_config(data_dir: &Path) -> Result<Config, ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => return Err(ConfigError::ReadError { path, source: e }),
    };
    Ok(toml::from_str(&text)?)
}

/// Write `config` to config.toml, replacing any existing file
pub fn write_config(data_dir: &Path, config: &Config) -> Result<(), ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    let text = toml::to_string_pretty(config)?;
    fs::create_dir_all(data_dir).map_err(|e| ConfigError::WriteError {
        path: data_dir.to_path_buf(),
        source: e,
    })?;
    atomic_write(&path, text.as_bytes()).map_err(|e| ConfigError::WriteError { path, source: e })
}

/// Pick the data directory: an explicit path, then `PATHLIST_DIR`, then
/// `$XDG_DATA_HOME/pathlist`, then `~/.local/share/pathlist`.
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    resolve_data_dir_with(explicit, |key| std::env::var(key).ok())
}

/// [`resolve_data_dir`] with an injectable environment lookup
pub fn resolve_data_dir_with(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());
    if let Some(dir) = non_empty(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(base) = non_empty("XDG_DATA_HOME") {
        return Ok(PathBuf::from(base).join("pathlist"));
    }
    match non_empty("HOME") {
        Some(home) => Ok(PathBuf::from(home).join(".local/share/pathlist")),
        None => Err(ConfigError::NoDataDir),
    }
}
