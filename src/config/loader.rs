// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TaroError};

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "TARO_CONFIG";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `taro.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("taro.toml")
}

/// Resolve and load the effective configuration.
///
/// Lookup order: `explicit` (from `--config`), then `env_value` (the
/// `TARO_CONFIG` variable), then `./taro.toml` when it exists, then
/// built-in defaults. An explicitly named file that does not exist is an
/// error; a missing `./taro.toml` is not.
pub fn resolve_config(explicit: Option<&Path>, env_value: Option<&str>) -> Result<ConfigFile> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| env_value.filter(|v| !v.trim().is_empty()).map(PathBuf::from));

    if let Some(path) = named {
        if !path.is_file() {
            return Err(TaroError::ConfigError(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        debug!(path = %path.display(), "loading config");
        return load_and_validate(&path);
    }

    let fallback = default_config_path();
    if fallback.is_file() {
        debug!(path = %fallback.display(), "loading config");
        return load_and_validate(&fallback);
    }

    debug!("no config file found; using defaults");
    Ok(ConfigFile::default())
}

/// [`resolve_config`] reading `TARO_CONFIG` from the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigFile> {
    let env_value = std::env::var(CONFIG_ENV_VAR).ok();
    resolve_config(explicit, env_value.as_deref())
}
