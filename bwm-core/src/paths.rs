//! XDG locations used by bwm.
//!
//! ```text
//! $XDG_CONFIG_HOME/bwm/config.yaml   configuration (mode 0600)
//! $XDG_CACHE_HOME/.bwm-auth          IPC rendezvous file (mode 0600)
//! $XDG_CACHE_HOME/bwm/bwm.log        daemon log, rotated by size
//! ```
//!
//! Every path helper has an `_at` form taking the base directory explicitly;
//! tests only ever use the `_at` forms with a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const APP_DIR: &str = "bwm";
pub const CONFIG_FILE: &str = "config.yaml";
pub const AUTH_FILE: &str = ".bwm-auth";
pub const LOG_FILE: &str = "bwm.log";

pub fn config_home() -> Result<PathBuf, ConfigError> {
    dirs::config_dir().ok_or(ConfigError::DirNotFound("config"))
}

pub fn cache_home() -> Result<PathBuf, ConfigError> {
    dirs::cache_dir().ok_or(ConfigError::DirNotFound("cache"))
}

pub fn config_path_at(config_home: &Path) -> PathBuf {
    config_home.join(APP_DIR).join(CONFIG_FILE)
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&config_home()?))
}

pub fn auth_path_at(cache_home: &Path) -> PathBuf {
    cache_home.join(AUTH_FILE)
}

pub fn auth_path() -> Result<PathBuf, ConfigError> {
    Ok(auth_path_at(&cache_home()?))
}

pub fn logs_dir_at(cache_home: &Path) -> PathBuf {
    cache_home.join(APP_DIR)
}

pub fn log_path_at(cache_home: &Path) -> PathBuf {
    logs_dir_at(cache_home).join(LOG_FILE)
}

pub fn log_path() -> Result<PathBuf, ConfigError> {
    Ok(log_path_at(&cache_home()?))
}
