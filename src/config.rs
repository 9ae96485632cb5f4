// src/config.rs

//! Configuration loading utilities.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file, and command-line flags applied by the binary.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::Config;

/// Config file read when no path is given explicitly.
pub const DEFAULT_CONFIG_PATH: &str = "pagewatch.toml";

/// The config file that will be read, if any.
///
/// An explicit path is always returned; otherwise the default path is
/// returned only when it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            path.exists().then(|| path.to_path_buf())
        }
    }
}

/// Load configuration from a TOML file.
///
/// A config file that is present must parse, whether it was requested
/// explicitly or found at the default path. Defaults are used only when
/// no file is given and the default path does not exist.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match resolve_config_path(explicit) {
        Some(path) => Config::load(&path).map_err(|e| {
            AppError::config(format!("failed to load config from {}: {e}", path.display()))
        }),
        None => Ok(Config::default()),
    }
}
