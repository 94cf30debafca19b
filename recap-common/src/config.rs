//! Configuration file resolution and loading
//!
//! Services resolve their TOML configuration with the same priority order:
//! 1. Explicit command-line path (highest priority)
//! 2. Environment variable pointing at a file
//! 3. Platform config directory (`<config_dir>/recap/<service>.toml`)
//!
//! A missing file is not an error at resolution time; callers fall back to
//! compiled defaults when no file is found.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// Resolve the configuration file path for a service
///
/// Returns `None` when no candidate path exists on disk.
pub fn resolve_config_path(
    cli_arg: Option<&str>,
    env_var_name: &str,
    service_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Platform config directory
    let candidate = dirs::config_dir().map(|d| d.join("recap").join(format!("{}.toml", service_name)));
    match candidate {
        Some(path) if path.exists() => Some(path),
        _ => None,
    }
}

/// Load and parse a TOML configuration file
pub fn load_config_file<T: DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Default data directory for a service (database location)
pub fn default_data_dir(service_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("recap").join(service_name))
        .unwrap_or_else(|| PathBuf::from(format!("/var/lib/recap/{}", service_name)))
}
