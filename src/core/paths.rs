use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base config directory (~/.config/nexus-provision/)
pub fn config_root() -> Result<PathBuf> {
    let home = env::var("HOME").map_err(|_| {
        Error::internal_unexpected("HOME environment variable not set".to_string())
    })?;
    Ok(PathBuf::from(home).join(".config").join("nexus-provision"))
}

/// Global provision.json config file path
pub fn provision_json() -> Result<PathBuf> {
    Ok(config_root()?.join("provision.json"))
}

/// Servers directory
pub fn servers() -> Result<PathBuf> {
    Ok(config_root()?.join("servers"))
}
