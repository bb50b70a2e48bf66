use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(skip_deserializing, default)]
    pub id: String,
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl Server {
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty()
    }

    pub fn generate_id(host: &str) -> String {
        format!("server-{}", host.replace('.', "-"))
    }

    /// Ad hoc server built from command-line flags.
    pub fn from_host(host: &str, user: &str, port: u16, identity_file: Option<String>) -> Self {
        Self {
            id: Self::generate_id(host),
            host: host.to_string(),
            user: user.to_string(),
            port,
            identity_file,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

pub fn load(id: &str) -> Result<Server> {
    load_from(&paths::servers()?, id)
}

pub fn list() -> Result<Vec<Server>> {
    list_in(&paths::servers()?)
}

/// Server ids name a file directly under the servers directory.
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(Error::validation_invalid_argument(
            "server",
            format!("Invalid server id '{}'", id),
            Some(id.to_string()),
            None,
        ));
    }
    Ok(())
}

pub fn load_from(dir: &Path, id: &str) -> Result<Server> {
    validate_id(id)?;
    let path = dir.join(format!("{}.json", id));
    if !path.exists() {
        return Err(Error::server_not_found(id));
    }

    let content = io::read_file(&path, &format!("read {}", path.display()))?;

    let mut server: Server = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;
    server.id = id.to_string();

    if !server.is_valid() {
        return Err(Error::config_invalid_value(
            "server",
            Some(id.to_string()),
            "host and user are required",
        ));
    }

    Ok(server)
}

pub fn list_in(dir: &Path) -> Result<Vec<Server>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| Error::internal_io(e.to_string(), Some("list servers".to_string())))?;

    let mut servers = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Some(id) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        servers.push(load_from(dir, &id)?);
    }

    servers.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(servers)
}
