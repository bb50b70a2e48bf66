use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;

/// Root configuration structure for provision.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvisionConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via provision.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Defaults {
    #[serde(default)]
    pub install: InstallDefaults,

    #[serde(default)]
    pub ssh: SshDefaults,
}

/// Defaults for the install recipes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallDefaults {
    /// Owner of the install directory and of the running service
    #[serde(default = "default_nexus_user")]
    pub nexus_user: String,

    #[serde(default = "default_download_url")]
    pub download_url: String,

    #[serde(default = "default_install_dir")]
    pub install_dir: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_jdk_package")]
    pub jdk_package: String,

    /// Local nginx site file uploaded by the proxy recipe; the bundled
    /// site is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_site_file: Option<String>,
}

impl Default for InstallDefaults {
    fn default() -> Self {
        Self {
            nexus_user: default_nexus_user(),
            download_url: default_download_url(),
            install_dir: default_install_dir(),
            http_port: default_http_port(),
            jdk_package: default_jdk_package(),
            proxy_site_file: None,
        }
    }
}

/// Defaults for the SSH transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshDefaults {
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Seconds before an SSH connection attempt is abandoned
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u32,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Run remote commands through `sudo -n`
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,
}

impl Default for SshDefaults {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            connect_timeout: default_connect_timeout(),
            retry_attempts: default_retry_attempts(),
            use_sudo: default_use_sudo(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_nexus_user() -> String {
    "nexus".to_string()
}

fn default_download_url() -> String {
    "http://www.sonatype.org/downloads/nexus-latest-bundle.tar.gz".to_string()
}

fn default_install_dir() -> String {
    "/data/nexus".to_string()
}

fn default_http_port() -> u16 {
    8081
}

fn default_jdk_package() -> String {
    "openjdk-7-jre-headless".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u32 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_use_sudo() -> bool {
    true
}

// =============================================================================
// Loading
// =============================================================================

/// Load defaults from ~/.config/nexus-provision/provision.json.
///
/// A missing file yields built-in defaults; a malformed one is an error.
pub fn load_defaults() -> Result<Defaults> {
    let path = paths::provision_json()?;
    load_defaults_from(&path)
}

pub fn load_defaults_from(path: &Path) -> Result<Defaults> {
    if !path.exists() {
        return Ok(Defaults::default());
    }

    let content = io::read_file(path, &format!("read {}", path.display()))?;

    let config: ProvisionConfig = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

    Ok(config.defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_builtin_defaults() {
        let dir = tempdir().unwrap();
        let defaults = load_defaults_from(&dir.path().join("provision.json")).unwrap();
        assert_eq!(defaults.install.nexus_user, "nexus");
        assert_eq!(defaults.install.install_dir, "/data/nexus");
        assert_eq!(defaults.install.http_port, 8081);
        assert_eq!(defaults.ssh.retry_attempts, 3);
        assert!(defaults.ssh.use_sudo);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provision.json");
        fs::write(
            &path,
            r#"{"defaults":{"install":{"installDir":"/srv/nexus"},"ssh":{"connectTimeout":30}}}"#,
        )
        .unwrap();

        let defaults = load_defaults_from(&path).unwrap();
        assert_eq!(defaults.install.install_dir, "/srv/nexus");
        assert_eq!(defaults.install.nexus_user, "nexus");
        assert_eq!(defaults.ssh.connect_timeout, 30);
        assert_eq!(defaults.ssh.port, 22);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provision.json");
        fs::write(&path, "{not json").unwrap();

        let err = load_defaults_from(&path).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ConfigInvalidJson);
    }
}
