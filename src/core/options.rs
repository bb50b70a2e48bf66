//! Per-run install options.
//!
//! `InstallOptions` is resolved once at the start of an install; the date it
//! captures names the backup directories for every step of that run.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

use crate::defaults::InstallDefaults;
use crate::error::{Error, Result};
use crate::utils::base_path;

/// Directory (under the install dir) the current release lives in.
pub const NEXUS_CURRENT_DIR_NAME: &str = "nexus-current";
/// Scratch directory (under the install dir) archives are extracted into.
pub const WORKING_DIR_NAME: &str = "working";
/// Stable path the service and users refer to.
pub const NEXUS_LINK: &str = "/usr/local/nexus";
pub const INIT_SCRIPT_LINK: &str = "/etc/init.d/nexus";
pub const NEXUS_SERVICE: &str = "nexus";
/// Config directory relative to the install dir.
pub const CONF_DIR: &str = "sonatype-work/nexus/conf";

/// Caller-supplied knobs, before anything is derived from them.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub nexus_username: String,
    pub download_url: String,
    pub install_dir: String,
    pub migrate_from: Option<String>,
    pub install_jdk: bool,
    pub install_nginx: bool,
    pub http_port: u16,
    pub jdk_package: String,
    pub proxy_site_file: Option<PathBuf>,
}

impl InstallRequest {
    pub fn from_defaults(defaults: &InstallDefaults) -> Self {
        Self {
            nexus_username: defaults.nexus_user.clone(),
            download_url: defaults.download_url.clone(),
            install_dir: defaults.install_dir.clone(),
            migrate_from: None,
            install_jdk: false,
            install_nginx: false,
            http_port: defaults.http_port,
            jdk_package: defaults.jdk_package.clone(),
            proxy_site_file: defaults.proxy_site_file.as_deref().map(|p| {
                PathBuf::from(shellexpand::tilde(p).to_string())
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstallOptions {
    pub nexus_username: String,
    pub download_url: String,
    pub install_dir: String,
    pub migrate_from: Option<String>,
    pub install_jdk: bool,
    pub install_nginx: bool,
    pub http_port: u16,
    pub jdk_package: String,
    pub proxy_site_file: Option<PathBuf>,

    /// `MM-DD-YY` of the run
    pub date_stamp: String,
    /// Downloaded archive name, `{date}-{basename(url)}`
    pub archive_name: String,
    pub working_dir: String,
    pub nexus_current_dir_name: String,
    pub nexus_old_dir_name: String,
    pub conf_backup_name: String,
}

impl InstallOptions {
    /// Resolve options for a run happening today (local time).
    pub fn for_today(request: InstallRequest) -> Result<Self> {
        Self::resolve(request, chrono::Local::now().date_naive())
    }

    pub fn resolve(request: InstallRequest, date: NaiveDate) -> Result<Self> {
        if request.nexus_username.trim().is_empty() {
            return Err(Error::validation_invalid_argument(
                "nexus_username",
                "User name cannot be empty",
                None,
                None,
            ));
        }

        if !request.install_dir.starts_with('/') {
            return Err(Error::validation_invalid_argument(
                "install_dir",
                "Install directory must be an absolute path",
                Some(request.install_dir.clone()),
                None,
            ));
        }

        let archive = base_path::basename(&request.download_url);
        if archive.is_empty() || !request.download_url.contains("://") {
            return Err(Error::validation_invalid_argument(
                "download_url",
                "Download URL must be an absolute URL naming an archive",
                Some(request.download_url.clone()),
                None,
            ));
        }

        let date_stamp = date.format("%m-%d-%y").to_string();
        let install_dir = request.install_dir.trim_end_matches('/').to_string();
        let install_dir = if install_dir.is_empty() {
            "/".to_string()
        } else {
            install_dir
        };

        Ok(Self {
            archive_name: format!("{}-{}", date_stamp, archive),
            working_dir: WORKING_DIR_NAME.to_string(),
            nexus_current_dir_name: NEXUS_CURRENT_DIR_NAME.to_string(),
            nexus_old_dir_name: format!("nexus-old-{}", date_stamp),
            conf_backup_name: format!("conf-backup-{}-", date_stamp),
            date_stamp,
            nexus_username: request.nexus_username,
            download_url: request.download_url,
            install_dir,
            migrate_from: request.migrate_from,
            install_jdk: request.install_jdk,
            install_nginx: request.install_nginx,
            http_port: request.http_port,
            jdk_package: request.jdk_package,
            proxy_site_file: request.proxy_site_file,
        })
    }

    fn under_install_dir(&self, relative: &str) -> String {
        format!("{}/{}", self.install_dir.trim_end_matches('/'), relative)
    }

    /// `{install_dir}/nexus-current`
    pub fn current_dir(&self) -> String {
        self.under_install_dir(&self.nexus_current_dir_name)
    }

    /// `{install_dir}/nexus-old-{date}`
    pub fn old_dir(&self) -> String {
        self.under_install_dir(&self.nexus_old_dir_name)
    }

    pub fn working_path(&self) -> String {
        self.under_install_dir(&self.working_dir)
    }

    /// Init script shipped inside the release.
    pub fn startup_script_path(&self) -> String {
        format!("{}/bin/nexus", self.current_dir())
    }

    pub fn conf_dir(&self) -> String {
        self.under_install_dir(CONF_DIR)
    }

    pub fn conf_backup_dir(&self) -> String {
        format!("{}/{}", self.conf_dir(), self.conf_backup_name)
    }
}
