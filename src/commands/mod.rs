use std::path::PathBuf;

use clap::Args;

use nexus_provision::defaults::{Defaults, SshDefaults};
use nexus_provision::options::{InstallOptions, InstallRequest};
use nexus_provision::server::Server;

pub type CmdResult<T> = nexus_provision::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Which host to provision.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Configured server ID (see `server list`)
    #[arg(long, conflicts_with = "host")]
    pub server: Option<String>,

    /// SSH host, for a server that is not configured
    #[arg(long)]
    pub host: Option<String>,

    /// SSH user for --host
    #[arg(long, default_value = "ubuntu")]
    pub user: String,

    /// SSH port for --host (default from provision.json)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSH private key for --host
    #[arg(long)]
    pub identity_file: Option<String>,
}

impl TargetArgs {
    /// Resolve to a server entry: configured by ID, or built from flags.
    pub fn resolve(&self, ssh: &SshDefaults) -> nexus_provision::Result<Server> {
        if let Some(id) = &self.server {
            return nexus_provision::server::load(id);
        }

        match &self.host {
            Some(host) => Ok(Server::from_host(
                host,
                &self.user,
                self.port.unwrap_or(ssh.port),
                self.identity_file.clone(),
            )),
            None => Err(nexus_provision::Error::validation_invalid_argument(
                "target",
                "Either --server or --host is required",
                None,
                None,
            )),
        }
    }
}

/// Recipe knobs; anything unset falls back to provision.json.
#[derive(Args, Debug, Default)]
pub struct RecipeArgs {
    /// Owner of the install and of the running service
    #[arg(long = "user-name")]
    pub nexus_username: Option<String>,

    /// Release archive to install
    #[arg(long)]
    pub download_url: Option<String>,

    /// Root directory of the install
    #[arg(long)]
    pub install_dir: Option<String>,

    /// Existing remote install whose conf should be carried over
    #[arg(long)]
    pub migrate_from: Option<String>,

    /// Also install the Java runtime
    #[arg(long)]
    pub with_jdk: bool,

    /// Also install nginx in front of Nexus
    #[arg(long)]
    pub with_nginx: bool,

    /// Local nginx site file to upload instead of the bundled one
    #[arg(long)]
    pub site_file: Option<PathBuf>,
}

impl RecipeArgs {
    pub fn to_options(&self, defaults: &Defaults) -> nexus_provision::Result<InstallOptions> {
        let mut request = InstallRequest::from_defaults(&defaults.install);

        if let Some(user) = &self.nexus_username {
            request.nexus_username = user.clone();
        }
        if let Some(url) = &self.download_url {
            request.download_url = url.clone();
        }
        if let Some(dir) = &self.install_dir {
            request.install_dir = dir.clone();
        }
        if let Some(site) = &self.site_file {
            request.proxy_site_file = Some(site.clone());
        }
        request.migrate_from = self.migrate_from.clone();
        request.install_jdk = self.with_jdk;
        request.install_nginx = self.with_nginx;

        InstallOptions::for_today(request)
    }
}

pub mod install;
pub mod plan;
pub mod server;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (nexus_provision::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Install(args) => dispatch!(args, global, install),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::Server(args) => dispatch!(args, global, server),
    }
}
