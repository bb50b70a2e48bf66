use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use nexus_provision::cancel::CancellationToken;
use nexus_provision::defaults;
use nexus_provision::dry_run::DryRunTransport;
use nexus_provision::recipes::Recipe;
use nexus_provision::sequencer::{PlanReport, Sequencer};
use nexus_provision::ssh::{SshClient, Transport};
use nexus_provision::{log_status, InstallOptions, Session};

use super::{CmdResult, RecipeArgs, TargetArgs};
use crate::output::{self, CliError};

#[derive(Args)]
pub struct InstallArgs {
    /// Recipe to run: nexus, proxy or runtime
    pub recipe: Recipe,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub recipe_args: RecipeArgs,

    /// Record the commands each step would run without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Run commands as the SSH user instead of through sudo
    #[arg(long)]
    pub no_sudo: bool,

    /// Run only these steps (repeatable); see `plan <recipe>` for names
    #[arg(long = "only", value_name = "STEP")]
    pub only: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutput {
    pub command: String,
    pub server_id: String,
    pub options: InstallOptions,
    pub report: PlanReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CliError>,
}

pub fn run(args: InstallArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<InstallOutput> {
    let defaults = defaults::load_defaults()?;
    let options = args.recipe_args.to_options(&defaults)?;
    let server = args.target.resolve(&defaults.ssh)?;

    let mut plan = args.recipe.build(&options);
    if !args.only.is_empty() {
        plan = plan.only(&args.only)?;
    }
    plan.validate()?;

    let transport: Arc<dyn Transport> = if args.dry_run {
        Arc::new(DryRunTransport::new(format!("{}@{}", server.user, server.host)))
    } else {
        Arc::new(SshClient::from_server(&server, &server.id, &defaults.ssh)?)
    };
    let session = Session::new(transport).elevated(defaults.ssh.use_sudo && !args.no_sudo);

    log_status!(
        "install",
        "Installing {} on {}{} ({})",
        args.recipe,
        session.target(),
        if session.is_elevated() { " via sudo" } else { "" },
        options.date_stamp
    );

    let report = Sequencer::new()
        .with_cancellation(CancellationToken::on_interrupt())
        .execute(&plan, &session);

    let failure = report.to_error();
    let exit_code = failure
        .as_ref()
        .map(|err| output::exit_code_for_error(err.code))
        .unwrap_or(0);

    Ok((
        InstallOutput {
            command: "install.run".to_string(),
            server_id: server.id,
            options,
            report,
            failure: failure.as_ref().map(CliError::from),
        },
        exit_code,
    ))
}
