use clap::{Args, Subcommand};
use serde::Serialize;

use nexus_provision::server::{self, Server};

use super::CmdResult;

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<Server>,
    #[serde(skip_serializing_if = "Option::is_none")]
    servers: Option<Vec<Server>>,
}

#[derive(Args)]
pub struct ServerArgs {
    #[command(subcommand)]
    command: ServerCommand,
}

#[derive(Subcommand)]
enum ServerCommand {
    /// Display server configuration
    Show {
        /// Server ID
        server_id: String,
    },
    /// List all configured servers
    List,
}

pub fn run(args: ServerArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ServerOutput> {
    match args.command {
        ServerCommand::Show { server_id } => {
            let server = server::load(&server_id)?;
            Ok((
                ServerOutput {
                    command: "server.show".to_string(),
                    server_id: Some(server_id),
                    server: Some(server),
                    ..Default::default()
                },
                0,
            ))
        }
        ServerCommand::List => {
            let servers = server::list()?;
            Ok((
                ServerOutput {
                    command: "server.list".to_string(),
                    servers: Some(servers),
                    ..Default::default()
                },
                0,
            ))
        }
    }
}
