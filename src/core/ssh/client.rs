use super::{CommandResult, Transport};
use crate::defaults::SshDefaults;
use crate::error::{Error, Result};
use crate::server::Server;
use std::path::Path;
use std::process::{Command, Stdio};

pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    pub connect_timeout: u32,
    pub retry_attempts: u32,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the server host is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

impl SshClient {
    pub fn from_server(server: &Server, server_id: &str, defaults: &SshDefaults) -> Result<Self> {
        let identity_file = match &server.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        server_id.to_string(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&server.host);
        if is_local {
            log_status!("ssh", "Server '{}' is localhost, using local execution", server_id);
        }

        Ok(Self {
            host: server.host.clone(),
            user: server.user.clone(),
            port: server.port,
            identity_file,
            connect_timeout: defaults.connect_timeout,
            retry_attempts: defaults.retry_attempts.max(1),
            is_local,
        })
    }

    /// Client that runs every command on this machine.
    pub fn local() -> Self {
        Self {
            host: "localhost".to_string(),
            user: std::env::var("USER").unwrap_or_else(|_| "root".to_string()),
            port: 22,
            identity_file: None,
            connect_timeout: 10,
            retry_attempts: 1,
            is_local: true,
        }
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Never block on prompts or stalled connections.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    fn execute_with_retry(&self, command: &str, stdin_file: Option<&Path>) -> CommandResult {
        let backoff_secs = [0, 2, 5]; // delays before retry 1, 2, 3
        let max_attempts = self.retry_attempts;

        for attempt in 0..max_attempts {
            let result = self.execute_once(command, stdin_file);

            // Only retry on transient connection errors, not command failures
            if result.success || attempt + 1 >= max_attempts || !is_transient_ssh_error(&result) {
                return result;
            }

            let delay = backoff_secs.get(attempt as usize + 1).copied().unwrap_or(5);
            log_status!(
                "ssh",
                "Connection failed (attempt {}/{}), retrying in {}s...",
                attempt + 1,
                max_attempts,
                delay
            );
            std::thread::sleep(std::time::Duration::from_secs(delay));
        }

        CommandResult::failed(-1, "SSH retry exhausted")
    }

    fn execute_once(&self, command: &str, stdin_file: Option<&Path>) -> CommandResult {
        if self.is_local {
            return execute_local_command(command, stdin_file);
        }

        let mut cmd = Command::new("ssh");
        cmd.args(self.build_ssh_args(command));
        shield_from_terminal_signals(&mut cmd);

        if let Err(result) = attach_stdin(&mut cmd, stdin_file) {
            return result;
        }

        match cmd.output() {
            Ok(out) => CommandResult {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandResult::failed(-1, format!("SSH error: {}", e)),
        }
    }
}

impl Transport for SshClient {
    fn execute(&self, command: &str, stdin: Option<&Path>) -> CommandResult {
        self.execute_with_retry(command, stdin)
    }

    fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

fn attach_stdin(cmd: &mut Command, stdin_file: Option<&Path>) -> std::result::Result<(), CommandResult> {
    let Some(path) = stdin_file else {
        cmd.stdin(Stdio::null());
        return Ok(());
    };

    match std::fs::File::open(path) {
        Ok(file) => {
            cmd.stdin(file);
            Ok(())
        }
        Err(err) => Err(CommandResult::failed(
            -1,
            format!("Failed to open stdin file {}: {}", path.display(), err),
        )),
    }
}

/// Run a command through the local `sh`, optionally feeding a file to stdin.
pub fn execute_local_command(command: &str, stdin_file: Option<&Path>) -> CommandResult {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    shield_from_terminal_signals(&mut cmd);

    if let Err(result) = attach_stdin(&mut cmd, stdin_file) {
        return result;
    }

    match cmd.output() {
        Ok(out) => CommandResult {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandResult::failed(-1, format!("Command error: {}", e)),
    }
}

/// Own process group: a terminal Ctrl-C reaches this process, not the child.
#[cfg(unix)]
fn shield_from_terminal_signals(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn shield_from_terminal_signals(_cmd: &mut Command) {}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Check if an SSH failure is a transient connection error worth retrying.
fn is_transient_ssh_error(output: &CommandResult) -> bool {
    let stderr = output.stderr.to_lowercase();
    // SSH exit code 255 = connection error (not a remote command failure)
    let is_connection_exit = output.exit_code == 255;

    let transient_patterns = [
        "connection refused",
        "connection reset",
        "connection timed out",
        "no route to host",
        "network is unreachable",
        "temporary failure in name resolution",
        "could not resolve hostname",
        "broken pipe",
        "ssh_exchange_identification",
        "connection closed by remote host",
    ];

    is_connection_exit || transient_patterns.iter().any(|p| stderr.contains(p))
}
