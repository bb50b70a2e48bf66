//! Remote execution transport.
//!
//! `Transport` is the seam between the orchestration core and the wire:
//! the `SshClient` shells out to the system `ssh` binary (or runs locally for
//! localhost targets), while tests and dry runs plug in their own
//! implementations.

mod client;

use serde::Serialize;
use std::path::Path;

pub use client::{execute_local_command, is_local_host, SshClient};

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }

    /// Trimmed stdout.
    pub fn output(&self) -> &str {
        self.stdout.trim()
    }

    /// True when the command never reached the remote shell (spawn failure or
    /// ssh connection error) rather than exiting non-zero on its own.
    pub fn is_transport_failure(&self) -> bool {
        !self.success && (self.exit_code == -1 || self.exit_code == 255)
    }
}

/// A channel able to run shell commands on one target host.
pub trait Transport: Send + Sync {
    /// Run `command` through the target's shell, optionally streaming a local
    /// file to its stdin. Never panics; failures are encoded in the result.
    fn execute(&self, command: &str, stdin: Option<&Path>) -> CommandResult;

    /// Human-readable target label (`user@host`).
    fn target(&self) -> String;

    /// True when commands are only recorded, never executed.
    fn is_dry_run(&self) -> bool {
        false
    }
}
