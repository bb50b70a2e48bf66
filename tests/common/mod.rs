#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use nexus_provision::ssh::{CommandResult, Transport};
use nexus_provision::Session;

/// Transport that answers from a script and records every command.
///
/// The first rule whose needle occurs in the command decides the response;
/// anything unmatched succeeds with empty output.
#[derive(Default)]
pub struct ScriptedTransport {
    rules: Vec<(String, CommandResult)>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: &str, result: CommandResult) -> Self {
        self.rules.push((needle.to_string(), result));
        self
    }

    /// Commands containing `needle` exit 1 with `stderr`.
    pub fn fail(self, needle: &str, stderr: &str) -> Self {
        self.respond(needle, CommandResult::failed(1, stderr))
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_matching(&self, needle: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, command: &str, _stdin: Option<&Path>) -> CommandResult {
        self.sent.lock().unwrap().push(command.to_string());
        self.rules
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| CommandResult::ok(""))
    }

    fn target(&self) -> String {
        "ubuntu@nexus.test".to_string()
    }
}

/// Unelevated session over `transport`, so recorded commands read plainly.
pub fn session(transport: &Arc<ScriptedTransport>) -> Session {
    Session::new(transport.clone()).elevated(false)
}
