//! What-if execution: plans run against a transport that only records.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::plan::Plan;
use crate::sequencer::{PlanReport, Sequencer};
use crate::session::Session;
use crate::ssh::{CommandResult, Transport};

/// Stdout every recorded command pretends to have produced.
pub const DRY_RUN_OUTPUT: &str = "<dry-run>";

/// Transport that records commands and reports success for each.
///
/// Existence probes therefore answer "present", so a dry run shows the
/// commands of a re-install over an existing release.
pub struct DryRunTransport {
    target: String,
    commands: Mutex<Vec<String>>,
}

impl DryRunTransport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl Transport for DryRunTransport {
    fn execute(&self, command: &str, _stdin: Option<&Path>) -> CommandResult {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.to_string());
        }
        CommandResult::ok(DRY_RUN_OUTPUT)
    }

    fn target(&self) -> String {
        self.target.clone()
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// Run `plan` without touching any host.
pub fn dry_run(plan: &Plan, target: &str) -> PlanReport {
    let session = Session::new(Arc::new(DryRunTransport::new(target)));
    Sequencer::new().execute(plan, &session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Step;
    use crate::sequencer::{PlanState, StepState};

    #[test]
    fn dry_run_records_commands_per_step() {
        let plan = Plan::new("demo")
            .step(Step::command("stop", "service nexus stop").lenient())
            .step(Step::command("start", "service nexus start"));

        let report = dry_run(&plan, "ubuntu@nexus");

        assert!(report.dry_run);
        assert_eq!(report.state, PlanState::Completed);
        assert_eq!(report.steps[0].commands, ["service nexus stop"]);
        assert_eq!(report.steps[1].state, StepState::Succeeded);
        assert_eq!(report.steps[1].output.as_deref(), Some(DRY_RUN_OUTPUT));
    }

    #[test]
    fn transport_keeps_wire_commands() {
        let transport = DryRunTransport::new("t");
        transport.execute("ls", None);
        assert_eq!(transport.commands(), ["ls"]);
        assert!(transport.is_dry_run());
    }
}
