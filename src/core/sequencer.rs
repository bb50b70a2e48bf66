//! Step sequencer.
//!
//! Runs a [`Plan`] strictly in order against one [`Session`]. The sequencer is
//! the only place that decides whether a failure aborts the plan: non-lenient
//! failures stop it, lenient ones are recorded and the run continues.

use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::error::{Error, PlanAbortedDetails};
use crate::plan::{Plan, PlanContext, Step, StepOutcome};
use crate::session::Session;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    NotStarted,
    InProgress,
    Completed,
    Aborted,
}

/// Failure recorded against a step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl From<&Error> for StepError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            command: err.command().map(str::to_string),
            stderr: err.stderr().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    pub state: StepState,
    pub lenient: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl StepResult {
    fn pending(step: &Step) -> Self {
        Self {
            name: step.name().to_string(),
            state: StepState::Pending,
            lenient: step.is_lenient(),
            error: None,
            commands: Vec::new(),
            note: None,
            output: None,
        }
    }

    fn transition(&mut self, next: StepState) {
        debug_assert!(
            matches!(
                (self.state, next),
                (StepState::Pending, StepState::Running)
                    | (StepState::Running, StepState::Succeeded)
                    | (StepState::Running, StepState::Failed)
                    | (StepState::Running, StepState::Skipped)
            ),
            "invalid step transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_run: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub recipe: String,
    pub target: String,
    pub state: PlanState,
    pub cancelled: bool,
    pub dry_run: bool,
    pub steps: Vec<StepResult>,
    pub summary: PlanSummary,
}

impl PlanReport {
    pub fn is_completed(&self) -> bool {
        self.state == PlanState::Completed
    }

    /// The non-lenient step that aborted the plan.
    pub fn failed_step(&self) -> Option<&StepResult> {
        if self.state != PlanState::Aborted {
            return None;
        }
        self.steps
            .iter()
            .rev()
            .find(|s| s.state == StepState::Failed && !s.lenient)
    }

    /// Names of the steps that finished without a hard failure.
    pub fn completed_steps(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Succeeded | StepState::Skipped))
            .map(|s| s.name.clone())
            .collect()
    }

    /// Error describing why the plan did not complete, if it did not.
    pub fn to_error(&self) -> Option<Error> {
        if self.cancelled {
            return Some(Error::plan_cancelled(&self.recipe, self.completed_steps()));
        }

        let failed = self.failed_step()?;
        let error = failed.error.as_ref();
        Some(Error::plan_aborted(PlanAbortedDetails {
            recipe: self.recipe.clone(),
            failed_step: failed.name.clone(),
            command: error.and_then(|e| e.command.clone()),
            stderr: error.and_then(|e| e.stderr.clone()),
            completed_steps: self.completed_steps(),
        }))
    }
}

pub struct Sequencer {
    state: PlanState,
    cancel: CancellationToken,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            state: PlanState::NotStarted,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> PlanState {
        self.state
    }

    pub fn execute(&mut self, plan: &Plan, session: &Session) -> PlanReport {
        self.state = PlanState::InProgress;
        log_status!(
            "plan",
            "Running '{}' ({} steps) on {}",
            plan.recipe(),
            plan.len(),
            session.target()
        );

        // Commands issued before the plan belong to no step.
        session.take_journal();

        let mut context = PlanContext::new();
        let mut results = Vec::with_capacity(plan.len());
        let mut cancelled = false;
        let total = plan.len();

        for (index, step) in plan.steps().iter().enumerate() {
            if self.cancel.is_cancelled() {
                log_status!("plan", "Cancelled before step '{}'", step.name());
                cancelled = true;
                self.state = PlanState::Aborted;
                break;
            }

            let result = run_step(step, index, total, session, &mut context);
            let hard_failure = result.state == StepState::Failed && !result.lenient;
            results.push(result);

            if hard_failure {
                self.state = PlanState::Aborted;
                break;
            }
        }

        if self.state == PlanState::InProgress {
            self.state = PlanState::Completed;
        }

        let summary = build_summary(&results, total, self.state);
        log_status!(
            "plan",
            "'{}' {:?}: {} succeeded, {} failed, {} skipped, {} not run",
            plan.recipe(),
            self.state,
            summary.succeeded,
            summary.failed,
            summary.skipped,
            summary.not_run
        );

        PlanReport {
            recipe: plan.recipe().to_string(),
            target: session.target(),
            state: self.state,
            cancelled,
            dry_run: session.is_dry_run(),
            steps: results,
            summary,
        }
    }
}

/// Execute `plan` against `session` with no cancellation source.
pub fn execute(plan: &Plan, session: &Session) -> PlanReport {
    Sequencer::new().execute(plan, session)
}

fn run_step(
    step: &Step,
    index: usize,
    total: usize,
    session: &Session,
    context: &mut PlanContext,
) -> StepResult {
    let mut result = StepResult::pending(step);
    result.transition(StepState::Running);
    log_status!("plan", "[{}/{}] {}", index + 1, total, step.name());

    let outcome = step.invoke(session, context);
    result.commands = session.take_journal();

    match outcome {
        Ok(StepOutcome::Done { output }) => {
            result.transition(StepState::Succeeded);
            result.output = output.filter(|o| !o.is_empty());
        }
        Ok(StepOutcome::PreconditionSkip { reason }) => {
            log_status!("plan", "Skipped '{}': {}", step.name(), reason);
            result.transition(StepState::Skipped);
            result.note = Some(reason);
        }
        Err(err) => {
            if step.is_lenient() {
                log_status!("plan", "Step '{}' failed (ignored): {}", step.name(), err);
            } else {
                log_status!("plan", "Step '{}' failed: {}", step.name(), err);
            }
            result.transition(StepState::Failed);
            result.error = Some(StepError::from(&err));
        }
    }

    result
}

fn build_summary(results: &[StepResult], total: usize, state: PlanState) -> PlanSummary {
    let count = |wanted: StepState| results.iter().filter(|r| r.state == wanted).count();

    let next_actions = match state {
        PlanState::Aborted => vec![
            "Fix the issue and re-run (idempotent - completed steps will converge again)"
                .to_string(),
        ],
        _ => Vec::new(),
    };

    PlanSummary {
        total_steps: total,
        succeeded: count(StepState::Succeeded),
        failed: count(StepState::Failed),
        skipped: count(StepState::Skipped),
        not_run: total - results.len(),
        next_actions,
    }
}
