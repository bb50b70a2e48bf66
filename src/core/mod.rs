// Public modules
pub mod cancel;
pub mod command_builder;
pub mod defaults;
pub mod dry_run;
pub mod error;
pub mod files;
pub mod options;
pub mod plan;
pub mod recipes;
pub mod sequencer;
pub mod server;
pub mod service;
pub mod session;
pub mod ssh;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use cancel::CancellationToken;
pub use dry_run::{dry_run, DryRunTransport};
pub use error::{Error, ErrorCode, Result};
pub use options::InstallOptions;
pub use plan::{Plan, PlanContext, Step, StepOutcome};
pub use recipes::Recipe;
pub use sequencer::{PlanReport, PlanState, StepResult, StepState};
pub use session::Session;
