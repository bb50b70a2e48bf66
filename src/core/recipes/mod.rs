//! Installation recipes.
//!
//! Each recipe is a pure `(&InstallOptions) -> Plan` function. Recipes only
//! compose session, file and service primitives; deciding whether a failure
//! aborts the run is left to the sequencer.

mod nexus;
mod proxy;
mod runtime;

pub use nexus::install_nexus;
pub use proxy::install_proxy;
pub use runtime::install_runtime;

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, ErrorCode, Result};
use crate::options::InstallOptions;
use crate::plan::{Plan, PlanContext, Step, StepOutcome};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Recipe {
    Nexus,
    Proxy,
    Runtime,
}

impl Recipe {
    pub const ALL: [Recipe; 3] = [Recipe::Nexus, Recipe::Proxy, Recipe::Runtime];

    pub fn name(&self) -> &'static str {
        match self {
            Recipe::Nexus => "nexus",
            Recipe::Proxy => "proxy",
            Recipe::Runtime => "runtime",
        }
    }

    pub fn build(&self, options: &InstallOptions) -> Plan {
        match self {
            Recipe::Nexus => install_nexus(options),
            Recipe::Proxy => install_proxy(options),
            Recipe::Runtime => install_runtime(options),
        }
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Recipe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Recipe::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Recipe::ALL.iter().map(Recipe::name).collect();
                Error::new(
                    ErrorCode::ValidationInvalidArgument,
                    format!("Unknown recipe '{}' (expected one of: {})", s, known.join(", ")),
                    serde_json::json!({ "field": "recipe", "id": s, "tried": known }),
                )
            })
    }
}

type RecipeAction = fn(&Session, &mut PlanContext, &InstallOptions) -> Result<StepOutcome>;

/// Step whose action reads the shared options of the run.
fn option_step(name: &str, options: &Rc<InstallOptions>, action: RecipeAction) -> Step {
    let options = Rc::clone(options);
    Step::new(name, move |session, context| action(session, context, &options))
}

/// Replacement text with `$` taken literally by the regex engine.
fn literal(replacement: &str) -> String {
    replacement.replace('$', "$$")
}
