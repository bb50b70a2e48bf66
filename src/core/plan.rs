//! Plans: ordered, named units of remote work.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::session::Session;

pub type StepAction = Box<dyn Fn(&Session, &mut PlanContext) -> Result<StepOutcome>>;

/// What a step reports back when its action returns normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done { output: Option<String> },
    /// The step had nothing to do; counts as success.
    PreconditionSkip { reason: String },
}

impl StepOutcome {
    pub fn done() -> Self {
        StepOutcome::Done { output: None }
    }

    pub fn with_output(output: impl Into<String>) -> Self {
        StepOutcome::Done {
            output: Some(output.into()),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        StepOutcome::PreconditionSkip {
            reason: reason.into(),
        }
    }
}

pub struct Step {
    name: String,
    lenient: bool,
    action: StepAction,
}

impl Step {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Session, &mut PlanContext) -> Result<StepOutcome> + 'static,
    {
        Self {
            name: name.into(),
            lenient: false,
            action: Box::new(action),
        }
    }

    /// Step that runs a single command.
    pub fn command(name: impl Into<String>, command: impl Into<String>) -> Self {
        let command = command.into();
        Self::new(name, move |session, _| {
            let result = session.run(&command)?;
            Ok(StepOutcome::with_output(result.output()))
        })
    }

    /// Failure of this step is recorded but does not abort the plan.
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    pub(crate) fn invoke(&self, session: &Session, context: &mut PlanContext) -> Result<StepOutcome> {
        (self.action)(session, context)
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("lenient", &self.lenient)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Plan {
    recipe: String,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanOutlineItem {
    pub name: String,
    pub lenient: bool,
}

impl Plan {
    pub fn new(recipe: impl Into<String>) -> Self {
        Self {
            recipe: recipe.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Add `step` only when `condition` holds.
    pub fn step_if(self, condition: bool, step: impl FnOnce() -> Step) -> Self {
        if condition {
            self.step(step())
        } else {
            self
        }
    }

    /// Append every step of `other`, in order.
    pub fn extend(mut self, other: Plan) -> Self {
        self.steps.extend(other.steps);
        self
    }

    /// Keep only the named steps, in plan order.
    pub fn only(self, names: &[String]) -> Result<Plan> {
        if let Some(unknown) = names
            .iter()
            .find(|name| !self.steps.iter().any(|s| &s.name == *name))
        {
            return Err(Error::validation_invalid_argument(
                "step",
                format!("Plan '{}' has no step named '{}'", self.recipe, unknown),
                Some(unknown.clone()),
                Some(self.steps.iter().map(|s| s.name.clone()).collect()),
            ));
        }

        let Plan { recipe, steps } = self;
        Ok(Plan {
            recipe,
            steps: steps
                .into_iter()
                .filter(|s| names.contains(&s.name))
                .collect(),
        })
    }

    pub fn recipe(&self) -> &str {
        &self.recipe
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn outline(&self) -> Vec<PlanOutlineItem> {
        self.steps
            .iter()
            .map(|step| PlanOutlineItem {
                name: step.name.clone(),
                lenient: step.lenient,
            })
            .collect()
    }

    /// Reject plans with empty or duplicate step names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(Error::validation_invalid_argument(
                    "plan",
                    format!("Plan '{}' has a step without a name", self.recipe),
                    None,
                    None,
                ));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(Error::validation_invalid_argument(
                    "plan",
                    format!("Duplicate step name '{}'", step.name),
                    Some(self.recipe.clone()),
                    None,
                ));
            }
        }
        Ok(())
    }
}

/// Values produced by earlier steps of the same plan run.
#[derive(Debug, Default, Clone)]
pub struct PlanContext {
    values: HashMap<String, String>,
}

impl PlanContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value a step depends on; missing means an earlier step never ran.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            Error::internal_unexpected(format!(
                "'{}' was not produced by an earlier step",
                key
            ))
        })
    }
}
