use clap::Args;
use serde::Serialize;

use nexus_provision::defaults;
use nexus_provision::plan::PlanOutlineItem;
use nexus_provision::recipes::Recipe;
use nexus_provision::InstallOptions;

use super::{CmdResult, RecipeArgs};

#[derive(Args)]
pub struct PlanArgs {
    /// Recipe to outline: nexus, proxy or runtime
    pub recipe: Recipe,

    #[command(flatten)]
    pub recipe_args: RecipeArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutput {
    pub command: String,
    pub recipe: Recipe,
    pub options: InstallOptions,
    pub steps: Vec<PlanOutlineItem>,
}

pub fn run(args: PlanArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<PlanOutput> {
    let defaults = defaults::load_defaults()?;
    let options = args.recipe_args.to_options(&defaults)?;

    let plan = args.recipe.build(&options);
    plan.validate()?;

    Ok((
        PlanOutput {
            command: "plan.show".to_string(),
            recipe: args.recipe,
            steps: plan.outline(),
            options,
        },
        0,
    ))
}
