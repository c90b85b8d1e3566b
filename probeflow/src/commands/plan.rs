// probeflow/src/commands/plan.rs
//
// USE CASE: show what a run would schedule, without touching the task store.

use crate::cli::RunArgs;
use probeflow_core::application::build_plan;
use probeflow_core::infrastructure::fs::ensure_dirs;
use probeflow_core::infrastructure::summaries::load_layer_summaries;

pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let ctx = super::preflight(&args)?;
    ensure_dirs(&args.out)?;

    let summaries = load_layer_summaries(&args.out, &ctx.layers);
    let planned = build_plan(&ctx.scope, &ctx.layers, &args.target, &summaries, &ctx.rules);

    for action in &planned {
        println!("{}", serde_json::to_string_pretty(action)?);
    }
    println!("Planned actions: {}", planned.len());
    Ok(())
}
