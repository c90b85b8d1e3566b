// probeflow/src/commands/run.rs
//
// USE CASE: plan, drain the task queue, render the combined report.
// `resume` is the same flow: the task store makes replanning idempotent.

use crate::cli::RunArgs;
use probeflow_core::application::{
    SchedulerConfig, build_combined_model, build_plan, render_reports, run_scheduler,
    write_next_steps,
};
use probeflow_core::infrastructure::adapters::HandlerRegistry;
use probeflow_core::infrastructure::fs::{append_timeline, ensure_dirs};
use probeflow_core::infrastructure::summaries::{load_combined_snapshots, load_layer_summaries};

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let start = std::time::Instant::now();
    let ctx = super::preflight(&args)?;
    tracing::debug!(mode = ?args.plan, "Planning mode");

    ensure_dirs(&args.out)?;
    let timeline = args.out.join("_timeline.txt");
    append_timeline(&timeline, "Run start")?;

    // A. Plan from what previous layers left on disk
    println!("⚙️  Loading summaries and rules...");
    let summaries = load_layer_summaries(&args.out, &ctx.layers);
    let planned = build_plan(&ctx.scope, &ctx.layers, &args.target, &summaries, &ctx.rules);
    write_next_steps(&args.out, &planned)?;
    println!("📝 Execution Plan: {} actions", planned.len());

    // B. Drain the queue under the budget
    let registry = HandlerRegistry::with_builtins();
    let time_budget_minutes = match args.time_budget {
        Some(minutes) if minutes > 0 => minutes,
        _ => ctx.scope.time_budget_minutes,
    };
    let config = SchedulerConfig {
        time_budget_minutes,
        max_parallel: args.max_parallel,
        timeout_per_task: args.timeout,
        rate_per_sec: args.rate,
    };
    run_scheduler(&args.out, &planned, &config, &registry).await?;

    // C. Rebuild the report from everything now on disk
    let mut summaries = load_layer_summaries(&args.out, &ctx.layers);
    summaries.extend(load_combined_snapshots(&args.out));
    let model = build_combined_model(&summaries);
    render_reports(&args.out, &model)?;

    append_timeline(&timeline, "Run end")?;
    println!(
        "✨ Done in {:.2?}. Report under {}/combined/",
        start.elapsed(),
        args.out.display()
    );
    Ok(())
}
