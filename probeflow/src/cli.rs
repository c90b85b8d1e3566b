// probeflow/src/cli.rs

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "probeflow")]
#[command(version)]
#[command(about = "Rule-driven recon orchestrator (authorized use only)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the planned actions without executing anything
    Plan(RunArgs),

    /// Plan, then drain the task queue under the scope budget
    Run(RunArgs),

    /// Alias of run: picks pending tasks back up from the task store
    Resume(RunArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Target to engage; must be listed in the scope targets
    #[arg(long)]
    pub target: String,

    /// Path to the scope JSON file (targets, allowed tools, time budget)
    #[arg(long)]
    pub scope: PathBuf,

    /// Output root, created if missing
    #[arg(long)]
    pub out: PathBuf,

    /// Comma-separated layer numbers to seed
    #[arg(long, default_value = "1,2,3,4")]
    pub layers: String,

    /// Planning mode (accepted for compatibility with older run books)
    #[arg(long, value_enum, default_value_t = PlanMode::Auto)]
    pub plan: PlanMode,

    /// Rules file (the bundled default rule set when omitted)
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Concurrent task ceiling for the drain loop
    #[arg(long, default_value_t = 1)]
    pub max_parallel: usize,

    /// Per-task timeout in seconds
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,

    /// Max task completion rate per second (0 = disabled)
    #[arg(long, default_value_t = 0.0)]
    pub rate: f64,

    /// Overall budget in minutes (defaults to the scope's)
    #[arg(long)]
    pub time_budget: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanMode {
    Auto,
    Manual,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::parse_from([
            "probeflow",
            "run",
            "--target",
            "1.2.3.4",
            "--scope",
            "scope.json",
            "--out",
            "out",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.layers, "1,2,3,4");
                assert_eq!(args.plan, PlanMode::Auto);
                assert_eq!(args.max_parallel, 1);
                assert_eq!(args.timeout, 600);
                assert_eq!(args.rate, 0.0);
                assert_eq!(args.time_budget, None);
                assert!(args.rules.is_none());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_parse_resume_with_overrides() {
        let cli = Cli::parse_from([
            "probeflow",
            "resume",
            "--target",
            "1.2.3.4",
            "--scope",
            "scope.json",
            "--out",
            "out",
            "--layers",
            "1,2",
            "--max-parallel",
            "4",
            "--time-budget",
            "10",
        ]);
        match cli.command {
            Commands::Resume(args) => {
                assert_eq!(args.layers, "1,2");
                assert_eq!(args.max_parallel, 4);
                assert_eq!(args.time_budget, Some(10));
            }
            _ => panic!("Expected Resume command"),
        }
    }

    #[test]
    fn test_missing_target_is_a_parse_error() {
        let result =
            Cli::try_parse_from(["probeflow", "plan", "--scope", "scope.json", "--out", "out"]);
        assert!(result.is_err());
    }
}
