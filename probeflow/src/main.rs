// probeflow/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    // RUST_LOG=debug probeflow run ... to see the details
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan(args) => commands::plan::execute(args),
        Commands::Run(args) | Commands::Resume(args) => commands::run::execute(args).await,
    };

    // Preflight and pipeline failures surface as one line on stderr
    // (alternate formatting folds the context chain into that line).
    if let Err(e) = result {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}
