use miette::{IntoDiagnostic, Result};
use probeflow_core::infrastructure::state::StateStore;
use std::path::PathBuf;

fn main() -> Result<()> {
    let db_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("out/_state.sqlite"));

    if !db_path.exists() {
        return Err(miette::miette!(
            "❌ Task store not found at: {}\n👉 Have you run 'probeflow run'?",
            db_path.display()
        ));
    }

    let store = StateStore::open(&db_path).into_diagnostic()?;
    let tasks = store.get_all().into_diagnostic()?;

    println!(
        "\n🔍 Inspecting Task Store: '{}' ({} tasks)",
        db_path.display(),
        tasks.len()
    );

    for task in tasks {
        println!(
            "   ➜ #{} [{}] {} on {} (prio {}) logs={}",
            task.id,
            task.status,
            task.tool,
            task.target,
            task.priority,
            task.logs_path.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
