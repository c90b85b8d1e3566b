// probeflow-core/src/infrastructure/summaries.rs
//
// Readers for the per-layer summaries probes leave behind, and for the
// per-task snapshots the scheduler writes under combined/. Unreadable files
// are skipped with a warning; a missing summary is not an error.

use crate::domain::Summary;
use crate::infrastructure::fs::load_json;
use std::path::Path;
use tracing::warn;

/// Read `<out>/layer<N>/summary.json` for each requested layer.
pub fn load_layer_summaries(out_dir: &Path, layers: &[u32]) -> Vec<Summary> {
    let mut summaries = Vec::new();
    for layer in layers {
        let path = out_dir.join(format!("layer{layer}")).join("summary.json");
        if !path.exists() {
            continue;
        }
        match load_json::<Summary>(&path) {
            Ok(summary) => summaries.push(summary),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable layer summary"),
        }
    }
    summaries
}

/// Read every `<out>/combined/summary_*.json` snapshot in sorted filename
/// order, so the final report also covers handler output from the run that
/// just finished.
pub fn load_combined_snapshots(out_dir: &Path) -> Vec<Summary> {
    let combined = out_dir.join("combined");
    let Ok(entries) = std::fs::read_dir(&combined) else {
        return vec![];
    };

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("summary_") && n.ends_with(".json"))
        })
        .collect();
    paths.sort();

    let mut summaries = Vec::new();
    for path in paths {
        match load_json::<Summary>(&path) {
            Ok(summary) => summaries.push(summary),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable snapshot"),
        }
    }
    summaries
}
