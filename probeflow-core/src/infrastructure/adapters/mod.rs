// probeflow-core/src/infrastructure/adapters/mod.rs
//
// Dispatch between the two adapter families: external layer scripts
// (`recon_layer<N>.sh`, selected by a `layer<N>` tool name) and the named
// handlers registered at startup. The scheduler only ever calls
// `HandlerRegistry::run_action`.

pub mod probes;

use crate::domain::model::{Action, ProbeOutcome, Summary};
use crate::error::ProbeflowError;
use crate::infrastructure::fs::{atomic_write, load_json};
use crate::infrastructure::process::{CommandLine, RunOptions, safe_run};
use crate::ports::{ProbeHandler, ToolKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn ProbeHandler>>,
}

impl HandlerRegistry {
    /// Registry with the built-in probe set (http_enum, ssh_banner,
    /// dns_enum, tls_probe).
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        for handler in probes::builtin_handlers() {
            registry.register(handler);
        }
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn ProbeHandler>) {
        self.handlers.insert(handler.name(), handler);
    }

    /// Execute one action under the per-task timeout. Unknown named tools
    /// yield an empty summary without error; layer scripts that cannot be
    /// found do the same for their layer.
    pub async fn run_action(
        &self,
        action: &Action,
        out_dir: &Path,
        timeout_secs: u64,
    ) -> Result<ProbeOutcome, ProbeflowError> {
        match ToolKind::parse(&action.tool) {
            ToolKind::LayerScript(layer) => {
                run_layer_script(action, layer, out_dir, timeout_secs).await
            }
            ToolKind::Named(name) => match self.handlers.get(name.as_str()) {
                Some(handler) => handler.run(action, out_dir, timeout_secs).await,
                None => {
                    warn!(tool = %name, "No handler registered; returning empty summary");
                    Ok(ProbeOutcome::empty(
                        probes::UNKNOWN_TOOL_LAYER,
                        &action.target,
                    ))
                }
            },
        }
    }
}

/// First hit wins: current working directory, then the parent of the output
/// root, then the search path.
fn find_layer_script(layer: u32, out_dir: &Path) -> Option<PathBuf> {
    let script_name = format!("recon_layer{layer}.sh");

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join(&script_name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if let Some(parent) = out_dir.parent() {
        let candidate = parent.join(&script_name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let candidate = dir.join(&script_name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

async fn run_layer_script(
    action: &Action,
    layer: u32,
    out_dir: &Path,
    timeout_secs: u64,
) -> Result<ProbeOutcome, ProbeflowError> {
    let layer_dir = out_dir.join(format!("layer{layer}"));
    std::fs::create_dir_all(&layer_dir)?;

    let Some(script) = find_layer_script(layer, out_dir) else {
        debug!(layer, "No recon_layer script found; returning empty summary");
        return Ok(ProbeOutcome::empty(i64::from(layer), &action.target));
    };

    // The script runs from its own directory, so hand it an absolute OUT.
    let out_abs = std::fs::canonicalize(out_dir).unwrap_or_else(|_| out_dir.to_path_buf());
    let opts = RunOptions {
        cwd: script.parent().map(Path::to_path_buf),
        env: vec![
            ("T".to_string(), action.target.clone()),
            ("OUT".to_string(), out_abs.to_string_lossy().into_owned()),
        ],
        timeout_secs,
        ..RunOptions::default()
    };

    let (code, stdout, stderr) = safe_run(
        CommandLine::Argv(vec![script.to_string_lossy().into_owned()]),
        &opts,
    )
    .await?;
    debug!(layer, exit = code, script = %script.display(), "Layer script finished");

    let log_path = layer_dir.join(format!("{}.log.txt", action.tool));
    atomic_write(&log_path, format!("{stdout}\n{stderr}"))?;

    let summary = read_or_stub_summary(
        &layer_dir.join("summary.json"),
        i64::from(layer),
        &action.target,
    );
    Ok(ProbeOutcome {
        summary,
        artifacts: vec![],
        logs: Some(log_path.to_string_lossy().into_owned()),
    })
}

fn read_or_stub_summary(path: &Path, layer: i64, target: &str) -> Summary {
    if path.exists() {
        match load_json::<Summary>(path) {
            Ok(summary) => return summary,
            Err(e) => warn!(path = %path.display(), error = %e, "Unreadable summary; using empty stub"),
        }
    }
    Summary::empty(layer, target)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::Map;

    fn action(tool: &str, target: &str) -> Action {
        Action {
            tool: tool.to_string(),
            args: Map::new(),
            target: target.to_string(),
            priority: 5,
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_yields_empty_summary() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = HandlerRegistry::with_builtins();
        let outcome = registry
            .run_action(&action("made_up_tool", "1.2.3.4"), dir.path(), 10)
            .await?;
        assert_eq!(outcome.summary.layer, probes::UNKNOWN_TOOL_LAYER);
        assert_eq!(outcome.summary.target, "1.2.3.4");
        assert!(outcome.summary.evidence.is_empty());
        assert!(outcome.logs.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_layer_script_yields_empty_summary() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out_dir = dir.path().join("OUT");
        std::fs::create_dir_all(&out_dir)?;
        let registry = HandlerRegistry::with_builtins();
        let outcome = registry
            .run_action(&action("layer42", "1.2.3.4"), &out_dir, 10)
            .await?;
        assert_eq!(outcome.summary.layer, 42);
        assert!(outcome.summary.evidence.is_empty());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_layer_script_discovered_next_to_out_dir() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let script = dir.path().join("recon_layer1.sh");
        std::fs::write(
            &script,
            "#!/usr/bin/env bash\n\
             mkdir -p \"$OUT/layer1\"\n\
             echo '{\"layer\":1,\"target\":\"'$T'\",\"evidence\":[{\"type\":\"service\",\"port\":80,\"service\":\"http\"}]}' > \"$OUT/layer1/summary.json\"\n",
        )?;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;

        let out_dir = dir.path().join("OUT");
        std::fs::create_dir_all(&out_dir)?;

        let registry = HandlerRegistry::with_builtins();
        let outcome = registry
            .run_action(&action("layer1", "1.2.3.4"), &out_dir, 10)
            .await?;

        assert_eq!(outcome.summary.layer, 1);
        assert_eq!(outcome.summary.target, "1.2.3.4");
        assert_eq!(
            outcome.summary.evidence[0].service.as_deref(),
            Some("http")
        );
        assert!(out_dir.join("layer1/layer1.log.txt").exists());
        assert!(outcome.logs.is_some());
        Ok(())
    }
}
