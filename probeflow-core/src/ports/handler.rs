// probeflow-core/src/ports/handler.rs

// This file defines what the scheduler needs from a probe, without knowing
// how the probe is implemented. The scheduler only ever sees this contract;
// curl, nc, openssl and the shell-script layers live behind it.

use crate::domain::model::{Action, ProbeOutcome};
use crate::error::ProbeflowError;
use async_trait::async_trait;
use std::path::Path;

/// Discriminated tool name. Parsing up front avoids stringly-typed dispatch:
/// a `layer` prefix with a non-numeric suffix is just a named tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    /// `layer<N>` selects the external shell-script adapter for that layer.
    LayerScript(u32),
    /// Anything else is looked up in the handler registry.
    Named(String),
}

impl ToolKind {
    pub fn parse(tool: &str) -> Self {
        if let Some(suffix) = tool.strip_prefix("layer") {
            if !suffix.is_empty() {
                if let Ok(layer) = suffix.parse::<u32>() {
                    return ToolKind::LayerScript(layer);
                }
            }
        }
        ToolKind::Named(tool.to_string())
    }
}

#[async_trait]
pub trait ProbeHandler: Send + Sync {
    /// Registry key for this handler.
    fn name(&self) -> &'static str;

    /// Execute one action. `timeout_secs` is the per-task wall-clock ceiling;
    /// handlers may apply tighter internal caps.
    async fn run(
        &self,
        action: &Action,
        out_dir: &Path,
        timeout_secs: u64,
    ) -> Result<ProbeOutcome, ProbeflowError>;
}
