// probeflow-core/src/domain/rules/rule.rs

use serde::Deserialize;
use serde_json::{Map, Value};

/// One declarative rule: a match selector plus the actions to emit.
/// Unknown top-level keys are ignored by serde, so rule documents can carry
/// annotations (descriptions, ticket links) without breaking the loader.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rule {
    #[serde(rename = "match", default)]
    pub match_expr: Option<String>,

    #[serde(default)]
    pub then: Option<ThenBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThenBlock {
    #[serde(default)]
    pub run: Vec<RunSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSpec {
    #[serde(default)]
    pub tool: Option<String>,

    #[serde(default)]
    pub with: Map<String, Value>,
}

impl Rule {
    /// Rules without a match string or without runnable entries are inert.
    pub fn is_runnable(&self) -> bool {
        let has_match = self
            .match_expr
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty());
        let has_run = self.then.as_ref().is_some_and(|t| !t.run.is_empty());
        has_match && has_run
    }
}
