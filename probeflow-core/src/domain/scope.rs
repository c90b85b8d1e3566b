// probeflow-core/src/domain/scope.rs
//
// The authorization envelope. Nothing is planned or executed outside of it.

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Scope {
    #[validate(length(min = 1, message = "targets[] must not be empty"))]
    pub targets: Vec<String>,

    #[validate(length(min = 1, message = "allowed_tools[] must not be empty"))]
    pub allowed_tools: Vec<String>,

    #[validate(range(min = 1, message = "time_budget_minutes must be > 0"))]
    pub time_budget_minutes: u64,
}

impl Scope {
    pub fn contains_target(&self, target: &str) -> bool {
        self.targets.iter().any(|t| t == target)
    }

    pub fn allows_tool(&self, tool: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool)
    }

    /// Preflight check used by every subcommand before any state is written.
    pub fn require_target(&self, target: &str) -> Result<(), DomainError> {
        if self.contains_target(target) {
            Ok(())
        } else {
            Err(DomainError::TargetOutOfScope(target.to_string()))
        }
    }
}
