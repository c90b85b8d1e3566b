// probeflow-core/src/infrastructure/config/scope.rs

use crate::domain::Scope;
use crate::infrastructure::error::InfrastructureError;
use std::path::Path;
use tracing::{info, instrument};
use validator::Validate;

/// Load and validate the authorization scope. Any missing, empty or invalid
/// field is a preflight failure: nothing downstream runs without a scope.
#[instrument(skip(path))]
pub fn load_scope(path: &Path) -> Result<Scope, InfrastructureError> {
    if !path.exists() {
        return Err(InfrastructureError::ScopeNotFound(
            path.display().to_string(),
        ));
    }
    let content = std::fs::read_to_string(path)?;
    let scope: Scope = serde_json::from_str(&content).map_err(|e| {
        InfrastructureError::ConfigError(format!(
            "scope file must be a JSON object with targets[], allowed_tools[] and time_budget_minutes: {e}"
        ))
    })?;

    scope.validate().map_err(|e| {
        InfrastructureError::ConfigError(format!(
            "scope file must include targets[], allowed_tools[], and time_budget_minutes > 0 ({e})"
        ))
    })?;

    info!(
        targets = scope.targets.len(),
        tools = scope.allowed_tools.len(),
        budget_minutes = scope.time_budget_minutes,
        "Scope loaded"
    );
    Ok(scope)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn write_scope(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("scope.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_valid_scope_loads() -> Result<()> {
        let dir = tempdir()?;
        let path = write_scope(
            &dir,
            r#"{"targets":["1.2.3.4"],"allowed_tools":["layer1","http_enum"],"time_budget_minutes":5}"#,
        );
        let scope = load_scope(&path)?;
        assert!(scope.contains_target("1.2.3.4"));
        assert!(scope.allows_tool("http_enum"));
        assert_eq!(scope.time_budget_minutes, 5);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let result = load_scope(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(InfrastructureError::ScopeNotFound(_))));
    }

    #[test]
    fn test_empty_targets_rejected() {
        let dir = tempdir().unwrap();
        let path = write_scope(
            &dir,
            r#"{"targets":[],"allowed_tools":["layer1"],"time_budget_minutes":5}"#,
        );
        assert!(matches!(
            load_scope(&path),
            Err(InfrastructureError::ConfigError(_))
        ));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let dir = tempdir().unwrap();
        let path = write_scope(
            &dir,
            r#"{"targets":["1.2.3.4"],"allowed_tools":["layer1"],"time_budget_minutes":0}"#,
        );
        assert!(matches!(
            load_scope(&path),
            Err(InfrastructureError::ConfigError(_))
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        let dir = tempdir().unwrap();
        let path = write_scope(&dir, r#"["not","an","object"]"#);
        assert!(matches!(
            load_scope(&path),
            Err(InfrastructureError::ConfigError(_))
        ));
    }
}
