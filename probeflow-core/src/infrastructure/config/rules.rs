// probeflow-core/src/infrastructure/config/rules.rs

use crate::domain::error::DomainError;
use crate::domain::rules::Rule;
use crate::error::ProbeflowError;
use std::path::Path;
use tracing::{info, instrument};

/// Parse a YAML rule document. The document must be a list; an empty
/// document is an empty rule set.
pub fn parse_rules(content: &str) -> Result<Vec<Rule>, ProbeflowError> {
    if content.trim().is_empty() {
        return Ok(vec![]);
    }
    let rules: Vec<Rule> = serde_yaml::from_str(content).map_err(|e| {
        ProbeflowError::Domain(DomainError::RuleSyntax(format!(
            "rules file must be a YAML list of rule objects: {e}"
        )))
    })?;
    Ok(rules)
}

#[instrument(skip(path))]
pub fn load_rules(path: &Path) -> Result<Vec<Rule>, ProbeflowError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ProbeflowError::Domain(DomainError::RuleSyntax(format!(
            "cannot read rules file {}: {e}",
            path.display()
        )))
    })?;
    let rules = parse_rules(&content)?;
    info!(path = %path.display(), count = rules.len(), "Rules loaded");
    Ok(rules)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_parses_list_with_unknown_keys() -> Result<()> {
        let rules = parse_rules(
            r#"
- description: annotation ignored by the engine
  match: evidence[type == "service"]
  then:
    run:
      - tool: http_enum
        with:
          port: 443
"#,
        )?;
        assert_eq!(rules.len(), 1);
        assert!(rules[0].is_runnable());
        assert_eq!(
            rules[0].then.as_ref().unwrap().run[0].tool.as_deref(),
            Some("http_enum")
        );
        Ok(())
    }

    #[test]
    fn test_empty_document_is_empty_rule_set() -> Result<()> {
        assert!(parse_rules("")?.is_empty());
        assert!(parse_rules("   \n")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_mapping_document_rejected() {
        let result = parse_rules("match: evidence[x]\n");
        assert!(matches!(
            result,
            Err(ProbeflowError::Domain(DomainError::RuleSyntax(_)))
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_rules(Path::new("/nonexistent/rules.yaml"));
        assert!(matches!(
            result,
            Err(ProbeflowError::Domain(DomainError::RuleSyntax(_)))
        ));
    }
}
