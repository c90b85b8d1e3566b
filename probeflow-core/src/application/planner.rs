// probeflow-core/src/application/planner.rs
//
// Merges seed layer actions with evaluator output into the final plan.
// Everything the scheduler sees has already passed the scope filter here.

use crate::domain::model::Action;
use crate::domain::rules::{Rule, evaluate_rules};
use crate::domain::{Scope, Summary};
use crate::error::ProbeflowError;
use crate::infrastructure::fs::atomic_write;
use crate::infrastructure::hashing::canonical_json;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// One seed action per requested layer whose tool is inside the scope.
/// Seeds run first (priority 1).
pub fn seed_layer_actions(scope: &Scope, layers: &[u32], target: &str) -> Vec<Action> {
    layers
        .iter()
        .filter_map(|layer| {
            let tool = format!("layer{layer}");
            if !scope.allows_tool(&tool) {
                debug!(tool = %tool, "Layer tool not in scope; seed skipped");
                return None;
            }
            Some(Action {
                tool,
                args: Map::new(),
                target: target.to_string(),
                priority: 1,
            })
        })
        .collect()
}

/// Full plan: seeds, then rule-derived actions, deduplicated, then filtered
/// against the scope (tool AND target must be authorized).
pub fn build_plan(
    scope: &Scope,
    layers: &[u32],
    target: &str,
    summaries: &[Summary],
    rules: &[Rule],
) -> Vec<Action> {
    let seed = seed_layer_actions(scope, layers, target);
    let derived = evaluate_rules(rules, summaries);
    let merged = merge_actions(seed.into_iter().chain(derived));

    merged
        .into_iter()
        .filter(|action| {
            let authorized =
                scope.allows_tool(&action.tool) && scope.contains_target(&action.target);
            if !authorized {
                debug!(
                    tool = %action.tool,
                    target = %action.target,
                    "Action outside scope; dropped at planning time"
                );
            }
            authorized
        })
        .collect()
}

/// Deduplicate by `(tool, canonical args, target)`. The LAST occurrence
/// wins (so a rule-derived action overrides an identical seed), but the
/// entry keeps its first-occurrence position for stable ordering.
fn merge_actions(actions: impl IntoIterator<Item = Action>) -> Vec<Action> {
    let mut index: HashMap<(String, String, String), usize> = HashMap::new();
    let mut merged: Vec<Action> = Vec::new();

    for action in actions {
        let key = (
            action.tool.clone(),
            canonical_json(&Value::Object(action.args.clone())),
            action.target.clone(),
        );
        match index.get(&key) {
            Some(&slot) => merged[slot] = action,
            None => {
                index.insert(key, merged.len());
                merged.push(action);
            }
        }
    }

    merged
}

/// Write the human-readable plan once, before scheduling begins.
pub fn write_next_steps(out_dir: &Path, actions: &[Action]) -> Result<(), ProbeflowError> {
    let mut content = String::from("# Next Steps\n\n");
    for action in actions {
        content.push_str(&format!(
            "- [{}] {} on {} with {}\n",
            action.priority,
            action.tool,
            action.target,
            canonical_json(&Value::Object(action.args.clone()))
        ));
    }
    atomic_write(out_dir.join("next_steps.md"), content)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::model::Evidence;
    use anyhow::Result;
    use serde_json::json;

    fn scope() -> Scope {
        Scope {
            targets: vec!["1.2.3.4".to_string()],
            allowed_tools: vec![
                "layer1".to_string(),
                "layer2".to_string(),
                "http_enum".to_string(),
            ],
            time_budget_minutes: 5,
        }
    }

    fn action(tool: &str, target: &str, priority: i64) -> Action {
        Action {
            tool: tool.to_string(),
            args: Map::new(),
            target: target.to_string(),
            priority,
        }
    }

    #[test]
    fn test_seed_respects_allowed_tools() {
        let seeds = seed_layer_actions(&scope(), &[1, 2, 3, 4], "1.2.3.4");
        let tools: Vec<&str> = seeds.iter().map(|a| a.tool.as_str()).collect();
        // layer3/layer4 are not authorized, so only two seeds remain.
        assert_eq!(tools, vec!["layer1", "layer2"]);
        assert!(seeds.iter().all(|a| a.priority == 1));
    }

    #[test]
    fn test_dedup_keeps_last_occurrence_in_place() {
        let merged = merge_actions([
            action("layer1", "T", 1),
            action("layer2", "T", 1),
            action("layer1", "T", 5),
        ]);
        assert_eq!(merged.len(), 2);
        // The rule-derived duplicate overrode the seed but kept its slot.
        assert_eq!(merged[0].tool, "layer1");
        assert_eq!(merged[0].priority, 5);
        assert_eq!(merged[1].tool, "layer2");
    }

    #[test]
    fn test_dedup_ignores_args_key_order() {
        let mut a = action("http_enum", "T", 5);
        a.args.insert("port".to_string(), json!(443));
        a.args.insert("path".to_string(), json!("/"));

        let mut b = action("http_enum", "T", 3);
        b.args.insert("path".to_string(), json!("/"));
        b.args.insert("port".to_string(), json!(443));

        let merged = merge_actions([a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].priority, 3);
    }

    #[test]
    fn test_plan_filters_unauthorized_tools_and_targets() {
        let summaries = vec![Summary {
            layer: 1,
            target: "1.2.3.4".to_string(),
            evidence: vec![Evidence {
                port: Some(443),
                service: Some("https".to_string()),
                ..Evidence::of("service")
            }],
            findings: vec![],
            artifacts: vec![],
        }];
        let rules: Vec<Rule> = serde_yaml::from_str(
            r#"
- match: evidence[type == "service"]
  then:
    run:
      - tool: http_enum
      - tool: nmap_full
"#,
        )
        .unwrap();

        let plan = build_plan(&scope(), &[1], "1.2.3.4", &summaries, &rules);
        let tools: Vec<&str> = plan.iter().map(|a| a.tool.as_str()).collect();
        // nmap_full is outside allowed_tools and never reaches the plan.
        assert_eq!(tools, vec!["layer1", "http_enum"]);
    }

    #[test]
    fn test_rule_derived_duplicate_overrides_seed_priority() {
        // Literal planner-dedup scenario: identical (tool, args, target)
        // from seed (prio 1) and rules (prio 5) leaves one entry at prio 5.
        let summaries = vec![Summary {
            layer: 1,
            target: "1.2.3.4".to_string(),
            evidence: vec![Evidence::of("service")],
            findings: vec![],
            artifacts: vec![],
        }];
        let rules: Vec<Rule> = serde_yaml::from_str(
            r#"
- match: evidence[type == "service"]
  then:
    run:
      - tool: layer1
"#,
        )
        .unwrap();

        let plan = build_plan(&scope(), &[1], "1.2.3.4", &summaries, &rules);
        let layer1: Vec<&Action> = plan.iter().filter(|a| a.tool == "layer1").collect();
        assert_eq!(layer1.len(), 1);
        assert_eq!(layer1[0].priority, 5);
    }

    #[test]
    fn test_write_next_steps() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut with_args = action("http_enum", "1.2.3.4", 5);
        with_args.args.insert("port".to_string(), json!(443));
        write_next_steps(dir.path(), &[action("layer1", "1.2.3.4", 1), with_args])?;

        let content = std::fs::read_to_string(dir.path().join("next_steps.md"))?;
        assert!(content.starts_with("# Next Steps"));
        assert!(content.contains("- [1] layer1 on 1.2.3.4 with {}"));
        assert!(content.contains(r#"- [5] http_enum on 1.2.3.4 with {"port":443}"#));
        Ok(())
    }
}
