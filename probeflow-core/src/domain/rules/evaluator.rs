// probeflow-core/src/domain/rules/evaluator.rs
//
// Turns rules + loaded summaries into candidate actions. Per-record failures
// (rejected expression nodes, type mismatches) skip the record and never
// abort the evaluation run.

use crate::domain::model::{Action, as_record};
use crate::domain::rules::expr::parse_match_expr;
use crate::domain::rules::rule::Rule;
use crate::domain::Summary;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

enum Selector<'a> {
    Evidence(&'a str),
    Findings(&'a str),
}

/// Split `evidence[<expr>]` / `findings[<expr>]` into selector + inner expr.
fn parse_selector(match_expr: &str) -> Option<Selector<'_>> {
    if let Some(inner) = match_expr
        .strip_prefix("evidence[")
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return Some(Selector::Evidence(inner));
    }
    if let Some(inner) = match_expr
        .strip_prefix("findings[")
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return Some(Selector::Findings(inner));
    }
    None
}

fn matched_records<'a>(
    inner: &str,
    records: &'a [Map<String, Value>],
) -> Vec<&'a Map<String, Value>> {
    let expr = match parse_match_expr(inner) {
        Ok(expr) => expr,
        Err(e) => {
            debug!(expr = inner, error = %e, "Match expression rejected; rule yields nothing");
            return vec![];
        }
    };
    records
        .iter()
        .filter(|record| match expr.matches(record) {
            Ok(matched) => matched,
            Err(e) => {
                debug!(error = %e, "Record skipped during rule evaluation");
                false
            }
        })
        .collect()
}

/// Evaluate every rule against every loaded summary and emit actions.
///
/// For each rule with at least one matched record, one action is emitted per
/// `then.run` entry per distinct summary target (sorted, for determinism).
/// String values in `with` are templated from `{target}` and the fields of
/// the FIRST matched record.
pub fn evaluate_rules(rules: &[Rule], summaries: &[Summary]) -> Vec<Action> {
    let mut all_evidence: Vec<Map<String, Value>> = Vec::new();
    let mut all_findings: Vec<Map<String, Value>> = Vec::new();
    let mut targets: BTreeSet<String> = BTreeSet::new();

    for summary in summaries {
        targets.insert(summary.target.clone());
        all_evidence.extend(summary.evidence.iter().map(as_record));
        all_findings.extend(summary.findings.iter().map(as_record));
    }

    let mut actions = Vec::new();

    for rule in rules {
        if !rule.is_runnable() {
            continue;
        }
        let match_expr = rule.match_expr.as_deref().unwrap_or_default();
        let run_list = rule.then.as_ref().map(|t| t.run.as_slice()).unwrap_or(&[]);

        let matched = match parse_selector(match_expr) {
            Some(Selector::Evidence(inner)) => matched_records(inner, &all_evidence),
            Some(Selector::Findings(inner)) => matched_records(inner, &all_findings),
            None => {
                debug!(
                    expr = match_expr,
                    "Match selector must be evidence[...] or findings[...]; rule skipped"
                );
                continue;
            }
        };

        let Some(first) = matched.first() else {
            continue;
        };

        for target in &targets {
            for run in run_list {
                let Some(tool) = run.tool.as_deref() else {
                    continue;
                };
                let mut args = Map::new();
                for (key, value) in &run.with {
                    let templated = match value {
                        Value::String(s) => Value::String(format_template(s, target, first)),
                        other => other.clone(),
                    };
                    args.insert(key.clone(), templated);
                }
                actions.push(Action {
                    tool: tool.to_string(),
                    args,
                    target: target.clone(),
                    priority: 5,
                });
            }
        }
    }

    actions
}

/// Substitute `{target}` and record-field placeholders, one placeholder at a
/// time. Unknown placeholders (and null fields) stay verbatim; `{{`/`}}`
/// escape a literal brace; an unbalanced brace leaves the whole string
/// untouched.
fn format_template(template: &str, target: &str, record: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return template.to_string();
                }
                match lookup(&name, target, record) {
                    Some(rendered) => out.push_str(&rendered),
                    None => {
                        out.push('{');
                        out.push_str(&name);
                        out.push('}');
                    }
                }
            }
            '}' => return template.to_string(),
            c => out.push(c),
        }
    }

    out
}

fn lookup(name: &str, target: &str, record: &Map<String, Value>) -> Option<String> {
    if name == "target" {
        return Some(target.to_string());
    }
    match record.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        // A null field is absent data; substituting it is never useful.
        Some(Value::Null) | None => None,
        Some(other) => serde_json::to_string(other).ok(),
    }
}
