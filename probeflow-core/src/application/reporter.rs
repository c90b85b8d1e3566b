// probeflow-core/src/application/reporter.rs
//
// Aggregates every loaded summary into one combined model, then renders it
// twice: machine-facing JSON (pretty, key-sorted) and a single-file HTML
// report templated with minijinja. The JSON layout is contract; the HTML is
// human-facing only.

use crate::domain::Summary;
use crate::domain::model::as_record;
use crate::error::ProbeflowError;
use crate::infrastructure::fs::{atomic_write, save_json};
use chrono::Utc;
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct CombinedModel {
    /// Sorted unique union of all summary targets.
    pub targets: Vec<String>,
    /// Evidence entries whose `type == "service"`; always a subset of
    /// `evidence`.
    pub services: Vec<Value>,
    pub findings: Vec<Value>,
    pub artifacts: Vec<Value>,
    /// Every evidence record, annotated with its source `target`.
    pub evidence: Vec<Value>,
}

pub fn build_combined_model(summaries: &[Summary]) -> CombinedModel {
    let targets: BTreeSet<String> = summaries.iter().map(|s| s.target.clone()).collect();

    let mut evidence = Vec::new();
    let mut services = Vec::new();
    let mut findings = Vec::new();
    let mut artifacts = Vec::new();

    for summary in summaries {
        for item in &summary.evidence {
            let mut record = as_record(item);
            record.insert("target".to_string(), Value::String(summary.target.clone()));
            let record = Value::Object(record);
            if item.r#type == "service" {
                services.push(record.clone());
            }
            evidence.push(record);
        }
        for item in &summary.findings {
            let mut record = as_record(item);
            record.insert("target".to_string(), Value::String(summary.target.clone()));
            findings.push(Value::Object(record));
        }
        for item in &summary.artifacts {
            let mut record = as_record(item);
            record.insert("target".to_string(), Value::String(summary.target.clone()));
            artifacts.push(Value::Object(record));
        }
    }

    CombinedModel {
        targets: targets.into_iter().collect(),
        services,
        findings,
        artifacts,
        evidence,
    }
}

// --- HTML RENDERING ---

// Display DTOs: nulls become empty cells instead of leaking "null" into the
// report.

#[derive(Serialize)]
struct ServiceRow {
    target: String,
    service: String,
    port: String,
    proto: String,
    product: String,
    version: String,
}

#[derive(Serialize)]
struct FindingRow {
    target: String,
    id: String,
    title: String,
    severity: String,
}

#[derive(Serialize)]
struct EvidenceRow {
    target: String,
    kind: String,
    detail: String,
}

fn cell(record: &Value, key: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn service_rows(model: &CombinedModel) -> Vec<ServiceRow> {
    model
        .services
        .iter()
        .map(|s| ServiceRow {
            target: cell(s, "target"),
            service: cell(s, "service"),
            port: cell(s, "port"),
            proto: cell(s, "proto"),
            product: cell(s, "product"),
            version: cell(s, "version"),
        })
        .collect()
}

fn finding_rows(model: &CombinedModel) -> Vec<FindingRow> {
    model
        .findings
        .iter()
        .map(|f| FindingRow {
            target: cell(f, "target"),
            id: cell(f, "id"),
            title: cell(f, "title"),
            severity: cell(f, "severity"),
        })
        .collect()
}

fn evidence_rows(model: &CombinedModel) -> Vec<EvidenceRow> {
    model
        .evidence
        .iter()
        .map(|e| EvidenceRow {
            target: cell(e, "target"),
            kind: cell(e, "type"),
            detail: e.to_string(),
        })
        .collect()
}

const HTML_TEMPLATE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Probeflow Combined Report</title>
<style>
body { font-family: system-ui, -apple-system, Segoe UI, Roboto, sans-serif; margin: 2rem; }
h1 { margin-top: 0; }
table { border-collapse: collapse; width: 100%; margin-bottom: 1.5rem; }
th, td { border: 1px solid #ddd; padding: 6px 8px; font-size: 14px; }
th { background: #f2f2f2; text-align: left; }
code { background: #f5f5f5; padding: 2px 4px; }
.small { color: #666; font-size: 12px; }
</style>
</head><body>
<h1>Probeflow Combined Report</h1>
<p class="small">Generated: {{ generated }}</p>

<h2>Targets</h2>
<ul>
{% for t in targets %}<li>{{ t }}</li>{% endfor %}
</ul>

<h2>Services</h2>
<table><thead><tr><th>Target</th><th>Service</th><th>Port</th><th>Proto</th><th>Product</th><th>Version</th></tr></thead>
<tbody>
{% for s in services %}
  <tr><td>{{ s.target }}</td><td>{{ s.service }}</td><td>{{ s.port }}</td><td>{{ s.proto }}</td><td>{{ s.product }}</td><td>{{ s.version }}</td></tr>
{% endfor %}
</tbody></table>

<h2>Findings</h2>
<table><thead><tr><th>Target</th><th>ID</th><th>Title</th><th>Severity</th></tr></thead>
<tbody>
{% for f in findings %}
  <tr><td>{{ f.target }}</td><td>{{ f.id }}</td><td>{{ f.title }}</td><td>{{ f.severity }}</td></tr>
{% endfor %}
</tbody></table>

<h2>Evidence</h2>
<table><thead><tr><th>Target</th><th>Type</th><th>Detail</th></tr></thead>
<tbody>
{% for e in evidence %}
  <tr><td>{{ e.target }}</td><td>{{ e.kind }}</td><td><code>{{ e.detail }}</code></td></tr>
{% endfor %}
</tbody></table>
</body></html>
"#;

/// Write `combined_report.json` and `combined_report.html` under
/// `<out>/combined/`.
pub fn render_reports(out_dir: &Path, model: &CombinedModel) -> Result<(), ProbeflowError> {
    let combined_dir = out_dir.join("combined");
    std::fs::create_dir_all(&combined_dir)?;

    save_json(&combined_dir.join("combined_report.json"), model)?;

    let mut env = Environment::new();
    env.add_template("report", HTML_TEMPLATE)
        .map_err(crate::infrastructure::error::InfrastructureError::TemplateError)?;
    let html = env
        .get_template("report")
        .and_then(|tmpl| {
            tmpl.render(context! {
                generated => Utc::now().to_rfc3339(),
                targets => &model.targets,
                services => service_rows(model),
                findings => finding_rows(model),
                evidence => evidence_rows(model),
            })
        })
        .map_err(crate::infrastructure::error::InfrastructureError::TemplateError)?;
    atomic_write(combined_dir.join("combined_report.html"), html)?;

    info!(path = %combined_dir.display(), "Combined report rendered");
    Ok(())
}
