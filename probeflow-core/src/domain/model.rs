// probeflow-core/src/domain/model.rs
//
// Immutable value shapes shared across the engine. Optional fields serialize
// as explicit nulls so that a record converted to a JSON map always exposes
// every field name to the match-expression evaluator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One structured observation produced by a probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Free-form category: "service", "http-head", "tls-cert", "dns-record"...
    pub r#type: String,
    #[serde(default)]
    pub port: Option<i64>,
    #[serde(default)]
    pub proto: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Evidence {
    /// A bare observation of the given category; fill in fields with struct
    /// update syntax.
    pub fn of(kind: impl Into<String>) -> Self {
        Self {
            r#type: kind.into(),
            port: None,
            proto: None,
            service: None,
            product: None,
            version: None,
            name: None,
            url: None,
        }
    }
}

/// A conclusion derived from evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub title: String,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default)]
    pub evidence_ref: Option<String>,
}

fn default_severity() -> String {
    "info".to_string()
}

/// A file produced by a probe, relative to the output root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: String,
    pub path: String,
}

/// Per-layer observation bundle for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub layer: i64,
    pub target: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl Summary {
    /// An empty bundle, used when a probe produced nothing readable.
    pub fn empty(layer: i64, target: impl Into<String>) -> Self {
        Self {
            layer,
            target: target.into(),
            evidence: vec![],
            findings: vec![],
            artifacts: vec![],
        }
    }
}

/// A declarative, not-yet-executed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    pub target: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

fn default_priority() -> i64 {
    5
}

/// Handler output: one summary plus any artifact/log paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub summary: Summary,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub logs: Option<String>,
}

impl ProbeOutcome {
    pub fn empty(layer: i64, target: impl Into<String>) -> Self {
        Self {
            summary: Summary::empty(layer, target),
            artifacts: vec![],
            logs: None,
        }
    }
}

/// Lifecycle of a persisted task. Transitions only move forward:
/// pending -> running -> done | error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "running" => Some(TaskStatus::Running),
            "done" => Some(TaskStatus::Done),
            "error" => Some(TaskStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted, content-addressed action with its lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: i64,
    pub hash: String,
    pub tool: String,
    pub args: Map<String, Value>,
    pub target: String,
    pub priority: i64,
    pub status: TaskStatus,
    #[serde(default)]
    pub logs_path: Option<String>,
}

impl TaskRecord {
    /// Rebuild the planned action this row was created from.
    pub fn to_action(&self) -> Action {
        Action {
            tool: self.tool.clone(),
            args: self.args.clone(),
            target: self.target.clone(),
            priority: self.priority,
        }
    }
}

/// Flatten a serializable record into a JSON map for rule evaluation.
pub fn as_record<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
