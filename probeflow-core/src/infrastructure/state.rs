// probeflow-core/src/infrastructure/state.rs
//
// Durable task queue over SQLite. Rows are keyed by the content hash of
// {tool, args, target}; inserting the same logical action twice never
// creates a duplicate row and never resets its status, which is what makes
// replanning and `resume` idempotent.

use crate::domain::model::{TaskRecord, TaskStatus};
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::utcnow_iso;
use crate::infrastructure::hashing::{canonical_json, task_hash};
use rusqlite::{Connection, params};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hash TEXT UNIQUE NOT NULL,
    tool TEXT NOT NULL,
    args_json TEXT NOT NULL,
    target TEXT NOT NULL,
    priority INTEGER NOT NULL,
    status TEXT NOT NULL,
    logs_path TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_status_priority ON tasks(status, priority);
";

/// Single-writer task store. Every operation is one atomic statement.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open or create the store at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, InfrastructureError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert-if-absent keyed by the content hash; returns the row id.
    /// Existing rows keep their status AND their priority.
    pub fn upsert(
        &self,
        tool: &str,
        args: &Map<String, Value>,
        target: &str,
        priority: i64,
    ) -> Result<i64, InfrastructureError> {
        let hash = task_hash(tool, args, target);
        let args_json = canonical_json(&Value::Object(args.clone()));
        let now = utcnow_iso();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO tasks(hash, tool, args_json, target, priority, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)",
            params![hash, tool, args_json, target, priority, now],
        )?;
        if inserted == 0 {
            debug!(tool, target, "Task already known; keeping existing row");
        }
        let id: i64 =
            self.conn
                .query_row("SELECT id FROM tasks WHERE hash = ?1", params![hash], |row| {
                    row.get(0)
                })?;
        Ok(id)
    }

    /// Up to `limit` pending rows, ordered `(priority ASC, id ASC)`.
    pub fn get_pending(&self, limit: usize) -> Result<Vec<TaskRecord>, InfrastructureError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, hash, tool, args_json, target, priority, status, logs_path \
             FROM tasks WHERE status = 'pending' \
             ORDER BY priority ASC, id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], raw_row)?;
        collect_records(rows)
    }

    /// Atomic status transition. A `None` logs path preserves the stored one.
    pub fn set_status(
        &self,
        id: i64,
        status: TaskStatus,
        logs_path: Option<&str>,
    ) -> Result<(), InfrastructureError> {
        self.conn.execute(
            "UPDATE tasks SET status = ?2, updated_at = ?3, logs_path = COALESCE(?4, logs_path) \
             WHERE id = ?1",
            params![id, status.as_str(), utcnow_iso(), logs_path],
        )?;
        Ok(())
    }

    /// Every row ordered by id, for debugging and resumption.
    pub fn get_all(&self) -> Result<Vec<TaskRecord>, InfrastructureError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, hash, tool, args_json, target, priority, status, logs_path \
             FROM tasks ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], raw_row)?;
        collect_records(rows)
    }
}

type RawRow = (i64, String, String, String, String, i64, String, Option<String>);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn collect_records<I>(rows: I) -> Result<Vec<TaskRecord>, InfrastructureError>
where
    I: Iterator<Item = rusqlite::Result<RawRow>>,
{
    let mut records = Vec::new();
    for row in rows {
        let (id, hash, tool, args_json, target, priority, status, logs_path) = row?;
        let args = decode_args(&args_json)?;
        let status = TaskStatus::parse(&status).ok_or_else(|| {
            InfrastructureError::ConfigError(format!("unknown task status '{status}' in store"))
        })?;
        records.push(TaskRecord {
            id,
            hash,
            tool,
            args,
            target,
            priority,
            status,
            logs_path,
        });
    }
    Ok(records)
}

/// Decode the JSON args column back into a mapping.
fn decode_args(args_json: &str) -> Result<Map<String, Value>, InfrastructureError> {
    match serde_json::from_str(args_json)? {
        Value::Object(map) => Ok(map),
        _ => Err(InfrastructureError::ConfigError(
            "task args column is not a JSON object".to_string(),
        )),
    }
}
