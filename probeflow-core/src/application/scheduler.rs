// probeflow-core/src/application/scheduler.rs
//
// The drain loop is the only scheduling authority. It persists the plan,
// then repeatedly fetches a batch of pending tasks and dispatches them,
// until the budget deadline passes or nothing is pending. All task-store
// writes happen on the loop itself, between stream polls; handler futures
// never touch shared mutable state. The budget is enforced only between
// batches, so an in-flight task always finishes under its own timeout.

use crate::domain::model::{Action, TaskStatus};
use crate::error::ProbeflowError;
use crate::infrastructure::adapters::HandlerRegistry;
use crate::infrastructure::fs::{append_ndjson, append_timeline, save_json, utcnow_iso};
use crate::infrastructure::state::StateStore;
use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub time_budget_minutes: u64,
    pub max_parallel: usize,
    pub timeout_per_task: u64,
    pub rate_per_sec: f64,
}

pub async fn run_scheduler(
    out_dir: &Path,
    planned: &[Action],
    config: &SchedulerConfig,
    registry: &HandlerRegistry,
) -> Result<(), ProbeflowError> {
    let store = StateStore::open(&out_dir.join("_state.sqlite"))?;
    for action in planned {
        store.upsert(&action.tool, &action.args, &action.target, action.priority)?;
    }

    let deadline = Instant::now() + Duration::from_secs(config.time_budget_minutes * 60);
    let timeline = out_dir.join("_timeline.txt");
    let master_log = out_dir.join("_master_log.ndjson");
    let max_parallel = config.max_parallel.max(1);

    append_timeline(
        &timeline,
        &format!("Scheduler start; budget={}m", config.time_budget_minutes),
    )?;

    while Instant::now() < deadline {
        let batch = store.get_pending(max_parallel)?;
        if batch.is_empty() {
            break;
        }
        debug!(batch = batch.len(), "Dispatching pending tasks");

        for task in &batch {
            store.set_status(task.id, TaskStatus::Running, None)?;
            append_ndjson(
                &master_log,
                &json!({"ts": utcnow_iso(), "event": "task_start", "task": task}),
            )?;
        }

        let mut completions = futures::stream::iter(batch.into_iter().map(|task| {
            let action = task.to_action();
            async move {
                let result = registry
                    .run_action(&action, out_dir, config.timeout_per_task)
                    .await;
                (task, result)
            }
        }))
        .buffer_unordered(max_parallel);

        while let Some((task, result)) = completions.next().await {
            match result {
                Ok(outcome) => {
                    let snapshot = out_dir
                        .join("combined")
                        .join(format!("summary_{}_{}.json", task.id, Utc::now().timestamp()));
                    save_json(&snapshot, &outcome.summary)?;
                    store.set_status(task.id, TaskStatus::Done, outcome.logs.as_deref())?;
                    append_ndjson(
                        &master_log,
                        &json!({
                            "ts": utcnow_iso(),
                            "event": "task_done",
                            "task_id": task.id,
                            "logs": outcome.logs,
                        }),
                    )?;
                }
                Err(e) => {
                    store.set_status(task.id, TaskStatus::Error, None)?;
                    append_ndjson(
                        &master_log,
                        &json!({
                            "ts": utcnow_iso(),
                            "event": "task_error",
                            "task_id": task.id,
                            "error": e.to_string(),
                        }),
                    )?;
                }
            }
            if config.rate_per_sec > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(1.0 / config.rate_per_sec)).await;
            }
        }
    }

    append_timeline(&timeline, "Scheduler end")?;
    info!("Scheduler drained");
    Ok(())
}
