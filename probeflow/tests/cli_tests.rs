use anyhow::Result;
use assert_cmd::prelude::*;
use probeflow_core::domain::model::TaskStatus;
use probeflow_core::infrastructure::state::StateStore;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Abstraction for managing the probeflow test environment.
struct ProbeflowTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

const SCOPE: &str =
    r#"{"targets":["1.2.3.4"],"allowed_tools":["layer1","http_enum"],"time_budget_minutes":5}"#;

impl ProbeflowTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().to_path_buf();
        Ok(Self { _tmp: tmp, root })
    }

    fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    #[cfg(unix)]
    fn write_layer_script(&self, layer: u32, body: &str) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let path = self.root.join(format!("recon_layer{layer}.sh"));
        std::fs::write(&path, body)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(())
    }

    fn probeflow(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("probeflow"));
        cmd.current_dir(&self.root);
        cmd.env("AUTH_OK", "1");
        cmd
    }

    fn out(&self) -> PathBuf {
        self.root.join("out")
    }
}

#[test]
fn test_auth_gate_refuses_without_env() -> Result<()> {
    let env = ProbeflowTestEnv::new()?;
    env.write_file("scope.json", SCOPE)?;

    let mut cmd = env.probeflow();
    cmd.env_remove("AUTH_OK");
    cmd.args(["run", "--target", "1.2.3.4", "--scope", "scope.json", "--out", "out"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("AUTH_OK"));

    // Preflight failed: nothing was written.
    assert!(!env.out().exists());
    Ok(())
}

#[test]
fn test_target_outside_scope_is_refused() -> Result<()> {
    let env = ProbeflowTestEnv::new()?;
    env.write_file("scope.json", SCOPE)?;

    env.probeflow()
        .args(["run", "--target", "10.9.9.9", "--scope", "scope.json", "--out", "out"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("not listed in the scope targets"));
    Ok(())
}

#[test]
fn test_malformed_scope_is_refused() -> Result<()> {
    let env = ProbeflowTestEnv::new()?;
    env.write_file(
        "scope.json",
        r#"{"targets":[],"allowed_tools":["layer1"],"time_budget_minutes":5}"#,
    )?;

    env.probeflow()
        .args(["run", "--target", "1.2.3.4", "--scope", "scope.json", "--out", "out"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("targets"));
    Ok(())
}

#[test]
fn test_plan_prints_seeded_actions() -> Result<()> {
    let env = ProbeflowTestEnv::new()?;
    env.write_file("scope.json", SCOPE)?;

    // No summaries on disk yet, so the plan is exactly the layer1 seed.
    env.probeflow()
        .args([
            "plan",
            "--target",
            "1.2.3.4",
            "--scope",
            "scope.json",
            "--out",
            "out",
            "--layers",
            "1,2",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains(r#""tool": "layer1""#))
        .stdout(predicates::str::contains("Planned actions: 1"));
    Ok(())
}

#[cfg(unix)]
const LAYER1_SCRIPT: &str = "#!/usr/bin/env bash\n\
mkdir -p \"$OUT/layer1\"\n\
echo '{\"layer\":1,\"target\":\"'$T'\",\"evidence\":[{\"type\":\"service\",\"port\":80,\"service\":\"http\"}]}' > \"$OUT/layer1/summary.json\"\n";

#[cfg(unix)]
#[test]
fn test_run_executes_layer_script_end_to_end() -> Result<()> {
    let env = ProbeflowTestEnv::new()?;
    env.write_file("scope.json", SCOPE)?;
    env.write_file("rules.yaml", "[]")?;
    env.write_layer_script(1, LAYER1_SCRIPT)?;

    env.probeflow()
        .args([
            "run",
            "--target",
            "1.2.3.4",
            "--scope",
            "scope.json",
            "--out",
            "out",
            "--layers",
            "1",
            "--rules",
            "rules.yaml",
            "--timeout",
            "30",
        ])
        .assert()
        .success();

    let out = env.out();
    assert!(out.join("next_steps.md").exists());
    assert!(out.join("_state.sqlite").exists());
    assert!(out.join("layer1/summary.json").exists());

    let timeline = std::fs::read_to_string(out.join("_timeline.txt"))?;
    assert!(timeline.contains("Run start"));
    assert!(timeline.contains("Scheduler start; budget=5m"));
    assert!(timeline.contains("Run end"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("combined/combined_report.json"))?)?;
    assert_eq!(report["targets"], serde_json::json!(["1.2.3.4"]));
    assert_eq!(report["services"].as_array().map(Vec::len), Some(1));
    assert!(out.join("combined/combined_report.html").exists());

    let store = StateStore::open(&out.join("_state.sqlite"))?;
    let tasks = store.get_all()?;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Done);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_rerun_is_idempotent() -> Result<()> {
    let env = ProbeflowTestEnv::new()?;
    env.write_file("scope.json", SCOPE)?;
    env.write_file("rules.yaml", "[]")?;
    env.write_layer_script(1, LAYER1_SCRIPT)?;

    let run = |env: &ProbeflowTestEnv| {
        env.probeflow()
            .args([
                "run",
                "--target",
                "1.2.3.4",
                "--scope",
                "scope.json",
                "--out",
                "out",
                "--layers",
                "1",
                "--rules",
                "rules.yaml",
            ])
            .assert()
            .success();
    };

    run(&env);
    let store = StateStore::open(&env.out().join("_state.sqlite"))?;
    let first = store.get_all()?;
    drop(store);

    run(&env);
    let store = StateStore::open(&env.out().join("_state.sqlite"))?;
    let second = store.get_all()?;

    // Same plan, same rows: ids and terminal states are stable.
    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(second[0].status, TaskStatus::Done);

    // The second run dispatched nothing, so no new snapshot appeared.
    let snapshots = std::fs::read_dir(env.out().join("combined"))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("summary_"))
        .count();
    assert_eq!(snapshots, 1);
    Ok(())
}
