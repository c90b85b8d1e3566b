// probeflow-core/src/infrastructure/fs.rs

use crate::infrastructure::error::InfrastructureError;
use chrono::Utc;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Crash-safe write path for every JSON artifact and probe log: the content
/// is staged in a hidden temp file beside the destination and moved into
/// place with a rename, so readers never observe a half-written summary or
/// report. Missing parent directories are created on demand.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir)?;
            dir
        }
        _ => Path::new("."),
    };

    // Staging inside the destination directory keeps the final rename on a
    // single filesystem.
    let mut staged = tempfile::Builder::new()
        .prefix(".probeflow-write")
        .tempfile_in(parent)?;
    staged.write_all(content.as_ref())?;
    staged
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

/// Create the fixed output sub-directories (`combined/`, `tmp/`, `artifacts/`).
pub fn ensure_dirs(out: &Path) -> Result<(), InfrastructureError> {
    for sub in ["combined", "tmp", "artifacts"] {
        std::fs::create_dir_all(out.join(sub))?;
    }
    Ok(())
}

/// UTC timestamp in the `2024-01-31T12:00:00Z` shape used by logs and rows.
pub fn utcnow_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, InfrastructureError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Pretty-printed, key-sorted JSON write. The round-trip through `Value`
/// gives sorted object keys (the default serde_json map is BTree-backed).
pub fn save_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<(), InfrastructureError> {
    let value: Value = serde_json::to_value(data)?;
    let content = serde_json::to_string_pretty(&value)?;
    atomic_write(path, content)
}

/// Append one JSON object as a single NDJSON line, creating parent
/// directories on demand. Appends rely on O_APPEND semantics.
pub fn append_ndjson(path: &Path, record: &Value) -> Result<(), InfrastructureError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Append one human-readable timeline line, prefixed `[<UTC ISO-8601 Z>] `.
pub fn append_timeline(path: &Path, line: &str) -> Result<(), InfrastructureError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "[{}] {}", utcnow_iso(), line)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_parents_and_replaces() -> Result<()> {
        let out = tempdir()?;
        // Same shape as a probe log: nested layer dir, written twice.
        let log = out.path().join("layer1").join("layer1.log.txt");

        atomic_write(&log, "first pass\n")?;
        atomic_write(&log, "second pass\n")?;

        assert_eq!(fs::read_to_string(&log)?, "second pass\n");
        // No staging file survives next to the log.
        let leftovers = fs::read_dir(out.path().join("layer1"))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".probeflow"))
            .count();
        assert_eq!(leftovers, 0);
        Ok(())
    }

    #[test]
    fn test_ensure_dirs() -> Result<()> {
        let dir = tempdir()?;
        ensure_dirs(dir.path())?;
        for sub in ["combined", "tmp", "artifacts"] {
            assert!(dir.path().join(sub).is_dir());
        }
        Ok(())
    }

    #[test]
    fn test_save_json_sorts_keys() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.json");
        save_json(&path, &json!({"zulu": 1, "alpha": 2}))?;
        let content = fs::read_to_string(&path)?;
        let alpha = content.find("alpha").unwrap();
        let zulu = content.find("zulu").unwrap();
        assert!(alpha < zulu);
        Ok(())
    }

    #[test]
    fn test_append_ndjson_creates_parents() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("deep/nested/log.ndjson");
        append_ndjson(&path, &json!({"event": "one"}))?;
        append_ndjson(&path, &json!({"event": "two"}))?;
        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0])?;
        assert_eq!(first["event"], "one");
        Ok(())
    }

    #[test]
    fn test_timeline_lines_are_timestamped() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("_timeline.txt");
        append_timeline(&path, "Scheduler start; budget=5m")?;
        let content = fs::read_to_string(&path)?;
        assert!(content.starts_with('['));
        assert!(content.contains("Z] Scheduler start; budget=5m"));
        Ok(())
    }
}
