// probeflow-core/src/infrastructure/hashing.rs
//
// Stable content hashing. The canonical form is serde_json's compact output
// of a `Value`: the default map is BTree-backed, so object keys are emitted
// sorted with no whitespace. The crate must not enable serde_json's
// `preserve_order` feature, or task hashes would stop being stable.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// Compact, key-sorted JSON encoding of a value.
pub fn canonical_json(value: &Value) -> String {
    // `Value::Object` iterates in key order; nested objects too.
    value.to_string()
}

/// Hex SHA-256 of the canonical JSON encoding.
pub fn sha256_canonical(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Content hash identifying a task: stable over `{tool, args, target}`
/// regardless of the insertion order of `args` keys.
pub fn task_hash(tool: &str, args: &Map<String, Value>, target: &str) -> String {
    sha256_canonical(&json!({
        "args": Value::Object(args.clone()),
        "target": target,
        "tool": tool,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_canonical_json_sorts_keys_compactly() {
        let value = json!({"zulu": 1, "alpha": {"beta": 2, "aaa": 3}});
        assert_eq!(
            canonical_json(&value),
            r#"{"alpha":{"aaa":3,"beta":2},"zulu":1}"#
        );
    }

    #[test]
    fn test_task_hash_ignores_args_key_order() {
        let mut a = Map::new();
        a.insert("port".to_string(), json!(443));
        a.insert("url".to_string(), json!("https://x/"));

        let mut b = Map::new();
        b.insert("url".to_string(), json!("https://x/"));
        b.insert("port".to_string(), json!(443));

        assert_eq!(
            task_hash("http_enum", &a, "1.2.3.4"),
            task_hash("http_enum", &b, "1.2.3.4")
        );
    }

    #[test]
    fn test_task_hash_discriminates_fields() {
        let args = as_map(json!({"port": 443}));
        let base = task_hash("http_enum", &args, "1.2.3.4");
        assert_ne!(base, task_hash("tls_probe", &args, "1.2.3.4"));
        assert_ne!(base, task_hash("http_enum", &args, "4.3.2.1"));
        assert_ne!(
            base,
            task_hash("http_enum", &as_map(json!({"port": 80})), "1.2.3.4")
        );
    }

    #[test]
    fn test_hash_is_hex_sha256_shaped() {
        let h = task_hash("layer1", &Map::new(), "1.2.3.4");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
