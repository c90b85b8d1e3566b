// probeflow-core/src/infrastructure/adapters/probes.rs
//
// Built-in named probes. Each one shells out through safe_run, logs the
// redacted output under its own pseudo-layer directory, and turns what it
// saw into evidence. A probe that fails to run logs the failure and returns
// an empty evidence list; only the surrounding dispatch can fail a task.

use crate::domain::model::{Action, Evidence, ProbeOutcome, Summary};
use crate::error::ProbeflowError;
use crate::infrastructure::fs::atomic_write;
use crate::infrastructure::process::{CommandLine, RunOptions, safe_run};
use crate::ports::ProbeHandler;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

// Pseudo-layer numbers for handler-produced summaries. Real layers are
// small integers owned by the shell-script adapters.
pub const WEB_PSEUDO_LAYER: i64 = 99;
pub const SSH_PSEUDO_LAYER: i64 = 98;
pub const UNKNOWN_TOOL_LAYER: i64 = 97;
pub const DNS_PSEUDO_LAYER: i64 = 96;
pub const TLS_PSEUDO_LAYER: i64 = 95;

pub fn builtin_handlers() -> Vec<Arc<dyn ProbeHandler>> {
    vec![
        Arc::new(HttpEnum),
        Arc::new(SshBanner),
        Arc::new(DnsEnum),
        Arc::new(TlsProbe),
    ]
}

fn quote(s: &str) -> String {
    shlex::try_quote(s)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Run a shell snippet under `min(timeout, cap)` and log its output.
/// Returns `None` when the command could not run (the failure is logged).
async fn run_and_log(
    cmd: String,
    cap: u64,
    timeout_secs: u64,
    log_path: &Path,
) -> Result<Option<(String, String)>, ProbeflowError> {
    let opts = RunOptions {
        timeout_secs: timeout_secs.min(cap),
        ..RunOptions::default()
    };
    let argv = vec!["bash".to_string(), "-lc".to_string(), cmd];
    match safe_run(CommandLine::Argv(argv), &opts).await {
        Ok((code, stdout, stderr)) => {
            debug!(exit = code, log = %log_path.display(), "Probe command finished");
            atomic_write(log_path, format!("{stdout}\n{stderr}"))?;
            Ok(Some((stdout, stderr)))
        }
        Err(e) => {
            atomic_write(log_path, e.to_string())?;
            Ok(None)
        }
    }
}

fn outcome(layer: i64, target: &str, evidence: Vec<Evidence>, log_path: &Path) -> ProbeOutcome {
    ProbeOutcome {
        summary: Summary {
            layer,
            target: target.to_string(),
            evidence,
            findings: vec![],
            artifacts: vec![],
        },
        artifacts: vec![],
        logs: Some(log_path.to_string_lossy().into_owned()),
    }
}

// --- HTTP HEAD ---

pub struct HttpEnum;

/// Resolve the `{s}`/`{target}`/`{port}` placeholders of a url template.
/// `{s}` becomes "s" on the conventional TLS ports.
fn build_http_url(template: &str, target: &str, port: i64) -> String {
    let scheme = if matches!(port, 443 | 8443) { "s" } else { "" };
    template
        .replace("{s}", scheme)
        .replace("{target}", target)
        .replace("{port}", &port.to_string())
}

#[async_trait]
impl ProbeHandler for HttpEnum {
    fn name(&self) -> &'static str {
        "http_enum"
    }

    async fn run(
        &self,
        action: &Action,
        out_dir: &Path,
        timeout_secs: u64,
    ) -> Result<ProbeOutcome, ProbeflowError> {
        let template = action
            .args
            .get("url_template")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let port = action.args.get("port").and_then(Value::as_i64).unwrap_or(443);
        let url = build_http_url(template, &action.target, port);

        let layer_dir = out_dir.join("layer_web");
        std::fs::create_dir_all(&layer_dir)?;
        let log_path = layer_dir.join("http_enum.log.txt");

        let cmd = format!("curl -skI --max-time 10 {}", quote(&url));
        let mut evidence = vec![];
        if let Some((stdout, _)) = run_and_log(cmd, 30, timeout_secs, &log_path).await? {
            if stdout.contains("HTTP/") {
                evidence.push(Evidence {
                    url: Some(url),
                    ..Evidence::of("http-head")
                });
            }
        }
        Ok(outcome(WEB_PSEUDO_LAYER, &action.target, evidence, &log_path))
    }
}

// --- SSH BANNER ---

pub struct SshBanner;

#[async_trait]
impl ProbeHandler for SshBanner {
    fn name(&self) -> &'static str {
        "ssh_banner"
    }

    async fn run(
        &self,
        action: &Action,
        out_dir: &Path,
        timeout_secs: u64,
    ) -> Result<ProbeOutcome, ProbeflowError> {
        let port = action.args.get("port").and_then(Value::as_i64).unwrap_or(22);

        let layer_dir = out_dir.join("layer_ssh");
        std::fs::create_dir_all(&layer_dir)?;
        let log_path = layer_dir.join("ssh_banner.log.txt");

        let cmd = format!("echo | timeout 5 nc -v {} {}", quote(&action.target), port);
        let mut evidence = vec![];
        if let Some((stdout, stderr)) = run_and_log(cmd, 15, timeout_secs, &log_path).await? {
            if format!("{stdout}{stderr}").contains("SSH-") {
                evidence.push(Evidence {
                    service: Some("ssh".to_string()),
                    port: Some(port),
                    proto: Some("tcp".to_string()),
                    ..Evidence::of("service")
                });
            }
        }
        Ok(outcome(SSH_PSEUDO_LAYER, &action.target, evidence, &log_path))
    }
}

// --- DNS LOOKUPS ---

pub struct DnsEnum;

fn record_types(action: &Action) -> Vec<String> {
    let configured: Vec<String> = action
        .args
        .get("record_types")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if configured.is_empty() {
        ["A", "AAAA", "MX", "TXT", "NS"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        configured
    }
}

#[async_trait]
impl ProbeHandler for DnsEnum {
    fn name(&self) -> &'static str {
        "dns_enum"
    }

    async fn run(
        &self,
        action: &Action,
        out_dir: &Path,
        timeout_secs: u64,
    ) -> Result<ProbeOutcome, ProbeflowError> {
        let types = record_types(action);

        let layer_dir = out_dir.join("layer_dns");
        std::fs::create_dir_all(&layer_dir)?;
        let log_path = layer_dir.join("dns_enum.log.txt");

        let cmd = format!(
            "for t in {}; do nslookup -type=$t {}; done",
            types.join(" "),
            quote(&action.target)
        );
        let mut evidence = vec![];
        if let Some((stdout, _)) = run_and_log(cmd, 60, timeout_secs, &log_path).await? {
            if stdout.contains(&action.target) {
                evidence.push(Evidence {
                    name: Some(action.target.clone()),
                    ..Evidence::of("dns-record")
                });
            }
        }
        Ok(outcome(DNS_PSEUDO_LAYER, &action.target, evidence, &log_path))
    }
}

// --- TLS CERTIFICATE ---

pub struct TlsProbe;

/// Scrape `subject=` / `issuer=` lines out of s_client output.
fn parse_cert_fields(output: &str) -> (Option<String>, Option<String>) {
    let mut subject = None;
    let mut issuer = None;
    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("subject=") {
            subject = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("issuer=") {
            issuer = Some(rest.trim().to_string());
        }
    }
    (subject, issuer)
}

#[async_trait]
impl ProbeHandler for TlsProbe {
    fn name(&self) -> &'static str {
        "tls_probe"
    }

    async fn run(
        &self,
        action: &Action,
        out_dir: &Path,
        timeout_secs: u64,
    ) -> Result<ProbeOutcome, ProbeflowError> {
        let port = action.args.get("port").and_then(Value::as_i64).unwrap_or(443);

        let layer_dir = out_dir.join("layer_tls");
        std::fs::create_dir_all(&layer_dir)?;
        let log_path = layer_dir.join("tls_probe.log.txt");

        let target = quote(&action.target);
        let cmd = format!(
            "echo | timeout 10 openssl s_client -servername {target} -connect {target}:{port} 2>&1 | head -n 20"
        );
        let mut evidence = vec![];
        if let Some((stdout, _)) = run_and_log(cmd, 40, timeout_secs, &log_path).await? {
            let (subject, issuer) = parse_cert_fields(&stdout);
            if subject.is_some() || issuer.is_some() {
                evidence.push(Evidence {
                    service: Some("https".to_string()),
                    port: Some(port),
                    proto: Some("tcp".to_string()),
                    name: subject,
                    product: issuer,
                    ..Evidence::of("tls-cert")
                });
            }
        }
        Ok(outcome(TLS_PSEUDO_LAYER, &action.target, evidence, &log_path))
    }
}
