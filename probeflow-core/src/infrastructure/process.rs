// probeflow-core/src/infrastructure/process.rs
//
// The one way probes are allowed to reach the operating system. Every
// invocation gets a hard wall-clock timeout, optional per-process rlimits,
// and secret redaction on both output streams before anything is returned.

use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::redaction::redact_secrets;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// A command vector, or a shell string split by POSIX rules.
#[derive(Debug, Clone)]
pub enum CommandLine {
    Argv(Vec<String>),
    Shell(String),
}

impl CommandLine {
    fn into_argv(self) -> Result<Vec<String>, InfrastructureError> {
        let argv = match self {
            CommandLine::Argv(argv) => argv,
            CommandLine::Shell(line) => shlex::split(&line).ok_or_else(|| {
                InfrastructureError::CommandParse(format!("unparseable shell string: {line}"))
            })?,
        };
        if argv.is_empty() {
            return Err(InfrastructureError::CommandParse(
                "empty command".to_string(),
            ));
        }
        Ok(argv)
    }
}

/// Optional per-process ceilings, applied where the OS supports rlimits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecLimits {
    pub cpu_seconds: Option<u64>,
    pub memory_bytes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
    /// Extra environment pairs, added on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub timeout_secs: u64,
    pub limits: ExecLimits,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            env: vec![],
            timeout_secs: 600,
            limits: ExecLimits::default(),
        }
    }
}

/// Run a command and return `(exit_code, stdout, stderr)`.
///
/// On timeout the child is killed and `CommandTimeout` is raised. Both
/// output streams pass through secret redaction before return.
pub async fn safe_run(
    cmd: CommandLine,
    opts: &RunOptions,
) -> Result<(i32, String, String), InfrastructureError> {
    let argv = cmd.into_argv()?;
    let display = argv.join(" ");

    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &opts.cwd {
        command.current_dir(cwd);
    }
    for (key, value) in &opts.env {
        command.env(key, value);
    }
    apply_limits(&mut command, &opts.limits);

    let child = command.spawn()?;
    let output = match tokio::time::timeout(
        Duration::from_secs(opts.timeout_secs),
        child.wait_with_output(),
    )
    .await
    {
        // kill_on_drop reaps the child when the elapsed branch drops it.
        Err(_) => {
            return Err(InfrastructureError::CommandTimeout {
                secs: opts.timeout_secs,
                command: display,
            });
        }
        Ok(result) => result?,
    };

    let code = output.status.code().unwrap_or(-1);
    let stdout = redact_secrets(&String::from_utf8_lossy(&output.stdout));
    let stderr = redact_secrets(&String::from_utf8_lossy(&output.stderr));
    Ok((code, stdout, stderr))
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn apply_limits(command: &mut Command, limits: &ExecLimits) {
    let cpu = limits.cpu_seconds;
    let mem = limits.memory_bytes;
    if cpu.is_none() && mem.is_none() {
        return;
    }
    // SAFETY: the hook runs post-fork/pre-exec and only calls setrlimit,
    // which is async-signal-safe.
    unsafe {
        command.pre_exec(move || {
            if let Some(seconds) = cpu {
                set_rlimit(libc::RLIMIT_CPU, seconds)?;
            }
            if let Some(bytes) = mem {
                set_rlimit(libc::RLIMIT_AS, bytes)?;
            }
            Ok(())
        });
    }
}

// glibc types the resource argument with its own enum-backed alias; every
// other unix libc uses a plain int.
#[cfg(all(unix, target_os = "linux", target_env = "gnu"))]
type RlimitResource = libc::__rlimit_resource_t;
#[cfg(all(unix, not(all(target_os = "linux", target_env = "gnu"))))]
type RlimitResource = libc::c_int;

#[cfg(unix)]
#[allow(unsafe_code)]
fn set_rlimit(resource: RlimitResource, value: u64) -> std::io::Result<()> {
    let lim = libc::rlimit {
        rlim_cur: value as libc::rlim_t,
        rlim_max: value as libc::rlim_t,
    };
    // SAFETY: lim is a valid rlimit struct for the duration of the call.
    if unsafe { libc::setrlimit(resource, &lim) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_limits(_command: &mut Command, _limits: &ExecLimits) {}
