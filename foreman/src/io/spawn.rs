//! Spawning worker CLI sessions and capturing their output.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tracing::{debug, error, instrument, warn};

use crate::core::scope::ScopeIdentity;

/// JSON Schema the worker's structured payload must satisfy.
pub const WORKER_OUTPUT_SCHEMA: &str = include_str!("../../schemas/worker_output.schema.json");

/// Tools whose payloads go through the scope hook.
pub const SCOPED_TOOLS: &str = "Read|Write|Edit|Glob|Grep";

/// Everything one worker session needs to start.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub workdir: PathBuf,
    pub prompt: String,
    pub model: String,
    pub settings: Value,
    pub output_limit_bytes: usize,
}

/// Seam for spawning worker sessions. Tests script this; production
/// invokes the worker CLI.
pub trait WorkerSpawner {
    /// Run one session to completion and return its raw stdout.
    ///
    /// A non-zero exit is not an error here: workers often exit
    /// non-zero while still printing a usable envelope. Only a failure
    /// to spawn or capture is an `Err`.
    fn spawn(&self, request: &SpawnRequest) -> Result<String>;
}

/// Session settings wiring the scope hook into the worker CLI.
///
/// The hook runs before each file tool call and reads its identity
/// from the environment.
pub fn build_scope_settings(identity: &ScopeIdentity) -> Value {
    json!({
        "hooks": {
            "PreToolUse": [
                {
                    "matcher": SCOPED_TOOLS,
                    "hooks": [
                        { "type": "command", "command": "foreman scope-check" }
                    ]
                }
            ]
        },
        "env": {
            "FOREMAN_GROUP": identity.group,
            "FOREMAN_MEMBER": identity.member,
        }
    })
}

/// Spawner that runs the `claude` CLI in headless mode.
pub struct ClaudeSpawner;

impl WorkerSpawner for ClaudeSpawner {
    #[instrument(skip_all, fields(workdir = %request.workdir.display(), model = %request.model))]
    fn spawn(&self, request: &SpawnRequest) -> Result<String> {
        let mut cmd = Command::new("claude");
        cmd.arg("-p")
            .arg(&request.prompt)
            .arg("--model")
            .arg(&request.model)
            .arg("--output-format")
            .arg("json")
            .arg("--json-schema")
            .arg(WORKER_OUTPUT_SCHEMA)
            .arg("--settings")
            .arg(request.settings.to_string())
            .arg("--dangerously-skip-permissions")
            .current_dir(&request.workdir);

        let output = run_command_capture(cmd, request.output_limit_bytes)?;
        debug!(exit_code = ?output.status.code(), "worker session finished");
        if !output.stderr.is_empty() {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr),
                "worker stderr"
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Captured child process output.
#[derive(Debug)]
struct CommandOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes`
/// bounds the amount stored in memory (bytes beyond this are discarded
/// while still draining the pipe). No timeout: sessions run to
/// completion and the supervisor enforces its budget between cycles.
fn run_command_capture(mut cmd: Command, output_limit_bytes: usize) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let status = child.wait().context("wait for command")?;

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
