// src/exec/runner.rs

//! Individual instruction process runner.
//!
//! Spawns one rendered instruction as an external shell process, captures
//! stdout and stderr line by line, and enforces a wall-clock timeout by
//! killing an overrunning child. The instruction text is opaque to this
//! module.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How the process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The process exited on its own with this status code.
    Exited(i32),
    /// The process overran its timeout and was killed.
    TimedOut,
    /// The process could not be spawned or awaited at all.
    SpawnFailed(String),
}

/// Structured outcome of one execution attempt.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.status == RunStatus::Exited(0)
    }
}

/// Run one instruction with a timeout.
///
/// Infallible at this boundary: spawn and wait errors are folded into
/// [`RunStatus::SpawnFailed`] so the executor sees every outcome as a
/// completion event.
pub async fn run_instruction(instruction: &str, timeout: Duration) -> RunResult {
    match run_inner(instruction, timeout).await {
        Ok(result) => result,
        Err(err) => RunResult {
            status: RunStatus::SpawnFailed(format!("{err:#}")),
            stdout: String::new(),
            stderr: String::new(),
        },
    }
}

async fn run_inner(instruction: &str, timeout: Duration) -> Result<RunResult> {
    info!(cmd = %instruction, timeout_secs = timeout.as_secs_f64(), "starting process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(instruction);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(instruction);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for instruction {instruction:?}"))?;

    // Consume both streams eagerly so pipe buffers never fill up.
    let stdout = capture_stream(child.stdout.take(), "stdout");
    let stderr = capture_stream(child.stderr.take(), "stderr");

    // Either the process exits on its own, or the timeout fires and we kill
    // it. Killing closes the pipes, so the capture tasks finish either way.
    let status = tokio::select! {
        status = child.wait() => {
            Some(status.context("waiting for child process")?)
        }
        _ = tokio::time::sleep(timeout) => {
            warn!(cmd = %instruction, "process exceeded timeout; killing");
            if let Err(err) = child.kill().await {
                warn!(error = %err, "failed to kill timed-out process");
            }
            None
        }
    };

    let stdout = stdout.await.unwrap_or_default();
    let stderr = stderr.await.unwrap_or_default();

    let status = match status {
        Some(status) => {
            let code = status.code().unwrap_or(-1);
            info!(exit_code = code, success = status.success(), "process exited");
            RunStatus::Exited(code)
        }
        None => RunStatus::TimedOut,
    };

    Ok(RunResult {
        status,
        stdout,
        stderr,
    })
}

/// Collect a child stream into a string, echoing each line at debug level.
fn capture_stream<R>(stream: Option<R>, label: &'static str) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(stream) = stream else {
            return String::new();
        };

        let mut captured = String::new();
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("{label}: {line}");
            captured.push_str(&line);
            captured.push('\n');
        }
        captured
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_of_a_successful_process() {
        let result = run_instruction("echo hello", Duration::from_secs(5)).await;

        assert!(result.success());
        assert_eq!(result.status, RunStatus::Exited(0));
        assert_eq!(result.stdout, "hello\n");
    }

    #[tokio::test]
    async fn reports_nonzero_exit_with_captured_stderr() {
        let result = run_instruction("echo oops >&2; exit 3", Duration::from_secs(5)).await;

        assert!(!result.success());
        assert_eq!(result.status, RunStatus::Exited(3));
        assert_eq!(result.stderr, "oops\n");
    }

    #[tokio::test]
    async fn kills_an_overrunning_process() {
        let started = std::time::Instant::now();
        let result = run_instruction("sleep 30", Duration::from_millis(200)).await;

        assert_eq!(result.status, RunStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn spawn_failure_is_a_structured_outcome() {
        // An unspawnable shell is hard to fake portably; a command that the
        // shell itself cannot find still exits non-zero, which is the normal
        // failure path.
        let result = run_instruction("definitely-not-a-real-binary-xyz", Duration::from_secs(5)).await;
        assert!(!result.success());
    }
}
