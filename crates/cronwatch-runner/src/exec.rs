// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subprocess execution with capped output capture.

use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, trace, warn};

use cronwatch_core::{CapturedStream, RunOutcome, DEFAULT_CAPTURE_LIMIT_BYTES};

/// A command to execute, with its capture and timeout policy.
#[derive(Debug, Clone)]
pub struct ExecRequest {
	/// Command line, run through `sh -c` like cron does.
	pub command: String,
	/// Kill the process after this long. `None` means no limit,
	/// matching scheduled runs where cron owns the job's lifetime.
	pub timeout: Option<Duration>,
	/// Per-stream capture bound in bytes.
	pub capture_limit: usize,
}

impl ExecRequest {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			timeout: None,
			capture_limit: DEFAULT_CAPTURE_LIMIT_BYTES,
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn with_capture_limit(mut self, limit: usize) -> Self {
		self.capture_limit = limit;
		self
	}
}

/// What the executor observed: outcome plus timing and captured streams.
/// This is everything the recorder needs to build an execution record.
#[derive(Debug, Clone)]
pub struct ExecOutput {
	pub started_at: DateTime<Utc>,
	pub duration_ms: u64,
	pub outcome: RunOutcome,
	pub stdout: CapturedStream,
	pub stderr: CapturedStream,
}

/// Run a command through `sh -c`, capturing stdout and stderr up to the
/// capture limit. Never returns an error: a command that cannot be
/// launched is itself an observation ([`RunOutcome::StartFailure`]).
pub async fn execute(request: &ExecRequest) -> ExecOutput {
	let started_at = Utc::now();
	let start = Instant::now();

	trace!(command = %request.command, "spawning wrapped command");

	let mut child = match Command::new("sh")
		.arg("-c")
		.arg(&request.command)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
	{
		Ok(child) => child,
		Err(e) => {
			warn!(command = %request.command, error = %e, "failed to spawn command");
			return ExecOutput {
				started_at,
				duration_ms: start.elapsed().as_millis() as u64,
				outcome: RunOutcome::StartFailure {
					message: e.to_string(),
				},
				stdout: CapturedStream::empty(),
				stderr: CapturedStream::empty(),
			};
		}
	};

	// Drain both pipes concurrently so a chatty command never blocks on
	// a full pipe while we wait on the other stream.
	let stdout_task = child
		.stdout
		.take()
		.map(|pipe| tokio::spawn(drain_capped(pipe, request.capture_limit)));
	let stderr_task = child
		.stderr
		.take()
		.map(|pipe| tokio::spawn(drain_capped(pipe, request.capture_limit)));

	let outcome = match request.timeout {
		Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
			Ok(wait_result) => outcome_from_wait(wait_result),
			Err(_) => {
				warn!(command = %request.command, timeout_secs = limit.as_secs(), "command timed out, killing");
				if let Err(e) = child.kill().await {
					warn!(error = %e, "failed to kill timed-out command");
				}
				RunOutcome::TimedOut
			}
		},
		None => outcome_from_wait(child.wait().await),
	};

	let stdout = collect(stdout_task).await;
	let stderr = collect(stderr_task).await;
	let duration_ms = start.elapsed().as_millis() as u64;

	debug!(
		command = %request.command,
		outcome = %outcome,
		duration_ms,
		"command finished"
	);

	ExecOutput {
		started_at,
		duration_ms,
		outcome,
		stdout,
		stderr,
	}
}

fn outcome_from_wait(result: std::io::Result<std::process::ExitStatus>) -> RunOutcome {
	match result {
		Ok(status) if status.success() => RunOutcome::Success,
		Ok(status) => RunOutcome::Failed {
			// A signal death has no exit code; cron reports those as 1.
			exit_code: status.code().unwrap_or(1),
		},
		Err(e) => RunOutcome::StartFailure {
			message: e.to_string(),
		},
	}
}

/// Read a pipe to EOF, keeping at most `limit` bytes. The pipe is always
/// drained fully so the child never stalls on backpressure.
async fn drain_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> CapturedStream {
	let mut chunk = vec![0u8; 8192];
	let mut captured: Vec<u8> = Vec::new();
	let mut truncated = false;

	loop {
		match reader.read(&mut chunk).await {
			Ok(0) => break,
			Ok(n) => {
				if captured.len() < limit {
					let take = n.min(limit - captured.len());
					captured.extend_from_slice(&chunk[..take]);
					if take < n {
						truncated = true;
					}
				} else {
					truncated = true;
				}
			}
			Err(_) => break,
		}
	}

	CapturedStream::from_bytes(captured, truncated)
}

async fn collect(
	task: Option<tokio::task::JoinHandle<CapturedStream>>,
) -> CapturedStream {
	match task {
		Some(handle) => handle.await.unwrap_or_default(),
		None => CapturedStream::empty(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn success_exits_zero_with_output() {
		let output = execute(&ExecRequest::new("echo hello")).await;
		assert_eq!(output.outcome, RunOutcome::Success);
		assert_eq!(output.stdout.text, "hello\n");
		assert!(!output.stdout.truncated);
		assert!(output.stderr.text.is_empty());
	}

	#[tokio::test]
	async fn nonzero_exit_is_failed_with_code() {
		let output = execute(&ExecRequest::new("exit 3")).await;
		assert_eq!(output.outcome, RunOutcome::Failed { exit_code: 3 });
	}

	#[tokio::test]
	async fn stderr_is_captured_separately() {
		let output = execute(&ExecRequest::new("echo oops >&2; exit 1")).await;
		assert_eq!(output.outcome, RunOutcome::Failed { exit_code: 1 });
		assert_eq!(output.stderr.text, "oops\n");
		assert!(output.stdout.text.is_empty());
	}

	#[tokio::test]
	async fn missing_executable_is_a_failed_run_not_a_start_failure() {
		// sh itself launches fine; the missing binary surfaces as 127.
		let output = execute(&ExecRequest::new("/no/such/binary-cronwatch-test")).await;
		assert_eq!(output.outcome, RunOutcome::Failed { exit_code: 127 });
	}

	#[tokio::test]
	async fn output_beyond_limit_is_flagged_truncated() {
		let request =
			ExecRequest::new("head -c 4096 /dev/zero | tr '\\0' 'x'").with_capture_limit(100);
		let output = execute(&request).await;
		assert_eq!(output.outcome, RunOutcome::Success);
		assert_eq!(output.stdout.text.len(), 100);
		assert!(output.stdout.truncated);
	}

	#[tokio::test]
	async fn chatty_command_beyond_limit_still_runs_to_completion() {
		// 1 MiB of output against a tiny limit; the drain must keep the
		// pipe flowing or the child deadlocks and this test hangs.
		let request = ExecRequest::new(
			"head -c 1048576 /dev/zero | tr '\\0' 'y'; echo done >&2",
		)
		.with_capture_limit(64);
		let output = execute(&request).await;
		assert_eq!(output.outcome, RunOutcome::Success);
		assert!(output.stdout.truncated);
		assert_eq!(output.stderr.text, "done\n");
	}

	#[tokio::test]
	async fn timeout_kills_and_reports_timed_out() {
		let request =
			ExecRequest::new("sleep 30").with_timeout(Duration::from_millis(100));
		let start = Instant::now();
		let output = execute(&request).await;
		assert_eq!(output.outcome, RunOutcome::TimedOut);
		assert!(start.elapsed() < Duration::from_secs(5));
	}

	#[tokio::test]
	async fn partial_output_survives_a_timeout() {
		let request = ExecRequest::new("echo started; sleep 30")
			.with_timeout(Duration::from_millis(200));
		let output = execute(&request).await;
		assert_eq!(output.outcome, RunOutcome::TimedOut);
		assert_eq!(output.stdout.text, "started\n");
	}

	#[tokio::test]
	async fn duration_is_measured() {
		let output = execute(&ExecRequest::new("sleep 0.2")).await;
		assert!(output.duration_ms >= 150);
	}
}
