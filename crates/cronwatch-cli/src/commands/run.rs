// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The `run` command: execute, record, evaluate, forward exit status.

use std::time::Duration;

use tracing::warn;

use cronwatch_config::Config;
use cronwatch_notify::{FailureWatcher, Notifier};
use cronwatch_runner::{execute, record_run, ExecRequest};

use super::{open_store, parse_job_id, CommandResult};

/// Execute a job's command, record the outcome, run the inline monitor
/// evaluation, and return the command's exit status for the caller to
/// forward to cron.
pub async fn run(
	config: &Config,
	job: &str,
	timeout_secs: Option<u64>,
	command: &str,
) -> Result<i32, Box<dyn std::error::Error>> {
	let job_id = parse_job_id(job)?;

	let mut request =
		ExecRequest::new(command).with_capture_limit(config.capture.limit_bytes);
	if let Some(secs) = timeout_secs {
		request = request.with_timeout(Duration::from_secs(secs));
	}
	let output = execute(&request).await;

	// A store failure must not break the job: record_run logs it and
	// still reports the command's own exit status.
	let store = match open_store(config).await {
		Ok(store) => store,
		Err(e) => {
			warn!(error = %e, "log store unavailable, run will not be recorded");
			return Ok(output.outcome.exit_code());
		}
	};
	let report = record_run(&store, job_id.clone(), output).await;

	if config.monitoring.enabled && report.stored {
		if let Err(e) = evaluate_inline(config, &store, &job_id).await {
			warn!(error = %e, "inline monitor evaluation failed");
		}
	}

	Ok(report.exit_code)
}

async fn evaluate_inline(
	config: &Config,
	store: &cronwatch_store::SqliteLogStore,
	job_id: &cronwatch_core::JobId,
) -> CommandResult {
	let notifier = Notifier::new(&config.email, config.paths.reports_dir())?;
	let watcher = FailureWatcher::new(
		store,
		&notifier,
		config.monitoring.max_failures,
		config.email.notify_on_success,
	);
	watcher.evaluate(job_id).await?;
	Ok(())
}
