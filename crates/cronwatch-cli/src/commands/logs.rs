// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Log inspection commands: logs, stats, prune.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use cronwatch_config::Config;
use cronwatch_core::{summarize, ExecutionRecord, JobId, ScheduleExpr, DEFAULT_TOP_ERRORS};
use cronwatch_crontab::{JobTable, SystemCrontabs, UserCrontab};
use cronwatch_store::{next_runs, LogStore, NextRuns, RecordFilter};

use super::{open_store, parse_job_id, CommandResult};

pub async fn logs(
	config: &Config,
	job: Option<String>,
	since: Option<String>,
	until: Option<String>,
	limit: usize,
	failures_only: bool,
) -> CommandResult {
	let store = open_store(config).await?;
	let filter = RecordFilter {
		job_id: job.as_deref().map(parse_job_id).transpose()?,
		since: since.as_deref().map(parse_time).transpose()?,
		until: until.as_deref().map(parse_time).transpose()?,
		// A failures-only listing filters after the query, so its cap
		// cannot be pushed down.
		limit: if failures_only {
			None
		} else {
			Some(limit.try_into().unwrap_or(u32::MAX))
		},
	};
	let mut records = store.query(&filter).await?;
	if failures_only {
		records.retain(|r| !r.is_success());
		let start = records.len().saturating_sub(limit);
		records.drain(..start);
	}

	if records.is_empty() {
		println!("No recorded executions.");
		return Ok(());
	}

	for record in &records {
		print_record(record);
	}
	Ok(())
}

/// Accepts RFC 3339 timestamps or bare dates (midnight UTC).
fn parse_time(s: &str) -> CommandResult<DateTime<Utc>> {
	if let Ok(t) = DateTime::parse_from_rfc3339(s) {
		return Ok(t.with_timezone(&Utc));
	}
	if let Ok(date) = s.parse::<NaiveDate>() {
		if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
			return Ok(midnight.and_utc());
		}
	}
	Err(format!("invalid time '{s}' (expected RFC 3339 or YYYY-MM-DD)").into())
}

fn print_record(record: &ExecutionRecord) {
	let mut line = format!(
		"{}  {:<12}  {:>7}ms  {}",
		record.started_at.format("%Y-%m-%d %H:%M:%S"),
		record.job_id,
		record.duration_ms,
		record.outcome
	);
	if record.stdout.truncated || record.stderr.truncated {
		line.push_str("  [output truncated]");
	}
	println!("{line}");

	if !record.is_success() {
		if let Some(first) = record.stderr.first_line() {
			println!("    stderr: {}", first);
		}
	}
}

pub async fn stats(config: &Config, job: Option<String>, days: Option<u32>) -> CommandResult {
	let store = open_store(config).await?;
	let since = days.map(|d| Utc::now() - Duration::days(d as i64));

	let job_ids = match job {
		Some(job) => vec![parse_job_id(&job)?],
		None => store.job_ids().await?,
	};
	if job_ids.is_empty() {
		println!("No recorded executions.");
		return Ok(());
	}

	let schedules = load_schedules().await;

	for job_id in job_ids {
		let filter = RecordFilter {
			job_id: Some(job_id.clone()),
			since,
			..RecordFilter::default()
		};
		let records = store.query(&filter).await?;
		let summary = summarize(&records, DEFAULT_TOP_ERRORS);

		println!(
			"{}: {} runs, {} ok, {} failed ({:.1}% success)",
			job_id,
			summary.total,
			summary.success,
			summary.failure,
			summary.success_rate * 100.0
		);
		if let Some(mean) = summary.mean_duration_ms {
			println!("  mean duration (ok runs): {:.0} ms", mean);
		}
		if let Some(last) = summary.last_failure_at {
			println!("  last failure: {}", last.to_rfc3339());
		}
		for error in &summary.top_errors {
			println!("  {:>4}x  {}", error.count, error.message);
		}

		if let Some(schedule) = schedules.get(&job_id) {
			match next_runs(schedule, &config.monitoring.timezone, Utc::now(), 1) {
				Ok(NextRuns::AtStartup) => println!("  next run: at system startup"),
				Ok(NextRuns::At(times)) => {
					if let Some(next) = times.first() {
						println!("  next run: {}", next.to_rfc3339());
					}
				}
				Err(_) => {}
			}
		}
	}
	Ok(())
}

/// Schedules by job id from whatever crontab sources are readable.
/// History is still useful when the job table is not, so failures here
/// just mean no next-run line.
async fn load_schedules() -> HashMap<JobId, ScheduleExpr> {
	let mut jobs = UserCrontab::new().load().await.unwrap_or_default();
	if let Ok(system) = SystemCrontabs::new().load().await {
		jobs.extend(system);
	}
	jobs
		.into_iter()
		.map(|job| (job.id, job.schedule))
		.collect()
}

pub async fn prune(config: &Config, days: Option<u32>) -> CommandResult {
	let days = days.unwrap_or(config.retention.days);
	let cutoff = Utc::now() - Duration::days(days as i64);

	let store = open_store(config).await?;
	let deleted = store.prune(cutoff).await?;

	println!(
		"Pruned {} record{} older than {} days.",
		deleted,
		if deleted == 1 { "" } else { "s" },
		days
	);
	Ok(())
}
