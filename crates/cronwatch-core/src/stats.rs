// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pure read-side statistics over execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::record::{ExecutionRecord, RunOutcome};

/// Default number of distinct error messages reported.
pub const DEFAULT_TOP_ERRORS: usize = 5;

/// Aggregated statistics for a set of execution records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
	pub total: u64,
	pub success: u64,
	pub failure: u64,
	/// success / total, 0.0 for an empty record set (never NaN).
	pub success_rate: f64,
	/// Mean wall-clock duration of successful runs, `None` if there were
	/// none.
	pub mean_duration_ms: Option<f64>,
	/// Most frequent distinct error messages, top-K by occurrence,
	/// ties broken most-recent-first.
	pub top_errors: Vec<ErrorFrequency>,
	pub first_failure_at: Option<DateTime<Utc>>,
	pub last_failure_at: Option<DateTime<Utc>>,
}

impl StatsSummary {
	pub fn empty() -> Self {
		Self {
			total: 0,
			success: 0,
			failure: 0,
			success_rate: 0.0,
			mean_duration_ms: None,
			top_errors: Vec::new(),
			first_failure_at: None,
			last_failure_at: None,
		}
	}
}

/// One distinct error message and how often it occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrequency {
	pub message: String,
	pub count: u64,
	pub last_seen: DateTime<Utc>,
}

/// Summarize a record set. An empty input is valid and yields the
/// all-zero summary with an undefined (None) mean duration.
pub fn summarize(records: &[ExecutionRecord], top_k: usize) -> StatsSummary {
	if records.is_empty() {
		return StatsSummary::empty();
	}

	let total = records.len() as u64;
	let success = records.iter().filter(|r| r.is_success()).count() as u64;
	let failure = total - success;

	let success_durations: Vec<u64> = records
		.iter()
		.filter(|r| r.is_success())
		.map(|r| r.duration_ms)
		.collect();
	let mean_duration_ms = if success_durations.is_empty() {
		None
	} else {
		Some(success_durations.iter().sum::<u64>() as f64 / success_durations.len() as f64)
	};

	let mut failures_by_message: HashMap<String, (u64, DateTime<Utc>)> = HashMap::new();
	let mut first_failure_at = None;
	let mut last_failure_at = None;
	for record in records.iter().filter(|r| !r.is_success()) {
		first_failure_at = Some(first_failure_at.unwrap_or(record.started_at).min(record.started_at));
		last_failure_at = Some(last_failure_at.unwrap_or(record.started_at).max(record.started_at));

		let message = failure_message(record);
		let entry = failures_by_message
			.entry(message)
			.or_insert((0, record.started_at));
		entry.0 += 1;
		entry.1 = entry.1.max(record.started_at);
	}

	let mut top_errors: Vec<ErrorFrequency> = failures_by_message
		.into_iter()
		.map(|(message, (count, last_seen))| ErrorFrequency {
			message,
			count,
			last_seen,
		})
		.collect();
	top_errors.sort_by(|a, b| {
		b.count
			.cmp(&a.count)
			.then_with(|| b.last_seen.cmp(&a.last_seen))
	});
	top_errors.truncate(top_k);

	StatsSummary {
		total,
		success,
		failure,
		success_rate: success as f64 / total as f64,
		mean_duration_ms,
		top_errors,
		first_failure_at,
		last_failure_at,
	}
}

/// Compact one-line description of why a record failed.
fn failure_message(record: &ExecutionRecord) -> String {
	match &record.outcome {
		RunOutcome::StartFailure { message } => message.clone(),
		RunOutcome::TimedOut => "timed out".to_string(),
		RunOutcome::Failed { exit_code } => record
			.stderr
			.first_line()
			.map(str::to_string)
			.unwrap_or_else(|| format!("exit status {}", exit_code)),
		RunOutcome::Success => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::JobId;
	use crate::record::CapturedStream;
	use chrono::TimeZone;

	fn record(outcome: RunOutcome, stderr: &str, minute: u32) -> ExecutionRecord {
		ExecutionRecord {
			id: None,
			job_id: JobId::new("backup").unwrap(),
			started_at: Utc.with_ymd_and_hms(2026, 3, 1, 4, minute, 0).unwrap(),
			duration_ms: 200,
			outcome,
			stdout: CapturedStream::empty(),
			stderr: CapturedStream {
				text: stderr.to_string(),
				truncated: false,
			},
			created_at: Utc::now(),
		}
	}

	#[test]
	fn empty_input_yields_zero_summary() {
		let summary = summarize(&[], DEFAULT_TOP_ERRORS);
		assert_eq!(summary.total, 0);
		assert_eq!(summary.success, 0);
		assert_eq!(summary.failure, 0);
		assert_eq!(summary.success_rate, 0.0);
		assert!(summary.success_rate.is_finite());
		assert_eq!(summary.mean_duration_ms, None);
		assert!(summary.top_errors.is_empty());
		assert_eq!(summary.first_failure_at, None);
	}

	#[test]
	fn counts_and_rate() {
		let records = vec![
			record(RunOutcome::Success, "", 0),
			record(RunOutcome::Success, "", 1),
			record(RunOutcome::Failed { exit_code: 1 }, "disk full", 2),
			record(RunOutcome::Success, "", 3),
		];
		let summary = summarize(&records, DEFAULT_TOP_ERRORS);
		assert_eq!(summary.total, 4);
		assert_eq!(summary.success, 3);
		assert_eq!(summary.failure, 1);
		assert!((summary.success_rate - 0.75).abs() < f64::EPSILON);
		assert_eq!(summary.mean_duration_ms, Some(200.0));
	}

	#[test]
	fn mean_duration_undefined_without_successes() {
		let records = vec![record(RunOutcome::Failed { exit_code: 1 }, "boom", 0)];
		let summary = summarize(&records, DEFAULT_TOP_ERRORS);
		assert_eq!(summary.mean_duration_ms, None);
	}

	#[test]
	fn top_errors_ordered_by_count_then_recency() {
		let records = vec![
			record(RunOutcome::Failed { exit_code: 1 }, "disk full", 0),
			record(RunOutcome::Failed { exit_code: 1 }, "disk full", 1),
			record(RunOutcome::Failed { exit_code: 2 }, "old and rare", 2),
			record(RunOutcome::Failed { exit_code: 2 }, "new and rare", 3),
		];
		let summary = summarize(&records, DEFAULT_TOP_ERRORS);
		let messages: Vec<&str> = summary
			.top_errors
			.iter()
			.map(|e| e.message.as_str())
			.collect();
		// Highest count first; equal counts favor the more recent.
		assert_eq!(messages, vec!["disk full", "new and rare", "old and rare"]);
		assert_eq!(summary.top_errors[0].count, 2);
	}

	#[test]
	fn top_k_limits_output() {
		let records: Vec<ExecutionRecord> = (0..10)
			.map(|i| {
				record(
					RunOutcome::Failed { exit_code: 1 },
					&format!("error {}", i),
					i,
				)
			})
			.collect();
		let summary = summarize(&records, 3);
		assert_eq!(summary.top_errors.len(), 3);
	}

	#[test]
	fn start_failure_message_wins_over_stderr() {
		let records = vec![record(
			RunOutcome::StartFailure {
				message: "no such file".to_string(),
			},
			"irrelevant",
			0,
		)];
		let summary = summarize(&records, DEFAULT_TOP_ERRORS);
		assert_eq!(summary.top_errors[0].message, "no such file");
	}

	#[test]
	fn failure_timestamps_span_failures_only() {
		let records = vec![
			record(RunOutcome::Success, "", 0),
			record(RunOutcome::Failed { exit_code: 1 }, "a", 1),
			record(RunOutcome::Failed { exit_code: 1 }, "b", 5),
			record(RunOutcome::Success, "", 9),
		];
		let summary = summarize(&records, DEFAULT_TOP_ERRORS);
		assert_eq!(summary.first_failure_at, Some(records[1].started_at));
		assert_eq!(summary.last_failure_at, Some(records[2].started_at));
	}
}
