// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Notification and report rendering.

use chrono::{DateTime, Utc};

use cronwatch_core::{ExecutionRecord, JobId, RunOutcome, StatsSummary};

/// A rendered notification: subject plus both body forms. What the
/// notifier dispatches, whether by email or to a report file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
	pub subject: String,
	pub text: String,
	pub html: String,
}

/// Render a failure alert for a job whose streak crossed the threshold.
///
/// `records` is the job's history ascending by start time; the trailing
/// failures supply the details shown.
pub fn failure_alert(
	job_id: &JobId,
	consecutive_failures: u32,
	records: &[ExecutionRecord],
) -> Report {
	let subject = format!(
		"[cronwatch] job '{}' failed {} times in a row",
		job_id, consecutive_failures
	);

	let last = records.iter().rev().find(|r| !r.is_success());
	let detail = last.map(describe_failure).unwrap_or_default();
	let last_at = last
		.map(|r| r.started_at.to_rfc3339())
		.unwrap_or_else(|| "unknown".to_string());

	let mut text = format!(
		"Job '{}' has failed {} consecutive times.\n\nLast failure: {}\n",
		job_id, consecutive_failures, last_at
	);
	if !detail.is_empty() {
		text.push_str(&format!("Reason: {}\n", detail));
	}
	if let Some(stderr) = last.and_then(|r| excerpt(&r.stderr.text)) {
		text.push_str(&format!("\nstderr:\n{}\n", stderr));
	}
	text.push_str("\nFurther failures in this streak will not be re-notified until the job succeeds again.\n");

	let mut html = format!(
		"<h2>Job '{}' is failing</h2>\
		 <p><strong>{}</strong> consecutive failures.</p>\
		 <p>Last failure: {}</p>",
		escape_html(job_id.as_str()),
		consecutive_failures,
		escape_html(&last_at)
	);
	if !detail.is_empty() {
		html.push_str(&format!("<p>Reason: {}</p>", escape_html(&detail)));
	}
	if let Some(stderr) = last.and_then(|r| excerpt(&r.stderr.text)) {
		html.push_str(&format!("<pre>{}</pre>", escape_html(&stderr)));
	}
	html.push_str("<p>Further failures in this streak will not be re-notified until the job succeeds again.</p>");

	Report {
		subject,
		text,
		html,
	}
}

/// Render a recovery notice after a success ends a failure streak.
pub fn recovery_notice(job_id: &JobId, recovered_at: DateTime<Utc>) -> Report {
	let subject = format!("[cronwatch] job '{}' recovered", job_id);
	let text = format!(
		"Job '{}' succeeded at {} and is healthy again.\n",
		job_id,
		recovered_at.to_rfc3339()
	);
	let html = format!(
		"<h2>Job '{}' recovered</h2><p>Succeeded at {} and is healthy again.</p>",
		escape_html(job_id.as_str()),
		escape_html(&recovered_at.to_rfc3339())
	);
	Report {
		subject,
		text,
		html,
	}
}

/// Render a statistics summary for one job, used by `cronwatch report`.
pub fn stats_report(job_id: &JobId, summary: &StatsSummary) -> Report {
	let subject = format!("[cronwatch] execution report for '{}'", job_id);

	let mut text = format!(
		"Job: {}\nRuns: {} ({} ok, {} failed, {:.1}% success)\n",
		job_id,
		summary.total,
		summary.success,
		summary.failure,
		summary.success_rate * 100.0
	);
	if let Some(mean) = summary.mean_duration_ms {
		text.push_str(&format!("Mean duration (successful runs): {:.0} ms\n", mean));
	}
	if let Some(last) = summary.last_failure_at {
		text.push_str(&format!("Last failure: {}\n", last.to_rfc3339()));
	}
	if !summary.top_errors.is_empty() {
		text.push_str("\nMost frequent errors:\n");
		for error in &summary.top_errors {
			text.push_str(&format!("  {:>4}x  {}\n", error.count, error.message));
		}
	}

	let mut html = format!(
		"<h2>Execution report for '{}'</h2>\
		 <p>{} runs: {} ok, {} failed ({:.1}% success)</p>",
		escape_html(job_id.as_str()),
		summary.total,
		summary.success,
		summary.failure,
		summary.success_rate * 100.0
	);
	if let Some(mean) = summary.mean_duration_ms {
		html.push_str(&format!(
			"<p>Mean duration of successful runs: {:.0} ms</p>",
			mean
		));
	}
	if !summary.top_errors.is_empty() {
		html.push_str("<h3>Most frequent errors</h3><ul>");
		for error in &summary.top_errors {
			html.push_str(&format!(
				"<li>{}&times; {}</li>",
				error.count,
				escape_html(&error.message)
			));
		}
		html.push_str("</ul>");
	}

	Report {
		subject,
		text,
		html,
	}
}

/// A short test message for `cronwatch notify-test`.
pub fn test_report() -> Report {
	Report {
		subject: "[cronwatch] test notification".to_string(),
		text: "This is a test notification from cronwatch. Delivery works.\n".to_string(),
		html: "<p>This is a test notification from cronwatch. Delivery works.</p>".to_string(),
	}
}

fn describe_failure(record: &ExecutionRecord) -> String {
	match &record.outcome {
		RunOutcome::StartFailure { message } => format!("could not start: {}", message),
		RunOutcome::TimedOut => "timed out".to_string(),
		RunOutcome::Failed { exit_code } => format!("exit status {}", exit_code),
		RunOutcome::Success => String::new(),
	}
}

/// At most the first 10 lines of captured stderr.
fn excerpt(text: &str) -> Option<String> {
	if text.trim().is_empty() {
		return None;
	}
	let lines: Vec<&str> = text.lines().take(10).collect();
	Some(lines.join("\n"))
}

fn escape_html(s: &str) -> String {
	s.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use cronwatch_core::{summarize, CapturedStream, DEFAULT_TOP_ERRORS};

	fn failed_record(minute: u32, stderr: &str) -> ExecutionRecord {
		ExecutionRecord {
			id: None,
			job_id: JobId::new("backup").unwrap(),
			started_at: Utc.with_ymd_and_hms(2026, 3, 1, 4, minute, 0).unwrap(),
			duration_ms: 100,
			outcome: RunOutcome::Failed { exit_code: 2 },
			stdout: CapturedStream::empty(),
			stderr: CapturedStream {
				text: stderr.to_string(),
				truncated: false,
			},
			created_at: Utc::now(),
		}
	}

	#[test]
	fn failure_alert_carries_streak_and_reason() {
		let job = JobId::new("backup").unwrap();
		let records = vec![
			failed_record(0, "tar: /data: Cannot open"),
			failed_record(1, "tar: /data: Cannot open"),
			failed_record(2, "tar: /data: Cannot open"),
		];
		let report = failure_alert(&job, 3, &records);

		assert!(report.subject.contains("backup"));
		assert!(report.subject.contains("3 times"));
		assert!(report.text.contains("exit status 2"));
		assert!(report.text.contains("tar: /data: Cannot open"));
		assert!(report.html.contains("<pre>"));
	}

	#[test]
	fn html_is_escaped() {
		let job = JobId::new("backup").unwrap();
		let records = vec![failed_record(0, "error: <tag> & more")];
		let report = failure_alert(&job, 1, &records);
		assert!(report.html.contains("&lt;tag&gt; &amp; more"));
		assert!(!report.html.contains("<tag>"));
	}

	#[test]
	fn recovery_notice_names_the_job() {
		let job = JobId::new("backup").unwrap();
		let at = Utc.with_ymd_and_hms(2026, 3, 1, 5, 0, 0).unwrap();
		let report = recovery_notice(&job, at);
		assert!(report.subject.contains("recovered"));
		assert!(report.text.contains("2026-03-01T05:00:00"));
	}

	#[test]
	fn stats_report_lists_top_errors() {
		let job = JobId::new("backup").unwrap();
		let records = vec![
			failed_record(0, "disk full"),
			failed_record(1, "disk full"),
		];
		let summary = summarize(&records, DEFAULT_TOP_ERRORS);
		let report = stats_report(&job, &summary);
		assert!(report.text.contains("2x"));
		assert!(report.text.contains("disk full"));
		assert!(report.text.contains("0.0% success"));
	}

	#[test]
	fn stderr_excerpt_is_bounded() {
		let long: String = (0..50).map(|i| format!("line {}\n", i)).collect();
		let bounded = excerpt(&long).unwrap();
		assert_eq!(bounded.lines().count(), 10);
	}
}
