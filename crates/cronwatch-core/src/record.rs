// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Execution record types: one immutable observed outcome per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::job::JobId;

/// Store-assigned identifier for an execution record (auto-increment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Default per-stream capture bound (10 KiB). Overridable via the
/// `[capture]` config section.
pub const DEFAULT_CAPTURE_LIMIT_BYTES: usize = 10 * 1024;

/// Wrapper exit code when the wrapped command could not be launched.
pub const EXIT_START_FAILURE: i32 = 127;

/// Wrapper exit code when an on-demand run exceeded its timeout.
pub const EXIT_TIMED_OUT: i32 = 124;

/// One observed run of a job's command. Immutable once written; the
/// log store only ever inserts and prunes these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
	/// Assigned by the store on append; `None` before persistence.
	pub id: Option<RecordId>,
	pub job_id: JobId,

	pub started_at: DateTime<Utc>,
	pub duration_ms: u64,
	pub outcome: RunOutcome,

	pub stdout: CapturedStream,
	pub stderr: CapturedStream,

	pub created_at: DateTime<Utc>,
}

impl ExecutionRecord {
	pub fn is_success(&self) -> bool {
		matches!(self.outcome, RunOutcome::Success)
	}
}

/// How a wrapped run ended.
///
/// A command that could not be started at all is distinct from one that
/// ran and exited non-zero; the wrapper never forges an exit status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
	/// Process exited 0.
	Success,
	/// Process exited non-zero.
	Failed { exit_code: i32 },
	/// Process could not be launched (missing executable, permissions).
	StartFailure { message: String },
	/// On-demand run was terminated after exceeding its timeout.
	TimedOut,
}

impl RunOutcome {
	/// Exit status the wrapper forwards to the scheduler.
	pub fn exit_code(&self) -> i32 {
		match self {
			Self::Success => 0,
			Self::Failed { exit_code } => *exit_code,
			Self::StartFailure { .. } => EXIT_START_FAILURE,
			Self::TimedOut => EXIT_TIMED_OUT,
		}
	}

	/// Storage discriminant for the `status` column.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Success => "ok",
			Self::Failed { .. } => "failed",
			Self::StartFailure { .. } => "start_failure",
			Self::TimedOut => "timed_out",
		}
	}

	/// Reassemble an outcome from its storage columns.
	pub fn from_parts(
		kind: &str,
		exit_code: Option<i32>,
		message: Option<String>,
	) -> Result<Self, CoreError> {
		match kind {
			"ok" => Ok(Self::Success),
			"failed" => Ok(Self::Failed {
				exit_code: exit_code.unwrap_or(1),
			}),
			"start_failure" => Ok(Self::StartFailure {
				message: message.unwrap_or_default(),
			}),
			"timed_out" => Ok(Self::TimedOut),
			other => Err(CoreError::UnknownOutcome(other.to_string())),
		}
	}
}

impl fmt::Display for RunOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Success => write!(f, "ok"),
			Self::Failed { exit_code } => write!(f, "failed (exit {})", exit_code),
			Self::StartFailure { message } => write!(f, "start failure: {}", message),
			Self::TimedOut => write!(f, "timed out"),
		}
	}
}

/// Captured stdout or stderr, capped at the configured byte limit.
/// Truncation is flagged, never silent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedStream {
	pub text: String,
	pub truncated: bool,
}

impl CapturedStream {
	pub fn empty() -> Self {
		Self::default()
	}

	/// Capture a string, truncating beyond `limit` bytes on a UTF-8
	/// boundary and flagging the cut.
	pub fn capped(text: &str, limit: usize) -> Self {
		if text.len() <= limit {
			return Self {
				text: text.to_string(),
				truncated: false,
			};
		}
		let mut end = limit;
		while end > 0 && !text.is_char_boundary(end) {
			end -= 1;
		}
		Self {
			text: text[..end].to_string(),
			truncated: true,
		}
	}

	/// Capture raw drained bytes. `truncated` is set by the drainer when
	/// it stopped buffering at the limit.
	pub fn from_bytes(bytes: Vec<u8>, truncated: bool) -> Self {
		Self {
			text: String::from_utf8_lossy(&bytes).into_owned(),
			truncated,
		}
	}

	/// First non-empty line, for compact failure summaries.
	pub fn first_line(&self) -> Option<&str> {
		self.text.lines().map(str::trim).find(|l| !l.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn capped_never_exceeds_limit(s in ".{0,200}", limit in 0usize..64) {
			let captured = CapturedStream::capped(&s, limit);
			prop_assert!(captured.text.len() <= limit);
			prop_assert_eq!(captured.truncated, s.len() > limit);
		}

		#[test]
		fn capped_preserves_small_strings(s in ".{0,50}") {
			let captured = CapturedStream::capped(&s, DEFAULT_CAPTURE_LIMIT_BYTES);
			prop_assert_eq!(captured.text, s);
			prop_assert!(!captured.truncated);
		}

		#[test]
		fn outcome_parts_roundtrip(code in 1i32..256) {
			let outcome = RunOutcome::Failed { exit_code: code };
			let parsed =
				RunOutcome::from_parts(outcome.kind(), Some(code), None).unwrap();
			prop_assert_eq!(outcome, parsed);
		}
	}

	#[test]
	fn capped_respects_utf8_boundaries() {
		// 'é' is two bytes; a limit in the middle must back off.
		let captured = CapturedStream::capped("ééé", 3);
		assert_eq!(captured.text, "é");
		assert!(captured.truncated);
	}

	#[test]
	fn exit_codes() {
		assert_eq!(RunOutcome::Success.exit_code(), 0);
		assert_eq!(RunOutcome::Failed { exit_code: 3 }.exit_code(), 3);
		assert_eq!(
			RunOutcome::StartFailure {
				message: "no such file".to_string()
			}
			.exit_code(),
			EXIT_START_FAILURE
		);
		assert_eq!(RunOutcome::TimedOut.exit_code(), EXIT_TIMED_OUT);
	}

	#[test]
	fn unknown_outcome_kind_rejected() {
		assert!(RunOutcome::from_parts("exploded", None, None).is_err());
	}

	#[test]
	fn first_line_skips_blanks() {
		let captured = CapturedStream {
			text: "\n\n  rm: cannot remove '/tmp/x'\nmore".to_string(),
			truncated: false,
		};
		assert_eq!(captured.first_line(), Some("rm: cannot remove '/tmp/x'"));
	}
}
