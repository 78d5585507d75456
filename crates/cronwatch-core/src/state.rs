// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-job failure-monitor state machine.
//!
//! States: `Healthy` → `Degraded` (failures below threshold) →
//! `Alerting` (threshold crossed, notification due) → `Suppressed`
//! (notified, cooling down). Any success returns to `Healthy` and
//! resets the consecutive-failure count, regardless of current state.
//!
//! Evaluation is a pure fold over outcomes: replaying the same record
//! history always converges to the same state, so inline evaluation
//! after an append and periodic polling are interchangeable. The
//! Alerting→Suppressed edge is the one transition not derivable from
//! records alone; it is taken by [`MonitoringState::mark_notified`]
//! after a dispatch and persisted by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::record::ExecutionRecord;

/// Current monitor state for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobHealth {
	/// No active failure streak.
	Healthy,
	/// Failures observed, below the alert threshold.
	Degraded,
	/// Threshold crossed, notification due.
	Alerting,
	/// Notification dispatched for the ongoing streak.
	Suppressed,
}

impl fmt::Display for JobHealth {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Healthy => write!(f, "healthy"),
			Self::Degraded => write!(f, "degraded"),
			Self::Alerting => write!(f, "alerting"),
			Self::Suppressed => write!(f, "suppressed"),
		}
	}
}

impl FromStr for JobHealth {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"healthy" => Ok(Self::Healthy),
			"degraded" => Ok(Self::Degraded),
			"alerting" => Ok(Self::Alerting),
			"suppressed" => Ok(Self::Suppressed),
			other => Err(CoreError::UnknownHealth(other.to_string())),
		}
	}
}

/// Event emitted by a state transition that the notifier acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
	/// Consecutive failures reached the configured threshold.
	ThresholdCrossed { consecutive_failures: u32 },
	/// A success ended a failure streak.
	Recovered,
}

/// Monitoring state for one job. Owned by the failure monitor; other
/// components read it but never mutate it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringState {
	pub health: JobHealth,
	pub consecutive_failures: u32,
	pub last_notified_at: Option<DateTime<Utc>>,
}

impl Default for MonitoringState {
	fn default() -> Self {
		Self {
			health: JobHealth::Healthy,
			consecutive_failures: 0,
			last_notified_at: None,
		}
	}
}

impl MonitoringState {
	/// Feed one execution outcome through the state machine.
	///
	/// Returns the event the transition produced, if any. `Alerting` is
	/// entered at most once per failure streak; further failures while
	/// `Alerting` or `Suppressed` produce no event.
	pub fn observe(&mut self, success: bool, max_failures: u32) -> Option<MonitorEvent> {
		if success {
			let was_unhealthy = self.health != JobHealth::Healthy;
			self.health = JobHealth::Healthy;
			self.consecutive_failures = 0;
			return was_unhealthy.then_some(MonitorEvent::Recovered);
		}

		self.consecutive_failures += 1;
		match self.health {
			JobHealth::Alerting | JobHealth::Suppressed => None,
			JobHealth::Healthy | JobHealth::Degraded => {
				if max_failures > 0 && self.consecutive_failures >= max_failures {
					self.health = JobHealth::Alerting;
					Some(MonitorEvent::ThresholdCrossed {
						consecutive_failures: self.consecutive_failures,
					})
				} else {
					self.health = JobHealth::Degraded;
					None
				}
			}
		}
	}

	/// Record that a notification was dispatched for the current streak.
	pub fn mark_notified(&mut self, at: DateTime<Utc>) {
		if self.health == JobHealth::Alerting {
			self.health = JobHealth::Suppressed;
		}
		self.last_notified_at = Some(at);
	}

	/// Fold a record history (ascending by start time) into the state it
	/// converges to, starting from `Healthy`. Idempotent with respect to
	/// call cadence: only the history matters.
	pub fn replay<'a, I>(records: I, max_failures: u32) -> Self
	where
		I: IntoIterator<Item = &'a ExecutionRecord>,
	{
		let mut state = Self::default();
		for record in records {
			state.observe(record.is_success(), max_failures);
		}
		state
	}
}

/// Start timestamp of the trailing failure streak in an ascending
/// record history, if the history ends in failures.
pub fn current_streak_start(records: &[ExecutionRecord]) -> Option<DateTime<Utc>> {
	let mut start = None;
	for record in records {
		if record.is_success() {
			start = None;
		} else if start.is_none() {
			start = Some(record.started_at);
		}
	}
	start
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::JobId;
	use crate::record::{CapturedStream, RunOutcome};
	use proptest::prelude::*;

	fn record(success: bool, minute: u32) -> ExecutionRecord {
		use chrono::TimeZone;
		ExecutionRecord {
			id: None,
			job_id: JobId::new("backup").unwrap(),
			started_at: Utc.with_ymd_and_hms(2026, 3, 1, 4, minute, 0).unwrap(),
			duration_ms: 100,
			outcome: if success {
				RunOutcome::Success
			} else {
				RunOutcome::Failed { exit_code: 1 }
			},
			stdout: CapturedStream::empty(),
			stderr: CapturedStream::empty(),
			created_at: Utc::now(),
		}
	}

	#[test]
	fn healthy_to_degraded_on_first_failure() {
		let mut state = MonitoringState::default();
		assert_eq!(state.observe(false, 3), None);
		assert_eq!(state.health, JobHealth::Degraded);
		assert_eq!(state.consecutive_failures, 1);
	}

	#[test]
	fn threshold_crossing_emits_exactly_one_event() {
		let mut state = MonitoringState::default();
		let mut events = Vec::new();
		for _ in 0..5 {
			events.extend(state.observe(false, 3));
		}
		assert_eq!(
			events,
			vec![MonitorEvent::ThresholdCrossed {
				consecutive_failures: 3
			}]
		);
		assert_eq!(state.health, JobHealth::Alerting);
		assert_eq!(state.consecutive_failures, 5);
	}

	#[test]
	fn suppressed_stays_until_success() {
		let mut state = MonitoringState::default();
		for _ in 0..3 {
			state.observe(false, 3);
		}
		state.mark_notified(Utc::now());
		assert_eq!(state.health, JobHealth::Suppressed);

		assert_eq!(state.observe(false, 3), None);
		assert_eq!(state.health, JobHealth::Suppressed);

		assert_eq!(state.observe(true, 3), Some(MonitorEvent::Recovered));
		assert_eq!(state.health, JobHealth::Healthy);
		assert_eq!(state.consecutive_failures, 0);
	}

	#[test]
	fn success_resets_from_any_state() {
		for failures in [1u32, 2, 3, 7] {
			let mut state = MonitoringState::default();
			for _ in 0..failures {
				state.observe(false, 3);
			}
			state.observe(true, 3);
			assert_eq!(state.health, JobHealth::Healthy);
			assert_eq!(state.consecutive_failures, 0);
		}
	}

	#[test]
	fn max_failures_of_one_alerts_immediately() {
		let mut state = MonitoringState::default();
		assert_eq!(
			state.observe(false, 1),
			Some(MonitorEvent::ThresholdCrossed {
				consecutive_failures: 1
			})
		);
		assert_eq!(state.health, JobHealth::Alerting);
	}

	#[test]
	fn replay_matches_incremental_observation() {
		let history: Vec<ExecutionRecord> = [true, true, false, false, false, false]
			.iter()
			.enumerate()
			.map(|(i, &ok)| record(ok, i as u32))
			.collect();

		let replayed = MonitoringState::replay(&history, 3);

		let mut incremental = MonitoringState::default();
		for r in &history {
			incremental.observe(r.is_success(), 3);
		}
		assert_eq!(replayed, incremental);
		assert_eq!(replayed.health, JobHealth::Alerting);
	}

	#[test]
	fn streak_start_is_first_trailing_failure() {
		let history = vec![
			record(true, 0),
			record(false, 1),
			record(true, 2),
			record(false, 3),
			record(false, 4),
		];
		assert_eq!(
			current_streak_start(&history),
			Some(history[3].started_at)
		);
	}

	#[test]
	fn streak_start_none_after_success() {
		let history = vec![record(false, 0), record(true, 1)];
		assert_eq!(current_streak_start(&history), None);
	}

	proptest! {
		#[test]
		fn replay_is_prefix_consistent(outcomes in proptest::collection::vec(any::<bool>(), 0..40)) {
			// Folding the whole history equals folding a prefix and then
			// observing the remainder.
			let split = outcomes.len() / 2;
			let mut state = MonitoringState::default();
			for &ok in &outcomes[..split] {
				state.observe(ok, 3);
			}
			for &ok in &outcomes[split..] {
				state.observe(ok, 3);
			}

			let mut whole = MonitoringState::default();
			for &ok in &outcomes {
				whole.observe(ok, 3);
			}
			prop_assert_eq!(state, whole);
		}

		#[test]
		fn consecutive_failures_counts_trailing_failures(
			outcomes in proptest::collection::vec(any::<bool>(), 1..40)
		) {
			let mut state = MonitoringState::default();
			for &ok in &outcomes {
				state.observe(ok, 3);
			}
			let trailing = outcomes.iter().rev().take_while(|&&ok| !ok).count() as u32;
			prop_assert_eq!(state.consecutive_failures, trailing);
		}
	}
}
