// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Failure watcher: evaluates job health and triggers notifications.
//!
//! Evaluation replays a job's record history into its canonical state,
//! then reconciles with the persisted state to decide whether an alert
//! is due. Because replay is a pure fold, evaluating after every run
//! and evaluating on a timer converge to the same decisions; only the
//! already-notified marker (the Suppressed edge) comes from the store.

use chrono::Utc;
use tracing::{debug, info, instrument};

use cronwatch_core::{
	current_streak_start, JobHealth, JobId, MonitoringState,
};
use cronwatch_store::{LogStore, RecordFilter};

use crate::error::Result;
use crate::notifier::{Delivery, Notifier};
use crate::report::{failure_alert, recovery_notice};

/// Outcome of evaluating one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
	/// No transition needing a notification.
	Quiet { health: JobHealth },
	/// Threshold crossed; an alert was dispatched.
	Alerted { delivery: Delivery },
	/// The streak already got its alert; nothing new sent.
	AlreadyNotified,
	/// A success ended a streak that had been notified.
	Recovered { delivery: Option<Delivery> },
}

/// Watches job histories and dispatches alerts through a [`Notifier`].
pub struct FailureWatcher<'a> {
	store: &'a dyn LogStore,
	notifier: &'a Notifier,
	max_failures: u32,
	notify_on_recovery: bool,
}

impl<'a> FailureWatcher<'a> {
	pub fn new(
		store: &'a dyn LogStore,
		notifier: &'a Notifier,
		max_failures: u32,
		notify_on_recovery: bool,
	) -> Self {
		Self {
			store,
			notifier,
			max_failures,
			notify_on_recovery,
		}
	}

	/// Evaluate every job with recorded history.
	pub async fn evaluate_all(&self) -> Result<Vec<(JobId, WatchOutcome)>> {
		let mut outcomes = Vec::new();
		for job_id in self.store.job_ids().await? {
			let outcome = self.evaluate(&job_id).await?;
			outcomes.push((job_id, outcome));
		}
		Ok(outcomes)
	}

	/// Evaluate one job and dispatch whatever its state transition
	/// requires. Persists the reconciled state.
	#[instrument(skip(self), fields(job_id = %job_id))]
	pub async fn evaluate(&self, job_id: &JobId) -> Result<WatchOutcome> {
		let records = self
			.store
			.query(&RecordFilter::for_job(job_id.clone()))
			.await?;
		let persisted = self.store.load_state(job_id).await?.unwrap_or_default();
		let mut state = MonitoringState::replay(&records, self.max_failures);
		state.last_notified_at = persisted.last_notified_at;

		let outcome = match state.health {
			JobHealth::Alerting => {
				// Replay cannot see past dispatches; claiming the
				// streak in the store is atomic, so overlapping
				// evaluations of one job never both dispatch.
				let now = Utc::now();
				let claimed = match current_streak_start(&records) {
					Some(start) => {
						self.store.claim_notification(job_id, start, now).await?
					}
					None => false,
				};

				if claimed {
					let report =
						failure_alert(job_id, state.consecutive_failures, &records);
					let delivery = self.notifier.dispatch(&report).await?;
					state.mark_notified(now);
					info!(
						consecutive_failures = state.consecutive_failures,
						"failure alert dispatched"
					);
					WatchOutcome::Alerted { delivery }
				} else {
					state.health = JobHealth::Suppressed;
					debug!("streak already notified, suppressing");
					WatchOutcome::AlreadyNotified
				}
			}
			JobHealth::Healthy => {
				let was_notified_streak = matches!(
					persisted.health,
					JobHealth::Alerting | JobHealth::Suppressed
				);
				if was_notified_streak {
					let delivery = if self.notify_on_recovery {
						let recovered_at = records
							.iter()
							.rev()
							.find(|r| r.is_success())
							.map(|r| r.started_at)
							.unwrap_or_else(Utc::now);
						Some(
							self
								.notifier
								.dispatch(&recovery_notice(job_id, recovered_at))
								.await?,
						)
					} else {
						None
					};
					WatchOutcome::Recovered { delivery }
				} else {
					WatchOutcome::Quiet {
						health: state.health,
					}
				}
			}
			health => WatchOutcome::Quiet { health },
		};

		self.store.save_state(job_id, &state).await?;
		Ok(outcome)
	}
}
