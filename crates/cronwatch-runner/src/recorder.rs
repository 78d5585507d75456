// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Execution recorder: turns an observed run into a persisted record.

use chrono::Utc;
use tracing::{error, info, instrument};

use cronwatch_core::{ExecutionRecord, JobId, RecordId};
use cronwatch_store::LogStore;

use crate::exec::ExecOutput;

/// Result of recording one run.
#[derive(Debug)]
pub struct RunReport {
	/// The record as built from the observation. `record.id` is set
	/// only when the append succeeded.
	pub record: ExecutionRecord,
	/// Exit status to forward to the scheduler. Determined entirely by
	/// the run outcome; a store failure never alters it.
	pub exit_code: i32,
	/// Whether the record made it into the store.
	pub stored: bool,
}

/// Build an execution record from an observed run and append it.
///
/// The append happens exactly once per run. If the store is unavailable
/// the failure is logged and the report still carries the run's true
/// exit status, so cron sees the command's result rather than ours.
#[instrument(skip(store, output), fields(job_id = %job_id, outcome = %output.outcome))]
pub async fn record_run(store: &dyn LogStore, job_id: JobId, output: ExecOutput) -> RunReport {
	let exit_code = output.outcome.exit_code();
	let mut record = ExecutionRecord {
		id: None,
		job_id,
		started_at: output.started_at,
		duration_ms: output.duration_ms,
		outcome: output.outcome,
		stdout: output.stdout,
		stderr: output.stderr,
		created_at: Utc::now(),
	};

	let stored = match store.append(&record).await {
		Ok(RecordId(id)) => {
			info!(record_id = id, exit_code, "recorded execution");
			record.id = Some(RecordId(id));
			true
		}
		Err(e) => {
			error!(error = %e, exit_code, "failed to record execution, forwarding exit status anyway");
			false
		}
	};

	RunReport {
		record,
		exit_code,
		stored,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use chrono::{DateTime, Utc};
	use cronwatch_core::{CapturedStream, MonitoringState, RunOutcome};
	use cronwatch_store::{
		connect_in_memory, RecordFilter, SqliteLogStore, StoreError,
	};

	fn output(outcome: RunOutcome) -> ExecOutput {
		ExecOutput {
			started_at: Utc::now(),
			duration_ms: 42,
			outcome,
			stdout: CapturedStream {
				text: "out\n".to_string(),
				truncated: false,
			},
			stderr: CapturedStream::empty(),
		}
	}

	#[tokio::test]
	async fn records_exactly_one_row_per_run() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		let job = JobId::new("backup").unwrap();

		let report = record_run(&store, job.clone(), output(RunOutcome::Success)).await;
		assert!(report.stored);
		assert!(report.record.id.is_some());
		assert_eq!(report.exit_code, 0);

		let rows = store
			.query(&RecordFilter::for_job(job))
			.await
			.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].stdout.text, "out\n");
	}

	#[tokio::test]
	async fn forwards_failure_exit_code() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		let job = JobId::new("backup").unwrap();

		let report =
			record_run(&store, job, output(RunOutcome::Failed { exit_code: 3 })).await;
		assert_eq!(report.exit_code, 3);
	}

	/// A store that refuses every write.
	struct BrokenStore;

	#[async_trait]
	impl LogStore for BrokenStore {
		async fn append(
			&self,
			_record: &ExecutionRecord,
		) -> cronwatch_store::Result<RecordId> {
			Err(StoreError::Corrupt("disk on fire".to_string()))
		}

		async fn query(
			&self,
			_filter: &RecordFilter,
		) -> cronwatch_store::Result<Vec<ExecutionRecord>> {
			Ok(Vec::new())
		}

		async fn prune(&self, _older_than: DateTime<Utc>) -> cronwatch_store::Result<u64> {
			Ok(0)
		}

		async fn job_ids(&self) -> cronwatch_store::Result<Vec<JobId>> {
			Ok(Vec::new())
		}

		async fn load_state(
			&self,
			_job_id: &JobId,
		) -> cronwatch_store::Result<Option<MonitoringState>> {
			Ok(None)
		}

		async fn save_state(
			&self,
			_job_id: &JobId,
			_state: &MonitoringState,
		) -> cronwatch_store::Result<()> {
			Ok(())
		}

		async fn claim_notification(
			&self,
			_job_id: &JobId,
			_streak_start: DateTime<Utc>,
			_notified_at: DateTime<Utc>,
		) -> cronwatch_store::Result<bool> {
			Ok(false)
		}
	}

	#[tokio::test]
	async fn store_failure_never_alters_the_exit_status() {
		let job = JobId::new("backup").unwrap();

		let report = record_run(
			&BrokenStore,
			job,
			output(RunOutcome::Failed { exit_code: 7 }),
		)
		.await;
		assert!(!report.stored);
		assert!(report.record.id.is_none());
		assert_eq!(report.exit_code, 7);

		let report = record_run(&BrokenStore, JobId::new("backup").unwrap(), output(RunOutcome::Success)).await;
		assert!(!report.stored);
		assert_eq!(report.exit_code, 0);
	}
}
