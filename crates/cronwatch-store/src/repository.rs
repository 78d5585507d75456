// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository layer for execution records and monitoring state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use cronwatch_core::{
	CapturedStream, ExecutionRecord, JobHealth, JobId, MonitoringState, RecordId, RunOutcome,
};

use crate::error::{Result, StoreError};

/// Query filter for execution records. All bounds are optional;
/// `since`/`until` are inclusive on the record start time. `limit`
/// keeps only the most recent matches; results always come back in
/// ascending start order.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
	pub job_id: Option<JobId>,
	pub since: Option<DateTime<Utc>>,
	pub until: Option<DateTime<Utc>>,
	pub limit: Option<u32>,
}

impl RecordFilter {
	pub fn for_job(job_id: JobId) -> Self {
		Self {
			job_id: Some(job_id),
			..Self::default()
		}
	}
}

/// The append-only log store.
///
/// `append` never partially writes a record; `query` returns a snapshot
/// ordered by start time ascending; `prune` deletes strictly-older
/// records and is safe to run concurrently with appends (a record
/// written during a prune postdates its cutoff and is never matched).
#[async_trait]
pub trait LogStore: Send + Sync {
	async fn append(&self, record: &ExecutionRecord) -> Result<RecordId>;
	async fn query(&self, filter: &RecordFilter) -> Result<Vec<ExecutionRecord>>;
	async fn prune(&self, older_than: DateTime<Utc>) -> Result<u64>;

	/// Distinct job ids with at least one record.
	async fn job_ids(&self) -> Result<Vec<JobId>>;

	// Monitoring state, owned by the failure monitor. `save_state`
	// leaves `last_notified_at` alone on existing rows; only
	// `claim_notification` advances it.
	async fn load_state(&self, job_id: &JobId) -> Result<Option<MonitoringState>>;
	async fn save_state(&self, job_id: &JobId, state: &MonitoringState) -> Result<()>;

	/// Atomically claim the notification for the failure streak that
	/// started at `streak_start`. Returns false when the streak was
	/// already notified; at most one concurrent caller gets true.
	async fn claim_notification(
		&self,
		job_id: &JobId,
		streak_start: DateTime<Utc>,
		notified_at: DateTime<Utc>,
	) -> Result<bool>;
}

/// SQLite implementation of the log store.
#[derive(Clone)]
pub struct SqliteLogStore {
	pool: SqlitePool,
}

impl SqliteLogStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl LogStore for SqliteLogStore {
	#[instrument(skip(self, record), fields(job_id = %record.job_id, status = record.outcome.kind()))]
	async fn append(&self, record: &ExecutionRecord) -> Result<RecordId> {
		let (exit_code, error_message) = match &record.outcome {
			RunOutcome::Success => (Some(0), None),
			RunOutcome::Failed { exit_code } => (Some(*exit_code), None),
			RunOutcome::StartFailure { message } => (None, Some(message.clone())),
			RunOutcome::TimedOut => (None, None),
		};

		let result = sqlx::query(
			r#"
			INSERT INTO execution_records (
				job_id, started_at, duration_ms,
				status, exit_code, error_message,
				stdout, stdout_truncated,
				stderr, stderr_truncated,
				created_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.job_id.as_str())
		.bind(record.started_at.to_rfc3339())
		.bind(record.duration_ms as i64)
		.bind(record.outcome.kind())
		.bind(exit_code)
		.bind(error_message)
		.bind(&record.stdout.text)
		.bind(record.stdout.truncated as i32)
		.bind(&record.stderr.text)
		.bind(record.stderr.truncated as i32)
		.bind(record.created_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(RecordId(result.last_insert_rowid()))
	}

	#[instrument(skip(self, filter))]
	async fn query(&self, filter: &RecordFilter) -> Result<Vec<ExecutionRecord>> {
		// Dynamic WHERE assembled from the filter; all values bound.
		let mut sql = String::from(
			"SELECT id, job_id, started_at, duration_ms, \
			 status, exit_code, error_message, \
			 stdout, stdout_truncated, stderr, stderr_truncated, created_at \
			 FROM execution_records WHERE 1=1",
		);
		if filter.job_id.is_some() {
			sql.push_str(" AND job_id = ?");
		}
		if filter.since.is_some() {
			sql.push_str(" AND started_at >= ?");
		}
		if filter.until.is_some() {
			sql.push_str(" AND started_at <= ?");
		}
		if filter.limit.is_some() {
			// Take the newest rows, then restore chronological order.
			sql.push_str(" ORDER BY started_at DESC, id DESC LIMIT ?");
			sql = format!("SELECT * FROM ({sql}) ORDER BY started_at ASC, id ASC");
		} else {
			sql.push_str(" ORDER BY started_at ASC, id ASC");
		}

		let mut query = sqlx::query_as::<_, RecordRow>(&sql);
		if let Some(job_id) = &filter.job_id {
			query = query.bind(job_id.as_str().to_string());
		}
		if let Some(since) = filter.since {
			query = query.bind(since.to_rfc3339());
		}
		if let Some(until) = filter.until {
			query = query.bind(until.to_rfc3339());
		}
		if let Some(limit) = filter.limit {
			query = query.bind(limit as i64);
		}

		let rows = query.fetch_all(&self.pool).await?;
		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self))]
	async fn prune(&self, older_than: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM execution_records WHERE started_at < ?")
			.bind(older_than.to_rfc3339())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}

	#[instrument(skip(self))]
	async fn job_ids(&self) -> Result<Vec<JobId>> {
		let rows: Vec<(String,)> =
			sqlx::query_as("SELECT DISTINCT job_id FROM execution_records ORDER BY job_id ASC")
				.fetch_all(&self.pool)
				.await?;

		rows
			.into_iter()
			.map(|(id,)| id.parse().map_err(|_| StoreError::corrupt("job_id")))
			.collect()
	}

	#[instrument(skip(self), fields(job_id = %job_id))]
	async fn load_state(&self, job_id: &JobId) -> Result<Option<MonitoringState>> {
		let row = sqlx::query_as::<_, StateRow>(
			"SELECT health, consecutive_failures, last_notified_at \
			 FROM monitor_state WHERE job_id = ?",
		)
		.bind(job_id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self, state), fields(job_id = %job_id, health = %state.health))]
	async fn save_state(&self, job_id: &JobId, state: &MonitoringState) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO monitor_state (job_id, health, consecutive_failures, last_notified_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			ON CONFLICT(job_id) DO UPDATE SET
				health = excluded.health,
				consecutive_failures = excluded.consecutive_failures,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(job_id.as_str())
		.bind(state.health.to_string())
		.bind(state.consecutive_failures as i64)
		.bind(state.last_notified_at.map(|dt| dt.to_rfc3339()))
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(job_id = %job_id))]
	async fn claim_notification(
		&self,
		job_id: &JobId,
		streak_start: DateTime<Utc>,
		notified_at: DateTime<Utc>,
	) -> Result<bool> {
		// The conditional update is a single statement, so overlapping
		// evaluations of one job race on the row and exactly one wins.
		let result = sqlx::query(
			r#"
			INSERT INTO monitor_state (job_id, health, consecutive_failures, last_notified_at, updated_at)
			VALUES (?, ?, 0, ?, ?)
			ON CONFLICT(job_id) DO UPDATE SET
				last_notified_at = excluded.last_notified_at,
				updated_at = excluded.updated_at
			WHERE monitor_state.last_notified_at IS NULL
				OR monitor_state.last_notified_at < ?
			"#,
		)
		.bind(job_id.as_str())
		.bind(JobHealth::Alerting.to_string())
		.bind(notified_at.to_rfc3339())
		.bind(Utc::now().to_rfc3339())
		.bind(streak_start.to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}
}

// Database row types for sqlx

#[derive(sqlx::FromRow)]
struct RecordRow {
	id: i64,
	job_id: String,
	started_at: String,
	duration_ms: i64,
	status: String,
	exit_code: Option<i32>,
	error_message: Option<String>,
	stdout: String,
	stdout_truncated: i32,
	stderr: String,
	stderr_truncated: i32,
	created_at: String,
}

impl TryFrom<RecordRow> for ExecutionRecord {
	type Error = StoreError;

	fn try_from(row: RecordRow) -> Result<Self> {
		Ok(ExecutionRecord {
			id: Some(RecordId(row.id)),
			job_id: row
				.job_id
				.parse()
				.map_err(|_| StoreError::corrupt("job_id"))?,
			started_at: parse_timestamp(&row.started_at, "started_at")?,
			duration_ms: row.duration_ms as u64,
			outcome: RunOutcome::from_parts(&row.status, row.exit_code, row.error_message)
				.map_err(|_| StoreError::corrupt("status"))?,
			stdout: CapturedStream {
				text: row.stdout,
				truncated: row.stdout_truncated != 0,
			},
			stderr: CapturedStream {
				text: row.stderr,
				truncated: row.stderr_truncated != 0,
			},
			created_at: parse_timestamp(&row.created_at, "created_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct StateRow {
	health: String,
	consecutive_failures: i64,
	last_notified_at: Option<String>,
}

impl TryFrom<StateRow> for MonitoringState {
	type Error = StoreError;

	fn try_from(row: StateRow) -> Result<Self> {
		let health: JobHealth = row
			.health
			.parse()
			.map_err(|_| StoreError::corrupt("health"))?;
		Ok(MonitoringState {
			health,
			consecutive_failures: row.consecutive_failures as u32,
			last_notified_at: row
				.last_notified_at
				.map(|s| parse_timestamp(&s, "last_notified_at"))
				.transpose()?,
		})
	}
}

fn parse_timestamp(value: &str, what: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| StoreError::corrupt(what))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::connect_in_memory;
	use chrono::{Duration, TimeZone};

	fn record(job: &str, started_at: DateTime<Utc>, outcome: RunOutcome) -> ExecutionRecord {
		ExecutionRecord {
			id: None,
			job_id: JobId::new(job).unwrap(),
			started_at,
			duration_ms: 1500,
			outcome,
			stdout: CapturedStream {
				text: "done\n".to_string(),
				truncated: false,
			},
			stderr: CapturedStream::empty(),
			created_at: Utc::now(),
		}
	}

	fn at(minute: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2026, 3, 1, 4, minute, 0).unwrap()
	}

	#[tokio::test]
	async fn append_then_query_roundtrip() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		let original = record("backup", at(0), RunOutcome::Failed { exit_code: 2 });
		store.append(&original).await.unwrap();

		let filter = RecordFilter {
			job_id: Some(original.job_id.clone()),
			since: Some(original.started_at),
			until: Some(original.started_at),
			limit: None,
		};
		let got = store.query(&filter).await.unwrap();
		assert_eq!(got.len(), 1);

		// Equal to the original, excluding the store-assigned id.
		let mut fetched = got.into_iter().next().unwrap();
		assert!(fetched.id.is_some());
		fetched.id = None;
		assert_eq!(fetched, original);
	}

	#[tokio::test]
	async fn query_orders_by_start_time_ascending() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		for minute in [9, 1, 5] {
			store
				.append(&record("backup", at(minute), RunOutcome::Success))
				.await
				.unwrap();
		}

		let got = store.query(&RecordFilter::default()).await.unwrap();
		let minutes: Vec<u32> = got
			.iter()
			.map(|r| chrono::Timelike::minute(&r.started_at))
			.collect();
		assert_eq!(minutes, vec![1, 5, 9]);
	}

	#[tokio::test]
	async fn query_filters_by_job_and_range() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		store
			.append(&record("backup", at(0), RunOutcome::Success))
			.await
			.unwrap();
		store
			.append(&record("cleanup", at(1), RunOutcome::Success))
			.await
			.unwrap();
		store
			.append(&record("backup", at(30), RunOutcome::Success))
			.await
			.unwrap();

		let filter = RecordFilter {
			job_id: Some(JobId::new("backup").unwrap()),
			since: Some(at(10)),
			until: None,
			limit: None,
		};
		let got = store.query(&filter).await.unwrap();
		assert_eq!(got.len(), 1);
		assert_eq!(got[0].started_at, at(30));
	}

	#[tokio::test]
	async fn prune_deletes_strictly_older_records() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		let cutoff = at(30);
		// 3 older than cutoff, 1 at the cutoff, 6 newer.
		for minute in [0, 10, 20] {
			store
				.append(&record("backup", at(minute), RunOutcome::Success))
				.await
				.unwrap();
		}
		for minute in [30, 31, 35, 40, 45, 50, 55] {
			store
				.append(&record("backup", at(minute), RunOutcome::Success))
				.await
				.unwrap();
		}

		let deleted = store.prune(cutoff).await.unwrap();
		assert_eq!(deleted, 3);

		let remaining = store.query(&RecordFilter::default()).await.unwrap();
		assert_eq!(remaining.len(), 7);
		assert!(remaining.iter().all(|r| r.started_at >= cutoff));
	}

	#[tokio::test]
	async fn start_failure_roundtrips_with_message() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		let original = record(
			"backup",
			at(0),
			RunOutcome::StartFailure {
				message: "sh: /opt/backup.sh: No such file or directory".to_string(),
			},
		);
		store.append(&original).await.unwrap();

		let got = store.query(&RecordFilter::default()).await.unwrap();
		assert_eq!(got[0].outcome, original.outcome);
	}

	#[tokio::test]
	async fn truncation_flags_roundtrip() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		let mut original = record("backup", at(0), RunOutcome::Success);
		original.stdout = CapturedStream {
			text: "x".repeat(64),
			truncated: true,
		};
		store.append(&original).await.unwrap();

		let got = store.query(&RecordFilter::default()).await.unwrap();
		assert!(got[0].stdout.truncated);
		assert!(!got[0].stderr.truncated);
	}

	#[tokio::test]
	async fn job_ids_are_distinct_and_sorted() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		for job in ["cleanup", "backup", "backup"] {
			store
				.append(&record(job, at(0), RunOutcome::Success))
				.await
				.unwrap();
		}

		let ids = store.job_ids().await.unwrap();
		let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
		assert_eq!(names, vec!["backup", "cleanup"]);
	}

	#[tokio::test]
	async fn monitoring_state_upserts() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		let job = JobId::new("backup").unwrap();

		assert!(store.load_state(&job).await.unwrap().is_none());

		let mut state = MonitoringState::default();
		state.observe(false, 3);
		store.save_state(&job, &state).await.unwrap();
		assert_eq!(store.load_state(&job).await.unwrap(), Some(state.clone()));

		state.observe(false, 3);
		state.observe(false, 3);
		store.save_state(&job, &state).await.unwrap();
		assert!(store.claim_notification(&job, at(2), at(59)).await.unwrap());
		state.mark_notified(at(59));
		store.save_state(&job, &state).await.unwrap();

		let loaded = store.load_state(&job).await.unwrap().unwrap();
		assert_eq!(loaded.health, cronwatch_core::JobHealth::Suppressed);
		assert_eq!(loaded.consecutive_failures, 3);
		assert_eq!(loaded.last_notified_at, Some(at(59)));
	}

	#[tokio::test]
	async fn save_state_never_advances_the_notified_marker() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		let job = JobId::new("backup").unwrap();

		assert!(store.claim_notification(&job, at(0), at(5)).await.unwrap());

		let mut stale = MonitoringState::default();
		stale.observe(false, 3);
		store.save_state(&job, &stale).await.unwrap();

		let loaded = store.load_state(&job).await.unwrap().unwrap();
		assert_eq!(loaded.last_notified_at, Some(at(5)));
	}

	#[tokio::test]
	async fn only_one_claim_per_streak_wins() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		let job = JobId::new("backup").unwrap();

		assert!(store.claim_notification(&job, at(10), at(20)).await.unwrap());
		// A second claimant for the same streak loses.
		assert!(!store.claim_notification(&job, at(10), at(21)).await.unwrap());
		// A fresh streak claims again.
		assert!(store.claim_notification(&job, at(30), at(40)).await.unwrap());
	}

	#[tokio::test]
	async fn limit_keeps_the_most_recent_in_order() {
		let store = SqliteLogStore::new(connect_in_memory().await.unwrap());
		for minute in [0, 10, 20, 30] {
			store
				.append(&record("backup", at(minute), RunOutcome::Success))
				.await
				.unwrap();
		}

		let filter = RecordFilter {
			limit: Some(2),
			..RecordFilter::default()
		};
		let got = store.query(&filter).await.unwrap();
		let minutes: Vec<u32> = got
			.iter()
			.map(|r| chrono::Timelike::minute(&r.started_at))
			.collect();
		assert_eq!(minutes, vec![20, 30]);
	}

	#[tokio::test]
	async fn concurrent_appends_lose_no_records() {
		let dir = tempfile::tempdir().unwrap();
		let pool = crate::schema::connect(&dir.path().join("logs.db"))
			.await
			.unwrap();
		let store = std::sync::Arc::new(SqliteLogStore::new(pool));

		let mut handles = Vec::new();
		for worker in 0..4 {
			let store = store.clone();
			handles.push(tokio::spawn(async move {
				for i in 0..10 {
					let r = record(
						&format!("job-{}", worker),
						at(0) + Duration::seconds((worker * 10 + i) as i64),
						RunOutcome::Success,
					);
					store.append(&r).await.unwrap();
				}
			}));
		}
		for handle in handles {
			handle.await.unwrap();
		}

		let all = store.query(&RecordFilter::default()).await.unwrap();
		assert_eq!(all.len(), 40);
	}
}
