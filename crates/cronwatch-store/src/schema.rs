// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database bootstrap: connection options and schema creation.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::error::Result;

/// Open (creating if missing) the log database at `path`.
///
/// WAL mode lets monitoring reads run concurrently with appends from
/// wrapper processes.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
	let options = SqliteConnectOptions::new()
		.filename(path)
		.create_if_missing(true)
		.journal_mode(SqliteJournalMode::Wal)
		.busy_timeout(std::time::Duration::from_secs(5));

	let pool = SqlitePoolOptions::new()
		.max_connections(4)
		.connect_with(options)
		.await?;

	init_schema(&pool).await?;
	Ok(pool)
}

/// Open an in-memory store, for tests and dry runs.
pub async fn connect_in_memory() -> Result<SqlitePool> {
	let options = SqliteConnectOptions::new()
		.filename(":memory:")
		.in_memory(true);
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await?;
	init_schema(&pool).await?;
	Ok(pool)
}

/// Create tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
	debug!("initializing log store schema");

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS execution_records (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			job_id TEXT NOT NULL,
			started_at TEXT NOT NULL,
			duration_ms INTEGER NOT NULL,
			status TEXT NOT NULL,
			exit_code INTEGER,
			error_message TEXT,
			stdout TEXT NOT NULL DEFAULT '',
			stdout_truncated INTEGER NOT NULL DEFAULT 0,
			stderr TEXT NOT NULL DEFAULT '',
			stderr_truncated INTEGER NOT NULL DEFAULT 0,
			created_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_records_job_started
		 ON execution_records (job_id, started_at)",
	)
	.execute(pool)
	.await?;

	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_records_started
		 ON execution_records (started_at)",
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS monitor_state (
			job_id TEXT PRIMARY KEY,
			health TEXT NOT NULL,
			consecutive_failures INTEGER NOT NULL DEFAULT 0,
			last_notified_at TEXT,
			updated_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await?;

	Ok(())
}
