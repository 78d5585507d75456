// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command implementations.

pub mod jobs;
pub mod logs;
pub mod monitor;
pub mod run;
pub mod transfer;

use cronwatch_config::Config;
use cronwatch_core::JobId;
use cronwatch_store::SqliteLogStore;

pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Open the log store at the configured path, creating the data
/// directory on first use.
pub async fn open_store(config: &Config) -> CommandResult<SqliteLogStore> {
	tokio::fs::create_dir_all(&config.paths.data_dir).await?;
	let pool = cronwatch_store::connect(&config.paths.database_path()).await?;
	Ok(SqliteLogStore::new(pool))
}

pub fn parse_job_id(id: &str) -> CommandResult<JobId> {
	Ok(JobId::new(id)?)
}
