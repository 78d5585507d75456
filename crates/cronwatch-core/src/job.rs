// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job types for cron entry management.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Unique identifier for a job.
///
/// Managed entries carry their id in a `# cronwatch:<id>` crontab tag;
/// unmanaged entries get a derived id from a hash of (command, schedule)
/// so logs and statistics can still be keyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
	/// Create a job id, validating the slug format.
	pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
		let id = id.into();
		if Self::validate(&id) {
			Ok(Self(id))
		} else {
			Err(CoreError::InvalidJobId(id))
		}
	}

	/// Derive a stable id for an entry that carries no cronwatch tag.
	pub fn derived(command: &str, schedule: &str) -> Self {
		Self(format!("job-{:08x}", fnv1a(command, schedule)))
	}

	/// Validate an id slug: 1..=64 chars, lowercase ASCII letters,
	/// digits, `-` or `_`, starting with a letter.
	pub fn validate(id: &str) -> bool {
		if id.is_empty() || id.len() > 64 {
			return false;
		}
		id.starts_with(|c: char| c.is_ascii_lowercase())
			&& id
				.chars()
				.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for JobId {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

/// FNV-1a over command and schedule. Stable across builds, unlike the
/// std hasher.
fn fnv1a(command: &str, schedule: &str) -> u32 {
	const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
	const PRIME: u64 = 0x0000_0100_0000_01b3;
	let mut hash = OFFSET;
	for byte in command.bytes().chain([0u8]).chain(schedule.bytes()) {
		hash ^= byte as u64;
		hash = hash.wrapping_mul(PRIME);
	}
	(hash ^ (hash >> 32)) as u32
}

/// A scheduled command, referenced (not owned) by the logging core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
	pub id: JobId,
	pub command: String,
	pub schedule: ScheduleExpr,
	pub comment: Option<String>,
	pub enabled: bool,
	pub source: JobSource,
	/// Owning user, where the source records one (system crontabs).
	pub user: Option<String>,
}

/// Schedule expression for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleExpr {
	/// Standard 5-field cron expression: minute hour day month weekday.
	Cron { expression: String },
	/// `@reboot`: runs at system startup, no deterministic next time.
	Reboot,
}

impl ScheduleExpr {
	/// Parse a crontab schedule field, normalizing `@`-aliases to their
	/// 5-field equivalents. `@reboot` is the only alias with no cron
	/// equivalent and is kept as its own variant.
	pub fn parse(s: &str) -> Result<Self, CoreError> {
		let s = s.trim();
		let expression = match s {
			"@reboot" => return Ok(Self::Reboot),
			"@yearly" | "@annually" => "0 0 1 1 *".to_string(),
			"@monthly" => "0 0 1 * *".to_string(),
			"@weekly" => "0 0 * * 0".to_string(),
			"@daily" | "@midnight" => "0 0 * * *".to_string(),
			"@hourly" => "0 * * * *".to_string(),
			_ => {
				if s.starts_with('@') || s.split_whitespace().count() != 5 {
					return Err(CoreError::InvalidSchedule(s.to_string()));
				}
				s.split_whitespace().collect::<Vec<_>>().join(" ")
			}
		};
		Ok(Self::Cron { expression })
	}

	/// The crontab-file rendering of this schedule.
	pub fn as_crontab_field(&self) -> String {
		match self {
			Self::Cron { expression } => expression.clone(),
			Self::Reboot => "@reboot".to_string(),
		}
	}

	/// Human-readable rendering for tables and reports.
	pub fn describe(&self) -> String {
		let expression = match self {
			Self::Reboot => return "At startup".to_string(),
			Self::Cron { expression } => expression,
		};
		let fields: Vec<&str> = expression.split_whitespace().collect();
		match fields.as_slice() {
			["*", "*", "*", "*", "*"] => "Every minute".to_string(),
			[minute, "*", "*", "*", "*"] if minute.starts_with("*/") => {
				format!("Every {} minutes", &minute[2..])
			}
			["0", "*", "*", "*", "*"] => "Hourly".to_string(),
			["0", "0", "*", "*", "*"] => "Daily at midnight".to_string(),
			["0", "0", "*", "*", "0"] => "Weekly (Sunday)".to_string(),
			["0", "0", "1", "*", "*"] => "Monthly (1st)".to_string(),
			_ => expression.clone(),
		}
	}
}

impl fmt::Display for ScheduleExpr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_crontab_field())
	}
}

/// Where a job entry lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
	/// The invoking user's crontab.
	User,
	/// `/etc/crontab`.
	System,
	/// A file under `/etc/cron.d/`.
	CronD(String),
	/// A script under `/etc/cron.{hourly,daily,weekly,monthly}/`.
	Periodic(String),
}

impl fmt::Display for JobSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::User => write!(f, "user"),
			Self::System => write!(f, "system"),
			Self::CronD(file) => write!(f, "cron.d/{}", file),
			Self::Periodic(period) => write!(f, "periodic-{}", period),
		}
	}
}
