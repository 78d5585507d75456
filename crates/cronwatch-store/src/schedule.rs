// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schedule parsing and next run calculation for jobs.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

use cronwatch_core::ScheduleExpr;

use crate::error::{Result, StoreError};

/// Upcoming run times for a job schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextRuns {
	/// The job runs at system boot and has no computable fire times.
	AtStartup,
	/// The next `n` fire times, in UTC, ascending.
	At(Vec<DateTime<Utc>>),
}

/// Convert a standard 5-field Unix cron expression to the 7-field format
/// expected by the `cron` crate.
///
/// 5-field format: minute hour day-of-month month day-of-week
/// 7-field format: second minute hour day-of-month month day-of-week year
///
/// We add "0" for seconds (run at :00 of each minute) and "*" for year (any year).
fn convert_to_cron_crate_format(expression: &str) -> String {
	let field_count = expression.split_whitespace().count();
	if field_count == 5 {
		format!("0 {} *", expression)
	} else {
		// Wrong field count, return as-is and let the parser error
		expression.to_string()
	}
}

/// Calculate the next `count` run times for a job schedule.
///
/// Cron expressions are evaluated in `timezone` (IANA name) and the fire
/// times are returned in UTC. `@reboot` schedules have no computable fire
/// times and yield [`NextRuns::AtStartup`].
pub fn next_runs(
	schedule: &ScheduleExpr,
	timezone: &str,
	after: DateTime<Utc>,
	count: usize,
) -> Result<NextRuns> {
	let expression = match schedule {
		ScheduleExpr::Reboot => return Ok(NextRuns::AtStartup),
		ScheduleExpr::Cron { expression } => expression,
	};

	let cron_expr = convert_to_cron_crate_format(expression);
	let cron_schedule = Schedule::from_str(&cron_expr)
		.map_err(|e| StoreError::InvalidCronExpression(e.to_string()))?;

	let tz: Tz = timezone
		.parse()
		.map_err(|_| StoreError::InvalidTimezone(timezone.to_string()))?;

	let local_after = after.with_timezone(&tz);
	let times = cron_schedule
		.after(&local_after)
		.take(count)
		.map(|local| local.with_timezone(&Utc))
		.collect();

	Ok(NextRuns::At(times))
}

/// Validate a 5-field cron expression without calculating a next run.
pub fn validate_expression(expression: &str) -> Result<()> {
	let cron_expr = convert_to_cron_crate_format(expression);
	Schedule::from_str(&cron_expr)
		.map_err(|e| StoreError::InvalidCronExpression(e.to_string()))?;
	Ok(())
}

/// Validate an IANA timezone name.
pub fn validate_timezone(timezone: &str) -> Result<()> {
	let _: Tz = timezone
		.parse()
		.map_err(|_| StoreError::InvalidTimezone(timezone.to_string()))?;
	Ok(())
}
