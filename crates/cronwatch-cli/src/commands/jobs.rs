// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job management commands: list, add, remove, enable, disable,
//! search, validate.

use chrono::Utc;

use cronwatch_config::Config;
use cronwatch_core::{Job, JobId, JobSource, ScheduleExpr};
use cronwatch_crontab::{JobTable, SystemCrontabs, UserCrontab};
use cronwatch_runner::{unwrap_command, wrap_command};
use cronwatch_store::{next_runs, LogStore, NextRuns};

use super::{open_store, parse_job_id, CommandResult};

pub async fn list(config: &Config, include_system: bool) -> CommandResult {
	let mut jobs = UserCrontab::new().load().await?;
	if include_system {
		jobs.extend(SystemCrontabs::new().load().await?);
	}

	if jobs.is_empty() {
		println!("No jobs found.");
		return Ok(());
	}

	let store = open_store(config).await.ok();

	let id_width = jobs
		.iter()
		.map(|j| j.id.as_str().len())
		.max()
		.unwrap_or(2)
		.max(2);
	println!(
		"{:<id_width$}  {:<20}  {:<8}  {:<10}  COMMAND",
		"ID", "SCHEDULE", "STATE", "HEALTH"
	);
	for job in &jobs {
		let health = match &store {
			Some(store) => store
				.load_state(&job.id)
				.await
				.ok()
				.flatten()
				.map(|s| s.health.to_string())
				.unwrap_or_else(|| "-".to_string()),
			None => "-".to_string(),
		};
		let state = if job.enabled { "enabled" } else { "disabled" };
		println!(
			"{:<id_width$}  {:<20}  {:<8}  {:<10}  {}",
			job.id.as_str(),
			job.schedule.describe(),
			state,
			health,
			display_command(job)
		);
	}
	Ok(())
}

pub async fn add(
	id: Option<String>,
	schedule: Option<&str>,
	comment: Option<String>,
	no_log: bool,
	cron_d: Option<&str>,
	periodic: Option<&str>,
	command: &str,
) -> CommandResult {
	if let Some(period) = periodic {
		return add_periodic_script(id, period, no_log, command).await;
	}

	let schedule = ScheduleExpr::parse(schedule.ok_or("--schedule is required")?)?;
	if let ScheduleExpr::Cron { expression } = &schedule {
		cronwatch_store::validate_expression(expression)?;
	}

	let id = match id {
		Some(id) => JobId::new(id)?,
		None => JobId::derived(command, &schedule.as_crontab_field()),
	};

	if let Some(file) = cron_d {
		return add_cron_d_entry(file, id, schedule, comment, no_log, command).await;
	}

	let table = UserCrontab::new();
	let mut jobs = table.load().await?;
	if jobs.iter().any(|j| j.id == id) {
		return Err(format!("a job with id '{}' already exists", id).into());
	}

	let command = if no_log {
		command.to_string()
	} else {
		wrap_command(&id, command)
	};
	let job = Job {
		command,
		id: id.clone(),
		schedule,
		comment,
		enabled: true,
		source: JobSource::User,
		user: None,
	};
	jobs.push(job);
	table.save(&jobs).await?;

	println!("Added job '{}'.", id);
	Ok(())
}

/// Installs under /etc/cron.d with a root user column. The id must be
/// free across every system source.
async fn add_cron_d_entry(
	file: &str,
	id: JobId,
	schedule: ScheduleExpr,
	comment: Option<String>,
	no_log: bool,
	command: &str,
) -> CommandResult {
	let table = SystemCrontabs::new();
	if table.load().await?.iter().any(|j| j.id == id) {
		return Err(format!("a job with id '{}' already exists", id).into());
	}

	let command = if no_log {
		command.to_string()
	} else {
		wrap_command(&id, command)
	};
	let job = Job {
		command,
		id: id.clone(),
		schedule,
		comment,
		enabled: true,
		source: JobSource::CronD(file.to_string()),
		user: Some("root".to_string()),
	};
	table.add_cron_d(file, &job).await?;

	println!("Added job '{}' to cron.d/{}.", id, file);
	Ok(())
}

async fn add_periodic_script(
	id: Option<String>,
	period: &str,
	no_log: bool,
	command: &str,
) -> CommandResult {
	let id = match id {
		Some(id) => JobId::new(id)?,
		None => JobId::derived(command, period),
	};
	let command = if no_log {
		command.to_string()
	} else {
		wrap_command(&id, command)
	};
	SystemCrontabs::new()
		.add_periodic(period, id.as_str(), &command)
		.await?;

	println!("Installed periodic job '{}' under cron.{}.", id, period);
	Ok(())
}

pub async fn remove(id: &str) -> CommandResult {
	let id = parse_job_id(id)?;
	let table = UserCrontab::new();
	let mut jobs = table.load().await?;
	let before = jobs.len();
	jobs.retain(|j| j.id != id);
	if jobs.len() == before {
		return Err(format!("no job with id '{}'", id).into());
	}
	table.save(&jobs).await?;

	println!("Removed job '{}'.", id);
	Ok(())
}

pub async fn set_enabled(id: &str, enabled: bool) -> CommandResult {
	let id = parse_job_id(id)?;
	let table = UserCrontab::new();
	let mut jobs = table.load().await?;
	let job = jobs
		.iter_mut()
		.find(|j| j.id == id)
		.ok_or_else(|| format!("no job with id '{}'", id))?;
	job.enabled = enabled;
	table.save(&jobs).await?;

	println!(
		"Job '{}' {}.",
		id,
		if enabled { "enabled" } else { "disabled" }
	);
	Ok(())
}

pub async fn search(_config: &Config, pattern: &str) -> CommandResult {
	let mut jobs = UserCrontab::new().load().await?;
	jobs.extend(SystemCrontabs::new().load().await?);

	let needle = pattern.to_lowercase();
	let matches: Vec<&Job> = jobs
		.iter()
		.filter(|j| {
			j.id.as_str().contains(&needle)
				|| display_command(j).to_lowercase().contains(&needle)
				|| j
					.comment
					.as_deref()
					.map(|c| c.to_lowercase().contains(&needle))
					.unwrap_or(false)
		})
		.collect();

	if matches.is_empty() {
		println!("No jobs match '{}'.", pattern);
		return Ok(());
	}
	for job in matches {
		println!(
			"{}  [{}]  {}  {}",
			job.id,
			job.source,
			job.schedule.as_crontab_field(),
			display_command(job)
		);
	}
	Ok(())
}

/// With an expression: validate it and show its next fire times. With
/// none: check every job schedule from all readable crontab sources.
pub async fn validate(config: &Config, expression: Option<&str>) -> CommandResult {
	let Some(expression) = expression else {
		return validate_all_sources().await;
	};

	let schedule = ScheduleExpr::parse(expression)?;
	if let ScheduleExpr::Cron { expression } = &schedule {
		cronwatch_store::validate_expression(expression)?;
	}

	println!("{} -- {}", schedule.as_crontab_field(), schedule.describe());

	match next_runs(&schedule, &config.monitoring.timezone, Utc::now(), 3)? {
		NextRuns::AtStartup => println!("Runs at system startup; no fixed fire times."),
		NextRuns::At(times) => {
			println!("Next runs ({}):", config.monitoring.timezone);
			for time in times {
				println!("  {}", time.to_rfc3339());
			}
		}
	}
	Ok(())
}

async fn validate_all_sources() -> CommandResult {
	let mut jobs = UserCrontab::new().load().await?;
	jobs.extend(SystemCrontabs::new().load().await?);

	let mut invalid = 0usize;
	for job in &jobs {
		let result = match &job.schedule {
			ScheduleExpr::Reboot => Ok(()),
			ScheduleExpr::Cron { expression } => {
				cronwatch_store::validate_expression(expression)
			}
		};
		if let Err(e) = result {
			invalid += 1;
			println!("{}  [{}]  INVALID: {}", job.id, job.source, e);
		}
	}

	if invalid == 0 {
		println!("All {} job schedule(s) are valid.", jobs.len());
		Ok(())
	} else {
		Err(format!("{invalid} job(s) have invalid schedules").into())
	}
}

/// The command as the user wrote it: wrapped entries show their
/// original command, not the recorder invocation.
fn display_command(job: &Job) -> String {
	unwrap_command(&job.command)
		.map(|(_, original)| original)
		.unwrap_or_else(|| job.command.clone())
}
