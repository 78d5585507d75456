// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Export, import and backup commands.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cronwatch_config::Config;
use cronwatch_core::{Job, JobId, JobSource, ScheduleExpr};
use cronwatch_crontab::{format_entry, JobTable, UserCrontab};
use cronwatch_runner::{unwrap_command, wrap_command};

use crate::cli::ExportFormat;

use super::CommandResult;

/// Portable job representation used by export and import. Commands are
/// stored unwrapped so exports are usable outside cronwatch.
#[derive(Debug, Serialize, Deserialize)]
struct PortableJob {
	id: String,
	schedule: String,
	command: String,
	#[serde(default)]
	comment: Option<String>,
	#[serde(default = "default_enabled")]
	enabled: bool,
}

fn default_enabled() -> bool {
	true
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportFile {
	version: u32,
	exported_at: DateTime<Utc>,
	jobs: Vec<PortableJob>,
}

pub async fn export(format: ExportFormat, output: Option<&Path>) -> CommandResult {
	let jobs = UserCrontab::new().load().await?;

	let content = match format {
		ExportFormat::Json => render_json(&jobs)?,
		ExportFormat::Csv => render_csv(&jobs),
		ExportFormat::Markdown => render_markdown(&jobs),
		ExportFormat::Crontab => render_crontab(&jobs),
	};

	match output {
		Some(path) => {
			tokio::fs::write(path, content).await?;
			println!("Exported {} job(s) to {}.", jobs.len(), path.display());
		}
		None => print!("{content}"),
	}
	Ok(())
}

pub async fn import(file: &Path) -> CommandResult {
	let content = tokio::fs::read_to_string(file).await?;
	let export: ExportFile = serde_json::from_str(&content)?;

	let table = UserCrontab::new();
	let mut jobs = table.load().await?;

	let mut added = 0usize;
	let mut skipped = 0usize;
	for portable in export.jobs {
		let id = JobId::new(&portable.id)?;
		if jobs.iter().any(|j| j.id == id) {
			skipped += 1;
			continue;
		}
		let schedule = ScheduleExpr::parse(&portable.schedule)?;
		jobs.push(Job {
			command: wrap_command(&id, &portable.command),
			id,
			schedule,
			comment: portable.comment,
			enabled: portable.enabled,
			source: JobSource::User,
			user: None,
		});
		added += 1;
	}
	table.save(&jobs).await?;

	println!("Imported {added} job(s), skipped {skipped} existing.");
	Ok(())
}

/// Write a timestamped backup directory holding the user crontab, the
/// log database and the config file.
pub async fn backup(config: &Config, output: Option<PathBuf>) -> CommandResult {
	let base = output.unwrap_or_else(|| config.paths.data_dir.join("backups"));
	let dest = base.join(Utc::now().format("%Y%m%dT%H%M%S").to_string());
	tokio::fs::create_dir_all(&dest).await?;

	let jobs = UserCrontab::new().load().await?;
	tokio::fs::write(dest.join("crontab.txt"), render_crontab(&jobs)).await?;

	let db = config.paths.database_path();
	if tokio::fs::try_exists(&db).await? {
		tokio::fs::copy(&db, dest.join("logs.db")).await?;
	}

	let config_file = cronwatch_config::user_config_path();
	if tokio::fs::try_exists(&config_file).await? {
		tokio::fs::copy(&config_file, dest.join("config.toml")).await?;
	}

	println!(
		"Backed up {} job(s) to {}.",
		jobs.len(),
		dest.display()
	);
	Ok(())
}

fn portable(job: &Job) -> PortableJob {
	let command = unwrap_command(&job.command)
		.map(|(_, original)| original)
		.unwrap_or_else(|| job.command.clone());
	PortableJob {
		id: job.id.to_string(),
		schedule: job.schedule.as_crontab_field(),
		command,
		comment: job.comment.clone(),
		enabled: job.enabled,
	}
}

fn render_json(jobs: &[Job]) -> Result<String, serde_json::Error> {
	let export = ExportFile {
		version: 1,
		exported_at: Utc::now(),
		jobs: jobs.iter().map(portable).collect(),
	};
	let mut out = serde_json::to_string_pretty(&export)?;
	out.push('\n');
	Ok(out)
}

fn render_csv(jobs: &[Job]) -> String {
	let mut out = String::from("id,schedule,command,comment,enabled\n");
	for job in jobs.iter().map(portable) {
		out.push_str(&format!(
			"{},{},{},{},{}\n",
			csv_field(&job.id),
			csv_field(&job.schedule),
			csv_field(&job.command),
			csv_field(job.comment.as_deref().unwrap_or("")),
			job.enabled
		));
	}
	out
}

fn csv_field(value: &str) -> String {
	if value.contains(',') || value.contains('"') || value.contains('\n') {
		format!("\"{}\"", value.replace('"', "\"\""))
	} else {
		value.to_string()
	}
}

fn render_markdown(jobs: &[Job]) -> String {
	let mut out = String::from(
		"| ID | Schedule | Command | Comment | Enabled |\n|---|---|---|---|---|\n",
	);
	for job in jobs.iter().map(portable) {
		out.push_str(&format!(
			"| {} | `{}` | `{}` | {} | {} |\n",
			job.id,
			job.schedule,
			job.command.replace('|', "\\|"),
			job.comment.as_deref().unwrap_or(""),
			if job.enabled { "yes" } else { "no" }
		));
	}
	out
}

fn render_crontab(jobs: &[Job]) -> String {
	let mut out = String::new();
	for job in jobs {
		out.push_str(&format_entry(job));
		out.push('\n');
	}
	out
}
