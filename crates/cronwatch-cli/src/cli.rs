// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Cron job manager with execution logging and failure alerts.
#[derive(Debug, Parser)]
#[command(name = "cronwatch", version, about)]
pub struct Cli {
	/// Path to the config file (default: ~/.config/cronwatch/config.toml).
	#[arg(long, global = true, env = "CRONWATCH_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// List jobs from the user crontab.
	List {
		/// Include system cron sources (/etc/crontab, cron.d, periodic).
		#[arg(long)]
		system: bool,
	},

	/// Add a managed job to the user crontab, or to a system source
	/// with --cron-d or --periodic (both need root).
	Add {
		/// Job id (lowercase slug). Derived from the command if omitted.
		#[arg(long)]
		id: Option<String>,

		/// Schedule: 5-field cron expression or an @-alias. The
		/// period supplies it for --periodic.
		#[arg(long, required_unless_present = "periodic", conflicts_with = "periodic")]
		schedule: Option<String>,

		/// Human comment stored with the entry.
		#[arg(long)]
		comment: Option<String>,

		/// Install the command as written, without the logging wrapper.
		#[arg(long)]
		no_log: bool,

		/// Install into /etc/cron.d/<FILE> instead of the user crontab.
		#[arg(long, value_name = "FILE", conflicts_with = "periodic")]
		cron_d: Option<String>,

		/// Install as a run-parts script in /etc/cron.<PERIOD>/
		/// (hourly, daily, weekly or monthly).
		#[arg(long, value_name = "PERIOD")]
		periodic: Option<String>,

		/// The command to run.
		#[arg(required = true, trailing_var_arg = true)]
		command: Vec<String>,
	},

	/// Remove a managed job from the user crontab.
	Remove {
		/// Job id to remove.
		id: String,
	},

	/// Enable a disabled job.
	Enable { id: String },

	/// Disable a job without removing it.
	Disable { id: String },

	/// Search jobs by id, command or comment.
	Search { pattern: String },

	/// Validate a schedule expression, or every readable crontab
	/// source when no expression is given.
	Validate { expression: Option<String> },

	/// Execute a command and record the run. This is what wrapped
	/// crontab entries invoke; the command's exit status is forwarded.
	Run {
		/// Job id to record the run under.
		#[arg(long)]
		job: String,

		/// Kill the command after this many seconds.
		#[arg(long)]
		timeout: Option<u64>,

		/// The command to execute.
		#[arg(required = true, trailing_var_arg = true)]
		command: Vec<String>,
	},

	/// Show recorded executions.
	Logs {
		/// Limit to one job.
		#[arg(long)]
		job: Option<String>,

		/// Only records started at or after this time (RFC 3339 or
		/// YYYY-MM-DD).
		#[arg(long)]
		since: Option<String>,

		/// Only records started at or before this time (RFC 3339 or
		/// YYYY-MM-DD).
		#[arg(long)]
		until: Option<String>,

		/// Show at most this many of the latest records.
		#[arg(long, default_value_t = 20)]
		limit: usize,

		/// Show failures only.
		#[arg(long)]
		failures_only: bool,
	},

	/// Aggregate execution statistics.
	Stats {
		/// Limit to one job; all jobs otherwise.
		#[arg(long)]
		job: Option<String>,

		/// Only consider records from the last N days.
		#[arg(long)]
		days: Option<u32>,
	},

	/// Delete records older than the retention window.
	Prune {
		/// Override the configured retention in days.
		#[arg(long)]
		days: Option<u32>,
	},

	/// Evaluate job health and dispatch due alerts.
	Monitor {
		/// Keep running, re-evaluating on the configured interval.
		#[arg(long)]
		watch: bool,
	},

	/// Render an execution report and deliver it.
	Report {
		/// Limit to one job; all jobs otherwise.
		#[arg(long)]
		job: Option<String>,
	},

	/// Send a test notification to verify delivery.
	NotifyTest,

	/// Export jobs in a machine-readable format.
	Export {
		#[arg(long, value_enum, default_value_t = ExportFormat::Json)]
		format: ExportFormat,

		/// Write to a file instead of stdout.
		#[arg(long)]
		output: Option<PathBuf>,
	},

	/// Import jobs from a JSON export into the user crontab.
	Import {
		/// File produced by `cronwatch export --format json`.
		file: PathBuf,
	},

	/// Back up the user crontab and the log database.
	Backup {
		/// Destination directory (default: <data_dir>/backups).
		#[arg(long)]
		output: Option<PathBuf>,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
	Json,
	Csv,
	Markdown,
	Crontab,
}
