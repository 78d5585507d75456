// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use cronwatch_config::Config;

#[tokio::main]
async fn main() {
	// Logs go to stderr so wrapped runs never mix ours into cron mail.
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
		)
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();

	let config = match load_config(&cli) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("cronwatch: {e}");
			std::process::exit(2);
		}
	};

	let result = dispatch(cli.command, &config).await;
	match result {
		Ok(code) => std::process::exit(code),
		Err(e) => {
			eprintln!("cronwatch: {e}");
			std::process::exit(1);
		}
	}
}

fn load_config(cli: &Cli) -> Result<Config, cronwatch_config::ConfigError> {
	match &cli.config {
		Some(path) => cronwatch_config::load_config_with_file(path),
		None => cronwatch_config::load_config(),
	}
}

async fn dispatch(
	command: Command,
	config: &Config,
) -> Result<i32, Box<dyn std::error::Error>> {
	match command {
		Command::List { system } => commands::jobs::list(config, system).await?,
		Command::Add {
			id,
			schedule,
			comment,
			no_log,
			cron_d,
			periodic,
			command,
		} => {
			commands::jobs::add(
				id,
				schedule.as_deref(),
				comment,
				no_log,
				cron_d.as_deref(),
				periodic.as_deref(),
				&command.join(" "),
			)
			.await?
		}
		Command::Remove { id } => commands::jobs::remove(&id).await?,
		Command::Enable { id } => commands::jobs::set_enabled(&id, true).await?,
		Command::Disable { id } => commands::jobs::set_enabled(&id, false).await?,
		Command::Search { pattern } => commands::jobs::search(config, &pattern).await?,
		Command::Validate { expression } => {
			commands::jobs::validate(config, expression.as_deref()).await?
		}
		Command::Run {
			job,
			timeout,
			command,
		} => {
			return commands::run::run(config, &job, timeout, &command.join(" ")).await;
		}
		Command::Logs {
			job,
			since,
			until,
			limit,
			failures_only,
		} => commands::logs::logs(config, job, since, until, limit, failures_only).await?,
		Command::Stats { job, days } => commands::logs::stats(config, job, days).await?,
		Command::Prune { days } => commands::logs::prune(config, days).await?,
		Command::Monitor { watch } => commands::monitor::monitor(config, watch).await?,
		Command::Report { job } => commands::monitor::report(config, job).await?,
		Command::NotifyTest => commands::monitor::notify_test(config).await?,
		Command::Export { format, output } => {
			commands::transfer::export(format, output.as_deref()).await?
		}
		Command::Import { file } => commands::transfer::import(&file).await?,
		Command::Backup { output } => commands::transfer::backup(config, output).await?,
	}
	Ok(0)
}
