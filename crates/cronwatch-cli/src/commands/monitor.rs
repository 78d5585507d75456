// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Monitoring commands: monitor, report, notify-test.

use std::time::Duration;

use tracing::info;

use cronwatch_config::Config;
use cronwatch_core::{summarize, DEFAULT_TOP_ERRORS};
use cronwatch_notify::{stats_report, test_report, Delivery, FailureWatcher, Notifier, WatchOutcome};
use cronwatch_store::{LogStore, RecordFilter};

use super::{open_store, parse_job_id, CommandResult};

pub async fn monitor(config: &Config, watch: bool) -> CommandResult {
	if !config.monitoring.enabled {
		println!("Monitoring is disabled in the configuration.");
		return Ok(());
	}
	cronwatch_store::validate_timezone(&config.monitoring.timezone)?;

	let store = open_store(config).await?;
	let notifier = Notifier::new(&config.email, config.paths.reports_dir())?;
	let watcher = FailureWatcher::new(
		&store,
		&notifier,
		config.monitoring.max_failures,
		config.email.notify_on_success,
	);

	loop {
		let outcomes = watcher.evaluate_all().await?;
		for (job_id, outcome) in &outcomes {
			match outcome {
				WatchOutcome::Quiet { health } => {
					println!("{job_id}: {health}");
				}
				WatchOutcome::Alerted { delivery } => {
					println!("{job_id}: alert dispatched ({})", describe(delivery));
				}
				WatchOutcome::AlreadyNotified => {
					println!("{job_id}: failing, already notified");
				}
				WatchOutcome::Recovered { delivery } => match delivery {
					Some(delivery) => {
						println!("{job_id}: recovered ({})", describe(delivery))
					}
					None => println!("{job_id}: recovered"),
				},
			}
		}
		if outcomes.is_empty() {
			println!("No jobs with recorded history.");
		}

		if !watch {
			return Ok(());
		}
		info!(
			interval_secs = config.monitoring.check_interval_secs,
			"sleeping until next evaluation"
		);
		tokio::time::sleep(Duration::from_secs(config.monitoring.check_interval_secs)).await;
	}
}

pub async fn report(config: &Config, job: Option<String>) -> CommandResult {
	let store = open_store(config).await?;
	let notifier = Notifier::new(&config.email, config.paths.reports_dir())?;

	let job_ids = match job {
		Some(job) => vec![parse_job_id(&job)?],
		None => store.job_ids().await?,
	};
	if job_ids.is_empty() {
		println!("No jobs with recorded history.");
		return Ok(());
	}

	for job_id in job_ids {
		let records = store
			.query(&RecordFilter::for_job(job_id.clone()))
			.await?;
		let summary = summarize(&records, DEFAULT_TOP_ERRORS);
		let delivery = notifier.dispatch(&stats_report(&job_id, &summary)).await?;
		println!("{}: report {}", job_id, describe(&delivery));
	}
	Ok(())
}

pub async fn notify_test(config: &Config) -> CommandResult {
	let notifier = Notifier::new(&config.email, config.paths.reports_dir())?;
	notifier.check_health().await?;
	let delivery = notifier.dispatch(&test_report()).await?;
	match delivery {
		Delivery::Sent => println!("Test notification sent to {}.", config.email.to_address),
		Delivery::Written(path) => {
			println!("Email not configured; test report written to {}.", path.display())
		}
	}
	Ok(())
}

fn describe(delivery: &Delivery) -> String {
	match delivery {
		Delivery::Sent => "emailed".to_string(),
		Delivery::Written(path) => format!("written to {}", path.display()),
	}
}
