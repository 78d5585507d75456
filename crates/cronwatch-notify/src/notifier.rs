// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Notification dispatch: email when configured, report files otherwise.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, instrument, warn};

use cronwatch_config::EmailConfig;
use cronwatch_smtp::{is_valid_email, Mailer, SmtpConfig};

use crate::error::Result;
use crate::report::Report;

/// How a report was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
	/// Sent by email.
	Sent,
	/// Written to a report file (email disabled or unavailable).
	Written(PathBuf),
}

/// Dispatches rendered reports.
///
/// With email enabled, reports go out through SMTP; otherwise, and as a
/// fallback when a send fails, they are written under the reports
/// directory so an alert is never silently dropped.
pub struct Notifier {
	mailer: Option<Mailer>,
	to_address: String,
	reports_dir: PathBuf,
}

impl Notifier {
	/// Build a notifier from the email section. The mailer is only
	/// constructed when email is enabled.
	pub fn new(email: &EmailConfig, reports_dir: PathBuf) -> Result<Self> {
		let mailer = if email.enabled {
			if !is_valid_email(&email.to_address) {
				return Err(
					cronwatch_smtp::SmtpError::Address(email.to_address.clone()).into(),
				);
			}
			Some(Mailer::new(SmtpConfig {
				host: email.host.clone(),
				port: email.port,
				username: email.username.clone(),
				password: email.password.clone(),
				from_address: email.from_address.clone(),
				from_name: email.from_name.clone(),
				use_tls: email.use_tls,
			})?)
		} else {
			None
		};

		Ok(Self {
			mailer,
			to_address: email.to_address.clone(),
			reports_dir,
		})
	}

	/// A notifier that only writes report files, regardless of the
	/// email configuration.
	pub fn file_only(reports_dir: PathBuf) -> Self {
		Self {
			mailer: None,
			to_address: String::new(),
			reports_dir,
		}
	}

	/// Verify SMTP connectivity. A no-op when email is disabled.
	pub async fn check_health(&self) -> Result<()> {
		if let Some(mailer) = &self.mailer {
			mailer.check_health().await?;
		}
		Ok(())
	}

	/// Deliver a report. Email first when configured; a failed send
	/// falls back to a report file.
	#[instrument(skip(self, report), fields(subject = %report.subject))]
	pub async fn dispatch(&self, report: &Report) -> Result<Delivery> {
		if let Some(mailer) = &self.mailer {
			match mailer
				.send_email(&self.to_address, &report.subject, &report.html, &report.text)
				.await
			{
				Ok(()) => {
					info!("notification sent by email");
					return Ok(Delivery::Sent);
				}
				Err(e) => {
					warn!(error = %e, "email delivery failed, writing report file instead");
				}
			}
		}

		let path = self.write_report(report).await?;
		info!(path = %path.display(), "notification written to report file");
		Ok(Delivery::Written(path))
	}

	async fn write_report(&self, report: &Report) -> Result<PathBuf> {
		tokio::fs::create_dir_all(&self.reports_dir).await?;
		let filename = format!("{}.txt", Utc::now().format("%Y%m%dT%H%M%S%.3f"));
		let path = self.reports_dir.join(filename);
		let content = format!("Subject: {}\n\n{}", report.subject, report.text);
		tokio::fs::write(&path, content).await?;
		Ok(path)
	}
}
