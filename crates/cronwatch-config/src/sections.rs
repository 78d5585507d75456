// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections: email, monitoring, retention, capture, paths.
//!
//! Each section comes in two forms: a `*Layer` with every field optional,
//! used while merging sources, and the resolved form produced by
//! `finalize` with defaults filled in.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use cronwatch_core::DEFAULT_CAPTURE_LIMIT_BYTES;
use cronwatch_secret::SecretString;

// Email

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmailConfigLayer {
	pub enabled: Option<bool>,
	pub host: Option<String>,
	pub port: Option<u16>,
	pub username: Option<String>,
	pub password: Option<SecretString>,
	pub from_address: Option<String>,
	pub from_name: Option<String>,
	pub to_address: Option<String>,
	pub use_tls: Option<bool>,
	pub notify_on_failure: Option<bool>,
	pub notify_on_success: Option<bool>,
}

impl EmailConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.username.is_some() {
			self.username = other.username;
		}
		if other.password.is_some() {
			self.password = other.password;
		}
		if other.from_address.is_some() {
			self.from_address = other.from_address;
		}
		if other.from_name.is_some() {
			self.from_name = other.from_name;
		}
		if other.to_address.is_some() {
			self.to_address = other.to_address;
		}
		if other.use_tls.is_some() {
			self.use_tls = other.use_tls;
		}
		if other.notify_on_failure.is_some() {
			self.notify_on_failure = other.notify_on_failure;
		}
		if other.notify_on_success.is_some() {
			self.notify_on_success = other.notify_on_success;
		}
	}

	pub fn finalize(self) -> EmailConfig {
		EmailConfig {
			enabled: self.enabled.unwrap_or(false),
			host: self.host.unwrap_or_else(|| "smtp.gmail.com".to_string()),
			port: self.port.unwrap_or(587),
			username: self.username,
			password: self.password,
			from_address: self.from_address.unwrap_or_default(),
			from_name: self.from_name.unwrap_or_else(|| "cronwatch".to_string()),
			to_address: self.to_address.unwrap_or_default(),
			use_tls: self.use_tls.unwrap_or(true),
			notify_on_failure: self.notify_on_failure.unwrap_or(true),
			notify_on_success: self.notify_on_success.unwrap_or(false),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
	pub enabled: bool,
	pub host: String,
	pub port: u16,
	pub username: Option<String>,
	pub password: Option<SecretString>,
	pub from_address: String,
	pub from_name: String,
	pub to_address: String,
	pub use_tls: bool,
	pub notify_on_failure: bool,
	pub notify_on_success: bool,
}

impl Default for EmailConfig {
	fn default() -> Self {
		EmailConfigLayer::default().finalize()
	}
}

// Monitoring

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonitoringConfigLayer {
	pub enabled: Option<bool>,
	pub check_interval_secs: Option<u64>,
	pub max_failures: Option<u32>,
	pub timezone: Option<String>,
}

impl MonitoringConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.check_interval_secs.is_some() {
			self.check_interval_secs = other.check_interval_secs;
		}
		if other.max_failures.is_some() {
			self.max_failures = other.max_failures;
		}
		if other.timezone.is_some() {
			self.timezone = other.timezone;
		}
	}

	pub fn finalize(self) -> MonitoringConfig {
		MonitoringConfig {
			enabled: self.enabled.unwrap_or(true),
			check_interval_secs: self.check_interval_secs.unwrap_or(300),
			// Alert after this many consecutive failures.
			max_failures: self.max_failures.unwrap_or(3).max(1),
			timezone: self.timezone.unwrap_or_else(|| "UTC".to_string()),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringConfig {
	pub enabled: bool,
	pub check_interval_secs: u64,
	pub max_failures: u32,
	pub timezone: String,
}

impl Default for MonitoringConfig {
	fn default() -> Self {
		MonitoringConfigLayer::default().finalize()
	}
}

// Retention

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetentionConfigLayer {
	pub days: Option<u32>,
}

impl RetentionConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.days.is_some() {
			self.days = other.days;
		}
	}

	pub fn finalize(self) -> RetentionConfig {
		RetentionConfig {
			days: self.days.unwrap_or(30),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetentionConfig {
	/// Execution records older than this many days are pruned.
	pub days: u32,
}

impl Default for RetentionConfig {
	fn default() -> Self {
		RetentionConfigLayer::default().finalize()
	}
}

// Capture

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfigLayer {
	pub limit_bytes: Option<usize>,
}

impl CaptureConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.limit_bytes.is_some() {
			self.limit_bytes = other.limit_bytes;
		}
	}

	pub fn finalize(self) -> CaptureConfig {
		CaptureConfig {
			limit_bytes: self.limit_bytes.unwrap_or(DEFAULT_CAPTURE_LIMIT_BYTES),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
	/// Per-stream capture bound for recorded runs.
	pub limit_bytes: usize,
}

impl Default for CaptureConfig {
	fn default() -> Self {
		CaptureConfigLayer::default().finalize()
	}
}

// Paths

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PathsConfigLayer {
	pub data_dir: Option<String>,
}

impl PathsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.data_dir.is_some() {
			self.data_dir = other.data_dir;
		}
	}

	pub fn finalize(self) -> PathsConfig {
		let data_dir = self
			.data_dir
			.map(PathBuf::from)
			.unwrap_or_else(default_data_dir);
		PathsConfig { data_dir }
	}
}

fn default_data_dir() -> PathBuf {
	dirs::data_dir()
		.unwrap_or_else(|| PathBuf::from("."))
		.join("cronwatch")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
	/// Directory holding the log database and written reports.
	pub data_dir: PathBuf,
}

impl PathsConfig {
	pub fn database_path(&self) -> PathBuf {
		self.data_dir.join("logs.db")
	}

	pub fn reports_dir(&self) -> PathBuf {
		self.data_dir.join("reports")
	}
}

impl Default for PathsConfig {
	fn default() -> Self {
		PathsConfigLayer::default().finalize()
	}
}
