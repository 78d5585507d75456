// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for cronwatch.
//!
//! Configuration is merged from three sources with standard precedence:
//! built-in defaults, then `~/.config/cronwatch/config.toml`, then
//! `CRONWATCH_*` environment variables. The resolved [`Config`] is
//! passed explicitly to whatever needs it; there are no ambient
//! globals.

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ConfigLayer;
pub use sections::*;
pub use sources::{
	user_config_path, ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource,
};

use tracing::{debug, info, warn};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
	pub email: EmailConfig,
	pub monitoring: MonitoringConfig,
	pub retention: RetentionConfig,
	pub capture: CaptureConfig,
	pub paths: PathsConfig,
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<Config, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::user()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path, as given by
/// `--config` on the command line.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<Config, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<Config, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	Ok(finalize(merged))
}

fn finalize(layer: ConfigLayer) -> Config {
	let mut email = layer.email.unwrap_or_default().finalize();
	let monitoring = layer.monitoring.unwrap_or_default().finalize();
	let retention = layer.retention.unwrap_or_default().finalize();
	let capture = layer.capture.unwrap_or_default().finalize();
	let paths = layer.paths.unwrap_or_default().finalize();

	sanitize_email(&mut email);

	info!(
		email_enabled = email.enabled,
		monitoring_enabled = monitoring.enabled,
		max_failures = monitoring.max_failures,
		retention_days = retention.days,
		data_dir = %paths.data_dir.display(),
		"configuration loaded"
	);

	Config {
		email,
		monitoring,
		retention,
		capture,
		paths,
	}
}

/// Email without addresses cannot deliver anything. A load failure here
/// would also take wrapped runs down with it, so the feature is
/// disabled and reported instead.
fn sanitize_email(email: &mut EmailConfig) {
	if !email.enabled {
		return;
	}
	if email.from_address.is_empty() || email.to_address.is_empty() {
		warn!("email.enabled is set without from/to addresses, disabling email");
		email.enabled = false;
		return;
	}
	if email.username.is_none() || email.password.is_none() {
		// Unauthenticated relays exist; flag it but do not refuse.
		warn!("email.enabled is set without SMTP credentials");
	}
}
