// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML file and environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use cronwatch_secret::SecretString;

use crate::error::ConfigError;
use crate::layer::ConfigLayer;
use crate::sections::{
	CaptureConfigLayer, EmailConfigLayer, MonitoringConfigLayer, PathsConfigLayer,
	RetentionConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// Built-in defaults source. An empty layer; defaults are applied by
/// each section's `finalize`.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		Ok(ConfigLayer::default())
	}
}

/// Default location of the user config file,
/// `~/.config/cronwatch/config.toml`.
pub fn user_config_path() -> PathBuf {
	dirs::config_dir()
		.unwrap_or_else(|| PathBuf::from("."))
		.join("cronwatch")
		.join("config.toml")
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// The user config file, `~/.config/cronwatch/config.toml`.
	pub fn user() -> Self {
		Self::new(user_config_path())
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CRONWATCH_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		Ok(ConfigLayer {
			email: Some(load_email_from_env()?),
			monitoring: Some(load_monitoring_from_env()?),
			retention: Some(RetentionConfigLayer {
				days: env_u32("CRONWATCH_RETENTION_DAYS")?,
			}),
			capture: Some(CaptureConfigLayer {
				limit_bytes: env_usize("CRONWATCH_CAPTURE_LIMIT_BYTES")?,
			}),
			paths: Some(PathsConfigLayer {
				data_dir: env_var("CRONWATCH_DATA_DIR"),
			}),
		})
	}
}

fn load_email_from_env() -> Result<EmailConfigLayer, ConfigError> {
	Ok(EmailConfigLayer {
		enabled: env_bool("CRONWATCH_EMAIL_ENABLED"),
		host: env_var("CRONWATCH_EMAIL_HOST"),
		port: env_u16("CRONWATCH_EMAIL_PORT")?,
		username: env_var("CRONWATCH_EMAIL_USERNAME"),
		password: secret_env("CRONWATCH_EMAIL_PASSWORD")?,
		from_address: env_var("CRONWATCH_EMAIL_FROM"),
		from_name: env_var("CRONWATCH_EMAIL_FROM_NAME"),
		to_address: env_var("CRONWATCH_EMAIL_TO"),
		use_tls: env_bool("CRONWATCH_EMAIL_USE_TLS"),
		notify_on_failure: env_bool("CRONWATCH_EMAIL_NOTIFY_ON_FAILURE"),
		notify_on_success: env_bool("CRONWATCH_EMAIL_NOTIFY_ON_SUCCESS"),
	})
}

fn load_monitoring_from_env() -> Result<MonitoringConfigLayer, ConfigError> {
	Ok(MonitoringConfigLayer {
		enabled: env_bool("CRONWATCH_MONITORING_ENABLED"),
		check_interval_secs: env_u64("CRONWATCH_MONITORING_CHECK_INTERVAL_SECS")?,
		max_failures: env_u32("CRONWATCH_MONITORING_MAX_FAILURES")?,
		timezone: env_var("CRONWATCH_MONITORING_TIMEZONE"),
	})
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	parse_env(name, "u16")
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	parse_env(name, "u32")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	parse_env(name, "u64")
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	parse_env(name, "usize")
}

fn parse_env<T: std::str::FromStr>(
	name: &str,
	kind: &str,
) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

/// Load a secret from `NAME`, or from the file named by `NAME_FILE`.
/// The file form keeps passwords out of process listings.
fn secret_env(name: &str) -> Result<Option<SecretString>, ConfigError> {
	if let Some(value) = env_var(name) {
		return Ok(Some(SecretString::new(value)));
	}
	match env_var(&format!("{name}_FILE")) {
		Some(path) => {
			let value = std::fs::read_to_string(&path)
				.map_err(|e| ConfigError::Secret(format!("reading {path}: {e}")))?;
			Ok(Some(SecretString::new(value.trim_end().to_string())))
		}
		None => Ok(None),
	}
}
