// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for crontab access.

use thiserror::Error;

/// Result type for crontab operations.
pub type Result<T> = std::result::Result<T, CrontabError>;

/// Errors that can occur reading or writing crontabs.
#[derive(Debug, Error)]
pub enum CrontabError {
	#[error("crontab binary not found in PATH")]
	CrontabNotInstalled,

	#[error("permission denied accessing {0}")]
	PermissionDenied(String),

	#[error("crontab command failed: {stderr}")]
	CommandFailed { stderr: String },

	#[error("{0} entries are read-only")]
	ReadOnly(String),

	#[error("invalid name '{0}' for a cron file")]
	InvalidName(String),

	#[error("unknown period '{0}' (expected hourly, daily, weekly or monthly)")]
	UnknownPeriod(String),

	#[error("{0} already exists")]
	AlreadyExists(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}
