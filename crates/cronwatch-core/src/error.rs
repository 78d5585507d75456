// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for core domain operations.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur constructing or parsing core types.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("invalid job id: {0}")]
	InvalidJobId(String),

	#[error("invalid schedule expression: {0}")]
	InvalidSchedule(String),

	#[error("unknown run outcome: {0}")]
	UnknownOutcome(String),

	#[error("unknown job health: {0}")]
	UnknownHealth(String),
}
