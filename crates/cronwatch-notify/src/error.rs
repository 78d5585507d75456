// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for notification dispatch.

use thiserror::Error;

/// Result type for notify operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors that can occur monitoring jobs and dispatching notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
	#[error(transparent)]
	Store(#[from] cronwatch_store::StoreError),

	#[error(transparent)]
	Smtp(#[from] cronwatch_smtp::SmtpError),

	#[error("failed to write report: {0}")]
	ReportWrite(#[from] std::io::Error),
}
