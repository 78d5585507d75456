// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for cronwatch execution logging and monitoring.
//!
//! This crate defines the domain model shared by the rest of the
//! workspace: jobs and their schedules, immutable execution records
//! with bounded output capture, statistics aggregation, and the
//! per-job failure-monitor state machine. It performs no I/O.

pub mod error;
pub mod job;
pub mod record;
pub mod state;
pub mod stats;

pub use error::{CoreError, Result};
pub use job::{Job, JobId, JobSource, ScheduleExpr};
pub use record::{
	CapturedStream, ExecutionRecord, RecordId, RunOutcome, DEFAULT_CAPTURE_LIMIT_BYTES,
	EXIT_START_FAILURE, EXIT_TIMED_OUT,
};
pub use state::{current_streak_start, JobHealth, MonitorEvent, MonitoringState};
pub use stats::{summarize, ErrorFrequency, StatsSummary, DEFAULT_TOP_ERRORS};
