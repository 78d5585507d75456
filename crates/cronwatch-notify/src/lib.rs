// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Failure monitoring and notification dispatch for cronwatch.
//!
//! The watcher replays each job's execution history into its health
//! state, alerts exactly once per failure streak when the consecutive
//! failure threshold is crossed, and sends an optional recovery notice
//! when a success ends a notified streak. Delivery is by email when
//! configured, otherwise to report files.

pub mod error;
pub mod notifier;
pub mod report;
pub mod watcher;

pub use error::{NotifyError, Result};
pub use notifier::{Delivery, Notifier};
pub use report::{failure_alert, recovery_notice, stats_report, test_report, Report};
pub use watcher::{FailureWatcher, WatchOutcome};
