// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapped command execution for cronwatch.
//!
//! The runner is what a wrapped crontab entry actually invokes: it
//! executes the job's original command through `sh -c`, captures output
//! within the configured bound, records the outcome exactly once, and
//! forwards the command's exit status to the scheduler.

pub mod exec;
pub mod recorder;
pub mod wrapper;

pub use exec::{execute, ExecOutput, ExecRequest};
pub use recorder::{record_run, RunReport};
pub use wrapper::{is_wrapped, sh_quote, unwrap_command, wrap_command};
