// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crontab access for cronwatch.
//!
//! Reads job entries from the user crontab (via the `crontab` binary)
//! and from system sources (`/etc/crontab`, `/etc/cron.d`, the periodic
//! directories), and writes managed entries back to the user crontab.

pub mod error;
pub mod parse;
pub mod table;

pub use error::{CrontabError, Result};
pub use parse::{format_entry, parse_crontab, parse_entry};
pub use table::{JobTable, SystemCrontabs, UserCrontab};
