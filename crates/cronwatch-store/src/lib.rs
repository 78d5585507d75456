// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only execution log store, backed by SQLite.
//!
//! The store is the system of record for execution history: records are
//! inserted atomically, queried as ordered snapshots, and deleted only
//! through retention pruning. It also persists the failure monitor's
//! per-job state and hosts schedule parsing / next-run calculation.

pub mod error;
pub mod repository;
pub mod schedule;
pub mod schema;

pub use error::{Result, StoreError};
pub use repository::{LogStore, RecordFilter, SqliteLogStore};
pub use schedule::{next_runs, validate_expression, validate_timezone, NextRuns};
pub use schema::{connect, connect_in_memory, init_schema};
