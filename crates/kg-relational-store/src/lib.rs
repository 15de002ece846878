// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Relational store adapter (spec §4.5, component C7): the semantic table
//! set (documents, sessions, test reporting, changes, commits, performance
//! metrics, checkpoint job queue), the [`RelationalStore`] trait, and the
//! shared bulk-write transaction/telemetry helper.

pub mod bulk;
pub mod memory;
pub mod models;
pub mod store;

pub use bulk::{run_relational_bulk_batch, RelationalBulkOptions};
pub use memory::InMemoryRelationalStore;
pub use models::push_metrics_history;
pub use models::{
    ChangeRecord, ChangeType, CheckpointJobStatus, CoverageHistoryEntry, Document,
    FlakyTestAnalysis, MetricSeverity, MetricTrend, PerformanceMetricSnapshot, ScmCommit,
    SessionCheckpointJobRow, SessionRow, SessionRowStatus, TestCoverageRow, TestPerformanceRow,
    TestResult, TestSuite, METRICS_HISTORY_LIMIT,
};
pub use store::{RelationalStore, UpsertOutcome};
