//! The [`RelationalStore`] trait (spec §4.5).
//!
//! All bulk writes share the transactional/telemetry semantics defined in
//! `kg-graph-store` (re-exported here as [`run_bulk_batch`] would be, but
//! each backend wires its own queries through that helper directly to
//! avoid a dependency from this crate back onto `kg-graph-store`).

use async_trait::async_trait;
use kg_error::KgError;

use crate::models::{
    ChangeRecord, CoverageHistoryEntry, Document, FlakyTestAnalysis, PerformanceMetricSnapshot,
    ScmCommit, SessionCheckpointJobRow, SessionRow, TestCoverageRow, TestPerformanceRow,
    TestResult, TestSuite,
};

/// Outcome of an upsert that may either insert a new row or return an
/// existing one unmodified (spec §4.5 "`test_suites` upsert is
/// fetch-by-unique-key, insert if absent, to keep legacy ids stable").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was inserted.
    Inserted,
    /// An existing row already satisfied the unique key; left untouched.
    AlreadyPresent,
    /// An existing row was found and overwritten.
    Updated,
}

/// The relational store adapter's public surface (spec §4.5).
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Upsert a generic document by id.
    async fn upsert_document(&self, doc: Document) -> Result<UpsertOutcome, KgError>;

    /// Upsert a session row by id.
    async fn upsert_session(&self, session: SessionRow) -> Result<UpsertOutcome, KgError>;

    /// Upsert a test suite. Unique on `(suite_name, timestamp)`; when a row
    /// already satisfies that key, the existing id is preserved and no
    /// write occurs (spec §4.5).
    async fn upsert_test_suite(&self, suite: TestSuite) -> Result<(String, UpsertOutcome), KgError>;

    /// Upsert a test result. Unique on `(test_id, suite_id)`.
    async fn upsert_test_result(&self, result: TestResult) -> Result<UpsertOutcome, KgError>;

    /// Upsert a test-coverage row. Unique on `(test_id, suite_id)`.
    async fn upsert_test_coverage(&self, row: TestCoverageRow) -> Result<UpsertOutcome, KgError>;

    /// Upsert a test-performance row. Unique on `(test_id, suite_id)`.
    async fn upsert_test_performance(&self, row: TestPerformanceRow) -> Result<UpsertOutcome, KgError>;

    /// Upsert a flaky-test analysis. Primary key `test_id`.
    async fn upsert_flaky_analysis(&self, row: FlakyTestAnalysis) -> Result<UpsertOutcome, KgError>;

    /// Append a change record.
    async fn insert_change(&self, change: ChangeRecord) -> Result<(), KgError>;

    /// Upsert an SCM commit. Unique on `commit_hash`.
    async fn upsert_scm_commit(&self, commit: ScmCommit) -> Result<UpsertOutcome, KgError>;

    /// Upsert a performance-metric snapshot.
    async fn upsert_performance_snapshot(
        &self,
        snapshot: PerformanceMetricSnapshot,
    ) -> Result<UpsertOutcome, KgError>;

    /// Append a coverage-history entry.
    async fn insert_coverage_history(&self, entry: CoverageHistoryEntry) -> Result<(), KgError>;

    /// Upsert a session-checkpoint job row. Primary key `job_id`.
    async fn upsert_checkpoint_job(&self, job: SessionCheckpointJobRow) -> Result<UpsertOutcome, KgError>;

    /// Delete a session-checkpoint job row by id (spec §4.7 "delete the
    /// persisted row" on job completion).
    async fn delete_checkpoint_job(&self, job_id: &str) -> Result<(), KgError>;

    /// Load every checkpoint-job row whose status is one of `statuses`, in
    /// `queued_at` order (spec §4.7 "Hydration").
    async fn load_checkpoint_jobs_by_status(
        &self,
        statuses: &[crate::models::CheckpointJobStatus],
    ) -> Result<Vec<SessionCheckpointJobRow>, KgError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_outcome_variants_are_distinct() {
        assert_ne!(UpsertOutcome::Inserted, UpsertOutcome::AlreadyPresent);
        assert_ne!(UpsertOutcome::Updated, UpsertOutcome::AlreadyPresent);
    }
}
