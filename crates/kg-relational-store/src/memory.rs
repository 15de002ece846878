//! A single-process, in-memory [`RelationalStore`] (spec §4.5, SPEC_FULL.md
//! §S3 "reference backend so the workspace compiles and is testable
//! end-to-end without a live Postgres deployment").
//!
//! Like [`kg_graph_store::InMemoryGraphStore`], this is a real backend, not
//! a test double. Each table is a `Mutex`-guarded map, keyed however the
//! table's documented uniqueness constraint (spec §4.5) says it should be.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kg_error::KgError;

use crate::models::{
    ChangeRecord, CheckpointJobStatus, CoverageHistoryEntry, Document, FlakyTestAnalysis,
    PerformanceMetricSnapshot, ScmCommit, SessionCheckpointJobRow, SessionRow, TestCoverageRow,
    TestPerformanceRow, TestResult, TestSuite,
};
use crate::store::{RelationalStore, UpsertOutcome};

#[derive(Default)]
struct Tables {
    documents: HashMap<String, Document>,
    sessions: HashMap<String, SessionRow>,
    test_suites: HashMap<String, TestSuite>,
    test_suites_by_key: HashMap<(String, i64), String>,
    test_results: HashMap<(String, String), TestResult>,
    test_coverage: HashMap<(String, String), TestCoverageRow>,
    test_performance: HashMap<(String, String), TestPerformanceRow>,
    flaky_analyses: HashMap<String, FlakyTestAnalysis>,
    changes: Vec<ChangeRecord>,
    scm_commits: HashMap<String, ScmCommit>,
    scm_commits_by_hash: HashMap<String, String>,
    performance_snapshots: HashMap<String, PerformanceMetricSnapshot>,
    coverage_history: Vec<CoverageHistoryEntry>,
    checkpoint_jobs: HashMap<String, SessionCheckpointJobRow>,
}

/// In-memory [`RelationalStore`]; `Clone` only clones the `Arc` handle.
#[derive(Clone, Default)]
pub struct InMemoryRelationalStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRelationalStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpoint-job rows currently held, for diagnostics/tests.
    #[must_use]
    pub fn checkpoint_job_count(&self) -> usize {
        self.tables.lock().unwrap().checkpoint_jobs.len()
    }
}

#[async_trait]
impl RelationalStore for InMemoryRelationalStore {
    async fn upsert_document(&self, doc: Document) -> Result<UpsertOutcome, KgError> {
        let mut tables = self.tables.lock().unwrap();
        let outcome = if tables.documents.contains_key(&doc.id) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        tables.documents.insert(doc.id.clone(), doc);
        Ok(outcome)
    }

    async fn upsert_session(&self, session: SessionRow) -> Result<UpsertOutcome, KgError> {
        let mut tables = self.tables.lock().unwrap();
        let outcome = if tables.sessions.contains_key(&session.id) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        tables.sessions.insert(session.id.clone(), session);
        Ok(outcome)
    }

    async fn upsert_test_suite(&self, suite: TestSuite) -> Result<(String, UpsertOutcome), KgError> {
        let mut tables = self.tables.lock().unwrap();
        let key = (suite.suite_name.clone(), suite.timestamp.timestamp_millis());
        if let Some(existing_id) = tables.test_suites_by_key.get(&key).cloned() {
            return Ok((existing_id, UpsertOutcome::AlreadyPresent));
        }
        let id = suite.id.clone();
        tables.test_suites_by_key.insert(key, id.clone());
        tables.test_suites.insert(id.clone(), suite);
        Ok((id, UpsertOutcome::Inserted))
    }

    async fn upsert_test_result(&self, result: TestResult) -> Result<UpsertOutcome, KgError> {
        let mut tables = self.tables.lock().unwrap();
        let key = (result.test_id.clone(), result.suite_id.clone());
        let outcome = if tables.test_results.contains_key(&key) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        tables.test_results.insert(key, result);
        Ok(outcome)
    }

    async fn upsert_test_coverage(&self, row: TestCoverageRow) -> Result<UpsertOutcome, KgError> {
        let mut tables = self.tables.lock().unwrap();
        let key = (row.test_id.clone(), row.suite_id.clone());
        let outcome = if tables.test_coverage.contains_key(&key) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        tables.test_coverage.insert(key, row);
        Ok(outcome)
    }

    async fn upsert_test_performance(&self, row: TestPerformanceRow) -> Result<UpsertOutcome, KgError> {
        let mut tables = self.tables.lock().unwrap();
        let key = (row.test_id.clone(), row.suite_id.clone());
        let outcome = if tables.test_performance.contains_key(&key) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        tables.test_performance.insert(key, row);
        Ok(outcome)
    }

    async fn upsert_flaky_analysis(&self, row: FlakyTestAnalysis) -> Result<UpsertOutcome, KgError> {
        let mut tables = self.tables.lock().unwrap();
        let outcome = if tables.flaky_analyses.contains_key(&row.test_id) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        tables.flaky_analyses.insert(row.test_id.clone(), row);
        Ok(outcome)
    }

    async fn insert_change(&self, change: ChangeRecord) -> Result<(), KgError> {
        self.tables.lock().unwrap().changes.push(change);
        Ok(())
    }

    async fn upsert_scm_commit(&self, commit: ScmCommit) -> Result<UpsertOutcome, KgError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing_id) = tables.scm_commits_by_hash.get(&commit.commit_hash).cloned() {
            tables.scm_commits.insert(existing_id, commit);
            return Ok(UpsertOutcome::Updated);
        }
        tables
            .scm_commits_by_hash
            .insert(commit.commit_hash.clone(), commit.id.clone());
        tables.scm_commits.insert(commit.id.clone(), commit);
        Ok(UpsertOutcome::Inserted)
    }

    async fn upsert_performance_snapshot(
        &self,
        snapshot: PerformanceMetricSnapshot,
    ) -> Result<UpsertOutcome, KgError> {
        let mut tables = self.tables.lock().unwrap();
        let outcome = if tables.performance_snapshots.contains_key(&snapshot.id) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        tables
            .performance_snapshots
            .insert(snapshot.id.clone(), snapshot);
        Ok(outcome)
    }

    async fn insert_coverage_history(&self, entry: CoverageHistoryEntry) -> Result<(), KgError> {
        self.tables.lock().unwrap().coverage_history.push(entry);
        Ok(())
    }

    async fn upsert_checkpoint_job(&self, job: SessionCheckpointJobRow) -> Result<UpsertOutcome, KgError> {
        let mut tables = self.tables.lock().unwrap();
        let outcome = if tables.checkpoint_jobs.contains_key(&job.job_id) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        tables.checkpoint_jobs.insert(job.job_id.clone(), job);
        Ok(outcome)
    }

    async fn delete_checkpoint_job(&self, job_id: &str) -> Result<(), KgError> {
        self.tables.lock().unwrap().checkpoint_jobs.remove(job_id);
        Ok(())
    }

    async fn load_checkpoint_jobs_by_status(
        &self,
        statuses: &[CheckpointJobStatus],
    ) -> Result<Vec<SessionCheckpointJobRow>, KgError> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<SessionCheckpointJobRow> = tables
            .checkpoint_jobs
            .values()
            .filter(|row| statuses.contains(&row.status))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.queued_at);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn test_suite(name: &str, now: chrono::DateTime<Utc>) -> TestSuite {
        TestSuite {
            id: format!("suite:{name}"),
            suite_name: name.to_string(),
            timestamp: now,
            framework: "cargo-test".into(),
            total_tests: 10,
            passed_tests: 10,
            failed_tests: 0,
            skipped_tests: 0,
            duration: 100,
            status: "passed".into(),
            coverage: None,
        }
    }

    #[tokio::test]
    async fn upsert_test_suite_is_idempotent_on_name_and_timestamp() {
        let store = InMemoryRelationalStore::new();
        let now = Utc::now();
        let (id1, outcome1) = store.upsert_test_suite(test_suite("unit", now)).await.unwrap();
        assert_eq!(outcome1, UpsertOutcome::Inserted);

        let mut second = test_suite("unit", now);
        second.id = "suite:different-id".into();
        let (id2, outcome2) = store.upsert_test_suite(second).await.unwrap();
        assert_eq!(outcome2, UpsertOutcome::AlreadyPresent);
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn upsert_scm_commit_is_unique_on_commit_hash() {
        let store = InMemoryRelationalStore::new();
        let now = Utc::now();
        let commit = ScmCommit {
            id: "commit:1".into(),
            commit_hash: "abc123".into(),
            branch: "main".into(),
            title: "initial".into(),
            description: None,
            author: None,
            metadata: json!({}),
            changes: Vec::new(),
            related_spec_id: None,
            test_results: Vec::new(),
            validation_results: None,
            pr_url: None,
            provider: None,
            status: "open".into(),
            created_at: now,
            updated_at: now,
        };
        let outcome1 = store.upsert_scm_commit(commit.clone()).await.unwrap();
        assert_eq!(outcome1, UpsertOutcome::Inserted);

        let mut updated = commit;
        updated.title = "amended".into();
        let outcome2 = store.upsert_scm_commit(updated).await.unwrap();
        assert_eq!(outcome2, UpsertOutcome::Updated);
    }

    #[tokio::test]
    async fn checkpoint_jobs_load_by_status_in_queued_order() {
        let store = InMemoryRelationalStore::new();
        let now = Utc::now();
        for (i, status) in [CheckpointJobStatus::Queued, CheckpointJobStatus::Running, CheckpointJobStatus::Queued]
            .into_iter()
            .enumerate()
        {
            store
                .upsert_checkpoint_job(SessionCheckpointJobRow {
                    job_id: format!("job:{i}"),
                    session_id: "session:1".into(),
                    payload: json!({}),
                    status,
                    attempts: 0,
                    last_error: None,
                    queued_at: now + chrono::Duration::seconds(i as i64),
                    updated_at: now,
                })
                .await
                .unwrap();
        }
        let queued = store
            .load_checkpoint_jobs_by_status(&[CheckpointJobStatus::Queued])
            .await
            .unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].job_id, "job:0");
        assert_eq!(queued[1].job_id, "job:2");

        store.delete_checkpoint_job("job:0").await.unwrap();
        assert_eq!(store.checkpoint_job_count(), 2);
    }
}
