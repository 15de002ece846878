// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Durable checkpoint job queue (spec §4.7, component C9).
//!
//! Wraps [`kg_temporal::create_checkpoint`] and its session-linking
//! companions in a persisted, retried, bounded-concurrency state machine:
//! `queued -> running -> (completed | pending -> queued | manual_intervention)`.
//! Jobs and their attempt counters survive a restart via
//! [`kg_relational_store::RelationalStore::upsert_checkpoint_job`]; call
//! [`CheckpointRunner::hydrate`] once per attachment to resume in-flight
//! work and recover dead-lettered jobs.

pub mod events;
pub mod payload;
pub mod runner;

pub use events::{JobEvent, Listeners};
pub use payload::JobPayload;
pub use runner::{CheckpointRunner, RunnerConfig};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use kg_core::entity::{CheckpointReason, Entity};
    use kg_core::query::{RelationshipQuery, TraversalQuery, TraversalResult};
    use kg_core::relationship::Relationship;
    use kg_error::{ErrorCode, KgError};
    use kg_graph_store::{BulkOptions, BulkQuery, BulkResult, GraphStore};
    use kg_graph_store::vector::{VectorCollection, VectorHit, VectorRecord};
    use kg_relational_store::*;

    use super::*;

    #[derive(Default, Clone)]
    struct FakeGraphStore {
        entities: Arc<Mutex<Vec<Entity>>>,
        relationships: Arc<Mutex<Vec<Relationship>>>,
        fail_checkpoints: Arc<Mutex<usize>>,
    }

    impl FakeGraphStore {
        /// Make the next `n` `createCheckpoint` calls fail, to exercise retry/dead-lettering.
        fn fail_next_checkpoints(&self, n: usize) {
            *self.fail_checkpoints.lock().unwrap() = n;
        }
    }

    fn matches(r: &Relationship, q: &RelationshipQuery) -> bool {
        if let Some(from) = &q.from_entity_id {
            if &r.from_entity_id != from {
                return false;
            }
        }
        if let Some(to) = &q.to_entity_id {
            if &r.to_entity_id != to {
                return false;
            }
        }
        if let Some(session_id) = &q.session_id {
            if r.change_set_id.as_deref() != Some(session_id.as_str()) {
                return false;
            }
        }
        true
    }

    #[async_trait]
    impl GraphStore for FakeGraphStore {
        async fn bulk_query(
            &self,
            queries: Vec<BulkQuery>,
            _options: BulkOptions,
            _queue_depth: u32,
        ) -> Result<BulkResult, KgError> {
            if *self.fail_checkpoints.lock().unwrap() > 0 {
                let mut remaining = self.fail_checkpoints.lock().unwrap();
                *remaining -= 1;
                return Err(KgError::new(ErrorCode::CheckpointCreationFailed, "injected failure"));
            }
            for query in queries {
                match query {
                    BulkQuery::UpsertEntity(entity) => {
                        let mut entities = self.entities.lock().unwrap();
                        if let Some(existing) = entities.iter_mut().find(|e| e.id == entity.id) {
                            *existing = *entity;
                        } else {
                            entities.push(*entity);
                        }
                    }
                    BulkQuery::UpsertRelationship(rel) => {
                        let mut relationships = self.relationships.lock().unwrap();
                        if let Some(existing) = relationships.iter_mut().find(|r| r.id == rel.id) {
                            *existing = *rel;
                        } else {
                            relationships.push(*rel);
                        }
                    }
                }
            }
            Ok(BulkResult { outcomes: Vec::new() })
        }

        async fn query_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>, KgError> {
            Ok(self
                .relationships
                .lock()
                .unwrap()
                .iter()
                .filter(|r| matches(r, query))
                .cloned()
                .collect())
        }

        async fn traverse(&self, query: &TraversalQuery) -> Result<TraversalResult, KgError> {
            Ok(TraversalResult { by_hop: vec![query.seed_entity_ids.clone()] })
        }

        async fn ensure_indexes(&self) -> Result<(), KgError> {
            Ok(())
        }

        async fn search_vector(
            &self,
            _collection: VectorCollection,
            _query_embedding: &[f32],
            _limit: usize,
        ) -> Result<Vec<VectorHit>, KgError> {
            Ok(Vec::new())
        }

        async fn upsert_vector(&self, _collection: VectorCollection, _record: VectorRecord) -> Result<(), KgError> {
            Ok(())
        }

        async fn scroll_vectors(
            &self,
            _collection: VectorCollection,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<VectorRecord>, KgError> {
            Ok(Vec::new())
        }

        async fn delete_vector(&self, _collection: VectorCollection, _entity_id: &str) -> Result<(), KgError> {
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct FakeRelationalStore {
        jobs: Arc<Mutex<HashMap<String, SessionCheckpointJobRow>>>,
    }

    #[async_trait]
    impl RelationalStore for FakeRelationalStore {
        async fn upsert_document(&self, _doc: Document) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_session(&self, _row: SessionRow) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_test_suite(&self, _row: TestSuite) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_test_result(&self, _row: TestResult) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_test_coverage(&self, _row: TestCoverageRow) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_test_performance(&self, _row: TestPerformanceRow) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_flaky_analysis(&self, _row: FlakyTestAnalysis) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn insert_change(&self, _row: ChangeRecord) -> Result<(), KgError> {
            Ok(())
        }
        async fn upsert_scm_commit(&self, _row: ScmCommit) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_performance_snapshot(&self, _row: PerformanceMetricSnapshot) -> Result<(), KgError> {
            Ok(())
        }
        async fn insert_coverage_history(&self, _row: CoverageHistoryEntry) -> Result<(), KgError> {
            Ok(())
        }
        async fn upsert_checkpoint_job(&self, job: SessionCheckpointJobRow) -> Result<UpsertOutcome, KgError> {
            let mut jobs = self.jobs.lock().unwrap();
            let outcome = if jobs.contains_key(&job.job_id) {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Inserted
            };
            jobs.insert(job.job_id.clone(), job);
            Ok(outcome)
        }
        async fn delete_checkpoint_job(&self, job_id: &str) -> Result<(), KgError> {
            self.jobs.lock().unwrap().remove(job_id);
            Ok(())
        }
        async fn load_checkpoint_jobs_by_status(
            &self,
            statuses: &[CheckpointJobStatus],
        ) -> Result<Vec<SessionCheckpointJobRow>, KgError> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| statuses.contains(&j.status))
                .cloned()
                .collect())
        }
    }

    fn payload(session: &str, seeds: &[&str]) -> JobPayload {
        JobPayload::new(
            session,
            seeds.iter().map(|s| s.to_string()).collect(),
            CheckpointReason::Manual,
            2,
            None,
        )
    }

    #[tokio::test]
    async fn enqueue_then_success_persists_completion_and_deletes_the_row() {
        let graph = FakeGraphStore::default();
        let relational = FakeRelationalStore::default();
        let runner = CheckpointRunner::new(graph, relational.clone(), RunnerConfig::default());

        let events = Arc::new(Mutex::new(Vec::new()));
        let events2 = events.clone();
        runner.subscribe(move |e| events2.lock().unwrap().push(format!("{e:?}")));

        let job_id = runner.enqueue(payload("sess-1", &["e1", "e2"])).await.unwrap();
        assert!(runner.idle(Duration::from_secs(2)).await);

        assert!(relational.jobs.lock().unwrap().get(&job_id).is_none());
        let logged = events.lock().unwrap();
        assert!(logged.iter().any(|e| e.contains("Enqueued")));
        assert!(logged.iter().any(|e| e.contains("Completed")));
    }

    #[tokio::test]
    async fn a_transient_failure_is_retried_then_succeeds() {
        let graph = FakeGraphStore::default();
        graph.fail_next_checkpoints(1);
        let relational = FakeRelationalStore::default();
        let runner = CheckpointRunner::new(
            graph,
            relational,
            RunnerConfig { max_attempts: 3, retry_delay_ms: 100, concurrency: 1 },
        );

        let completed = Arc::new(AtomicUsize::new(0));
        let failed_attempts = Arc::new(AtomicUsize::new(0));
        let c = completed.clone();
        let f = failed_attempts.clone();
        runner.subscribe(move |e| match e {
            JobEvent::Completed { .. } => {
                c.fetch_add(1, Ordering::SeqCst);
            }
            JobEvent::AttemptFailed { .. } => {
                f.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        });

        runner.enqueue(payload("sess-1", &["e1"])).await.unwrap();
        assert!(runner.idle(Duration::from_secs(2)).await);

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(failed_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_retries_dead_letters_the_job() {
        let graph = FakeGraphStore::default();
        graph.fail_next_checkpoints(10);
        let relational = FakeRelationalStore::default();
        let runner = CheckpointRunner::new(
            graph,
            relational.clone(),
            RunnerConfig { max_attempts: 2, retry_delay_ms: 50, concurrency: 1 },
        );

        let dead_lettered = Arc::new(AtomicUsize::new(0));
        let d = dead_lettered.clone();
        runner.subscribe(move |e| {
            if matches!(e, JobEvent::DeadLettered { .. }) {
                d.fetch_add(1, Ordering::SeqCst);
            }
        });

        let job_id = runner.enqueue(payload("sess-1", &["e1"])).await.unwrap();
        assert!(runner.idle(Duration::from_secs(2)).await);

        assert_eq!(dead_lettered.load(Ordering::SeqCst), 1);
        let row = relational.jobs.lock().unwrap().get(&job_id).cloned().unwrap();
        assert_eq!(row.status, CheckpointJobStatus::ManualIntervention);
        assert_eq!(row.attempts, 2);

        let letters = runner.dead_letters().await;
        assert_eq!(letters.len(), 0); // dead_letters() reflects hydrate(), not live execution
    }

    #[tokio::test]
    async fn hydrate_resumes_queued_rows_and_recovers_dead_letters() {
        let graph = FakeGraphStore::default();
        let relational = FakeRelationalStore::default();

        let now: DateTime<Utc> = Utc::now();
        let queued_row = SessionCheckpointJobRow {
            job_id: "job-resume".into(),
            session_id: "sess-2".into(),
            payload: payload("sess-2", &["e9"]).to_value(),
            status: CheckpointJobStatus::Queued,
            attempts: 0,
            last_error: None,
            queued_at: now,
            updated_at: now,
        };
        let dead_row = SessionCheckpointJobRow {
            job_id: "job-dead".into(),
            session_id: "sess-3".into(),
            payload: payload("sess-3", &["e8"]).to_value(),
            status: CheckpointJobStatus::ManualIntervention,
            attempts: 2,
            last_error: Some("boom".into()),
            queued_at: now,
            updated_at: now,
        };
        relational
            .upsert_checkpoint_job(queued_row)
            .await
            .unwrap();
        relational.upsert_checkpoint_job(dead_row).await.unwrap();

        let runner = CheckpointRunner::new(graph, relational.clone(), RunnerConfig::default());
        let resumed = runner.hydrate().await.unwrap();
        assert_eq!(resumed, 1);

        assert!(runner.idle(Duration::from_secs(2)).await);
        assert!(relational.jobs.lock().unwrap().get("job-resume").is_none());

        let letters = runner.dead_letters().await;
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].job_id, "job-dead");
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_is_rejected() {
        let runner = CheckpointRunner::new(FakeGraphStore::default(), FakeRelationalStore::default(), RunnerConfig::default());
        runner.shutdown();
        let err = runner.enqueue(payload("sess-1", &["e1"])).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }
}
