//! The checkpoint job runner (spec §4.7, component C9): durable,
//! at-least-once, bounded-concurrency execution of checkpoint jobs with
//! retry and dead-lettering.

use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use kg_error::{ErrorCode, KgError};
use kg_graph_store::GraphStore;
use kg_relational_store::{CheckpointJobStatus, RelationalStore, SessionCheckpointJobRow};
use kg_temporal::{
    annotate_session_relationships_with_checkpoint, create_checkpoint,
    create_session_checkpoint_link, CheckpointParams,
};
use serde_json::json;
use tokio::sync::{Mutex, Semaphore};

use crate::events::{JobEvent, Listeners};
use crate::payload::JobPayload;

/// Tunables for [`CheckpointRunner`] (spec §4.7 "Retry", "Concurrency").
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Maximum execution attempts before dead-lettering (default 3).
    pub max_attempts: u32,
    /// Base delay before a retry, in milliseconds. Floored at 100ms
    /// (default 5000ms).
    pub retry_delay_ms: u64,
    /// Maximum number of jobs executing concurrently (default 1).
    pub concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { max_attempts: 3, retry_delay_ms: 5_000, concurrency: 1 }
    }
}

impl RunnerConfig {
    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.max(100))
    }
}

type RollbackHook = Box<dyn Fn(&str, &str) + Send + Sync>;

struct Shared<G, R> {
    graph: G,
    relational: R,
    config: RunnerConfig,
    listeners: Listeners,
    queue: Mutex<VecDeque<SessionCheckpointJobRow>>,
    running: Mutex<HashSet<String>>,
    pending_retries: Mutex<HashSet<String>>,
    dead_letters: Mutex<Vec<SessionCheckpointJobRow>>,
    shutting_down: AtomicBool,
    permits: Arc<Semaphore>,
    rollback_hook: StdMutex<Option<RollbackHook>>,
}

/// Durable, bounded-concurrency checkpoint job queue (spec §4.7).
///
/// Generic over the graph/relational store traits so tests can run
/// against in-memory fakes without a real backend.
pub struct CheckpointRunner<G, R> {
    shared: Arc<Shared<G, R>>,
}

impl<G, R> Clone for CheckpointRunner<G, R> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<G, R> CheckpointRunner<G, R>
where
    G: GraphStore + Send + Sync + 'static,
    R: RelationalStore + Send + Sync + 'static,
{
    /// Construct a runner. Call [`Self::hydrate`] once per attachment
    /// before relying on persisted state (spec §4.7 "Hydration").
    pub fn new(graph: G, relational: R, config: RunnerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                graph,
                relational,
                config,
                listeners: Listeners::default(),
                queue: Mutex::new(VecDeque::new()),
                running: Mutex::new(HashSet::new()),
                pending_retries: Mutex::new(HashSet::new()),
                dead_letters: Mutex::new(Vec::new()),
                shutting_down: AtomicBool::new(false),
                permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
                rollback_hook: StdMutex::new(None),
            }),
        }
    }

    /// Register an event listener (spec §4.7 "Listeners").
    pub fn subscribe(&self, listener: impl Fn(&JobEvent) + Send + Sync + 'static) {
        self.shared.listeners.subscribe(listener);
    }

    /// Register the rollback-capabilities callback invoked on a job's
    /// success, `(job_id, checkpoint_id)` (spec §4.7 "register a
    /// rollback-capabilities callback (if provided)").
    pub fn set_rollback_hook(&self, hook: impl Fn(&str, &str) + Send + Sync + 'static) {
        *self.shared.rollback_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Jobs currently parked in `manual_intervention`, most recent first.
    pub async fn dead_letters(&self) -> Vec<SessionCheckpointJobRow> {
        self.shared.dead_letters.lock().await.clone()
    }

    /// Persist a new job snapshot, emit `jobEnqueued`, optimistically mark
    /// the session's relationships `checkpointId = "pending"`, and attempt
    /// to drain (spec §4.7 `enqueue`).
    pub async fn enqueue(&self, payload: JobPayload) -> Result<String, KgError> {
        if self.shared.shutting_down.load(Ordering::SeqCst) {
            return Err(KgError::new(
                ErrorCode::InvalidParameter,
                "runner is shutting down; enqueue rejected",
            ));
        }

        let now = Utc::now();
        let job_id = format!("ckpt-job_{}", now.timestamp_micros());
        let row = SessionCheckpointJobRow {
            job_id: job_id.clone(),
            session_id: payload.session_id.clone(),
            payload: payload.to_value(),
            status: CheckpointJobStatus::Queued,
            attempts: 0,
            last_error: None,
            queued_at: now,
            updated_at: now,
        };
        self.shared.relational.upsert_checkpoint_job(row.clone()).await?;
        self.shared.listeners.emit(JobEvent::Enqueued { job_id: job_id.clone() });

        annotate_session_relationships_with_checkpoint(
            &self.shared.graph,
            &payload.session_id,
            "pending",
            None,
            None,
            now,
        )
        .await?;

        self.shared.queue.lock().await.push_back(row);
        self.drain();
        Ok(job_id)
    }

    /// Load every row with status `queued`/`pending`/`running` and enqueue
    /// it in `queuedAt` order; load `manual_intervention` rows into the
    /// in-memory dead-letter set without scheduling them (spec §4.7
    /// "Hydration"). Call once per attachment.
    pub async fn hydrate(&self) -> Result<usize, KgError> {
        let mut runnable = self
            .shared
            .relational
            .load_checkpoint_jobs_by_status(&[
                CheckpointJobStatus::Queued,
                CheckpointJobStatus::Pending,
                CheckpointJobStatus::Running,
            ])
            .await?;
        runnable.sort_by_key(|r| r.queued_at);
        let count = runnable.len();

        let mut queue = self.shared.queue.lock().await;
        queue.extend(runnable);
        drop(queue);

        let dead = self
            .shared
            .relational
            .load_checkpoint_jobs_by_status(&[CheckpointJobStatus::ManualIntervention])
            .await?;
        *self.shared.dead_letters.lock().await = dead;

        self.drain();
        Ok(count)
    }

    /// Resolve once the queue is empty, no job is running, and no retry is
    /// pending, or when `timeout` elapses (spec §4.7 `idle(timeoutMs)`).
    /// Returns `true` if quiescence was observed before the timeout.
    pub async fn idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let quiescent = self.shared.queue.lock().await.is_empty()
                    && self.shared.running.lock().await.is_empty()
                    && self.shared.pending_retries.lock().await.is_empty();
                if quiescent {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Reject further [`Self::enqueue`] calls for orderly shutdown (spec
    /// §5 "the runner rejects new enqueues after shutdown is requested").
    pub fn shutdown(&self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Spawn a background loop draining the queue up to the concurrency
    /// bound. Called after every mutation of the queue; cheap to call
    /// redundantly since each loop exits as soon as the queue is empty.
    fn drain(&self) {
        let this = self.clone();
        tokio::spawn(async move { this.drain_loop().await });
    }

    async fn drain_loop(&self) {
        loop {
            let job = {
                let mut queue = self.shared.queue.lock().await;
                queue.pop_front()
            };
            let Some(job) = job else { return };

            let Ok(permit) = self.shared.permits.clone().acquire_owned().await else {
                return; // semaphore closed: runner is being torn down
            };
            self.shared.running.lock().await.insert(job.job_id.clone());
            let this = self.clone();
            tokio::spawn(async move {
                let job_id = job.job_id.clone();
                this.execute(job).await;
                this.shared.running.lock().await.remove(&job_id);
                drop(permit);
            });
        }
    }

    async fn execute(&self, mut row: SessionCheckpointJobRow) {
        let payload = match JobPayload::from_value(&row.payload) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(job_id = %row.job_id, error = %e.message, "malformed job payload; dead-lettering");
                self.dead_letter(&mut row, e.message).await;
                return;
            }
        };

        row.attempts += 1;
        row.status = CheckpointJobStatus::Running;
        row.updated_at = Utc::now();
        if let Err(e) = self.shared.relational.upsert_checkpoint_job(row.clone()).await {
            tracing::error!(job_id = %row.job_id, error = %e.message, "failed to persist running status");
        }
        self.shared
            .listeners
            .emit(JobEvent::Started { job_id: row.job_id.clone(), attempt: row.attempts });

        let now = Utc::now();
        let outcome = create_checkpoint(
            &self.shared.graph,
            &payload.seed_entities,
            CheckpointParams { reason: payload.reason, hops: payload.hops, window: payload.window },
            now,
        )
        .await;

        let checkpoint_id = match outcome {
            Ok(id) if !id.is_empty() => id,
            Ok(_) => {
                self.handle_failure(row, &payload, "createCheckpoint returned an empty id".to_string())
                    .await;
                return;
            }
            Err(e) => {
                self.handle_failure(row, &payload, e.message).await;
                return;
            }
        };

        if let Err(e) = annotate_session_relationships_with_checkpoint(
            &self.shared.graph,
            &payload.session_id,
            &checkpoint_id,
            None,
            None,
            now,
        )
        .await
        {
            tracing::warn!(job_id = %row.job_id, error = %e.message, "failed to annotate session edges with completed checkpoint");
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("reason".into(), json!(format!("{:?}", payload.reason)));
        metadata.insert("hops".into(), json!(payload.hops));
        metadata.insert("attempts".into(), json!(row.attempts));
        metadata.insert("seedEntities".into(), json!(payload.seed_entities));
        metadata.insert("jobId".into(), json!(row.job_id));
        metadata.insert("status".into(), json!("completed"));

        if let Err(e) = create_session_checkpoint_link(
            &self.shared.graph,
            &payload.session_id,
            &checkpoint_id,
            metadata,
            now,
        )
        .await
        {
            tracing::warn!(job_id = %row.job_id, error = %e.message, "failed to create session-checkpoint link");
        }

        if let Err(e) = self.shared.relational.delete_checkpoint_job(&row.job_id).await {
            tracing::warn!(job_id = %row.job_id, error = %e.message, "failed to delete completed job row");
        }

        if let Some(hook) = self.shared.rollback_hook.lock().unwrap().as_ref() {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| hook(&row.job_id, &checkpoint_id)));
            if outcome.is_err() {
                tracing::error!(job_id = %row.job_id, "rollback-capabilities callback panicked; continuing");
            }
        }

        self.shared
            .listeners
            .emit(JobEvent::Completed { job_id: row.job_id.clone(), checkpoint_id });
    }

    async fn handle_failure(&self, mut row: SessionCheckpointJobRow, payload: &JobPayload, error: String) {
        let _ = payload;
        self.shared.listeners.emit(JobEvent::AttemptFailed {
            job_id: row.job_id.clone(),
            attempt: row.attempts,
            error: error.clone(),
        });
        row.last_error = Some(error.clone());
        row.updated_at = Utc::now();

        if row.attempts < self.shared.config.max_attempts {
            row.status = CheckpointJobStatus::Pending;
            if let Err(e) = self.shared.relational.upsert_checkpoint_job(row.clone()).await {
                tracing::error!(job_id = %row.job_id, error = %e.message, "failed to persist pending status before retry");
            }
            self.shared.pending_retries.lock().await.insert(row.job_id.clone());

            let this = self.clone();
            let delay = self.shared.config.retry_delay();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let job_id = row.job_id.clone();
                this.shared.pending_retries.lock().await.remove(&job_id);

                let mut requeued = row;
                requeued.status = CheckpointJobStatus::Queued;
                requeued.updated_at = Utc::now();
                if let Err(e) = this.shared.relational.upsert_checkpoint_job(requeued.clone()).await {
                    tracing::error!(job_id = %job_id, error = %e.message, "failed to persist queued status on retry");
                }
                this.shared.queue.lock().await.push_back(requeued);
                this.drain();
            });
        } else {
            self.dead_letter(&mut row, error).await;
        }
    }

    /// Move `row` to `manual_intervention`: persist, annotate the
    /// session's edges, and emit `jobFailed`/`jobDeadLettered` (spec §4.7
    /// "Retry" terminal branch). Deleting or downgrading an
    /// already-created checkpoint link is unreachable here: `createCheckpoint`
    /// writes its checkpoint entity and edges in one transactional bulk
    /// batch (see `kg_temporal::checkpoint::create_checkpoint`), so a
    /// failed attempt never leaves an orphan checkpoint to clean up.
    async fn dead_letter(&self, row: &mut SessionCheckpointJobRow, error: String) {
        row.status = CheckpointJobStatus::ManualIntervention;
        row.last_error = Some(error);
        row.updated_at = Utc::now();
        if let Err(e) = self.shared.relational.upsert_checkpoint_job(row.clone()).await {
            tracing::error!(job_id = %row.job_id, error = %e.message, "failed to persist manual_intervention status");
        }

        if let Err(e) = annotate_session_relationships_with_checkpoint(
            &self.shared.graph,
            &row.session_id,
            "manual_intervention",
            None,
            None,
            Utc::now(),
        )
        .await
        {
            tracing::warn!(job_id = %row.job_id, error = %e.message, "failed to annotate edges with manual_intervention");
        }

        self.shared.dead_letters.lock().await.push(row.clone());
        self.shared.listeners.emit(JobEvent::Failed { job_id: row.job_id.clone() });
        self.shared.listeners.emit(JobEvent::DeadLettered { job_id: row.job_id.clone() });
    }
}
