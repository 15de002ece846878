// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Bulk-write batch telemetry shared by `kg-graph-store` and
//! `kg-relational-store` (spec §4.4, §4.5).
//!
//! A `BulkWriteTelemetry` collector is handed to a store adapter; every
//! bulk batch is timed and recorded. Running metrics stay in-memory only
//! (spec §6.3), bounded by a configurable history length, and a subscriber
//! callback can observe every event without affecting persistence even if
//! it panics (spec §7 "Bulk telemetry error").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Transaction mode for a bulk batch (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// All queries in the batch share one transaction; any failure rolls
    /// back the whole batch.
    Transaction,
    /// Each query in the batch is independent; errors are returned in-band.
    Independent,
}

/// A single bulk batch's telemetry record (spec §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Number of queries/operations in the batch.
    pub batch_size: u32,
    /// Whether the batch was run with `continueOnError=true`.
    pub continue_on_error: bool,
    /// Wall-clock batch duration in milliseconds.
    pub duration_ms: u64,
    /// When the batch began.
    pub started_at: DateTime<Utc>,
    /// When the batch finished.
    pub finished_at: DateTime<Utc>,
    /// Depth of the queue behind this batch when it started.
    pub queue_depth: u32,
    /// Transaction mode used.
    pub mode: BatchMode,
    /// Whether the batch completed without error.
    pub success: bool,
    /// Error message, when `!success`.
    pub error: Option<String>,
}

/// Thresholds controlling when a [`BatchRecord`] is retained in
/// `slow_batches` and how much history is kept (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryThresholds {
    /// A batch is "slow" at or above this duration.
    pub slow_batch_threshold_ms: u64,
    /// A batch is "large" at or above this size.
    pub warn_on_large_batch_size: u32,
    /// A batch is "backpressured" at or above this queue depth.
    pub queue_depth_warning_threshold: u32,
    /// Maximum entries retained in `history` and `slow_batches`.
    pub history_limit: usize,
}

impl Default for TelemetryThresholds {
    fn default() -> Self {
        Self {
            slow_batch_threshold_ms: 1_000,
            warn_on_large_batch_size: 500,
            queue_depth_warning_threshold: 100,
            history_limit: 200,
        }
    }
}

/// Running bulk-write metrics, updated under a mutex; reads return
/// defensive copies (spec §5 "Bulk-writer metrics are updated under a
/// mutex").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkWriteMetrics {
    /// Batches currently executing.
    pub active_batches: u32,
    /// Highest `active_batches` has ever reached.
    pub max_concurrent_batches: u32,
    /// Total batches recorded.
    pub total_batches: u64,
    /// Total queries recorded across all batches.
    pub total_queries: u64,
    /// Sum of every batch's `duration_ms`.
    pub total_duration_ms: u64,
    /// Largest `batch_size` seen.
    pub max_batch_size: u32,
    /// Largest `queue_depth` seen.
    pub max_queue_depth: u32,
    /// Largest `duration_ms` seen.
    pub max_duration_ms: u64,
    /// `total_duration_ms / total_batches`, or `0.0` when empty.
    pub average_duration_ms: f64,
    /// The most recently recorded batch.
    pub last_batch: Option<BatchRecord>,
    /// Bounded recent history, oldest first, capped at `history_limit`.
    pub history: Vec<BatchRecord>,
    /// Batches retained for being slow/large/backpressured/failed, capped
    /// at `history_limit`.
    pub slow_batches: Vec<BatchRecord>,
}

fn push_bounded<T>(vec: &mut Vec<T>, item: T, limit: usize) {
    vec.push(item);
    if vec.len() > limit {
        vec.remove(0);
    }
}

/// A subscriber observing every recorded [`BatchRecord`]. Exceptions
/// (panics) are caught and logged; they never affect the batch result
/// (spec §7).
pub trait TelemetrySubscriber: Send + Sync {
    /// Called once per recorded batch, after metrics have been updated.
    fn on_batch(&self, record: &BatchRecord, metrics: &BulkWriteMetrics);
}

/// Thread-safe collector of bulk-write telemetry for one store adapter.
#[derive(Clone)]
pub struct BulkWriteTelemetry {
    thresholds: TelemetryThresholds,
    inner: Arc<Mutex<BulkWriteMetrics>>,
    subscribers: Arc<Mutex<Vec<Arc<dyn TelemetrySubscriber>>>>,
}

impl std::fmt::Debug for BulkWriteTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkWriteTelemetry")
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

impl BulkWriteTelemetry {
    /// Create a collector with the given thresholds and no subscribers.
    #[must_use]
    pub fn new(thresholds: TelemetryThresholds) -> Self {
        Self {
            thresholds,
            inner: Arc::new(Mutex::new(BulkWriteMetrics::default())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a subscriber to be notified on every recorded batch.
    pub fn subscribe(&self, subscriber: Arc<dyn TelemetrySubscriber>) {
        self.subscribers
            .lock()
            .expect("telemetry subscriber lock poisoned")
            .push(subscriber);
    }

    /// Mark a batch as started, incrementing `active_batches`. Returns a
    /// [`BatchGuard`] whose `finish` records the completed batch.
    #[must_use]
    pub fn start_batch(&self, batch_size: u32, continue_on_error: bool, mode: BatchMode, queue_depth: u32) -> BatchGuard<'_> {
        {
            let mut m = self.inner.lock().expect("telemetry metrics lock poisoned");
            m.active_batches += 1;
            m.max_concurrent_batches = m.max_concurrent_batches.max(m.active_batches);
        }
        BatchGuard {
            telemetry: self,
            batch_size,
            continue_on_error,
            mode,
            queue_depth,
            started_at: Utc::now(),
        }
    }

    fn record(&self, record: BatchRecord) {
        let snapshot = {
            let mut m = self.inner.lock().expect("telemetry metrics lock poisoned");
            m.active_batches = m.active_batches.saturating_sub(1);
            m.total_batches += 1;
            m.total_queries += u64::from(record.batch_size);
            m.total_duration_ms += record.duration_ms;
            m.max_batch_size = m.max_batch_size.max(record.batch_size);
            m.max_queue_depth = m.max_queue_depth.max(record.queue_depth);
            m.max_duration_ms = m.max_duration_ms.max(record.duration_ms);
            m.average_duration_ms = m.total_duration_ms as f64 / m.total_batches as f64;

            let is_slow = !record.success
                || record.duration_ms >= self.thresholds.slow_batch_threshold_ms
                || record.batch_size >= self.thresholds.warn_on_large_batch_size
                || record.queue_depth >= self.thresholds.queue_depth_warning_threshold;
            if is_slow {
                push_bounded(&mut m.slow_batches, record.clone(), self.thresholds.history_limit);
            }

            push_bounded(&mut m.history, record.clone(), self.thresholds.history_limit);
            m.last_batch = Some(record.clone());
            m.clone()
        };

        info!(
            batch_size = record.batch_size,
            duration_ms = record.duration_ms,
            success = record.success,
            "bulk_write_batch"
        );

        let subs = self
            .subscribers
            .lock()
            .expect("telemetry subscriber lock poisoned")
            .clone();
        for sub in subs {
            let record_ref = &record;
            let snapshot_ref = &snapshot;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| sub.on_batch(record_ref, snapshot_ref))) {
                warn!(?panic, "telemetry subscriber panicked; ignoring");
            }
        }
    }

    /// A defensive copy of the current running metrics.
    #[must_use]
    pub fn metrics(&self) -> BulkWriteMetrics {
        self.inner.lock().expect("telemetry metrics lock poisoned").clone()
    }
}

/// RAII guard returned by [`BulkWriteTelemetry::start_batch`]. Call
/// [`finish`](Self::finish) exactly once when the batch completes.
pub struct BatchGuard<'a> {
    telemetry: &'a BulkWriteTelemetry,
    batch_size: u32,
    continue_on_error: bool,
    mode: BatchMode,
    queue_depth: u32,
    started_at: DateTime<Utc>,
}

impl BatchGuard<'_> {
    /// Record the batch's outcome and finalize its telemetry.
    pub fn finish(self, success: bool, error: Option<String>) {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - self.started_at).num_milliseconds().max(0) as u64;
        self.telemetry.record(BatchRecord {
            batch_size: self.batch_size,
            continue_on_error: self.continue_on_error,
            duration_ms,
            started_at: self.started_at,
            finished_at,
            queue_depth: self.queue_depth,
            mode: self.mode,
            success,
            error,
        });
    }
}
