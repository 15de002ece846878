//! The [`GraphStore`] trait and its bulk-write transactional semantics
//! (spec §4.4 "Surface", "Transactional semantics").

use async_trait::async_trait;
use kg_core::query::{RelationshipQuery, TraversalQuery, TraversalResult};
use kg_core::{Entity, Relationship};
use kg_error::KgError;
use kg_telemetry::{BatchMode, BulkWriteTelemetry};

use crate::vector::{VectorCollection, VectorHit, VectorRecord};

/// One write operation submitted as part of a bulk batch.
#[derive(Debug, Clone)]
pub enum BulkQuery {
    /// Upsert an entity node by id (idempotent).
    UpsertEntity(Box<Entity>),
    /// Upsert an edge by its canonical id (idempotent MERGE semantics).
    UpsertRelationship(Box<Relationship>),
}

/// Options controlling `bulkQuery`'s transactional behavior (spec §4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkOptions {
    /// When `false` (the default), all queries run in a single transaction;
    /// any failure rolls back the whole batch. When `true`, each query is
    /// independent and its error is returned in-band.
    pub continue_on_error: bool,
}

/// Per-query outcome inside a `continueOnError=true` batch.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The query succeeded.
    Ok,
    /// The query failed; the batch continued.
    Err(KgError),
}

/// Result of a bulk batch.
#[derive(Debug)]
pub struct BulkResult {
    /// Per-query outcomes, in submission order. Empty when the whole batch
    /// rolled back under `continueOnError=false`.
    pub outcomes: Vec<QueryOutcome>,
}

/// The graph store adapter's public surface (spec §4.4 "Surface").
///
/// Implementations own client acquisition, `statement_timeout` (or
/// equivalent), and release, all scoped to a single batch, and must
/// release the client on every path including an error or rollback
/// failure.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert entity nodes and relationship edges as one bulk batch. See
    /// [`BulkOptions`] for transaction semantics. `queue_depth` is the
    /// depth of the submission queue observed when the batch began, used
    /// only for telemetry retention (spec §4.4 "Bulk telemetry").
    async fn bulk_query(
        &self,
        queries: Vec<BulkQuery>,
        options: BulkOptions,
        queue_depth: u32,
    ) -> Result<BulkResult, KgError>;

    /// Query relationships matching `query` (spec §6.2).
    async fn query_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>, KgError>;

    /// Multi-hop traversal from a seed set (spec §6.2).
    async fn traverse(&self, query: &TraversalQuery) -> Result<TraversalResult, KgError>;

    /// Create required indexes/constraints. Idempotent.
    async fn ensure_indexes(&self) -> Result<(), KgError>;

    /// Nearest-neighbor search within one vector collection.
    async fn search_vector(
        &self,
        collection: VectorCollection,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>, KgError>;

    /// Upsert a single vector record into a collection.
    async fn upsert_vector(
        &self,
        collection: VectorCollection,
        record: VectorRecord,
    ) -> Result<(), KgError>;

    /// Page through every vector in a collection.
    async fn scroll_vectors(
        &self,
        collection: VectorCollection,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<VectorRecord>, KgError>;

    /// Remove a vector record from a collection by entity id.
    async fn delete_vector(&self, collection: VectorCollection, entity_id: &str) -> Result<(), KgError>;
}

/// Run `queries` through `apply_one` honoring [`BulkOptions`]'s transaction
/// semantics, recording telemetry on `telemetry` regardless of outcome
/// (spec §4.4 "Transactional semantics", "Bulk telemetry").
///
/// `apply_one` is the store-specific single-query executor; this function
/// only implements the shared all-or-nothing vs. independent control flow
/// so every backend gets identical semantics.
pub async fn run_bulk_batch<F, Fut>(
    telemetry: &BulkWriteTelemetry,
    queries: Vec<BulkQuery>,
    options: BulkOptions,
    queue_depth: u32,
    mut apply_one: F,
) -> Result<BulkResult, KgError>
where
    F: FnMut(BulkQuery) -> Fut,
    Fut: std::future::Future<Output = Result<(), KgError>>,
{
    let mode = if options.continue_on_error {
        BatchMode::Independent
    } else {
        BatchMode::Transaction
    };
    let batch_size = queries.len() as u32;
    let guard = telemetry.start_batch(batch_size, options.continue_on_error, mode, queue_depth);

    if options.continue_on_error {
        let mut outcomes = Vec::with_capacity(queries.len());
        let mut any_err = false;
        for q in queries {
            match apply_one(q).await {
                Ok(()) => outcomes.push(QueryOutcome::Ok),
                Err(e) => {
                    any_err = true;
                    outcomes.push(QueryOutcome::Err(e));
                }
            }
        }
        guard.finish(!any_err, None);
        Ok(BulkResult { outcomes })
    } else {
        let mut applied = Vec::with_capacity(queries.len());
        for q in queries {
            match apply_one(q).await {
                Ok(()) => applied.push(QueryOutcome::Ok),
                Err(e) => {
                    let msg = e.to_string();
                    guard.finish(false, Some(msg.clone()));
                    return Err(e);
                }
            }
        }
        guard.finish(true, None);
        Ok(BulkResult { outcomes: applied })
    }
}
