//! Checkpoint materialization and session linkage (spec §4.6
//! `createCheckpoint`, `annotateSessionRelationshipsWithCheckpoint`,
//! `createSessionCheckpointLink`).

use chrono::{DateTime, Utc};
use kg_core::entity::{CheckpointReason, Entity, EntityKind};
use kg_core::query::{PathDirection, RelationshipQuery, TraversalQuery};
use kg_core::relationship::RelationshipType;
use kg_error::KgError;
use kg_graph_store::{BulkQuery, GraphStore};
use serde_json::json;

use crate::support::{temporal_edge, write_all};

/// Parameters for [`create_checkpoint`] (spec §4.6 `createCheckpoint`).
#[derive(Debug, Clone)]
pub struct CheckpointParams {
    /// Why the checkpoint is being created.
    pub reason: CheckpointReason,
    /// Hop bound for the traversal from each seed. Counts edges traversed,
    /// matching [`kg_core::query::TraversalQuery::max_hops`]'s own
    /// convention (spec §9 Open Question (c)).
    pub hops: u32,
    /// Optional time-travel instant to traverse as-of.
    pub window: Option<DateTime<Utc>>,
}

/// Materialize a checkpoint node, traverse up to `params.hops` along
/// structural and code relationships from each seed, and emit
/// `CHECKPOINT_INCLUDES` edges to the reached set (spec §4.6
/// `createCheckpoint`). Returns the new checkpoint's id, or an empty
/// string if the caller supplied no seeds (the runner treats an empty id
/// as failure, per spec §4.7 "Execution").
pub async fn create_checkpoint<S: GraphStore + ?Sized>(
    store: &S,
    seed_entities: &[String],
    params: CheckpointParams,
    now: DateTime<Utc>,
) -> Result<String, KgError> {
    if seed_entities.is_empty() {
        return Ok(String::new());
    }

    let checkpoint_id = format!("chk_{}", now.timestamp_micros());

    let reached = store
        .traverse(&TraversalQuery {
            seed_entity_ids: seed_entities.to_vec(),
            relationship_types: None,
            max_hops: params.hops,
            direction: PathDirection::Outgoing,
            as_of: params.window,
        })
        .await?;

    let checkpoint_entity = Entity::new(
        checkpoint_id.clone(),
        checkpoint_id.clone(),
        EntityKind::Checkpoint {
            checkpoint_id: checkpoint_id.clone(),
            reason: params.reason,
            hops: params.hops,
            seed_entities: seed_entities.to_vec(),
        },
        now,
    );

    let mut queries = vec![BulkQuery::UpsertEntity(Box::new(checkpoint_entity))];
    for member_id in reached.all_reached() {
        queries.push(BulkQuery::UpsertRelationship(Box::new(temporal_edge(
            &checkpoint_id,
            &member_id,
            RelationshipType::CheckpointIncludes,
            now,
        ))));
    }

    let member_count = queries.len().saturating_sub(1);
    write_all(store, queries).await?;
    tracing::info!(checkpoint_id, member_count, hops = params.hops, "checkpoint materialized");
    Ok(checkpoint_id)
}

/// Stamp `checkpointId`/`annotatedAt` (carried in `metadata`, since
/// neither field belongs to the closed code-attribute set) onto either
/// the explicit `relationship_ids`, or — when absent — every edge tagged
/// with `changeSetId = session_id` (spec §4.6
/// `annotateSessionRelationshipsWithCheckpoint`). Returns the number of
/// edges annotated.
pub async fn annotate_session_relationships_with_checkpoint<S: GraphStore + ?Sized>(
    store: &S,
    session_id: &str,
    checkpoint_id: &str,
    relationship_ids: Option<&[String]>,
    ts: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<u32, KgError> {
    let annotated_at = ts.unwrap_or(now);

    let session_edges = store
        .query_relationships(&RelationshipQuery {
            session_id: Some(session_id.to_string()),
            ..Default::default()
        })
        .await?;

    let mut targets = session_edges;
    if let Some(ids) = relationship_ids {
        targets.retain(|r| ids.contains(&r.id));
    }

    let mut queries = Vec::with_capacity(targets.len());
    for mut edge in targets {
        edge.metadata.insert("checkpointId".to_string(), json!(checkpoint_id));
        edge.metadata.insert("annotatedAt".to_string(), json!(annotated_at.to_rfc3339()));
        edge.last_modified = now;
        queries.push(BulkQuery::UpsertRelationship(Box::new(edge)));
    }
    let annotated = queries.len() as u32;
    write_all(store, queries).await?;
    Ok(annotated)
}

/// MERGE a `Session`/`Checkpoint` node pair and the `SESSION_CHECKPOINT`
/// link between them, carrying `metadata` (reason, hop count, attempts,
/// seed entity ids, job id, checkpoint status) as the closed
/// `CREATED_CHECKPOINT` relationship named in the source prose (spec §4.6
/// `createSessionCheckpointLink`; the closed `RelationshipType` set has no
/// `CREATED_CHECKPOINT` variant, so this uses `SESSION_CHECKPOINT`, the
/// set's actual session/checkpoint-group member — see DESIGN.md).
pub async fn create_session_checkpoint_link<S: GraphStore + ?Sized>(
    store: &S,
    session_id: &str,
    checkpoint_id: &str,
    metadata: serde_json::Map<String, serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<(), KgError> {
    let mut link = temporal_edge(session_id, checkpoint_id, RelationshipType::SessionCheckpoint, now);
    link.metadata = metadata.into_iter().collect();

    write_all(store, vec![BulkQuery::UpsertRelationship(Box::new(link))]).await
}
