//! Edge open/close lifecycle (spec §4.6 `openEdge`, `closeEdge`,
//! `markInactiveEdgesNotSeenSince`; spec §3.3 "Relationships are opened
//! with `validFrom = now` on first observation...").

use chrono::{DateTime, Utc};
use kg_core::query::{RelationshipQuery, TypeFilter};
use kg_core::relationship::{Relationship, RelationshipType};
use kg_error::KgError;
use kg_graph_store::{BulkQuery, GraphStore};

use crate::support::{temporal_edge, write_all};

/// Open (or refresh) the active edge of the `(from, to, type)` triple:
/// set `validFrom = ts ∨ now`, tag it with `changeSetId`, create it if
/// none exists (spec §4.6 `openEdge`).
pub async fn open_edge<S: GraphStore + ?Sized>(
    store: &S,
    from_entity_id: &str,
    to_entity_id: &str,
    rel_type: RelationshipType,
    ts: Option<DateTime<Utc>>,
    change_set_id: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), KgError> {
    let when = ts.unwrap_or(now);

    let edge = match active_edge(store, from_entity_id, to_entity_id, rel_type).await? {
        Some(mut existing) => {
            existing.valid_from = Some(when);
            existing.change_set_id = change_set_id;
            existing.last_seen_at = Some(now);
            existing.last_modified = now;
            existing
        }
        None => {
            let mut fresh = temporal_edge(from_entity_id, to_entity_id, rel_type, now);
            fresh.valid_from = Some(when);
            fresh.change_set_id = change_set_id;
            fresh
        }
    };

    write_all(store, vec![BulkQuery::UpsertRelationship(Box::new(edge))]).await
}

/// Close the active edge of the `(from, to, type)` triple: set `validTo =
/// ts ∨ now` (spec §4.6 `closeEdge`). A no-op when no active edge exists.
pub async fn close_edge<S: GraphStore + ?Sized>(
    store: &S,
    from_entity_id: &str,
    to_entity_id: &str,
    rel_type: RelationshipType,
    ts: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), KgError> {
    let Some(mut existing) = active_edge(store, from_entity_id, to_entity_id, rel_type).await? else {
        return Ok(());
    };
    existing.valid_to = Some(ts.unwrap_or(now));
    existing.last_modified = now;
    write_all(store, vec![BulkQuery::UpsertRelationship(Box::new(existing))]).await
}

async fn active_edge<S: GraphStore + ?Sized>(
    store: &S,
    from_entity_id: &str,
    to_entity_id: &str,
    rel_type: RelationshipType,
) -> Result<Option<Relationship>, KgError> {
    let mut matches = store
        .query_relationships(&RelationshipQuery {
            from_entity_id: Some(from_entity_id.to_string()),
            to_entity_id: Some(to_entity_id.to_string()),
            r#type: Some(TypeFilter::One(rel_type)),
            active: Some(true),
            ..Default::default()
        })
        .await?;
    Ok(matches.pop())
}

/// Close every currently-active edge whose `lastSeenAt` predates
/// `scan_start` (spec §4.6 `markInactiveEdgesNotSeenSince`). Must run
/// only after every write from the scan that produced `scan_start` has
/// committed (spec §5 "ordering guarantees"). Returns the number of edges
/// closed.
pub async fn mark_inactive_edges_not_seen_since<S: GraphStore + ?Sized>(
    store: &S,
    scan_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<u32, KgError> {
    let active = store
        .query_relationships(&RelationshipQuery {
            active: Some(true),
            ..Default::default()
        })
        .await?;

    let mut queries = Vec::new();
    for mut edge in active {
        let last_seen = edge.last_seen_at.unwrap_or(edge.created);
        if last_seen < scan_start {
            edge.valid_to = Some(scan_start);
            edge.last_modified = now;
            queries.push(BulkQuery::UpsertRelationship(Box::new(edge)));
        }
    }
    let closed = queries.len() as u32;
    write_all(store, queries).await?;
    tracing::info!(scan_start = %scan_start, closed, "closed stale active edges after scan");
    Ok(closed)
}
