//! Shared edge-construction helpers for the temporal layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kg_core::ids::canonical_structural_id;
use kg_core::relationship::{Relationship, RelationshipType};
use kg_error::KgError;
use kg_graph_store::{BulkOptions, BulkQuery, GraphStore};

/// The `SCREAMING_SNAKE_CASE` wire name of a relationship type, as used in
/// canonical-id hash input. Reuses `RelationshipType`'s own serde
/// representation (spec §3.2) rather than hand-maintaining a second table
/// of names.
pub(crate) fn wire_name(t: RelationshipType) -> String {
    serde_json::to_value(t)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Build a bare temporal-layer edge (`OF`, `PREVIOUS_VERSION`,
/// `CHECKPOINT_INCLUDES`, `SESSION_CHECKPOINT`): no site/occurrence data.
/// The id is synthesized via [`canonical_structural_id`] — the `time-rel_`
/// prefix exists precisely so this layer can mint its own structural-style
/// ids, distinct from C4's code-edge ids (see `kg_core::ids`'s own doc
/// comment).
pub(crate) fn temporal_edge(
    from_entity_id: &str,
    to_entity_id: &str,
    rel_type: RelationshipType,
    now: DateTime<Utc>,
) -> Relationship {
    let id = canonical_structural_id(from_entity_id, &wire_name(rel_type), to_entity_id);
    Relationship {
        id,
        from_entity_id: from_entity_id.to_string(),
        to_entity_id: to_entity_id.to_string(),
        r#type: rel_type,
        created: now,
        last_modified: now,
        version: 1,
        metadata: BTreeMap::new(),
        site_id: None,
        site_hash: None,
        evidence: Vec::new(),
        locations: Vec::new(),
        sites: Vec::new(),
        attrs: None,
        valid_from: Some(now),
        valid_to: None,
        last_seen_at: Some(now),
        change_set_id: None,
    }
}

/// Submit `queries` as one bulk batch under default (transactional)
/// options. Failures inside the transaction surface as the batch-level
/// `Err` per [`kg_graph_store::BulkOptions`]'s contract, so callers need
/// not inspect per-query outcomes.
pub(crate) async fn write_all<S: GraphStore + ?Sized>(
    store: &S,
    queries: Vec<BulkQuery>,
) -> Result<(), KgError> {
    if queries.is_empty() {
        return Ok(());
    }
    store.bulk_query(queries, BulkOptions::default(), 0).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_name_matches_screaming_snake_case() {
        assert_eq!(wire_name(RelationshipType::Of), "OF");
        assert_eq!(wire_name(RelationshipType::PreviousVersion), "PREVIOUS_VERSION");
        assert_eq!(wire_name(RelationshipType::SessionCheckpoint), "SESSION_CHECKPOINT");
        assert_eq!(wire_name(RelationshipType::CheckpointIncludes), "CHECKPOINT_INCLUDES");
    }

    #[test]
    fn temporal_edge_is_active_and_deterministic() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let a = temporal_edge("v1", "e1", RelationshipType::Of, now);
        let b = temporal_edge("v1", "e1", RelationshipType::Of, now);
        assert_eq!(a.id, b.id);
        assert!(a.is_active());
        assert_eq!(a.valid_from, Some(now));
    }
}
