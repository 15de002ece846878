//! Version chain operations (spec §4.6 `appendVersion`,
//! `repairPreviousVersionLink`).

use chrono::{DateTime, Utc};
use kg_core::entity::{Entity, EntityKind};
use kg_core::query::{RelationshipQuery, TypeFilter};
use kg_core::relationship::RelationshipType;
use kg_error::{ErrorCode, KgError};
use kg_graph_store::{BulkQuery, GraphStore};

use crate::support::{temporal_edge, write_all};

/// Create a new `Version` node for `entity`, link it `OF` the entity, and
/// — when a prior version exists — link it `PREVIOUS_VERSION` to the most
/// recent one (spec §4.6 `appendVersion`). Returns the new version's id.
pub async fn append_version<S: GraphStore + ?Sized>(
    store: &S,
    entity: &Entity,
    now: DateTime<Utc>,
) -> Result<String, KgError> {
    let version_id = format!("ver_{}_{}", entity.id, now.timestamp_micros());

    let prior = most_recent_version(store, &entity.id).await?;

    let version_entity = Entity::new(
        version_id.clone(),
        entity.hash.clone(),
        EntityKind::Version {
            entity_id: entity.id.clone(),
            hash: entity.hash.clone(),
            path: entity.path.clone(),
            language: entity.language.clone(),
        },
        now,
    );

    let mut queries = vec![
        BulkQuery::UpsertEntity(Box::new(version_entity)),
        BulkQuery::UpsertRelationship(Box::new(temporal_edge(
            &version_id,
            &entity.id,
            RelationshipType::Of,
            now,
        ))),
    ];

    if let Some((prior_version_id, _)) = prior {
        queries.push(BulkQuery::UpsertRelationship(Box::new(temporal_edge(
            &version_id,
            &prior_version_id,
            RelationshipType::PreviousVersion,
            now,
        ))));
    }

    write_all(store, queries).await?;
    Ok(version_id)
}

/// The most recent `Version` node linked `OF` `entity_id`, as `(version_id,
/// created)`, chosen by latest `OF`-edge `created` timestamp.
async fn most_recent_version<S: GraphStore + ?Sized>(
    store: &S,
    entity_id: &str,
) -> Result<Option<(String, DateTime<Utc>)>, KgError> {
    let of_edges = store
        .query_relationships(&RelationshipQuery {
            to_entity_id: Some(entity_id.to_string()),
            r#type: Some(TypeFilter::One(RelationshipType::Of)),
            ..Default::default()
        })
        .await?;

    Ok(of_edges
        .into_iter()
        .max_by_key(|r| r.created)
        .map(|r| (r.from_entity_id, r.created)))
}

/// Idempotently create a missing `PREVIOUS_VERSION` edge for `version_id`:
/// find the unique immediately-prior version of the same entity by
/// timestamp and link it (spec §4.6 `repairPreviousVersionLink`, invariant
/// 4). Ties on `created` are broken by the lexically smaller version id
/// (spec §9 Open Question (a) — the source left this tiebreaker
/// unspecified).
pub async fn repair_previous_version_link<S: GraphStore + ?Sized>(
    store: &S,
    version_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, KgError> {
    let already_linked = store
        .query_relationships(&RelationshipQuery {
            from_entity_id: Some(version_id.to_string()),
            r#type: Some(TypeFilter::One(RelationshipType::PreviousVersion)),
            ..Default::default()
        })
        .await?;
    if !already_linked.is_empty() {
        return Ok(false);
    }

    let of_edges = store
        .query_relationships(&RelationshipQuery {
            from_entity_id: Some(version_id.to_string()),
            r#type: Some(TypeFilter::One(RelationshipType::Of)),
            ..Default::default()
        })
        .await?;
    let Some(of_edge) = of_edges.into_iter().next() else {
        return Err(KgError::new(
            ErrorCode::TemporalChainBroken,
            format!("version {version_id} has no OF edge to repair against"),
        ));
    };
    let entity_id = of_edge.to_entity_id;
    let this_created = of_edge.created;

    let siblings = store
        .query_relationships(&RelationshipQuery {
            to_entity_id: Some(entity_id),
            r#type: Some(TypeFilter::One(RelationshipType::Of)),
            ..Default::default()
        })
        .await?;

    let prior = siblings
        .into_iter()
        .filter(|r| r.from_entity_id != version_id && r.created <= this_created)
        .filter(|r| r.created < this_created || r.from_entity_id.as_str() < version_id)
        .max_by(|a, b| a.created.cmp(&b.created).then(a.from_entity_id.cmp(&b.from_entity_id)));

    let Some(prior_edge) = prior else {
        tracing::debug!(version_id, "no prior version found; treating as chain head");
        return Ok(false);
    };

    tracing::warn!(
        version_id,
        prior_version_id = prior_edge.from_entity_id.as_str(),
        "repairing missing PREVIOUS_VERSION link"
    );
    write_all(
        store,
        vec![BulkQuery::UpsertRelationship(Box::new(temporal_edge(
            version_id,
            &prior_edge.from_entity_id,
            RelationshipType::PreviousVersion,
            now,
        )))],
    )
    .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeStore;
    use kg_core::{Location, SymbolKind, SymbolVisibility};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn file_entity(id: &str) -> Entity {
        Entity::new(
            id,
            "hash",
            EntityKind::PlainSymbol {
                name: id.to_string(),
                symbol_kind: SymbolKind::Variable,
                signature: None,
                docstring: None,
                visibility: SymbolVisibility::Public,
                is_exported: false,
                is_deprecated: false,
                location: Location::default(),
            },
            now(),
        )
    }

    #[tokio::test]
    async fn first_version_has_no_previous_version_link() {
        let store = FakeStore::default();
        let entity = file_entity("e1");
        let version_id = append_version(&store, &entity, now()).await.unwrap();

        let links = store
            .query_relationships(&RelationshipQuery {
                from_entity_id: Some(version_id),
                r#type: Some(TypeFilter::One(RelationshipType::PreviousVersion)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn second_version_links_to_the_first() {
        let store = FakeStore::default();
        let entity = file_entity("e1");
        let t0 = now();
        let t1 = t0 + chrono::Duration::seconds(1);

        let v1 = append_version(&store, &entity, t0).await.unwrap();
        let v2 = append_version(&store, &entity, t1).await.unwrap();

        let links = store
            .query_relationships(&RelationshipQuery {
                from_entity_id: Some(v2),
                r#type: Some(TypeFilter::One(RelationshipType::PreviousVersion)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].to_entity_id, v1);
    }

    #[tokio::test]
    async fn repair_is_a_no_op_when_link_already_present() {
        let store = FakeStore::default();
        let entity = file_entity("e1");
        let t0 = now();
        append_version(&store, &entity, t0).await.unwrap();
        let v2 = append_version(&store, &entity, t0 + chrono::Duration::seconds(1)).await.unwrap();

        let repaired = repair_previous_version_link(&store, &v2, t0).await.unwrap();
        assert!(!repaired, "link already exists from appendVersion, repair must not duplicate it");

        let links = store
            .query_relationships(&RelationshipQuery {
                from_entity_id: Some(v2),
                r#type: Some(TypeFilter::One(RelationshipType::PreviousVersion)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn repair_fills_in_a_missing_link() {
        let store = FakeStore::default();
        let entity = file_entity("e1");
        let t0 = now();
        let t1 = t0 + chrono::Duration::seconds(1);

        // Construct v1 then v2's OF edge directly, skipping append_version's
        // own linking, to simulate a chain broken by a failed write.
        let v1 = append_version(&store, &entity, t0).await.unwrap();
        let v2_id = "ver_e1_manual".to_string();
        store
            .bulk_query(
                vec![kg_graph_store::BulkQuery::UpsertRelationship(Box::new(
                    crate::support::temporal_edge(&v2_id, &entity.id, RelationshipType::Of, t1),
                ))],
                kg_graph_store::BulkOptions::default(),
                0,
            )
            .await
            .unwrap();

        let repaired = repair_previous_version_link(&store, &v2_id, t1).await.unwrap();
        assert!(repaired);

        let links = store
            .query_relationships(&RelationshipQuery {
                from_entity_id: Some(v2_id),
                r#type: Some(TypeFilter::One(RelationshipType::PreviousVersion)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].to_entity_id, v1);
    }

    #[tokio::test]
    async fn repair_on_the_chain_head_is_a_no_op() {
        let store = FakeStore::default();
        let entity = file_entity("e1");
        let v1 = append_version(&store, &entity, now()).await.unwrap();

        let repaired = repair_previous_version_link(&store, &v1, now()).await.unwrap();
        assert!(!repaired);
    }
}
