// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Thin façade composing the graph/relational stores, temporal engine,
//! checkpoint runner, and validator behind one API (spec §4.9/S1,
//! component C11: "Thin pass-through exposing entity/relationship/search/
//! history/analysis capabilities, composing C6-C10").
//!
//! [`Facade`] owns no logic of its own beyond two derived read operations
//! that no single backing crate implements — [`Facade::path`] and
//! [`Facade::impact`] — built on [`kg_graph_store::GraphStore::query_relationships`]
//! and [`kg_graph_store::GraphStore::traverse`]. Everything else is a direct
//! pass-through to the crate that owns it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use kg_checkpoint_runner::{CheckpointRunner, JobEvent, JobPayload, RunnerConfig};
use kg_core::entity::Entity;
use kg_core::query::{
    ImpactQuery, ImpactResult, PathDirection, PathQuery, PathResult, RelationshipQuery, TraversalQuery,
    TraversalResult, TypeFilter,
};
use kg_core::relationship::{Relationship, RelationshipType};
use kg_error::KgError;
use kg_graph_store::vector::{VectorCollection, VectorHit, VectorRecord};
use kg_graph_store::{BulkOptions, BulkQuery, BulkResult, GraphStore};
use kg_relational_store::RelationalStore;
use kg_temporal::CheckpointParams;
use kg_validator::{ValidationReport, ValidatorOptions};

/// The façade. Generic over the graph/relational store implementations so
/// callers can wire a real backend or an in-memory one interchangeably.
///
/// `G`/`R` must be `Clone`: the façade keeps its own handle for direct
/// pass-through calls and hands a second handle to its internal
/// [`CheckpointRunner`], matching how a real backend's store type is itself
/// a cheap handle around a pooled connection.
pub struct Facade<G, R> {
    graph: G,
    relational: R,
    runner: CheckpointRunner<G, R>,
}

impl<G, R> Facade<G, R>
where
    G: GraphStore + Clone + Send + Sync + 'static,
    R: RelationalStore + Clone + Send + Sync + 'static,
{
    /// Wire a façade over the given stores. Call [`CheckpointRunner::hydrate`]
    /// via [`Self::checkpoint_runner`] once per attachment before relying on
    /// persisted checkpoint job state.
    pub fn new(graph: G, relational: R, runner_config: RunnerConfig) -> Self {
        let runner = CheckpointRunner::new(graph.clone(), relational.clone(), runner_config);
        Self { graph, relational, runner }
    }

    /// The underlying checkpoint runner, for hydration, shutdown, and
    /// listener subscription.
    pub fn checkpoint_runner(&self) -> &CheckpointRunner<G, R> {
        &self.runner
    }

    /// Create required indexes/constraints. Idempotent.
    pub async fn ensure_indexes(&self) -> Result<(), KgError> {
        self.graph.ensure_indexes().await
    }

    /// Bulk-upsert entities and relationships (spec §4.4 `bulkQuery`).
    /// `queue_depth` is passed straight to the store for its bulk-write
    /// telemetry and carries no meaning here.
    pub async fn bulk_write(
        &self,
        queries: Vec<BulkQuery>,
        options: BulkOptions,
        queue_depth: u32,
    ) -> Result<BulkResult, KgError> {
        self.graph.bulk_query(queries, options, queue_depth).await
    }

    // ---- relationship / traversal (spec §6.2) ----

    /// Query relationships matching `query`.
    pub async fn query_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>, KgError> {
        self.graph.query_relationships(query).await
    }

    /// Multi-hop traversal from a seed set.
    pub async fn traverse(&self, query: &TraversalQuery) -> Result<TraversalResult, KgError> {
        self.graph.traverse(query).await
    }

    /// Shortest path from `query.start_entity_id` toward `query.end_entity_id`,
    /// or to the nearest reachable entity when no end is given (spec §6.2
    /// "when absent, any reachable endpoint qualifies" — resolved here as
    /// the first entity discovered by breadth-first search, since "nearest"
    /// is the only reading consistent with a single [`PathResult`]; see
    /// DESIGN.md Open Question).
    ///
    /// [`PathResult::entities`] is always empty: `GraphStore` has no
    /// get-entity-by-id operation to materialize them from (spec §6.2 exposes
    /// only relationship/traversal queries), so entity hydration is left to
    /// the caller.
    pub async fn path(&self, query: &PathQuery) -> Result<PathResult, KgError> {
        if Some(query.start_entity_id.as_str()) == query.end_entity_id.as_deref() {
            return Ok(PathResult {
                path: vec![query.start_entity_id.clone()],
                total_length: 0,
                relationship_types: Vec::new(),
                entities: Vec::new(),
            });
        }

        let max_depth = query.max_depth.unwrap_or(u32::MAX);
        let mut visited: HashSet<String> = HashSet::from([query.start_entity_id.clone()]);
        let mut parent: HashMap<String, (String, RelationshipType)> = HashMap::new();
        let mut frontier = vec![query.start_entity_id.clone()];
        let mut found: Option<String> = None;

        'search: for _ in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            for node in &frontier {
                let neighbors = self.neighbors(node, query.direction, &query.relationship_types).await?;
                for (next_id, rel_type) in neighbors {
                    if !visited.insert(next_id.clone()) {
                        continue;
                    }
                    parent.insert(next_id.clone(), (node.clone(), rel_type));
                    let reached_target = match &query.end_entity_id {
                        Some(end) => &next_id == end,
                        None => true,
                    };
                    if reached_target {
                        found = Some(next_id);
                        break 'search;
                    }
                    next_frontier.push(next_id);
                }
            }
            frontier = next_frontier;
        }

        let Some(end_id) = found else {
            return Ok(PathResult::default());
        };

        let mut path = vec![end_id.clone()];
        let mut relationship_types = Vec::new();
        let mut cursor = end_id;
        while let Some((prev, rel_type)) = parent.get(&cursor) {
            relationship_types.push(*rel_type);
            path.push(prev.clone());
            cursor = prev.clone();
        }
        path.reverse();
        relationship_types.reverse();

        Ok(PathResult {
            total_length: relationship_types.len() as u32,
            relationship_types,
            path,
            entities: Vec::new(),
        })
    }

    /// Dependency/impact analysis: entities with a direct incoming edge
    /// from `query.entity_id` ("changing this entity directly affects
    /// these"), and everything reachable beyond them up to `query.max_depth`
    /// ("cascading" — spec §6.2 "direct vs cascading splits"). Direction is
    /// fixed to incoming: impact flows from dependents toward the entity
    /// that changed, not the other way around (see DESIGN.md Open Question).
    pub async fn impact(&self, query: &ImpactQuery) -> Result<ImpactResult, KgError> {
        let direct_edges = self
            .graph
            .query_relationships(&RelationshipQuery {
                to_entity_id: Some(query.entity_id.clone()),
                r#type: query.relationship_types.clone().map(TypeFilter::Many),
                ..Default::default()
            })
            .await?;
        let direct: Vec<String> = direct_edges.into_iter().map(|r| r.from_entity_id).collect();

        let traversal = self
            .graph
            .traverse(&TraversalQuery {
                seed_entity_ids: direct.clone(),
                relationship_types: query.relationship_types.clone(),
                max_hops: query.max_depth.unwrap_or(u32::MAX),
                direction: PathDirection::Incoming,
                as_of: None,
            })
            .await?;

        let mut seen: HashSet<String> = direct.iter().cloned().collect();
        seen.insert(query.entity_id.clone());
        let mut cascading = Vec::new();
        for id in traversal.all_reached() {
            if seen.insert(id.clone()) {
                cascading.push(id);
            }
        }

        Ok(ImpactResult { direct, cascading })
    }

    async fn neighbors(
        &self,
        node: &str,
        direction: PathDirection,
        relationship_types: &Option<Vec<RelationshipType>>,
    ) -> Result<Vec<(String, RelationshipType)>, KgError> {
        let type_filter = relationship_types.clone().map(TypeFilter::Many);
        let mut out = Vec::new();

        if matches!(direction, PathDirection::Outgoing | PathDirection::Both) {
            let query = RelationshipQuery {
                from_entity_id: Some(node.to_string()),
                r#type: type_filter.clone(),
                ..Default::default()
            };
            for rel in self.graph.query_relationships(&query).await? {
                out.push((rel.to_entity_id, rel.r#type));
            }
        }
        if matches!(direction, PathDirection::Incoming | PathDirection::Both) {
            let query = RelationshipQuery {
                to_entity_id: Some(node.to_string()),
                r#type: type_filter,
                ..Default::default()
            };
            for rel in self.graph.query_relationships(&query).await? {
                out.push((rel.from_entity_id, rel.r#type));
            }
        }
        Ok(out)
    }

    // ---- semantic search (spec §6.3 vector collections) ----

    /// Nearest-neighbor search within one vector collection.
    pub async fn search(
        &self,
        collection: VectorCollection,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>, KgError> {
        self.graph.search_vector(collection, query_embedding, limit).await
    }

    /// Index (or replace) an embedding in a vector collection.
    pub async fn index_embedding(&self, collection: VectorCollection, record: VectorRecord) -> Result<(), KgError> {
        self.graph.upsert_vector(collection, record).await
    }

    // ---- temporal history (spec §4.6, C8) ----

    /// Append a new version of `entity` and link it into its version chain.
    pub async fn append_version(&self, entity: &Entity, now: DateTime<Utc>) -> Result<String, KgError> {
        kg_temporal::append_version(&self.graph, entity, now).await
    }

    /// Open (or refresh) the active edge of a `(from, to, type)` triple.
    pub async fn open_edge(
        &self,
        from_entity_id: &str,
        to_entity_id: &str,
        rel_type: RelationshipType,
        ts: Option<DateTime<Utc>>,
        change_set_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), KgError> {
        kg_temporal::open_edge(&self.graph, from_entity_id, to_entity_id, rel_type, ts, change_set_id, now).await
    }

    /// Close the active edge of a `(from, to, type)` triple, if any.
    pub async fn close_edge(
        &self,
        from_entity_id: &str,
        to_entity_id: &str,
        rel_type: RelationshipType,
        ts: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), KgError> {
        kg_temporal::close_edge(&self.graph, from_entity_id, to_entity_id, rel_type, ts, now).await
    }

    /// Close every active edge whose `lastSeenAt` predates `scan_start`.
    pub async fn mark_inactive_edges_not_seen_since(
        &self,
        scan_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u32, KgError> {
        kg_temporal::mark_inactive_edges_not_seen_since(&self.graph, scan_start, now).await
    }

    // ---- checkpointing (spec §4.7, C9) ----

    /// Enqueue a checkpoint job. See [`CheckpointRunner::enqueue`].
    pub async fn enqueue_checkpoint(&self, payload: JobPayload) -> Result<String, KgError> {
        self.runner.enqueue(payload).await
    }

    /// Register a checkpoint-job lifecycle listener.
    pub fn subscribe_checkpoint_events(&self, listener: impl Fn(&JobEvent) + Send + Sync + 'static) {
        self.runner.subscribe(listener);
    }

    /// Materialize a checkpoint synchronously, bypassing the durable job
    /// queue — for callers that need the checkpoint id immediately rather
    /// than waiting on [`Self::enqueue_checkpoint`]'s asynchronous pipeline.
    pub async fn create_checkpoint_now(
        &self,
        seed_entities: &[String],
        params: CheckpointParams,
        now: DateTime<Utc>,
    ) -> Result<String, KgError> {
        kg_temporal::create_checkpoint(&self.graph, seed_entities, params, now).await
    }

    // ---- validation (spec §4.8, C10) ----

    /// Run the temporal history validator.
    pub async fn validate(&self, options: ValidatorOptions, now: DateTime<Utc>) -> Result<ValidationReport, KgError> {
        kg_validator::validate(&self.graph, options, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kg_core::entity::{EntityKind, Location, SymbolKind, SymbolVisibility};
    use kg_graph_store::{BulkOptions, BulkQuery, BulkResult};
    use kg_relational_store::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct FakeGraphStore {
        entities: Arc<Mutex<Vec<Entity>>>,
        relationships: Arc<Mutex<Vec<Relationship>>>,
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
        if let Some(t) = &q.r#type {
            if !t.matches(r.r#type) {
                return false;
            }
        }
        true
    }

    #[async_trait]
    impl GraphStore for FakeGraphStore {
        async fn bulk_query(&self, queries: Vec<BulkQuery>, _o: BulkOptions, _d: u32) -> Result<BulkResult, KgError> {
            for q in queries {
                match q {
                    BulkQuery::UpsertEntity(e) => self.entities.lock().unwrap().push(*e),
                    BulkQuery::UpsertRelationship(r) => {
                        let mut rels = self.relationships.lock().unwrap();
                        if let Some(existing) = rels.iter_mut().find(|x| x.id == r.id) {
                            *existing = *r;
                        } else {
                            rels.push(*r);
                        }
                    }
                }
            }
            Ok(BulkResult { outcomes: Vec::new() })
        }

        async fn query_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>, KgError> {
            Ok(self.relationships.lock().unwrap().iter().filter(|r| matches(r, query)).cloned().collect())
        }

        async fn traverse(&self, query: &TraversalQuery) -> Result<TraversalResult, KgError> {
            let mut by_hop = vec![query.seed_entity_ids.clone()];
            let mut frontier = query.seed_entity_ids.clone();
            let mut seen: HashSet<String> = frontier.iter().cloned().collect();
            for _ in 0..query.max_hops {
                let mut next = Vec::new();
                for node in &frontier {
                    let q = RelationshipQuery { to_entity_id: Some(node.clone()), ..Default::default() };
                    for rel in self.query_relationships(&q).await? {
                        if seen.insert(rel.from_entity_id.clone()) {
                            next.push(rel.from_entity_id);
                        }
                    }
                }
                if next.is_empty() {
                    break;
                }
                by_hop.push(next.clone());
                frontier = next;
            }
            Ok(TraversalResult { by_hop })
        }

        async fn ensure_indexes(&self) -> Result<(), KgError> {
            Ok(())
        }

        async fn search_vector(&self, _c: VectorCollection, _q: &[f32], _l: usize) -> Result<Vec<VectorHit>, KgError> {
            Ok(Vec::new())
        }

        async fn upsert_vector(&self, _c: VectorCollection, _r: VectorRecord) -> Result<(), KgError> {
            Ok(())
        }

        async fn scroll_vectors(&self, _c: VectorCollection, _o: usize, _l: usize) -> Result<Vec<VectorRecord>, KgError> {
            Ok(Vec::new())
        }

        async fn delete_vector(&self, _c: VectorCollection, _id: &str) -> Result<(), KgError> {
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct FakeRelationalStore {
        jobs: Arc<Mutex<std::collections::HashMap<String, SessionCheckpointJobRow>>>,
    }

    #[async_trait]
    impl RelationalStore for FakeRelationalStore {
        async fn upsert_document(&self, _d: Document) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_session(&self, _r: SessionRow) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_test_suite(&self, suite: TestSuite) -> Result<(String, UpsertOutcome), KgError> {
            Ok((suite.id.clone(), UpsertOutcome::Inserted))
        }
        async fn upsert_test_result(&self, _r: TestResult) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_test_coverage(&self, _r: TestCoverageRow) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_test_performance(&self, _r: TestPerformanceRow) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_flaky_analysis(&self, _r: FlakyTestAnalysis) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn insert_change(&self, _r: ChangeRecord) -> Result<(), KgError> {
            Ok(())
        }
        async fn upsert_scm_commit(&self, _r: ScmCommit) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn upsert_performance_snapshot(&self, _r: PerformanceMetricSnapshot) -> Result<UpsertOutcome, KgError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn insert_coverage_history(&self, _r: CoverageHistoryEntry) -> Result<(), KgError> {
            Ok(())
        }
        async fn upsert_checkpoint_job(&self, job: SessionCheckpointJobRow) -> Result<UpsertOutcome, KgError> {
            self.jobs.lock().unwrap().insert(job.job_id.clone(), job);
            Ok(UpsertOutcome::Inserted)
        }
        async fn delete_checkpoint_job(&self, job_id: &str) -> Result<(), KgError> {
            self.jobs.lock().unwrap().remove(job_id);
            Ok(())
        }
        async fn load_checkpoint_jobs_by_status(
            &self,
            statuses: &[CheckpointJobStatus],
        ) -> Result<Vec<SessionCheckpointJobRow>, KgError> {
            Ok(self.jobs.lock().unwrap().values().filter(|j| statuses.contains(&j.status)).cloned().collect())
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    fn entity(id: &str) -> Entity {
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

    fn facade() -> Facade<FakeGraphStore, FakeRelationalStore> {
        Facade::new(FakeGraphStore::default(), FakeRelationalStore::default(), RunnerConfig::default())
    }

    #[tokio::test]
    async fn path_follows_a_direct_call_edge() {
        let f = facade();
        f.open_edge("fn:a", "fn:b", RelationshipType::Calls, None, None, now()).await.unwrap();

        let result = f
            .path(&PathQuery {
                start_entity_id: "fn:a".into(),
                end_entity_id: Some("fn:b".into()),
                relationship_types: None,
                max_depth: Some(5),
                direction: PathDirection::Outgoing,
            })
            .await
            .unwrap();

        assert_eq!(result.path, vec!["fn:a".to_string(), "fn:b".to_string()]);
        assert_eq!(result.total_length, 1);
        assert_eq!(result.relationship_types, vec![RelationshipType::Calls]);
    }

    #[tokio::test]
    async fn path_with_no_end_stops_at_the_nearest_neighbor() {
        let f = facade();
        f.open_edge("fn:a", "fn:b", RelationshipType::Calls, None, None, now()).await.unwrap();

        let result = f
            .path(&PathQuery {
                start_entity_id: "fn:a".into(),
                end_entity_id: None,
                relationship_types: None,
                max_depth: Some(5),
                direction: PathDirection::Outgoing,
            })
            .await
            .unwrap();
        assert_eq!(result.path, vec!["fn:a".to_string(), "fn:b".to_string()]);
    }

    #[tokio::test]
    async fn path_returns_empty_when_unreachable() {
        let f = facade();
        let result = f
            .path(&PathQuery {
                start_entity_id: "fn:a".into(),
                end_entity_id: Some("fn:z".into()),
                relationship_types: None,
                max_depth: Some(5),
                direction: PathDirection::Outgoing,
            })
            .await
            .unwrap();
        assert!(result.path.is_empty());
    }

    #[tokio::test]
    async fn impact_splits_direct_from_cascading_dependents() {
        let f = facade();
        f.open_edge("fn:caller", "fn:target", RelationshipType::Calls, None, None, now()).await.unwrap();
        f.open_edge("fn:caller_of_caller", "fn:caller", RelationshipType::Calls, None, None, now()).await.unwrap();

        let result = f
            .impact(&ImpactQuery { entity_id: "fn:target".into(), max_depth: Some(5), relationship_types: None })
            .await
            .unwrap();

        assert_eq!(result.direct, vec!["fn:caller".to_string()]);
        assert_eq!(result.cascading, vec!["fn:caller_of_caller".to_string()]);
    }

    #[tokio::test]
    async fn append_version_and_validate_round_trip() {
        let f = facade();
        let e = entity("entity:a");
        f.append_version(&e, now()).await.unwrap();
        f.append_version(&e, now() + chrono::Duration::seconds(1)).await.unwrap();

        let report = f.validate(ValidatorOptions::default(), now()).await.unwrap();
        assert_eq!(report.scanned_entities, 1);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn enqueue_checkpoint_runs_to_completion() {
        let f = facade();
        let payload = JobPayload::new("sess-1", vec!["entity:a".into()], kg_core::entity::CheckpointReason::Manual, 1, None);
        f.enqueue_checkpoint(payload).await.unwrap();
        assert!(f.checkpoint_runner().idle(std::time::Duration::from_secs(2)).await);
    }
}
