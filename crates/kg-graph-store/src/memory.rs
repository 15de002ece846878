//! A single-process, in-memory [`GraphStore`] (spec §4.4, SPEC_FULL.md §S3
//! "reference backend so the workspace compiles and is testable end-to-end
//! without a live Neo4j deployment").
//!
//! This is a real backend, not a test double: it implements the full
//! transactional bulk-write, query, traversal, and vector-collection
//! surface, and is what `kg-cli` constructs a [`crate::GraphStore`] from
//! when no external driver is configured. It does not persist across
//! process restarts and is not meant to scale past a demo-sized graph.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kg_core::query::{PathDirection, RelationshipQuery, TraversalQuery, TraversalResult};
use kg_core::relationship::Target;
use kg_core::{Entity, Relationship};
use kg_error::KgError;
use kg_telemetry::{BulkWriteTelemetry, TelemetryThresholds};

use crate::backfill::compute_backfill;
use crate::store::{run_bulk_batch, BulkOptions, BulkQuery, BulkResult, GraphStore};
use crate::structural::{extract_structural_fields, stable_stringify};
use crate::vector::{VectorCollection, VectorHit, VectorRecord};

/// In-memory [`GraphStore`], guarded by `Mutex`-wrapped maps so it can be
/// shared (via `Clone`, which only clones the `Arc` handles) across the
/// async tasks that own a [`crate::GraphStore`] implementation.
#[derive(Clone)]
pub struct InMemoryGraphStore {
    entities: Arc<Mutex<HashMap<String, Entity>>>,
    relationships: Arc<Mutex<HashMap<String, Relationship>>>,
    vectors: Arc<Mutex<HashMap<VectorCollection, Vec<VectorRecord>>>>,
    telemetry: Arc<BulkWriteTelemetry>,
}

impl InMemoryGraphStore {
    /// Construct an empty store with the given telemetry thresholds.
    #[must_use]
    pub fn new(thresholds: TelemetryThresholds) -> Self {
        Self {
            entities: Arc::new(Mutex::new(HashMap::new())),
            relationships: Arc::new(Mutex::new(HashMap::new())),
            vectors: Arc::new(Mutex::new(HashMap::new())),
            telemetry: Arc::new(BulkWriteTelemetry::new(thresholds)),
        }
    }

    /// Number of entities currently held, for diagnostics and tests.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.lock().unwrap().len()
    }

    /// Number of relationships currently held, for diagnostics and tests.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.relationships.lock().unwrap().len()
    }

    /// Fetch a stored entity by id, for diagnostics and tests.
    #[must_use]
    pub fn get_entity(&self, id: &str) -> Option<Entity> {
        self.entities.lock().unwrap().get(id).cloned()
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new(TelemetryThresholds::default())
    }
}

/// Upsert `rel` by id. When an edge with the same id already exists, diff
/// its structural fields via [`compute_backfill`] purely to surface what
/// changed in logs; the replacement itself is unconditional, since MERGE
/// semantics means the new observation always wins (spec §4.4 "upsert
/// idempotency").
fn upsert_relationship(rels: &mut HashMap<String, Relationship>, rel: Relationship) {
    if let Some(existing) = rels.get(&rel.id) {
        let persisted_fields = extract_structural_fields(existing);
        let persisted_metadata =
            stable_stringify(&serde_json::to_value(&existing.metadata).unwrap_or_default());
        if let Some(backfill) = compute_backfill(&persisted_fields, &persisted_metadata, &rel) {
            tracing::debug!(
                edge_id = %rel.id,
                changed_fields = backfill.changes.len(),
                "backfilling structural fields on re-upsert"
            );
        }
    }
    rels.insert(rel.id.clone(), rel);
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn bulk_query(
        &self,
        queries: Vec<BulkQuery>,
        options: BulkOptions,
        queue_depth: u32,
    ) -> Result<BulkResult, KgError> {
        let entities = Arc::clone(&self.entities);
        let relationships = Arc::clone(&self.relationships);
        run_bulk_batch(&self.telemetry, queries, options, queue_depth, move |q| {
            let entities = Arc::clone(&entities);
            let relationships = Arc::clone(&relationships);
            async move {
                match q {
                    BulkQuery::UpsertEntity(e) => {
                        entities.lock().unwrap().insert(e.id.clone(), *e);
                    }
                    BulkQuery::UpsertRelationship(r) => {
                        upsert_relationship(&mut relationships.lock().unwrap(), *r);
                    }
                }
                Ok(())
            }
        })
        .await
    }

    async fn query_relationships(
        &self,
        query: &RelationshipQuery,
    ) -> Result<Vec<Relationship>, KgError> {
        let rels = self.relationships.lock().unwrap();
        let mut matched: Vec<Relationship> = rels
            .values()
            .filter(|r| relationship_matches(query, r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

        let offset = query.offset.unwrap_or(0) as usize;
        let mut matched = if offset < matched.len() {
            matched.split_off(offset)
        } else {
            Vec::new()
        };
        if let Some(limit) = query.limit {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }

    async fn traverse(&self, query: &TraversalQuery) -> Result<TraversalResult, KgError> {
        let rels: Vec<Relationship> = self.relationships.lock().unwrap().values().cloned().collect();
        let allowed_types = query.relationship_types.as_ref();

        let mut visited: HashSet<String> = query.seed_entity_ids.iter().cloned().collect();
        let mut by_hop = vec![query.seed_entity_ids.clone()];
        let mut frontier = query.seed_entity_ids.clone();

        for _ in 0..query.max_hops {
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for node in &frontier {
                for rel in &rels {
                    if let Some(types) = allowed_types {
                        if !types.contains(&rel.r#type) {
                            continue;
                        }
                    }
                    if let Some(as_of) = query.as_of {
                        if !edge_valid_as_of(rel, as_of) {
                            continue;
                        }
                    }
                    if let Some(id) = step(rel, node, query.direction) {
                        if visited.insert(id.clone()) {
                            next.push(id);
                        }
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

    async fn search_vector(
        &self,
        collection: VectorCollection,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>, KgError> {
        let vectors = self.vectors.lock().unwrap();
        let mut hits: Vec<VectorHit> = vectors
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .map(|r| VectorHit {
                        entity_id: r.entity_id.clone(),
                        score: cosine_similarity(query_embedding, &r.embedding),
                    })
                    .collect()
            })
            .unwrap_or_default();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn upsert_vector(
        &self,
        collection: VectorCollection,
        record: VectorRecord,
    ) -> Result<(), KgError> {
        let mut vectors = self.vectors.lock().unwrap();
        let records = vectors.entry(collection).or_default();
        if let Some(existing) = records.iter_mut().find(|r| r.entity_id == record.entity_id) {
            *existing = record;
        } else {
            records.push(record);
        }
        Ok(())
    }

    async fn scroll_vectors(
        &self,
        collection: VectorCollection,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<VectorRecord>, KgError> {
        let vectors = self.vectors.lock().unwrap();
        Ok(vectors
            .get(&collection)
            .map(|records| records.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_vector(&self, collection: VectorCollection, entity_id: &str) -> Result<(), KgError> {
        let mut vectors = self.vectors.lock().unwrap();
        if let Some(records) = vectors.get_mut(&collection) {
            records.retain(|r| r.entity_id != entity_id);
        }
        Ok(())
    }
}

fn edge_valid_as_of(rel: &Relationship, as_of: DateTime<Utc>) -> bool {
    let valid_from = rel.valid_from.unwrap_or(rel.created);
    valid_from <= as_of && rel.valid_to.map_or(true, |vt| as_of < vt)
}

fn step(rel: &Relationship, node: &str, direction: PathDirection) -> Option<String> {
    match direction {
        PathDirection::Outgoing if rel.from_entity_id == node => Some(rel.to_entity_id.clone()),
        PathDirection::Incoming if rel.to_entity_id == node => Some(rel.from_entity_id.clone()),
        PathDirection::Both if rel.from_entity_id == node => Some(rel.to_entity_id.clone()),
        PathDirection::Both if rel.to_entity_id == node => Some(rel.from_entity_id.clone()),
        _ => None,
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Match `rel` against every filter field on `query`. Fields documented on
/// [`RelationshipQuery`] as "external collaborator field" are not modeled as
/// typed columns on [`Relationship`]; they are read generically from
/// `rel.metadata` under the field's camelCase name, the same fallback path
/// `extract_structural_fields` uses for structural columns.
///
/// `entity_types` (restricting by the kind of either endpoint entity) is not
/// filtered here: this store has no secondary index from relationship to
/// endpoint entity kind, and adding one would mean threading an `Entity`
/// lookup through every match — left as a documented simplification (see
/// DESIGN.md).
fn relationship_matches(q: &RelationshipQuery, rel: &Relationship) -> bool {
    if let Some(id) = &q.from_entity_id {
        if &rel.from_entity_id != id {
            return false;
        }
    }
    if let Some(id) = &q.to_entity_id {
        if &rel.to_entity_id != id {
            return false;
        }
    }
    if let Some(type_filter) = &q.r#type {
        if !type_filter.matches(rel.r#type) {
            return false;
        }
    }
    if let Some(since) = q.since {
        if rel.created < since {
            return false;
        }
    }
    if let Some(until) = q.until {
        if rel.created >= until {
            return false;
        }
    }
    if let Some(active) = q.active {
        if rel.is_active() != active {
            return false;
        }
    }
    if let Some(site_hash) = &q.site_hash {
        if rel.site_hash.as_deref() != Some(site_hash.as_str()) {
            return false;
        }
    }
    if let Some(session_id) = &q.session_id {
        if rel.change_set_id.as_deref() != Some(session_id.as_str()) {
            return false;
        }
    }

    if !code_attrs_match(q, rel) {
        return false;
    }
    if !structural_fields_match(q, rel) {
        return false;
    }
    if !external_fields_match(q, rel) {
        return false;
    }

    true
}

fn code_attrs_match(q: &RelationshipQuery, rel: &Relationship) -> bool {
    let attrs = rel.attrs.as_ref();

    if let Some(resolution) = q.resolution {
        if attrs.and_then(|a| a.resolution) != Some(resolution) {
            return false;
        }
    }
    if let Some(scope) = q.scope {
        if attrs.and_then(|a| a.scope) != Some(scope) {
            return false;
        }
    }
    if let Some(source) = q.source {
        if attrs.and_then(|a| a.source) != Some(source) {
            return false;
        }
    }
    if let Some(kind) = &q.kind {
        if attrs.and_then(|a| a.kind.as_deref()) != Some(kind.as_str()) {
            return false;
        }
    }
    if let Some(min) = q.confidence_min {
        if attrs.and_then(|a| a.confidence).map_or(true, |c| c < min) {
            return false;
        }
    }
    if let Some(max) = q.confidence_max {
        if attrs.and_then(|a| a.confidence).map_or(true, |c| c > max) {
            return false;
        }
    }
    if let Some(inferred) = q.inferred {
        if attrs.map(|a| a.inferred) != Some(inferred) {
            return false;
        }
    }
    if let Some(resolved) = q.resolved {
        if attrs.map(|a| a.resolved) != Some(resolved) {
            return false;
        }
    }
    if let Some(arity_min) = q.arity_min {
        if attrs.and_then(|a| a.arity).map_or(true, |a| a < arity_min) {
            return false;
        }
    }
    if let Some(arity_max) = q.arity_max {
        if attrs.and_then(|a| a.arity).map_or(true, |a| a > arity_max) {
            return false;
        }
    }
    if let Some(awaited) = q.awaited {
        if attrs.and_then(|a| a.awaited) != Some(awaited) {
            return false;
        }
    }
    if let Some(is_method) = q.is_method {
        if attrs.and_then(|a| a.is_method) != Some(is_method) {
            return false;
        }
    }
    if let Some(operator) = &q.operator {
        if attrs.and_then(|a| a.operator.as_deref()) != Some(operator.as_str()) {
            return false;
        }
    }
    if let Some(callee) = &q.callee {
        if attrs.and_then(|a| a.callee.as_deref()) != Some(callee.as_str()) {
            return false;
        }
    }
    if let Some(is_namespace) = q.is_namespace {
        if attrs.and_then(|a| a.is_namespace) != Some(is_namespace) {
            return false;
        }
    }

    if let Some(to_ref_kind) = &q.to_ref_kind {
        let tag = attrs.and_then(|a| a.to_ref.as_ref()).map(to_ref_kind_tag);
        if tag.as_deref() != Some(to_ref_kind.as_str()) {
            return false;
        }
    }
    if let Some(to_ref_file) = &q.to_ref_file {
        let file = attrs.and_then(|a| a.to_ref.as_ref()).and_then(|t| match t {
            Target::FileSymbol { file, .. } => Some(file.as_str()),
            _ => None,
        });
        if file != Some(to_ref_file.as_str()) {
            return false;
        }
    }
    if let Some(to_ref_symbol) = &q.to_ref_symbol {
        let symbol = attrs.and_then(|a| a.to_ref.as_ref()).and_then(|t| match t {
            Target::FileSymbol { symbol, .. } => Some(symbol.as_str()),
            _ => None,
        });
        if symbol != Some(to_ref_symbol.as_str()) {
            return false;
        }
    }
    if let Some(to_ref_name) = &q.to_ref_name {
        let name = attrs.and_then(|a| a.to_ref.as_ref()).and_then(|t| match t {
            Target::External { name } | Target::Placeholder { name, .. } => Some(name.as_str()),
            _ => None,
        });
        if name != Some(to_ref_name.as_str()) {
            return false;
        }
    }

    true
}

fn to_ref_kind_tag(target: &Target) -> &'static str {
    match target {
        Target::Entity { .. } => "entity",
        Target::FileSymbol { .. } => "fileSymbol",
        Target::External { .. } => "external",
        Target::Placeholder { .. } => "placeholder",
    }
}

fn structural_fields_match(q: &RelationshipQuery, rel: &Relationship) -> bool {
    let needs_structural = q.import_depth_min.is_some()
        || q.import_depth_max.is_some()
        || q.import_alias.is_some()
        || q.import_type.is_some()
        || q.resolution_state.is_some()
        || q.language.is_some()
        || q.symbol_kind.is_some()
        || q.module_path.is_some()
        || q.module_path_prefix.is_some()
        || q.first_seen_since.is_some()
        || q.last_seen_since.is_some();
    if !needs_structural {
        return true;
    }

    let fields = extract_structural_fields(rel);
    if let Some(min) = q.import_depth_min {
        if fields.import_depth.map_or(true, |d| d < min) {
            return false;
        }
    }
    if let Some(max) = q.import_depth_max {
        if fields.import_depth.map_or(true, |d| d > max) {
            return false;
        }
    }
    if let Some(alias) = &q.import_alias {
        if fields.import_alias.as_deref() != Some(alias.as_str()) {
            return false;
        }
    }
    if let Some(import_type) = &q.import_type {
        if fields.import_type.as_deref() != Some(import_type.as_str()) {
            return false;
        }
    }
    if let Some(state) = q.resolution_state {
        if fields.resolution_state != Some(state) {
            return false;
        }
    }
    if let Some(language) = &q.language {
        if fields.language.as_deref() != Some(language.to_ascii_lowercase().as_str()) {
            return false;
        }
    }
    if let Some(symbol_kind) = &q.symbol_kind {
        if fields.symbol_kind.as_deref() != Some(symbol_kind.to_ascii_lowercase().as_str()) {
            return false;
        }
    }
    if let Some(module_path) = &q.module_path {
        if fields.module_path.as_deref() != Some(module_path.as_str()) {
            return false;
        }
    }
    if let Some(prefix) = &q.module_path_prefix {
        if !fields.module_path.as_deref().map_or(false, |p| p.starts_with(prefix.as_str())) {
            return false;
        }
    }
    if let Some(since) = q.first_seen_since {
        if fields.first_seen_at < since {
            return false;
        }
    }
    if let Some(since) = q.last_seen_since {
        if fields.last_seen_at < since {
            return false;
        }
    }
    true
}

fn external_fields_match(q: &RelationshipQuery, rel: &Relationship) -> bool {
    if let Some(domain_path) = &q.domain_path {
        if metadata_str(rel, "domainPath").as_deref() != Some(domain_path.as_str()) {
            return false;
        }
    }
    if let Some(prefix) = &q.domain_path_prefix {
        if !metadata_str(rel, "domainPath").map_or(false, |p| p.starts_with(prefix.as_str())) {
            return false;
        }
    }
    if let Some(metric_id) = &q.metric_id {
        if metadata_str(rel, "metricId").as_deref() != Some(metric_id.as_str()) {
            return false;
        }
    }
    if let Some(environment) = &q.environment {
        if metadata_str(rel, "environment").as_deref() != Some(environment.as_str()) {
            return false;
        }
    }
    if let Some(severity) = &q.severity {
        if metadata_str(rel, "severity").as_deref() != Some(severity.as_str()) {
            return false;
        }
    }
    if let Some(trend) = &q.trend {
        if metadata_str(rel, "trend").as_deref() != Some(trend.as_str()) {
            return false;
        }
    }
    if let Some(since) = q.detected_since {
        if metadata_datetime(rel, "detectedAt").map_or(true, |dt| dt < since) {
            return false;
        }
    }
    if let Some(until) = q.detected_until {
        if metadata_datetime(rel, "detectedAt").map_or(true, |dt| dt >= until) {
            return false;
        }
    }
    if let Some(min) = q.sequence_number_min {
        if metadata_u64(rel, "sequenceNumber").map_or(true, |s| s < min) {
            return false;
        }
    }
    if let Some(max) = q.sequence_number_max {
        if metadata_u64(rel, "sequenceNumber").map_or(true, |s| s > max) {
            return false;
        }
    }
    if let Some(actor) = &q.actor {
        if metadata_str(rel, "actor").as_deref() != Some(actor.as_str()) {
            return false;
        }
    }
    if let Some(impact_severity) = &q.impact_severity {
        if metadata_str(rel, "impactSeverity").as_deref() != Some(impact_severity.as_str()) {
            return false;
        }
    }
    if let Some(state_transition_to) = &q.state_transition_to {
        if metadata_str(rel, "stateTransitionTo").as_deref() != Some(state_transition_to.as_str()) {
            return false;
        }
    }
    true
}

fn metadata_str(rel: &Relationship, key: &str) -> Option<String> {
    rel.metadata.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn metadata_u64(rel: &Relationship, key: &str) -> Option<u64> {
    rel.metadata.get(key).and_then(|v| v.as_u64())
}

fn metadata_datetime(rel: &Relationship, key: &str) -> Option<DateTime<Utc>> {
    rel.metadata
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_core::relationship::RelationshipType;
    use kg_core::{EntityKind, Location, SymbolKind, SymbolVisibility};
    use std::collections::BTreeMap;

    fn entity(id: &str, now: DateTime<Utc>) -> Entity {
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
            now,
        )
    }

    fn relationship(id: &str, from: &str, to: &str, r#type: RelationshipType, now: DateTime<Utc>) -> Relationship {
        Relationship {
            id: id.to_string(),
            from_entity_id: from.to_string(),
            to_entity_id: to.to_string(),
            r#type,
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
            valid_from: None,
            valid_to: None,
            last_seen_at: None,
            change_set_id: None,
        }
    }

    #[tokio::test]
    async fn bulk_query_upserts_entities_and_relationships() {
        let store = InMemoryGraphStore::default();
        let now = Utc::now();
        let result = store
            .bulk_query(
                vec![
                    BulkQuery::UpsertEntity(Box::new(entity("entity:a", now))),
                    BulkQuery::UpsertRelationship(Box::new(relationship(
                        "rel:1",
                        "entity:a",
                        "entity:b",
                        RelationshipType::Calls,
                        now,
                    ))),
                ],
                BulkOptions::default(),
                0,
            )
            .await
            .unwrap();
        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(store.entity_count(), 1);
        assert_eq!(store.relationship_count(), 1);
    }

    #[tokio::test]
    async fn re_upserting_same_id_replaces_the_edge() {
        let store = InMemoryGraphStore::default();
        let now = Utc::now();
        store
            .bulk_query(
                vec![BulkQuery::UpsertRelationship(Box::new(relationship(
                    "rel:1",
                    "entity:a",
                    "entity:b",
                    RelationshipType::Calls,
                    now,
                )))],
                BulkOptions::default(),
                0,
            )
            .await
            .unwrap();
        let mut updated = relationship("rel:1", "entity:a", "entity:b", RelationshipType::Calls, now);
        updated.version = 2;
        store
            .bulk_query(
                vec![BulkQuery::UpsertRelationship(Box::new(updated))],
                BulkOptions::default(),
                0,
            )
            .await
            .unwrap();
        assert_eq!(store.relationship_count(), 1);
        let found = store
            .query_relationships(&RelationshipQuery::default())
            .await
            .unwrap();
        assert_eq!(found[0].version, 2);
    }

    #[tokio::test]
    async fn query_relationships_filters_by_from_and_type() {
        let store = InMemoryGraphStore::default();
        let now = Utc::now();
        store
            .bulk_query(
                vec![
                    BulkQuery::UpsertRelationship(Box::new(relationship(
                        "rel:1",
                        "entity:a",
                        "entity:b",
                        RelationshipType::Calls,
                        now,
                    ))),
                    BulkQuery::UpsertRelationship(Box::new(relationship(
                        "rel:2",
                        "entity:a",
                        "entity:c",
                        RelationshipType::Reads,
                        now,
                    ))),
                ],
                BulkOptions::default(),
                0,
            )
            .await
            .unwrap();

        let query = RelationshipQuery {
            from_entity_id: Some("entity:a".into()),
            r#type: Some(kg_core::query::TypeFilter::One(RelationshipType::Calls)),
            ..Default::default()
        };
        let found = store.query_relationships(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "rel:1");
    }

    #[tokio::test]
    async fn traverse_respects_max_hops_and_direction() {
        let store = InMemoryGraphStore::default();
        let now = Utc::now();
        store
            .bulk_query(
                vec![
                    BulkQuery::UpsertRelationship(Box::new(relationship(
                        "rel:1",
                        "entity:a",
                        "entity:b",
                        RelationshipType::Calls,
                        now,
                    ))),
                    BulkQuery::UpsertRelationship(Box::new(relationship(
                        "rel:2",
                        "entity:b",
                        "entity:c",
                        RelationshipType::Calls,
                        now,
                    ))),
                ],
                BulkOptions::default(),
                0,
            )
            .await
            .unwrap();

        let result = store
            .traverse(&TraversalQuery {
                seed_entity_ids: vec!["entity:a".into()],
                relationship_types: None,
                max_hops: 1,
                direction: PathDirection::Outgoing,
                as_of: None,
            })
            .await
            .unwrap();
        assert_eq!(result.by_hop.len(), 2);
        assert_eq!(result.by_hop[1], vec!["entity:b".to_string()]);
    }

    #[tokio::test]
    async fn vector_round_trip_search_upsert_scroll_delete() {
        let store = InMemoryGraphStore::default();
        let mut embedding = vec![0.0_f32; crate::vector::VECTOR_DIMENSIONS];
        embedding[0] = 1.0;
        let record = VectorRecord::new("entity:a", embedding.clone()).unwrap();
        store
            .upsert_vector(VectorCollection::Code, record)
            .await
            .unwrap();

        let hits = store
            .search_vector(VectorCollection::Code, &embedding, 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity_id, "entity:a");
        assert!(hits[0].score > 0.99);

        let scrolled = store.scroll_vectors(VectorCollection::Code, 0, 10).await.unwrap();
        assert_eq!(scrolled.len(), 1);

        store
            .delete_vector(VectorCollection::Code, "entity:a")
            .await
            .unwrap();
        let scrolled = store.scroll_vectors(VectorCollection::Code, 0, 10).await.unwrap();
        assert!(scrolled.is_empty());
    }
}
