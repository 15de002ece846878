//! Typed query surface (spec §6.2), concretized per SPEC_FULL.md S3.

use crate::entity::Entity;
use crate::relationship::{EdgeScope, EdgeSource, ResolutionMethod, ResolutionState, RelationshipType};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One or many relationship types, as accepted by [`RelationshipQuery::type_`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TypeFilter {
    /// Match a single relationship type.
    One(RelationshipType),
    /// Match any of the given relationship types.
    Many(Vec<RelationshipType>),
}

impl TypeFilter {
    /// Returns `true` if `t` satisfies this filter.
    #[must_use]
    pub fn matches(&self, t: RelationshipType) -> bool {
        match self {
            Self::One(only) => *only == t,
            Self::Many(set) => set.contains(&t),
        }
    }
}

/// Filter surface for relationship queries (spec §6.2).
///
/// Every field is optional; an absent field imposes no constraint. This
/// mirrors the facade's single entry point for C6-C10 query access.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipQuery {
    /// Restrict to edges from this entity id.
    pub from_entity_id: Option<String>,
    /// Restrict to edges to this entity id.
    pub to_entity_id: Option<String>,
    /// Restrict to one or more relationship types.
    pub r#type: Option<TypeFilter>,
    /// Restrict by the kind of either endpoint entity.
    pub entity_types: Option<Vec<String>>,
    /// Only edges created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only edges created strictly before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Result offset, for pagination.
    pub offset: Option<u32>,
    /// Restrict to edges with this resolution method.
    pub resolution: Option<ResolutionMethod>,
    /// Restrict to edges with this scope.
    pub scope: Option<EdgeScope>,
    /// Restrict to edges with this observation source.
    pub source: Option<EdgeSource>,
    /// Restrict to edges with this `kind` attribute.
    pub kind: Option<String>,
    /// Minimum confidence, inclusive.
    pub confidence_min: Option<f64>,
    /// Maximum confidence, inclusive.
    pub confidence_max: Option<f64>,
    /// Restrict to inferred (`true`) or resolved-at-emit (`false`) edges.
    pub inferred: Option<bool>,
    /// Restrict to fully resolved edges.
    pub resolved: Option<bool>,
    /// Restrict to currently-active edges (`valid_to` is null).
    pub active: Option<bool>,
    /// Only edges first seen at or after this instant.
    pub first_seen_since: Option<DateTime<Utc>>,
    /// Only edges last seen at or after this instant.
    pub last_seen_since: Option<DateTime<Utc>>,
    /// Restrict by the `to_ref` tagged-kind discriminant (`"entity"`,
    /// `"fileSymbol"`, `"external"`, `"placeholder"`).
    pub to_ref_kind: Option<String>,
    /// Restrict by `to_ref.file`, for `fileSymbol` targets.
    pub to_ref_file: Option<String>,
    /// Restrict by `to_ref.symbol`, for `fileSymbol` targets.
    pub to_ref_symbol: Option<String>,
    /// Restrict by `to_ref` name, for `external`/`placeholder` targets.
    pub to_ref_name: Option<String>,
    /// Restrict by observation-site hash.
    pub site_hash: Option<String>,
    /// Minimum call arity, inclusive.
    pub arity_min: Option<u32>,
    /// Maximum call arity, inclusive.
    pub arity_max: Option<u32>,
    /// Restrict to awaited (or non-awaited) call sites.
    pub awaited: Option<bool>,
    /// Restrict to method-call-form (or not) sites.
    pub is_method: Option<bool>,
    /// Restrict by assignment/compound-assignment operator.
    pub operator: Option<String>,
    /// Restrict by callee simple name.
    pub callee: Option<String>,
    /// Minimum import depth, inclusive.
    pub import_depth_min: Option<u32>,
    /// Maximum import depth, inclusive.
    pub import_depth_max: Option<u32>,
    /// Restrict by import alias.
    pub import_alias: Option<String>,
    /// Restrict by import kind (serialized form, e.g. `"named"`).
    pub import_type: Option<String>,
    /// Restrict to namespace imports.
    pub is_namespace: Option<bool>,
    /// Restrict by structural resolution state.
    pub resolution_state: Option<ResolutionState>,
    /// Restrict by lower-cased language tag.
    pub language: Option<String>,
    /// Restrict by lower-cased symbol-kind tag.
    pub symbol_kind: Option<String>,
    /// Restrict by exact normalized module path.
    pub module_path: Option<String>,
    /// Restrict by normalized module path prefix.
    pub module_path_prefix: Option<String>,
    /// Restrict by exact business-domain path (external collaborator field).
    pub domain_path: Option<String>,
    /// Restrict by business-domain path prefix.
    pub domain_path_prefix: Option<String>,
    /// Restrict by performance-metric id (external collaborator field).
    pub metric_id: Option<String>,
    /// Restrict by recorded environment.
    pub environment: Option<String>,
    /// Restrict by severity (external collaborator field).
    pub severity: Option<String>,
    /// Restrict by trend (external collaborator field).
    pub trend: Option<String>,
    /// Restrict to detections at or after this instant.
    pub detected_since: Option<DateTime<Utc>>,
    /// Restrict to detections strictly before this instant.
    pub detected_until: Option<DateTime<Utc>>,
    /// Restrict by session id (external collaborator field).
    pub session_id: Option<String>,
    /// Minimum session sequence number, inclusive.
    pub sequence_number_min: Option<u64>,
    /// Maximum session sequence number, inclusive.
    pub sequence_number_max: Option<u64>,
    /// Restrict by session actor identifier.
    pub actor: Option<String>,
    /// Restrict by session impact severity.
    pub impact_severity: Option<String>,
    /// Restrict by session state-transition target.
    pub state_transition_to: Option<String>,
}

/// Traversal direction for [`PathQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PathDirection {
    /// Follow edges in their natural `from -> to` direction.
    Outgoing,
    /// Follow edges in reverse, `to -> from`.
    Incoming,
    /// Follow edges in either direction.
    Both,
}

/// A shortest/bounded path query between two entities (spec §6.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PathQuery {
    /// Starting entity id.
    pub start_entity_id: String,
    /// Target entity id; when absent, any reachable endpoint qualifies.
    pub end_entity_id: Option<String>,
    /// Restrict traversal to these relationship types.
    pub relationship_types: Option<Vec<RelationshipType>>,
    /// Maximum number of edges to traverse.
    pub max_depth: Option<u32>,
    /// Traversal direction.
    pub direction: PathDirection,
}

/// Result of a [`PathQuery`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PathResult {
    /// Ordered entity ids forming the path, start to end inclusive.
    pub path: Vec<String>,
    /// Number of edges traversed.
    pub total_length: u32,
    /// Relationship types traversed, in order.
    pub relationship_types: Vec<RelationshipType>,
    /// Entities along the path, in order.
    pub entities: Vec<Entity>,
}

/// A bounded-depth traversal from one or more seed entities (spec §6.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TraversalQuery {
    /// Entities to start the traversal from.
    pub seed_entity_ids: Vec<String>,
    /// Restrict traversal to these relationship types; `None` means all
    /// code and structural types.
    pub relationship_types: Option<Vec<RelationshipType>>,
    /// Maximum number of edges to traverse from any seed.
    pub max_hops: u32,
    /// Traversal direction.
    pub direction: PathDirection,
    /// Optional time-travel instant; when set, only edges valid at `t` are
    /// followed (`validFrom <= t < validTo`, spec §4.6).
    pub as_of: Option<DateTime<Utc>>,
}

/// Result of a [`TraversalQuery`]: the reached entity ids, grouped by hop
/// distance from the nearest seed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TraversalResult {
    /// Entity ids reached at each hop distance, indexed by hop count (index
    /// 0 is the seed set itself).
    pub by_hop: Vec<Vec<String>>,
}

impl TraversalResult {
    /// Flatten all reached entity ids across every hop, including seeds.
    #[must_use]
    pub fn all_reached(&self) -> Vec<String> {
        self.by_hop.iter().flatten().cloned().collect()
    }
}

/// A dependency/impact-analysis query (spec §6.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImpactQuery {
    /// The entity whose impact surface is being analyzed.
    pub entity_id: String,
    /// Maximum number of edges to traverse for the cascading set.
    pub max_depth: Option<u32>,
    /// Restrict to these relationship types; `None` means all code and
    /// dependency-bearing types.
    pub relationship_types: Option<Vec<RelationshipType>>,
}

/// Result of an [`ImpactQuery`]: entities split by direct vs. cascading
/// reachability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImpactResult {
    /// Entity ids with a direct (one-hop) incoming edge from `entity_id`.
    pub direct: Vec<String>,
    /// Entity ids reachable only through an intermediate entity.
    pub cascading: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_filter_matches_one_and_many() {
        let one = TypeFilter::One(RelationshipType::Calls);
        assert!(one.matches(RelationshipType::Calls));
        assert!(!one.matches(RelationshipType::Reads));

        let many = TypeFilter::Many(vec![RelationshipType::Calls, RelationshipType::Reads]);
        assert!(many.matches(RelationshipType::Reads));
        assert!(!many.matches(RelationshipType::Writes));
    }

    #[test]
    fn traversal_result_flattens_by_hop() {
        let r = TraversalResult {
            by_hop: vec![vec!["a".into()], vec!["b".into(), "c".into()]],
        };
        assert_eq!(r.all_reached(), vec!["a", "b", "c"]);
    }

    #[test]
    fn relationship_query_defaults_are_unconstrained() {
        let q = RelationshipQuery::default();
        assert!(q.from_entity_id.is_none());
        assert!(q.r#type.is_none());
        assert!(q.confidence_min.is_none());
    }
}
