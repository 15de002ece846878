//! Relationship model and closed type sets (spec §3.2).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed relationship type set (spec §3.2), grouped as in the source
/// document. Serializes in `SCREAMING_SNAKE_CASE` to match the wire names
/// used throughout the contracts in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    // structural
    /// Parent contains child (directory/file/module containment).
    Contains,
    /// Scope defines a declared symbol.
    Defines,
    /// Module exports a symbol.
    Exports,
    /// Module imports a symbol or namespace.
    Imports,
    // code
    /// Function/method invocation.
    Calls,
    /// Generic identifier/property reference.
    References,
    /// Class implements an interface.
    Implements,
    /// Class extends a base class.
    Extends,
    /// Inferred or explicit dependency edge.
    DependsOn,
    /// Method overrides a base-class method.
    Overrides,
    /// Identifier or property is read.
    Reads,
    /// Identifier or property is written.
    Writes,
    /// An exception type is thrown.
    Throws,
    /// A type annotation references another type.
    TypeUses,
    /// A function's declared/inferred return type.
    ReturnsType,
    /// A function parameter's declared/inferred type.
    ParamType,
    // test
    /// Test exercises a symbol.
    Tests,
    /// Test validates a specification.
    Validates,
    // spec
    /// Code requires a specification clause.
    Requires,
    /// A change impacts a specification clause.
    Impacts,
    /// Code implements a specification clause.
    ImplementsSpec,
    // temporal
    /// Version chain link to the immediately-prior version.
    PreviousVersion,
    /// Entity was modified by a change.
    ModifiedBy,
    /// Entity was created within a session.
    CreatedIn,
    /// Entity was modified within a session.
    ModifiedIn,
    /// Entity was removed within a session.
    RemovedIn,
    /// Version belongs to an entity.
    Of,
    // documentation
    /// Documentation node describes a business domain.
    DescribesDomain,
    /// Entity belongs to a business domain.
    BelongsToDomain,
    /// Entity is documented by a documentation node.
    DocumentedBy,
    /// Entity is a member of a semantic cluster.
    ClusterMember,
    /// Entity is related to a business domain.
    DomainRelated,
    /// Entity is governed by a specification/policy.
    GovernedBy,
    /// Documentation node documents a section of a spec.
    DocumentsSection,
    // security
    /// Entity has an associated security issue.
    HasSecurityIssue,
    /// Entity depends on a vulnerable dependency.
    DependsOnVulnerable,
    /// A security issue impacts another entity.
    SecurityImpacts,
    // performance
    /// A change has a performance impact on an entity.
    PerformanceImpact,
    /// A change caused a performance regression.
    PerformanceRegression,
    /// A test provides coverage for an entity.
    CoverageProvides,
    // session
    /// Session modified an entity.
    SessionModified,
    /// Session impacted an entity.
    SessionImpacted,
    /// Session is linked to a checkpoint.
    SessionCheckpoint,
    /// A change broke in this session.
    BrokeIn,
    /// A change was fixed in this session.
    FixedIn,
    /// A change depends on another change.
    DependsOnChange,
    // checkpoint
    /// Checkpoint includes an entity in its materialized set.
    CheckpointIncludes,
}

impl RelationshipType {
    /// Returns `true` for the structural group (`CONTAINS`, `DEFINES`,
    /// `EXPORTS`, `IMPORTS`) handled by the structural normalizer (C2).
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Contains | Self::Defines | Self::Exports | Self::Imports
        )
    }

    /// Returns `true` for the code group that carries [`CodeAttributes`].
    #[must_use]
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            Self::Calls
                | Self::References
                | Self::Implements
                | Self::Extends
                | Self::DependsOn
                | Self::Overrides
                | Self::Reads
                | Self::Writes
                | Self::Throws
                | Self::TypeUses
                | Self::ReturnsType
                | Self::ParamType
        )
    }
}

/// Closed structural import-kind set (spec §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    /// `import x from "mod"`.
    Default,
    /// `import { x } from "mod"`.
    Named,
    /// `import * as x from "mod"`.
    Namespace,
    /// Wildcard import (`*`, `all`).
    Wildcard,
    /// Import for side effects only, no bindings.
    SideEffect,
}

/// How well a structural edge's target is known (spec §3.2/§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    /// Target resolved to a concrete entity or file symbol.
    Resolved,
    /// Target could not be resolved to anything concrete.
    Unresolved,
    /// Target was partially resolved (e.g. re-export depth bound reached).
    Partial,
}

/// Source of a code-relationship observation (spec §3.2 `source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeSource {
    /// Derived directly from AST structure.
    Ast,
    /// Derived via a type-checker call.
    TypeChecker,
    /// Derived via name-based heuristics.
    Heuristic,
    /// Derived from the symbol/name index.
    Index,
    /// Observed at runtime (external collaborator).
    Runtime,
    /// Reported by a language server.
    Lsp,
}

/// How a code-relationship target was resolved (spec §3.2 `resolution`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    /// Resolved directly within the same file/scope.
    Direct,
    /// Resolved by following an import map entry.
    ViaImport,
    /// Resolved using type-checker information.
    TypeChecker,
    /// Resolved via name-based heuristics.
    Heuristic,
}

/// Lexical scope of a code-relationship target (spec §3.2 `scope`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EdgeScope {
    /// Declared in the same file.
    Local,
    /// Declared in an imported module.
    Imported,
    /// Declared outside the repository (a dependency or the standard library).
    External,
    /// Scope could not be determined.
    Unknown,
}

/// A tagged reference to a relationship endpoint (spec §9 `Target`).
///
/// Edges may target a not-yet-materialized entity; promotion from
/// [`Target::Placeholder`]/[`Target::External`] to [`Target::Entity`] is a
/// read-through against the symbol/name index, performed at emission time
/// and again at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Target {
    /// A concrete, already-materialized entity.
    Entity {
        /// The entity id.
        id: String,
    },
    /// A symbol known to live in a specific file, not yet promoted to an
    /// entity id (e.g. a late-parsed file).
    FileSymbol {
        /// Repo-relative file path.
        file: String,
        /// Symbol name within that file.
        symbol: String,
    },
    /// A target outside the repository (external dependency, stdlib, etc.).
    External {
        /// The external name as referenced.
        name: String,
    },
    /// A synthetic, unresolved placeholder (`class:`, `interface:`,
    /// `import:`, etc.).
    Placeholder {
        /// The placeholder's kind tag (e.g. `"class"`, `"import"`).
        placeholder_kind: String,
        /// The unresolved name.
        name: String,
    },
}

impl Target {
    /// Render this target as the synthetic id string used for hashing and
    /// for placeholder lookups (`file:<rel>:<name>`, `import:<mod>:<name>`,
    /// `external:<name>`, `<kind>:<name>`, or the bare entity id).
    #[must_use]
    pub fn synthetic_id(&self) -> String {
        match self {
            Self::Entity { id } => id.clone(),
            Self::FileSymbol { file, symbol } => format!("file:{file}:{symbol}"),
            Self::External { name } => format!("external:{name}"),
            Self::Placeholder {
                placeholder_kind,
                name,
            } => format!("{placeholder_kind}:{name}"),
        }
    }

    /// Returns `true` if this target counts as resolved for the purposes of
    /// invariant 5 (`resolutionState=resolved ⇒ toRef.kind ∈
    /// {entity, fileSymbol}`).
    #[must_use]
    pub fn is_resolved_kind(&self) -> bool {
        matches!(self, Self::Entity { .. } | Self::FileSymbol { .. })
    }
}

/// The subset of attributes carried on code-group relationships (spec §3.2).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CodeAttributes {
    /// Operation kind (call, identifier, instantiation, ...).
    pub kind: Option<String>,
    /// Observation source.
    pub source: Option<EdgeSource>,
    /// Resolution method used.
    pub resolution: Option<ResolutionMethod>,
    /// Lexical scope of the target.
    pub scope: Option<EdgeScope>,
    /// Confidence in `[0, 1]`, required for inferred edges.
    pub confidence: Option<f64>,
    /// Whether this edge's target was not resolved at emit time.
    pub inferred: bool,
    /// Whether this edge's target is fully resolved.
    pub resolved: bool,
    /// Whether this edge is currently active (`validTo` is null).
    pub active: bool,
    /// Occurrences observed within one scan.
    pub occurrences_scan: u32,
    /// Occurrences observed across all scans.
    pub occurrences_total: u32,
    /// Occurrences observed within a recent window.
    pub occurrences_recent: u32,
    /// Dotted access path (e.g. `"a.b.c"`).
    pub access_path: Option<String>,
    /// Callee's simple name.
    pub callee: Option<String>,
    /// Assignment/compound-assignment operator, if applicable.
    pub operator: Option<String>,
    /// Call argument count.
    pub arity: Option<u32>,
    /// Whether a call expression is awaited.
    pub awaited: Option<bool>,
    /// Whether the call is a method call (property-access form).
    pub is_method: Option<bool>,
    /// Receiver's static type, from the type checker.
    pub receiver_type: Option<String>,
    /// Whether the receiver type implies dynamic dispatch.
    pub dynamic_dispatch: Option<bool>,
    /// Import kind for IMPORTS edges.
    pub import_type: Option<ImportKind>,
    /// Re-export traversal depth.
    pub import_depth: Option<u32>,
    /// Import alias, if any.
    pub import_alias: Option<String>,
    /// Whether the import is a namespace import.
    pub is_namespace: Option<bool>,
    /// Whether the import is a re-export.
    pub is_re_export: Option<bool>,
    /// Re-export target module, if `is_re_export`.
    pub re_export_target: Option<String>,
    /// Lower-cased language tag.
    pub language: Option<String>,
    /// Lower-cased symbol-kind tag.
    pub symbol_kind: Option<String>,
    /// Normalized module path.
    pub module_path: Option<String>,
    /// Resolution state for structural edges.
    pub resolution_state: Option<ResolutionState>,
    /// Data-flow correlation id shared by reads/writes of one binding.
    pub data_flow_id: Option<String>,
    /// Whether resolution was ambiguous (multiple name-index hits).
    pub ambiguous: Option<bool>,
    /// Number of ambiguous candidates, when `ambiguous`.
    pub candidate_count: Option<u32>,
    /// The resolved or unresolved source endpoint.
    pub from_ref: Option<Target>,
    /// The resolved or unresolved destination endpoint.
    pub to_ref: Option<Target>,
}

/// A single code-relationship observation site (spec §3.2 `sites`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Site {
    /// Repo-relative file path.
    pub path: String,
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
    /// Optional dotted access path at this site.
    pub access_path: Option<String>,
}

/// A relationship edge (spec §3.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Relationship {
    /// Canonical, deterministic id.
    pub id: String,
    /// Source entity id.
    pub from_entity_id: String,
    /// Destination entity id (may be a synthetic placeholder id).
    pub to_entity_id: String,
    /// Relationship type, from the closed set.
    pub r#type: RelationshipType,
    /// First-observed timestamp.
    pub created: DateTime<Utc>,
    /// Last-modified timestamp.
    pub last_modified: DateTime<Utc>,
    /// Monotonically increasing version counter for this edge.
    pub version: u64,
    /// Open attribute map for non-code relationship groups.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Deterministic hash identifying the observation site, when
    /// applicable (spec §9 OQ-b).
    pub site_id: Option<String>,
    /// The hash itself; see [`crate::ids::site_hash`].
    pub site_hash: Option<String>,
    /// Free-text or structured evidence supporting this edge.
    #[serde(default)]
    pub evidence: Vec<String>,
    /// All observation sites aggregated into this edge.
    #[serde(default)]
    pub locations: Vec<Site>,
    #[serde(default)]
    /// Aggregated raw sites (duplicate of `locations` kept for API parity
    /// with the external contract's `sites` field).
    pub sites: Vec<Site>,
    /// Code-group attributes, present when `type.is_code()` (or for
    /// inferred structural edges that also carry confidence).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<CodeAttributes>,
    /// Edge becomes valid at this instant.
    pub valid_from: Option<DateTime<Utc>>,
    /// Edge becomes invalid at this instant; `None` means still active.
    pub valid_to: Option<DateTime<Utc>>,
    /// Last time this edge was re-observed in a scan.
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Change-set (session) id that opened this edge, if any.
    pub change_set_id: Option<String>,
}

impl Relationship {
    /// Returns `true` if this edge is currently active (`valid_to` is null).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Returns the triple key `(from, to, type)` used by invariant 3
    /// (at-most-one-active-edge).
    #[must_use]
    pub fn triple_key(&self) -> (String, String, RelationshipType) {
        (
            self.from_entity_id.clone(),
            self.to_entity_id.clone(),
            self.r#type,
        )
    }
}
