//! Tagged-variant entity model (spec §3.1).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source location within a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    /// 1-based line number.
    pub line: u32,
    /// 0-based column offset.
    pub column: u32,
    /// Byte offset of the span start, if known.
    pub start: Option<u32>,
    /// Byte offset of the span end, if known.
    pub end: Option<u32>,
}

/// Declared visibility of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SymbolVisibility {
    /// Visible outside its declaring module.
    Public,
    /// Visible only within its declaring scope.
    Private,
    /// Visible to subclasses / the defining module family.
    Protected,
}

/// Closed set of symbol kinds (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    /// Free function or top-level function.
    Function,
    /// Class declaration.
    Class,
    /// Interface declaration.
    Interface,
    /// Type alias declaration.
    TypeAlias,
    /// Variable binding.
    Variable,
    /// Class or interface property.
    Property,
    /// Class or interface method.
    Method,
    /// Symbol kind could not be determined.
    Unknown,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Declared or inferred type name, if known.
    pub r#type: Option<String>,
    /// Textual default value, if any.
    pub default_value: Option<String>,
    /// Whether the parameter is optional.
    pub optional: bool,
}

/// Test coverage counters attached to a [`EntityKind::Test`] entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestCoverage {
    /// Fraction of lines covered, in `[0, 1]`.
    pub lines: f64,
    /// Fraction of branches covered, in `[0, 1]`.
    pub branches: f64,
    /// Fraction of functions covered, in `[0, 1]`.
    pub functions: f64,
    /// Fraction of statements covered, in `[0, 1]`.
    pub statements: f64,
}

/// Closed reason set for [`EntityKind::Checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    /// Scheduled daily checkpoint.
    Daily,
    /// Triggered by an incident/rollback need.
    Incident,
    /// Manually requested.
    Manual,
}

/// Closed status set for [`EntityKind::Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The session is still running.
    Active,
    /// The session finished successfully.
    Completed,
    /// The session terminated with an error.
    Failed,
}

/// The tagged-variant entity body (spec §3.1). Fields shared by every
/// variant (`id`, `path`, `hash`, `language`, timestamps, `metadata`) live on
/// the enclosing [`Entity`] struct; this enum carries only variant-specific
/// attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntityKind {
    /// A source file.
    File {
        /// File extension, without the leading dot.
        extension: String,
        /// Size in bytes.
        size: u64,
        /// Line count.
        lines: u32,
        /// Whether this file is test code.
        is_test: bool,
        /// Whether this file is configuration.
        is_config: bool,
        /// Repo-relative paths this file depends on.
        dependencies: Vec<String>,
    },
    /// A filesystem directory.
    Directory {
        /// Entity ids of immediate children.
        children: Vec<String>,
        /// Depth from the repository root.
        depth: u32,
    },
    /// A logical module / package.
    Module {
        /// Module name.
        name: String,
        /// Declared version string, if any.
        version: Option<String>,
        /// Manifest file path (package.json, Cargo.toml, etc.), if any.
        package_manifest: Option<String>,
        /// Entry point file, if any.
        entry_point: Option<String>,
    },
    /// A function or free-standing function-like symbol.
    FunctionSymbol {
        /// Symbol name.
        name: String,
        /// Rendered signature.
        signature: Option<String>,
        /// Doc comment text, if any.
        docstring: Option<String>,
        /// Declared visibility.
        visibility: SymbolVisibility,
        /// Whether this symbol is exported from its module.
        is_exported: bool,
        /// Whether this symbol is marked deprecated.
        is_deprecated: bool,
        /// Declaration location.
        location: Location,
        /// Declared parameters.
        parameters: Vec<Parameter>,
        /// Declared or inferred return type.
        return_type: Option<String>,
        /// Whether the function is `async`.
        is_async: bool,
        /// Whether the function is a generator.
        is_generator: bool,
        /// Cyclomatic complexity, if computed.
        complexity: Option<u32>,
        /// Names called from within this function's body, as a hint for
        /// builders before precise edges exist.
        calls: Vec<String>,
    },
    /// A class declaration.
    ClassSymbol {
        /// Symbol name.
        name: String,
        /// Rendered signature.
        signature: Option<String>,
        /// Doc comment text, if any.
        docstring: Option<String>,
        /// Declared visibility.
        visibility: SymbolVisibility,
        /// Whether this symbol is exported from its module.
        is_exported: bool,
        /// Whether this symbol is marked deprecated.
        is_deprecated: bool,
        /// Declaration location.
        location: Location,
        /// Base class names (`extends` clause).
        extends: Vec<String>,
        /// Implemented interface names.
        implements: Vec<String>,
        /// Method symbol ids.
        methods: Vec<String>,
        /// Property symbol ids.
        properties: Vec<String>,
        /// Whether the class is abstract.
        is_abstract: bool,
    },
    /// An interface declaration.
    InterfaceSymbol {
        /// Symbol name.
        name: String,
        /// Rendered signature.
        signature: Option<String>,
        /// Doc comment text, if any.
        docstring: Option<String>,
        /// Declared visibility.
        visibility: SymbolVisibility,
        /// Whether this symbol is exported from its module.
        is_exported: bool,
        /// Whether this symbol is marked deprecated.
        is_deprecated: bool,
        /// Declaration location.
        location: Location,
        /// Extended interface names.
        extends: Vec<String>,
        /// Method signatures declared by the interface.
        methods: Vec<String>,
        /// Property names declared by the interface.
        properties: Vec<String>,
    },
    /// A type-alias declaration.
    TypeAliasSymbol {
        /// Symbol name.
        name: String,
        /// Rendered signature.
        signature: Option<String>,
        /// Doc comment text, if any.
        docstring: Option<String>,
        /// Declared visibility.
        visibility: SymbolVisibility,
        /// Whether this symbol is exported from its module.
        is_exported: bool,
        /// Whether this symbol is marked deprecated.
        is_deprecated: bool,
        /// Declaration location.
        location: Location,
        /// The aliased type's textual form.
        aliased_type: String,
        /// Whether the aliased type is a union.
        is_union: bool,
        /// Whether the aliased type is an intersection.
        is_intersection: bool,
    },
    /// A generic symbol whose precise kind could not be narrowed further
    /// (variable, property, method, or unknown — see [`SymbolKind`]).
    PlainSymbol {
        /// Symbol name.
        name: String,
        /// Narrowed kind.
        symbol_kind: SymbolKind,
        /// Rendered signature.
        signature: Option<String>,
        /// Doc comment text, if any.
        docstring: Option<String>,
        /// Declared visibility.
        visibility: SymbolVisibility,
        /// Whether this symbol is exported from its module.
        is_exported: bool,
        /// Whether this symbol is marked deprecated.
        is_deprecated: bool,
        /// Declaration location.
        location: Location,
    },
    /// A test case.
    Test {
        /// Test framework's notion of test type (unit, integration, e2e, ...).
        test_type: String,
        /// Entity id of the symbol under test, if known.
        target_symbol: Option<String>,
        /// Test framework name.
        framework: String,
        /// Coverage produced by this test, if measured.
        coverage: Option<TestCoverage>,
        /// Last known pass/fail/skip status.
        status: String,
        /// Flakiness score in `[0, 1]`.
        flaky_score: f64,
        /// Execution history entity ids (most recent last).
        execution_history: Vec<String>,
    },
    /// A versioned snapshot of another entity (spec §3.1 `Version`).
    Version {
        /// Id of the entity this version belongs to.
        entity_id: String,
        /// Content hash at this version.
        hash: String,
        /// Repo-relative path at this version, if applicable.
        path: Option<String>,
        /// Language at this version, if applicable.
        language: Option<String>,
    },
    /// A materialized checkpoint over a seed set (spec §3.1 `Checkpoint`).
    Checkpoint {
        /// Human-assigned checkpoint identifier (distinct from `Entity::id`).
        checkpoint_id: String,
        /// Why the checkpoint was created.
        reason: CheckpointReason,
        /// Hop bound used during traversal.
        hops: u32,
        /// Seed entity ids the traversal started from.
        seed_entities: Vec<String>,
    },
    /// A bounded unit of agent activity (spec §3.1 `Session`).
    Session {
        /// Wall-clock start time.
        start_time: chrono::DateTime<chrono::Utc>,
        /// Wall-clock end time, if the session has ended.
        end_time: Option<chrono::DateTime<chrono::Utc>>,
        /// Identifier of the agent implementation that ran the session.
        agent_type: String,
        /// Current lifecycle status.
        status: SessionStatus,
        /// Entity ids of changes produced during the session.
        changes: Vec<String>,
        /// Entity ids of specs touched during the session.
        specs: Vec<String>,
    },
    /// An entity kind owned by an external collaborator (specification,
    /// documentation node, security issue, vulnerability, business domain,
    /// semantic cluster — spec §3.1) and passed through opaquely.
    External {
        /// The external system's type tag for this entity.
        external_type: String,
        /// Opaque attributes as reported by the external collaborator.
        attributes: BTreeMap<String, serde_json::Value>,
    },
}

impl EntityKind {
    /// Returns `true` if this variant represents some flavor of [`Symbol`].
    ///
    /// [`Symbol`]: EntityKind
    #[must_use]
    pub fn is_symbol(&self) -> bool {
        matches!(
            self,
            Self::FunctionSymbol { .. }
                | Self::ClassSymbol { .. }
                | Self::InterfaceSymbol { .. }
                | Self::TypeAliasSymbol { .. }
                | Self::PlainSymbol { .. }
        )
    }

    /// Returns the symbol's declared name, if this is any symbol variant.
    #[must_use]
    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            Self::FunctionSymbol { name, .. }
            | Self::ClassSymbol { name, .. }
            | Self::InterfaceSymbol { name, .. }
            | Self::TypeAliasSymbol { name, .. }
            | Self::PlainSymbol { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns whether the symbol is exported, for symbol variants.
    #[must_use]
    pub fn is_exported(&self) -> bool {
        match self {
            Self::FunctionSymbol { is_exported, .. }
            | Self::ClassSymbol { is_exported, .. }
            | Self::InterfaceSymbol { is_exported, .. }
            | Self::TypeAliasSymbol { is_exported, .. }
            | Self::PlainSymbol { is_exported, .. } => *is_exported,
            _ => false,
        }
    }
}

/// A fully-addressed entity: the fields shared by every variant (spec §3.1)
/// plus its tagged [`EntityKind`] body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    /// Opaque, stable entity id.
    pub id: String,
    /// Repository-relative path, when meaningful for this kind.
    pub path: Option<String>,
    /// Content fingerprint.
    pub hash: String,
    /// Source language, when meaningful for this kind.
    pub language: Option<String>,
    /// First-observed timestamp.
    pub created: chrono::DateTime<chrono::Utc>,
    /// Last-modified timestamp.
    pub last_modified: chrono::DateTime<chrono::Utc>,
    /// Open attribute map for fields not promoted to typed columns.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// The tagged variant body.
    pub kind: EntityKind,
}

impl Entity {
    /// Construct a new entity with empty metadata and `created ==
    /// last_modified == now`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        hash: impl Into<String>,
        kind: EntityKind,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            path: None,
            hash: hash.into(),
            language: None,
            created: now,
            last_modified: now,
            metadata: BTreeMap::new(),
            kind,
        }
    }

    /// Builder-style setter for `path`.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Builder-style setter for `language`.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn is_symbol_distinguishes_variants() {
        let now = Utc::now();
        let f = Entity::new(
            "sym:1",
            "h",
            EntityKind::FunctionSymbol {
                name: "foo".into(),
                signature: None,
                docstring: None,
                visibility: SymbolVisibility::Public,
                is_exported: true,
                is_deprecated: false,
                location: Location::default(),
                parameters: vec![],
                return_type: None,
                is_async: false,
                is_generator: false,
                complexity: None,
                calls: vec![],
            },
            now,
        );
        assert!(f.kind.is_symbol());
        assert_eq!(f.kind.symbol_name(), Some("foo"));
        assert!(f.kind.is_exported());

        let dir = Entity::new(
            "dir:1",
            "h",
            EntityKind::Directory {
                children: vec![],
                depth: 0,
            },
            now,
        );
        assert!(!dir.kind.is_symbol());
        assert_eq!(dir.kind.symbol_name(), None);
    }

    #[test]
    fn entity_kind_serializes_with_kind_tag() {
        let now = Utc::now();
        let e = Entity::new(
            "file:a.rs",
            "h",
            EntityKind::File {
                extension: "rs".into(),
                size: 10,
                lines: 1,
                is_test: false,
                is_config: false,
                dependencies: vec![],
            },
            now,
        );
        let v = serde_json::to_value(&e.kind).unwrap();
        assert_eq!(v["kind"], "file");
    }
}
