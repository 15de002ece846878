//! Shared builder input types (spec §4.2).
//!
//! The four builders walk an already-parsed declaration surface rather than
//! owning their own parser — a language front end is responsible for
//! producing these shapes (import declarations, call expressions, and so
//! on) from its AST; the builders' job starts at "here is a declaration,
//! emit the relationships it implies".

use std::cell::RefCell;
use std::collections::HashMap;

use kg_index::{SymbolIndex, TypeCheckerBudget};

/// A source location within one file (1-based line, 0-based column, as in
/// [`kg_core::relationship::Site`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    /// 1-based line number.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

/// alias → target file (spec §4.2 `importMap`).
pub type ImportMap = HashMap<String, String>;
/// alias → exported name reached after following re-exports transitively
/// (spec §4.2 `importSymbolMap`).
pub type ImportSymbolMap = HashMap<String, String>;

/// Consulted by builders when local/import resolution misses and budget
/// allows a type-checker call (spec §4.2.2, §4.2.3, §4.2.4). A host front
/// end implements this over its own type-checking service; builders never
/// talk to a type checker directly.
pub trait TypeCheckerResolver {
    /// Resolve `simple_name` to the repo-relative file it is declared in,
    /// if the type checker can determine one.
    fn resolve_symbol_file(&self, simple_name: &str) -> Option<String>;
    /// Static type of the expression at `access_path` (e.g. a call
    /// receiver), if known.
    fn receiver_type(&self, access_path: &str) -> Option<String>;
    /// Infer a type node's simple name when no explicit annotation exists
    /// (spec §4.2.4 "fall back to the type-checker's inferred type").
    fn inferred_type_name(&self, access_path: &str) -> Option<String>;
}

/// Tunable limits threaded through a builder pass, sourced from
/// `kg_config::GraphConfig` by the host front end that owns the AST walk
/// (spec §4.2.3, §4.2.4 "Configurable knobs"). Defaults mirror
/// `kg-config`'s own defaults, so a context built with `Default::default()`
/// behaves exactly as the hardcoded constants used to.
#[derive(Debug, Clone)]
pub struct BuilderLimits {
    /// Minimum simple-name length considered significant (spec §4.2.2,
    /// §4.2.3, §4.2.4 "Names failing `length ≥ AST_MIN_NAME_LENGTH`").
    pub min_name_length: usize,
    /// Additional stop-names excluded beyond the built-in [`STOP_NAMES`]
    /// set, merged rather than replacing it.
    pub extra_stop_names: Vec<String>,
    /// Minimum confidence an inferred edge must meet to be emitted (spec
    /// §4.2.3 "Confidence gate").
    pub min_inferred_confidence: f64,
}

impl Default for BuilderLimits {
    fn default() -> Self {
        Self {
            min_name_length: AST_MIN_NAME_LENGTH,
            extra_stop_names: Vec::new(),
            min_inferred_confidence: crate::call::MIN_INFERRED_CONFIDENCE,
        }
    }
}

impl BuilderLimits {
    /// Build limits from a loaded `kg_config::GraphConfig`.
    #[must_use]
    pub fn from_config(config: &kg_config::GraphConfig) -> Self {
        Self {
            min_name_length: config.ast_min_name_length,
            extra_stop_names: config.extra_stop_names.clone(),
            min_inferred_confidence: config.min_inferred_confidence,
        }
    }
}

/// Shared, read-only context threaded through a single file's builder pass
/// (spec §4.2: "Each [builder] receives ... shared services from C3/C5 and
/// a type-checker budget token").
///
/// `budget` is a [`RefCell`] rather than `&mut` because a single context is
/// shared by many independent emission sites within one file walk; the
/// budget itself is the only piece of state any of them mutate.
pub struct BuilderContext<'a> {
    /// Repo-relative path of the file currently being walked.
    pub from_file: &'a str,
    /// Timestamp to stamp newly emitted relationships with.
    pub now: chrono::DateTime<chrono::Utc>,
    /// alias → target file.
    pub import_map: &'a ImportMap,
    /// alias → exported name.
    pub import_symbol_map: &'a ImportSymbolMap,
    /// Symbol/name index (C3), shared read-only during a scan pass.
    pub symbol_index: &'a SymbolIndex,
    /// Optional type-checker front end; `None` degrades every cascade to
    /// its non-type-checker fallback.
    pub type_checker: Option<&'a dyn TypeCheckerResolver>,
    /// Remaining type-checker calls for this scan (spec §5 "type-checker
    /// budget").
    pub budget: RefCell<TypeCheckerBudget>,
    /// Configurable noise-filter and confidence-gate limits.
    pub limits: BuilderLimits,
}

impl<'a> BuilderContext<'a> {
    /// Construct a context for one file's builder pass, using
    /// [`BuilderLimits::default`].
    #[must_use]
    pub fn new(
        from_file: &'a str,
        now: chrono::DateTime<chrono::Utc>,
        import_map: &'a ImportMap,
        import_symbol_map: &'a ImportSymbolMap,
        symbol_index: &'a SymbolIndex,
        type_checker: Option<&'a dyn TypeCheckerResolver>,
        budget: TypeCheckerBudget,
    ) -> Self {
        Self::with_limits(
            from_file,
            now,
            import_map,
            import_symbol_map,
            symbol_index,
            type_checker,
            budget,
            BuilderLimits::default(),
        )
    }

    /// Construct a context with explicit [`BuilderLimits`] (typically
    /// [`BuilderLimits::from_config`]).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn with_limits(
        from_file: &'a str,
        now: chrono::DateTime<chrono::Utc>,
        import_map: &'a ImportMap,
        import_symbol_map: &'a ImportSymbolMap,
        symbol_index: &'a SymbolIndex,
        type_checker: Option<&'a dyn TypeCheckerResolver>,
        budget: TypeCheckerBudget,
        limits: BuilderLimits,
    ) -> Self {
        Self {
            from_file,
            now,
            import_map,
            import_symbol_map,
            symbol_index,
            type_checker,
            budget: RefCell::new(budget),
            limits,
        }
    }

    /// Attempt to consume one unit of type-checker budget.
    pub(crate) fn take_budget(&self) -> bool {
        self.budget.borrow_mut().take()
    }

    /// Returns `true` when `name` should be skipped as noise: too short, or
    /// a member of the built-in [`STOP_NAMES`] set or this context's
    /// [`BuilderLimits::extra_stop_names`].
    #[must_use]
    pub fn is_noise_name(&self, name: &str) -> bool {
        name.chars().count() < self.limits.min_name_length
            || STOP_NAMES.contains(&name)
            || self.limits.extra_stop_names.iter().any(|s| s == name)
    }
}

/// Minimum simple-name length to survive the noise filter (spec §4.2.2,
/// §4.2.3, §4.2.4 "Names failing `length ≥ AST_MIN_NAME_LENGTH`"); the
/// default for [`BuilderLimits::min_name_length`].
pub const AST_MIN_NAME_LENGTH: usize = 3;

/// Built-in identifiers excluded from REFERENCES/CALLS emission as noise
/// (spec §4.2.2 "the `stopNames` set (built-in identifiers like `console`,
/// `log`, etc.)").
pub const STOP_NAMES: &[&str] = &[
    "console", "log", "this", "self", "super", "undefined", "null", "true", "false",
];
