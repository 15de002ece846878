// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Unified error taxonomy with stable error codes for the code knowledge
//! graph core.
//!
//! Every error raised by a `kg-*` crate carries an [`ErrorCode`] (a
//! machine-readable, stable string tag), a human-readable message, an
//! optional cause chain, and arbitrary key-value context. Use the builder
//! returned by [`KgError::new`] to construct errors fluently.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Structural/relationship normalization errors (C2).
    Normalization,
    /// Resolution degradation (type-checker unavailable, budget exhausted).
    Resolution,
    /// Property-graph store persistence errors (C6).
    GraphStore,
    /// Relational store persistence errors (C7).
    RelationalStore,
    /// Temporal history engine errors (C8).
    Temporal,
    /// Checkpoint job runner errors (C9).
    Checkpoint,
    /// Temporal history validator errors (C10).
    Validator,
    /// Configuration errors.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normalization => "normalization",
            Self::Resolution => "resolution",
            Self::GraphStore => "graph_store",
            Self::RelationalStore => "relational_store",
            Self::Temporal => "temporal",
            Self::Checkpoint => "checkpoint",
            Self::Validator => "validator",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serializes to a `snake_case` string that is guaranteed not
/// to change across patch releases. This is the taxonomy named in
/// spec.md §7: `{not_initialized, invalid_parameter, query_failed, timeout,
/// constraint_violation, queue_full, dead_lettered}` plus category-specific
/// extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // -- Taxonomy core (spec.md §7) --
    /// A store or component was used before it was initialized.
    NotInitialized,
    /// A query parameter contained invalid characters or values.
    InvalidParameter,
    /// A query against a store failed for a reason other than the above.
    QueryFailed,
    /// An operation exceeded its configured timeout.
    Timeout,
    /// A uniqueness or referential constraint was violated.
    ConstraintViolation,
    /// A bounded queue has reached capacity and rejected an enqueue.
    QueueFull,
    /// A checkpoint job exhausted its retry budget and was dead-lettered.
    DeadLettered,

    // -- Normalization --
    /// Structural relationship metadata failed normalization.
    NormalizationInvalid,

    // -- Resolution --
    /// A resolution cascade could not resolve a placeholder target.
    ResolutionDegraded,

    // -- Graph store --
    /// A graph upsert or query failed.
    GraphStoreFailed,
    /// A requested vector collection does not exist.
    GraphStoreCollectionMissing,

    // -- Relational store --
    /// A relational upsert or query failed.
    RelationalStoreFailed,

    // -- Temporal --
    /// An edge-open/close operation violated the at-most-one-active invariant.
    TemporalInvariantViolation,
    /// A version chain has a missing or misordered `PREVIOUS_VERSION` link.
    TemporalChainBroken,

    // -- Checkpoint --
    /// Checkpoint creation returned an empty checkpoint id.
    CheckpointCreationFailed,

    // -- Validator --
    /// The validator encountered a per-entity failure; scan continues.
    ValidatorEntityFailed,

    // -- Config --
    /// Configuration is invalid.
    ConfigInvalid,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotInitialized
            | Self::InvalidParameter
            | Self::QueryFailed
            | Self::Timeout
            | Self::ConstraintViolation
            | Self::QueueFull
            | Self::DeadLettered
            | Self::Internal => ErrorCategory::Internal,

            Self::NormalizationInvalid => ErrorCategory::Normalization,
            Self::ResolutionDegraded => ErrorCategory::Resolution,
            Self::GraphStoreFailed | Self::GraphStoreCollectionMissing => {
                ErrorCategory::GraphStore
            }
            Self::RelationalStoreFailed => ErrorCategory::RelationalStore,
            Self::TemporalInvariantViolation | Self::TemporalChainBroken => {
                ErrorCategory::Temporal
            }
            Self::CheckpointCreationFailed => ErrorCategory::Checkpoint,
            Self::ValidatorEntityFailed => ErrorCategory::Validator,
            Self::ConfigInvalid => ErrorCategory::Config,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"not_initialized"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::InvalidParameter => "invalid_parameter",
            Self::QueryFailed => "query_failed",
            Self::Timeout => "timeout",
            Self::ConstraintViolation => "constraint_violation",
            Self::QueueFull => "queue_full",
            Self::DeadLettered => "dead_lettered",
            Self::NormalizationInvalid => "normalization_invalid",
            Self::ResolutionDegraded => "resolution_degraded",
            Self::GraphStoreFailed => "graph_store_failed",
            Self::GraphStoreCollectionMissing => "graph_store_collection_missing",
            Self::RelationalStoreFailed => "relational_store_failed",
            Self::TemporalInvariantViolation => "temporal_invariant_violation",
            Self::TemporalChainBroken => "temporal_chain_broken",
            Self::CheckpointCreationFailed => "checkpoint_creation_failed",
            Self::ValidatorEntityFailed => "validator_entity_failed",
            Self::ConfigInvalid => "config_invalid",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// KgError
// ---------------------------------------------------------------------------

/// Unified knowledge-graph-core error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context. No
/// sensitive parameter values are included unless the caller explicitly adds
/// them via [`with_context`](KgError::with_context) under a debug flag.
pub struct KgError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl KgError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialization
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for KgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("KgError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for KgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for KgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serializable snapshot of a [`KgError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KgErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&KgError> for KgErrorDto {
    fn from(err: &KgError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<KgErrorDto> for KgError {
    fn from(dto: KgErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}
