// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the knowledge graph
//! pipeline.
//!
//! This crate provides [`GraphConfig`] — the top-level runtime settings —
//! together with helpers for loading from TOML files, merging overlays, and
//! producing advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Severity of a [`ConfigWarning`] (spec §4.4/SPEC_FULL S2 "severity
/// Info/Warning/Error" — `Error` warnings are only produced here for
/// advisory issues that don't block loading; hard failures surface as
/// [`ConfigError::ValidationError`] instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    /// Informational; no action needed.
    Info,
    /// Worth a second look.
    Warning,
    /// Likely to cause surprising behavior, but not invalid.
    Error,
}

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A deprecated field was used in the configuration.
    DeprecatedField {
        /// Name of the deprecated field.
        field: String,
        /// Suggested replacement, if any.
        suggestion: Option<String>,
    },
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A confidence floor was configured below the teacher's recommended
    /// default, which will admit weaker inferred-call edges (spec §4.2.3).
    LowConfidenceFloor {
        /// The configured floor.
        value: f64,
    },
    /// A checkpoint retry delay is unusually large.
    LargeRetryDelay {
        /// Configured delay in milliseconds.
        millis: u64,
    },
}

impl ConfigWarning {
    /// Severity of this warning.
    #[must_use]
    pub fn severity(&self) -> WarningSeverity {
        match self {
            ConfigWarning::DeprecatedField { .. } => WarningSeverity::Warning,
            ConfigWarning::MissingOptionalField { .. } => WarningSeverity::Info,
            ConfigWarning::LowConfidenceFloor { .. } => WarningSeverity::Warning,
            ConfigWarning::LargeRetryDelay { .. } => WarningSeverity::Info,
        }
    }
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::DeprecatedField { field, suggestion } => {
                write!(f, "deprecated field '{field}'")?;
                if let Some(s) = suggestion {
                    write!(f, " — use '{s}' instead")?;
                }
                Ok(())
            }
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LowConfidenceFloor { value } => {
                write!(f, "min_inferred_confidence {value} is below the recommended 0.4 floor")
            }
            ConfigWarning::LargeRetryDelay { millis } => {
                write!(f, "checkpoint retry_delay_ms {millis} is unusually large")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for the knowledge graph pipeline
/// (spec §4.2.3, §4.7, §4.8, §4.4/§4.5 knobs — SPEC_FULL S2).
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct GraphConfig {
    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Minimum confidence an inferred call/reference edge must meet to be
    /// kept (spec §4.2.3 `MIN_INFERRED_CONFIDENCE`).
    #[serde(default = "default_min_inferred_confidence")]
    pub min_inferred_confidence: f64,

    /// Minimum identifier length considered significant by the name
    /// heuristics (spec §4.2.4 `AST_MIN_NAME_LENGTH`).
    #[serde(default = "default_ast_min_name_length")]
    pub ast_min_name_length: usize,

    /// Additional stop-names to exclude beyond the built-in set, merged
    /// (not replacing) `kg_builders::STOP_NAMES`.
    #[serde(default)]
    pub extra_stop_names: Vec<String>,

    /// Maximum import-resolution depth explored per reference.
    #[serde(default = "default_import_depth_bound")]
    pub import_depth_bound: u32,

    /// Checkpoint job runner tunables (spec §4.7).
    #[serde(default)]
    pub checkpoint: CheckpointSettings,

    /// Temporal history validator tunables (spec §4.8).
    #[serde(default)]
    pub validator: ValidatorSettings,

    /// Bulk-write telemetry thresholds (spec §4.4/§4.5).
    #[serde(default)]
    pub bulk_writer: BulkWriterSettings,
}

fn default_min_inferred_confidence() -> f64 {
    0.4
}

fn default_ast_min_name_length() -> usize {
    3
}

fn default_import_depth_bound() -> u32 {
    8
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".into()),
            min_inferred_confidence: default_min_inferred_confidence(),
            ast_min_name_length: default_ast_min_name_length(),
            extra_stop_names: Vec::new(),
            import_depth_bound: default_import_depth_bound(),
            checkpoint: CheckpointSettings::default(),
            validator: ValidatorSettings::default(),
            bulk_writer: BulkWriterSettings::default(),
        }
    }
}

/// Checkpoint job runner knobs (spec §4.7), mirrored from
/// [`kg_checkpoint_runner::RunnerConfig`] so they round-trip through TOML.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct CheckpointSettings {
    /// Maximum execution attempts before dead-lettering.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay before a retry, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Maximum number of jobs executing concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    5_000
}
fn default_concurrency() -> usize {
    1
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            concurrency: default_concurrency(),
        }
    }
}

impl CheckpointSettings {
    /// Convert to the runtime config type `kg-checkpoint-runner` actually uses.
    #[must_use]
    pub fn to_runner_config(self) -> kg_checkpoint_runner::RunnerConfig {
        kg_checkpoint_runner::RunnerConfig {
            max_attempts: self.max_attempts,
            retry_delay_ms: self.retry_delay_ms,
            concurrency: self.concurrency,
        }
    }
}

/// Temporal history validator knobs (spec §4.8), mirrored from
/// [`kg_validator::ValidatorOptions`].
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ValidatorSettings {
    /// Entities scanned per page (clamped to 100 by the validator itself).
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Maximum versions inspected per entity timeline.
    #[serde(default = "default_timeline_limit")]
    pub timeline_limit: u32,
}

fn default_batch_size() -> u32 {
    25
}
fn default_timeline_limit() -> u32 {
    200
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self { batch_size: default_batch_size(), timeline_limit: default_timeline_limit() }
    }
}

/// Bulk-write telemetry knobs (spec §4.4/§4.5), mirrored from
/// [`kg_telemetry::TelemetryThresholds`].
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct BulkWriterSettings {
    /// A batch is "slow" at or above this duration.
    #[serde(default = "default_slow_batch_threshold_ms")]
    pub slow_batch_threshold_ms: u64,
    /// A batch is "large" at or above this size.
    #[serde(default = "default_warn_on_large_batch_size")]
    pub warn_on_large_batch_size: u32,
    /// A batch is "backpressured" at or above this queue depth.
    #[serde(default = "default_queue_depth_warning_threshold")]
    pub queue_depth_warning_threshold: u32,
    /// Maximum entries retained in telemetry history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_slow_batch_threshold_ms() -> u64 {
    1_000
}
fn default_warn_on_large_batch_size() -> u32 {
    500
}
fn default_queue_depth_warning_threshold() -> u32 {
    100
}
fn default_history_limit() -> usize {
    200
}

impl Default for BulkWriterSettings {
    fn default() -> Self {
        Self {
            slow_batch_threshold_ms: default_slow_batch_threshold_ms(),
            warn_on_large_batch_size: default_warn_on_large_batch_size(),
            queue_depth_warning_threshold: default_queue_depth_warning_threshold(),
            history_limit: default_history_limit(),
        }
    }
}

impl BulkWriterSettings {
    /// Convert to the runtime thresholds type `kg-telemetry` actually uses.
    #[must_use]
    pub fn to_telemetry_thresholds(self) -> kg_telemetry::TelemetryThresholds {
        kg_telemetry::TelemetryThresholds {
            slow_batch_threshold_ms: self.slow_batch_threshold_ms,
            warn_on_large_batch_size: self.warn_on_large_batch_size,
            queue_depth_warning_threshold: self.queue_depth_warning_threshold,
            history_limit: self.history_limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Checkpoint retry delay above which [`ConfigWarning::LargeRetryDelay`]
/// is raised.
const LARGE_RETRY_DELAY_THRESHOLD_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`GraphConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`GraphConfig::default()`].
pub fn load_config(path: Option<&Path>) -> Result<GraphConfig, ConfigError> {
    match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .map_err(|_| ConfigError::FileNotFound { path: p.display().to_string() })?;
            parse_toml(&content)
        }
        None => Ok(GraphConfig::default()),
    }
}

/// Parse a TOML string into a [`GraphConfig`].
pub fn parse_toml(content: &str) -> Result<GraphConfig, ConfigError> {
    toml::from_str::<GraphConfig>(content).map_err(|e| ConfigError::ParseError { reason: e.to_string() })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (invalid log level, zero concurrency, out-of-range batch
/// sizes) are returned as a [`ConfigError::ValidationError`]; soft issues
/// come back as warnings.
pub fn validate_config(config: &GraphConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    if !(0.0..=1.0).contains(&config.min_inferred_confidence) {
        errors.push(format!(
            "min_inferred_confidence {} out of range [0, 1]",
            config.min_inferred_confidence
        ));
    } else if config.min_inferred_confidence < 0.4 {
        warnings.push(ConfigWarning::LowConfidenceFloor { value: config.min_inferred_confidence });
    }

    if config.checkpoint.max_attempts == 0 {
        errors.push("checkpoint.max_attempts must be at least 1".into());
    }
    if config.checkpoint.concurrency == 0 {
        errors.push("checkpoint.concurrency must be at least 1".into());
    }
    if config.checkpoint.retry_delay_ms > LARGE_RETRY_DELAY_THRESHOLD_MS {
        warnings.push(ConfigWarning::LargeRetryDelay { millis: config.checkpoint.retry_delay_ms });
    }

    if config.validator.batch_size == 0 {
        errors.push("validator.batch_size must be at least 1".into());
    }
    if config.validator.batch_size > 100 {
        errors.push("validator.batch_size must not exceed 100".into());
    }
    if config.validator.timeline_limit == 0 {
        errors.push("validator.timeline_limit must be at least 1".into());
    }

    if config.log_level.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "log_level".into(),
            hint: "defaults to 'info' if left unset".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Scalar values in `overlay` take precedence
/// over `base`; `extra_stop_names` are unioned.
#[must_use]
pub fn merge_configs(base: GraphConfig, overlay: GraphConfig) -> GraphConfig {
    let mut extra_stop_names = base.extra_stop_names;
    for name in overlay.extra_stop_names {
        if !extra_stop_names.contains(&name) {
            extra_stop_names.push(name);
        }
    }
    GraphConfig {
        log_level: overlay.log_level.or(base.log_level),
        min_inferred_confidence: overlay.min_inferred_confidence,
        ast_min_name_length: overlay.ast_min_name_length,
        extra_stop_names,
        import_depth_bound: overlay.import_depth_bound,
        checkpoint: overlay.checkpoint,
        validator: overlay.validator,
        bulk_writer: overlay.bulk_writer,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let cfg = GraphConfig::default();
        validate_config(&cfg).expect("default config should be valid");
    }

    #[test]
    fn default_config_has_sensible_defaults() {
        let cfg = GraphConfig::default();
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
        assert_eq!(cfg.min_inferred_confidence, 0.4);
        assert_eq!(cfg.checkpoint.max_attempts, 3);
        assert_eq!(cfg.validator.batch_size, 25);
    }

    #[test]
    fn parse_valid_toml_string() {
        let toml_str = r#"
            log_level = "debug"
            min_inferred_confidence = 0.6

            [checkpoint]
            max_attempts = 5
        "#;
        let cfg = parse_toml(toml_str).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.min_inferred_confidence, 0.6);
        assert_eq!(cfg.checkpoint.max_attempts, 5);
        assert_eq!(cfg.checkpoint.concurrency, 1, "unset fields keep their defaults");
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let err = parse_toml("this is [not valid toml =").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn validation_catches_invalid_log_level() {
        let cfg = GraphConfig { log_level: Some("verbose".into()), ..Default::default() };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn validation_catches_confidence_out_of_range() {
        let cfg = GraphConfig { min_inferred_confidence: 1.5, ..Default::default() };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn low_confidence_floor_produces_warning_not_error() {
        let cfg = GraphConfig { min_inferred_confidence: 0.1, ..Default::default() };
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.iter().any(|w| matches!(w, ConfigWarning::LowConfidenceFloor { .. })));
    }

    #[test]
    fn validation_catches_zero_max_attempts() {
        let cfg = GraphConfig {
            checkpoint: CheckpointSettings { max_attempts: 0, ..Default::default() },
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("max_attempts")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validation_catches_oversized_validator_batch() {
        let cfg = GraphConfig {
            validator: ValidatorSettings { batch_size: 101, ..Default::default() },
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn large_retry_delay_produces_warning() {
        let cfg = GraphConfig {
            checkpoint: CheckpointSettings { retry_delay_ms: 120_000, ..Default::default() },
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.iter().any(|w| matches!(w, ConfigWarning::LargeRetryDelay { .. })));
    }

    #[test]
    fn merge_overlay_overrides_base() {
        let base = GraphConfig { min_inferred_confidence: 0.4, ..Default::default() };
        let overlay = GraphConfig { min_inferred_confidence: 0.7, ..Default::default() };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.min_inferred_confidence, 0.7);
    }

    #[test]
    fn merge_unions_extra_stop_names() {
        let base = GraphConfig { extra_stop_names: vec!["tmp".into()], ..Default::default() };
        let overlay = GraphConfig { extra_stop_names: vec!["tmp".into(), "val".into()], ..Default::default() };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.extra_stop_names, vec!["tmp".to_string(), "val".to_string()]);
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = GraphConfig { log_level: Some("debug".into()), ..Default::default() };
        let serialized = toml::to_string(&cfg).unwrap();
        let deserialized: GraphConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "log_level = \"warn\"").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/graph.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_none_returns_default() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn bulk_writer_settings_convert_to_telemetry_thresholds() {
        let settings = BulkWriterSettings::default();
        let thresholds = settings.to_telemetry_thresholds();
        assert_eq!(thresholds.slow_batch_threshold_ms, settings.slow_batch_threshold_ms);
        assert_eq!(thresholds.history_limit, settings.history_limit);
    }

    #[test]
    fn checkpoint_settings_convert_to_runner_config() {
        let settings = CheckpointSettings { max_attempts: 7, retry_delay_ms: 2_500, concurrency: 4 };
        let runner_config = settings.to_runner_config();
        assert_eq!(runner_config.max_attempts, 7);
        assert_eq!(runner_config.retry_delay_ms, 2_500);
        assert_eq!(runner_config.concurrency, 4);
    }

    #[test]
    fn config_warning_display() {
        let w = ConfigWarning::LowConfidenceFloor { value: 0.1 };
        assert!(w.to_string().contains("0.1"));

        let w = ConfigWarning::MissingOptionalField { field: "f".into(), hint: "h".into() };
        assert!(w.to_string().contains('f'));
    }
}
