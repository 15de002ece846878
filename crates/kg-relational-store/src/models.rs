//! Row types for every table in the relational store (spec §4.5).
//!
//! These are semantic shapes, not dialect-specific schemas — a concrete
//! backend maps each struct onto whatever SQL dialect it targets.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `documents` — generic document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    /// Primary key.
    pub id: String,
    /// Document type discriminator.
    pub r#type: String,
    /// Document body.
    pub content: Value,
    /// Open attribute map.
    #[serde(default)]
    pub metadata: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of a [`SessionRow`] (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionRowStatus {
    /// The session is still running.
    Active,
    /// The session finished successfully.
    Completed,
    /// The session terminated with an error.
    Failed,
    /// The session exceeded its allotted time.
    Timeout,
}

/// `sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionRow {
    /// Primary key.
    pub id: String,
    /// Identifier of the agent implementation that ran the session.
    pub agent_type: String,
    /// User that initiated the session, if known.
    pub user_id: Option<String>,
    /// Wall-clock start time.
    pub start_time: DateTime<Utc>,
    /// Wall-clock end time, if the session has ended.
    pub end_time: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: SessionRowStatus,
    /// Open attribute map.
    #[serde(default)]
    pub metadata: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// `test_suites`, unique on `(suite_name, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestSuite {
    /// Primary key.
    pub id: String,
    /// Suite name; part of the unique key.
    pub suite_name: String,
    /// Run timestamp; part of the unique key.
    pub timestamp: DateTime<Utc>,
    /// Test framework name.
    pub framework: String,
    /// Total test count.
    pub total_tests: u32,
    /// Passed test count.
    pub passed_tests: u32,
    /// Failed test count.
    pub failed_tests: u32,
    /// Skipped test count.
    pub skipped_tests: u32,
    /// Wall-clock suite duration in milliseconds.
    pub duration: u64,
    /// Overall suite status.
    pub status: String,
    /// Aggregate coverage percentage, if measured.
    pub coverage: Option<f64>,
}

/// `test_results`, unique on `(test_id, suite_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestResult {
    /// Primary key.
    pub id: String,
    /// Owning suite's primary key.
    pub suite_id: String,
    /// Stable test identifier, part of the unique key.
    pub test_id: String,
    /// Suite name this result belongs to (denormalized for fast lookup).
    pub test_suite: String,
    /// Human-readable test name.
    pub test_name: String,
    /// Pass/fail/skip status.
    pub status: String,
    /// Duration in milliseconds.
    pub duration: u64,
    /// Error message, when failed.
    pub error_message: Option<String>,
    /// Stack trace, when failed.
    pub stack_trace: Option<String>,
    /// Coverage payload, if measured for this test.
    pub coverage: Option<Value>,
    /// Performance payload, if measured for this test.
    pub performance: Option<Value>,
    /// When this result was recorded.
    pub timestamp: DateTime<Utc>,
}

/// `test_coverage`, unique on `(test_id, suite_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestCoverageRow {
    /// Test identifier, part of the unique key.
    pub test_id: String,
    /// Owning suite's primary key, part of the unique key.
    pub suite_id: String,
    /// Lines covered.
    pub lines: f64,
    /// Branches covered.
    pub branches: f64,
    /// Functions covered.
    pub functions: f64,
    /// Statements covered.
    pub statements: f64,
}

/// `test_performance`, unique on `(test_id, suite_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestPerformanceRow {
    /// Test identifier, part of the unique key.
    pub test_id: String,
    /// Owning suite's primary key, part of the unique key.
    pub suite_id: String,
    /// Peak memory usage in bytes.
    pub memory_usage: Option<u64>,
    /// CPU usage percentage.
    pub cpu_usage: Option<f64>,
    /// Number of network requests made during the test.
    pub network_requests: Option<u32>,
}

/// `flaky_test_analyses`, primary key `test_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlakyTestAnalysis {
    /// Primary key.
    pub test_id: String,
    /// Human-readable test name.
    pub test_name: String,
    /// Number of failing runs observed.
    pub failure_count: u32,
    /// Flakiness score in `[0, 1]`.
    pub flaky_score: f64,
    /// Total runs observed.
    pub total_runs: u32,
    /// Failure rate in `[0, 1]`.
    pub failure_rate: f64,
    /// Success rate in `[0, 1]`.
    pub success_rate: f64,
    /// Timestamps of recent failures, most recent last.
    pub recent_failures: Vec<DateTime<Utc>>,
    /// Detected failure patterns.
    pub patterns: Vec<String>,
    /// Suggested remediation actions.
    pub recommendations: Vec<String>,
    /// When this analysis was computed.
    pub analyzed_at: DateTime<Utc>,
}

/// The kind of change recorded in `changes` (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// A new entity was created.
    Create,
    /// An existing entity was modified.
    Update,
    /// An entity was removed.
    Delete,
    /// An entity was renamed.
    Rename,
    /// An entity was moved.
    Move,
}

/// `changes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChangeRecord {
    /// Primary key.
    pub id: String,
    /// Kind of change.
    pub change_type: ChangeType,
    /// Kind of entity affected.
    pub entity_type: String,
    /// Affected entity's id.
    pub entity_id: String,
    /// When the change occurred.
    pub timestamp: DateTime<Utc>,
    /// Author identifier.
    pub author: Option<String>,
    /// VCS commit hash, if applicable.
    pub commit_hash: Option<String>,
    /// Unified diff text, if applicable.
    pub diff: Option<String>,
    /// Serialized prior state.
    pub previous_state: Option<Value>,
    /// Serialized new state.
    pub new_state: Option<Value>,
    /// Session this change was produced in, if any.
    pub session_id: Option<String>,
    /// Spec clause this change relates to, if any.
    pub spec_id: Option<String>,
}

/// `scm_commits`, unique on `commit_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScmCommit {
    /// Primary key.
    pub id: String,
    /// VCS commit hash; unique.
    pub commit_hash: String,
    /// Branch the commit landed on.
    pub branch: String,
    /// Commit title/summary line.
    pub title: String,
    /// Full commit description.
    pub description: Option<String>,
    /// Commit author.
    pub author: Option<String>,
    /// Open attribute map.
    #[serde(default)]
    pub metadata: Value,
    /// Entity/change ids touched by this commit.
    #[serde(default)]
    pub changes: Vec<String>,
    /// Spec clause this commit relates to, if any.
    pub related_spec_id: Option<String>,
    /// Test result ids produced by CI for this commit.
    #[serde(default)]
    pub test_results: Vec<String>,
    /// Serialized validation output.
    pub validation_results: Option<Value>,
    /// Link to the hosted pull/merge request, if any.
    pub pr_url: Option<String>,
    /// Hosting provider (`"github"`, `"gitlab"`, ...).
    pub provider: Option<String>,
    /// Review/merge status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Severity tier for a [`PerformanceMetricSnapshot`] (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricSeverity {
    /// Requires immediate attention.
    Critical,
    /// Should be addressed soon.
    High,
    /// Worth tracking.
    Medium,
    /// Informational only.
    Low,
}

/// Direction of change for a [`PerformanceMetricSnapshot`] (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricTrend {
    /// The metric got worse.
    Regression,
    /// The metric got better.
    Improvement,
    /// No meaningful change.
    Neutral,
}

/// `performance_metric_snapshots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerformanceMetricSnapshot {
    /// Primary key.
    pub id: String,
    /// Test that produced this snapshot, if applicable.
    pub test_id: Option<String>,
    /// Entity the metric is measured against.
    pub target_id: String,
    /// Metric identifier.
    pub metric_id: String,
    /// Benchmark scenario name.
    pub scenario: Option<String>,
    /// Environment the measurement ran in.
    pub environment: String,
    /// Severity tier.
    pub severity: MetricSeverity,
    /// Direction of change relative to baseline.
    pub trend: MetricTrend,
    /// Unit of measurement.
    pub unit: String,
    /// Baseline value.
    pub baseline_value: f64,
    /// Currently measured value.
    pub current_value: f64,
    /// `current_value - baseline_value`.
    pub delta: f64,
    /// Percentage change relative to baseline.
    pub percent_change: f64,
    /// Number of samples the measurement is based on.
    pub sample_size: u32,
    /// Composite risk score.
    pub risk_score: f64,
    /// Identifier of the benchmark/CI run that produced this snapshot.
    pub run_id: String,
    /// When the regression/improvement was detected.
    pub detected_at: DateTime<Utc>,
    /// When the issue was resolved, if it has been.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Open attribute map.
    #[serde(default)]
    pub metadata: Value,
    /// Bounded trailing history of this metric, most recent last, capped at
    /// 50 entries (spec §4.5 `metricsHistory[≤50]`).
    #[serde(default)]
    pub metrics_history: Vec<f64>,
}

/// Maximum entries retained in [`PerformanceMetricSnapshot::metrics_history`]
/// (spec §4.5).
pub const METRICS_HISTORY_LIMIT: usize = 50;

/// Push `value` onto `history`, evicting the oldest entry when the
/// [`METRICS_HISTORY_LIMIT`] would be exceeded.
pub fn push_metrics_history(history: &mut Vec<f64>, value: f64) {
    history.push(value);
    if history.len() > METRICS_HISTORY_LIMIT {
        history.remove(0);
    }
}

/// `coverage_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageHistoryEntry {
    /// Entity this coverage measurement is for.
    pub entity_id: String,
    /// Lines covered.
    pub lines_covered: u32,
    /// Total lines.
    pub lines_total: u32,
    /// `lines_covered / lines_total * 100`.
    pub percentage: f64,
    /// When this measurement was taken.
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle status of a [`SessionCheckpointJobRow`] (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointJobStatus {
    /// Waiting to be picked up.
    Queued,
    /// Waiting for a retry delay to elapse.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully; persisted row deleted, this is terminal.
    Failed,
    /// Exhausted retries; requires operator attention.
    ManualIntervention,
}

/// `session_checkpoint_jobs`, primary key `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionCheckpointJobRow {
    /// Primary key.
    pub job_id: String,
    /// Session this checkpoint job belongs to.
    pub session_id: String,
    /// Job payload (seed entities, reason, hops, window).
    pub payload: Value,
    /// Current lifecycle status.
    pub status: CheckpointJobStatus,
    /// Number of execution attempts so far.
    pub attempts: u32,
    /// Last error message, if any attempt failed.
    pub last_error: Option<String>,
    /// When the job was first enqueued.
    pub queued_at: DateTime<Utc>,
    /// Last time this row was updated.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_history_is_bounded() {
        let mut history = Vec::new();
        for i in 0..(METRICS_HISTORY_LIMIT + 10) {
            push_metrics_history(&mut history, i as f64);
        }
        assert_eq!(history.len(), METRICS_HISTORY_LIMIT);
        assert_eq!(history[0], 10.0);
        assert_eq!(*history.last().unwrap(), (METRICS_HISTORY_LIMIT + 9) as f64);
    }

    #[test]
    fn row_types_round_trip_json() {
        let now = Utc::now();
        let row = CoverageHistoryEntry {
            entity_id: "entity:a".into(),
            lines_covered: 10,
            lines_total: 20,
            percentage: 50.0,
            timestamp: now,
        };
        let json = serde_json::to_string(&row).unwrap();
        let back: CoverageHistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(row, back);
    }
}
