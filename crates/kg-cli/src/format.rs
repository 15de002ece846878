// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting utilities for the knowledge graph CLI.

use std::fmt;
use std::str::FromStr;

use kg_error::KgErrorDto;
use kg_graph_store::{BulkResult, QueryOutcome};
use kg_relational_store::SessionCheckpointJobRow;
use serde::{Deserialize, Serialize};
use serde_json::json;

use kg_core::relationship::Relationship;
use kg_validator::ValidationReport;

/// Supported output formats for CLI display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Compact JSON (single line).
    Json,
    /// Pretty-printed JSON.
    JsonPretty,
    /// Human-readable multi-line text.
    Text,
    /// Key-value aligned table.
    Table,
    /// Single-line summary.
    Compact,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
            Self::Text => "text",
            Self::Table => "table",
            Self::Compact => "compact",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "json-pretty" | "json_pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "text" => Ok(Self::Text),
            "table" => Ok(Self::Table),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Formats knowledge-graph contract types for CLI output.
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Create a new formatter with the given output format.
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format a [`BulkResult`] (the outcome of `kg ingest`).
    #[must_use]
    pub fn format_bulk_result(&self, result: &BulkResult) -> String {
        let (ok, err) = bulk_tally(result);
        match &self.format {
            OutputFormat::Json => serde_json::to_string(&bulk_result_value(result)).unwrap_or_default(),
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(&bulk_result_value(result)).unwrap_or_default()
            }
            OutputFormat::Text => {
                format!("Queries: {}\nSucceeded: {ok}\nFailed: {err}", result.outcomes.len())
            }
            OutputFormat::Table => {
                format!("{:<12} {}\n{:<12} {ok}\n{:<12} {err}", "queries", result.outcomes.len(), "ok", "failed")
            }
            OutputFormat::Compact => format!("[bulk] {ok} ok, {err} failed of {}", result.outcomes.len()),
        }
    }

    /// Format a list of [`Relationship`]s (the result of `kg query`).
    #[must_use]
    pub fn format_relationships(&self, rels: &[Relationship]) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(rels).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(rels).unwrap_or_default(),
            OutputFormat::Text => rels.iter().map(format_relationship_text).collect::<Vec<_>>().join("\n"),
            OutputFormat::Table => rels.iter().map(format_relationship_table).collect::<Vec<_>>().join("\n"),
            OutputFormat::Compact => format!("{} relationships matched", rels.len()),
        }
    }

    /// Format a [`ValidationReport`] (the result of `kg validate`).
    #[must_use]
    pub fn format_validation_report(&self, report: &ValidationReport) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(&validation_report_value(report)).unwrap_or_default(),
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(&validation_report_value(report)).unwrap_or_default()
            }
            OutputFormat::Text => format!(
                "Scanned: {}\nVersions inspected: {}\nRepaired: {}\nIssues: {}",
                report.scanned_entities,
                report.inspected_versions,
                report.repaired_links,
                report.issues.len(),
            ),
            OutputFormat::Table => format!(
                "{:<20} {}\n{:<20} {}\n{:<20} {}\n{:<20} {}",
                "scanned_entities",
                report.scanned_entities,
                "inspected_versions",
                report.inspected_versions,
                "repaired_links",
                report.repaired_links,
                "issues",
                report.issues.len(),
            ),
            OutputFormat::Compact => format!(
                "[validate] scanned={} versions={} repaired={} issues={}",
                report.scanned_entities,
                report.inspected_versions,
                report.repaired_links,
                report.issues.len(),
            ),
        }
    }

    /// Format a list of [`SessionCheckpointJobRow`]s (the result of
    /// `kg checkpoint list`).
    #[must_use]
    pub fn format_checkpoint_jobs(&self, jobs: &[SessionCheckpointJobRow]) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(jobs).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(jobs).unwrap_or_default(),
            OutputFormat::Text => jobs.iter().map(format_job_text).collect::<Vec<_>>().join("\n"),
            OutputFormat::Table => jobs.iter().map(format_job_table).collect::<Vec<_>>().join("\n"),
            OutputFormat::Compact => format!("{} checkpoint jobs", jobs.len()),
        }
    }

    /// Format an error message according to the configured output format.
    #[must_use]
    pub fn format_error(&self, err: &str) -> String {
        match &self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => json!({"error": err}).to_string(),
            OutputFormat::Text => format!("Error: {err}"),
            OutputFormat::Table => format!("error  {err}"),
            OutputFormat::Compact => format!("[error] {err}"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────────

fn bulk_tally(result: &BulkResult) -> (usize, usize) {
    let err = result.outcomes.iter().filter(|o| matches!(o, QueryOutcome::Err(_))).count();
    (result.outcomes.len() - err, err)
}

fn bulk_result_value(result: &BulkResult) -> serde_json::Value {
    let outcomes: Vec<serde_json::Value> = result
        .outcomes
        .iter()
        .map(|o| match o {
            QueryOutcome::Ok => json!({"ok": true}),
            QueryOutcome::Err(e) => json!({"ok": false, "error": KgErrorDto::from(e)}),
        })
        .collect();
    json!({"outcomes": outcomes})
}

fn validation_report_value(report: &ValidationReport) -> serde_json::Value {
    let issues: Vec<serde_json::Value> = report
        .issues
        .iter()
        .map(|i| {
            json!({
                "entity_id": i.entity_id,
                "version_id": i.version_id,
                "kind": format!("{:?}", i.kind),
                "repaired": i.repaired,
            })
        })
        .collect();
    json!({
        "scanned_entities": report.scanned_entities,
        "inspected_versions": report.inspected_versions,
        "repaired_links": report.repaired_links,
        "issues": issues,
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max])
    }
}

fn format_relationship_text(r: &Relationship) -> String {
    format!(
        "{} --[{:?}]--> {} (active={})",
        r.from_entity_id,
        r.r#type,
        r.to_entity_id,
        r.is_active(),
    )
}

fn format_relationship_table(r: &Relationship) -> String {
    format!(
        "{:<24} {:<28} {:<24} {}",
        truncate(&r.from_entity_id, 24),
        format!("{:?}", r.r#type),
        truncate(&r.to_entity_id, 24),
        r.is_active(),
    )
}

fn format_job_text(j: &SessionCheckpointJobRow) -> String {
    format!("{} [{:?}] session={} attempts={}", j.job_id, j.status, j.session_id, j.attempts)
}

fn format_job_table(j: &SessionCheckpointJobRow) -> String {
    format!("{:<24} {:<18} {:<24} {}", j.job_id, format!("{:?}", j.status), j.session_id, j.attempts)
}
