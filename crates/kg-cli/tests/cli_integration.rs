// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration tests for the `kg` CLI binary.

use assert_cmd::Command;
use predicates::str::contains;

fn kg() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("kg").expect("binary `kg` should be built")
}

fn write_json(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ── Help & version ──────────────────────────────────────────────────

#[test]
fn help_flag_prints_usage() {
    kg()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Knowledge graph CLI"))
        .stdout(contains("ingest"))
        .stdout(contains("query"));
}

#[test]
fn version_flag_prints_version() {
    kg().arg("--version").assert().success().stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_gives_error() {
    kg().arg("nonexistent").assert().failure().stderr(contains("unrecognized subcommand"));
}

// ── schema ───────────────────────────────────────────────────────────

#[test]
fn schema_subcommand_prints_valid_json_for_every_kind() {
    for kind in ["entity", "relationship", "relationship-query", "checkpoint-job", "config"] {
        let assert = kg().args(["schema", kind]).assert().success();
        let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
        let parsed: serde_json::Value =
            serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("schema {kind} produced invalid JSON: {e}"));
        assert!(parsed.is_object());
    }
}

// ── config-check ─────────────────────────────────────────────────────

#[test]
fn config_check_defaults_report_ok() {
    kg().arg("config-check").assert().success().stdout(contains("config: ok"));
}

#[test]
fn config_check_missing_file_reports_error() {
    kg().args(["config-check", "/nonexistent/graph.toml"]).assert().success().stdout(contains("error:"));
}

// ── ingest / query round trip ───────────────────────────────────────

const SEED_JSON: &str = r#"{
  "entities": [],
  "relationships": [
    {
      "id": "",
      "from_entity_id": "file:a.ts",
      "to_entity_id": "file:b.ts:foo",
      "type": "IMPORTS",
      "created": "2026-01-01T00:00:00Z",
      "last_modified": "2026-01-01T00:00:00Z",
      "version": 1
    }
  ]
}"#;

#[test]
fn ingest_reports_succeeded_count() {
    let tmp = tempfile::tempdir().unwrap();
    let seed = write_json(&tmp, "seed.json", SEED_JSON);

    kg().args(["ingest", seed.to_str().unwrap()]).assert().success().stdout(contains("Succeeded: 1"));
}

#[test]
fn query_with_seed_returns_matching_relationship() {
    let tmp = tempfile::tempdir().unwrap();
    let seed = write_json(&tmp, "seed.json", SEED_JSON);
    let filter = write_json(&tmp, "filter.json", "{}");

    kg()
        .args(["query", "--seed", seed.to_str().unwrap(), filter.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("file:a.ts"))
        .stdout(contains("Imports"));
}

#[test]
fn query_filter_narrows_by_from_entity_id() {
    let tmp = tempfile::tempdir().unwrap();
    let seed = write_json(&tmp, "seed.json", SEED_JSON);
    let filter = write_json(&tmp, "filter.json", r#"{"from_entity_id": "file:does-not-exist.ts"}"#);

    kg()
        .args(["query", "--seed", seed.to_str().unwrap(), filter.to_str().unwrap(), "--format", "compact"])
        .assert()
        .success()
        .stdout(contains("0 relationships matched"));
}

#[test]
fn ingest_missing_seed_file_fails() {
    kg().args(["ingest", "/nonexistent/seed.json"]).assert().failure().stderr(contains("error:"));
}

// ── validate ─────────────────────────────────────────────────────────

#[test]
fn validate_with_empty_store_reports_no_issues() {
    kg().args(["validate", "--format", "compact"]).assert().success().stdout(contains("issues=0"));
}

// ── checkpoint ───────────────────────────────────────────────────────

#[test]
fn checkpoint_create_requires_seed_entity() {
    kg().args(["checkpoint", "create"]).assert().failure().stderr(contains("--seed-entity"));
}

#[test]
fn checkpoint_create_prints_checkpoint_id() {
    kg()
        .args(["checkpoint", "create", "--seed-entity", "file:a.ts"])
        .assert()
        .success()
        .stdout(contains("checkpoint_id: chk_"));
}

const JOBS_JSON: &str = r#"[
  {
    "job_id": "job-1",
    "session_id": "session-1",
    "payload": {},
    "status": "completed",
    "attempts": 1,
    "last_error": null,
    "queued_at": "2026-01-01T00:00:00Z",
    "updated_at": "2026-01-01T00:00:01Z"
  }
]"#;

#[test]
fn checkpoint_list_filters_by_status() {
    let tmp = tempfile::tempdir().unwrap();
    let jobs = write_json(&tmp, "jobs.json", JOBS_JSON);

    kg()
        .args(["checkpoint", "list", jobs.to_str().unwrap(), "--status", "completed", "--format", "compact"])
        .assert()
        .success()
        .stdout(contains("1 checkpoint jobs"));

    kg()
        .args(["checkpoint", "list", jobs.to_str().unwrap(), "--status", "failed", "--format", "compact"])
        .assert()
        .success()
        .stdout(contains("0 checkpoint jobs"));
}

// ── debug flag ───────────────────────────────────────────────────────

#[test]
fn debug_flag_is_accepted() {
    kg().args(["--debug", "config-check"]).assert().success().stdout(contains("config: ok"));
}
