// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the knowledge graph CLI.
//!
//! These functions are library-level so they can be tested without
//! spawning the binary. `kg-cli` has no ingestion logic of its own (spec
//! §1 Non-goals, SPEC_FULL.md §S4): everything here reads entities,
//! relationships, queries, and job rows that were already produced
//! elsewhere, and hands them to `kg-facade`.

use std::path::Path;

use anyhow::{Context, Result};
use kg_config::GraphConfig;
use kg_core::entity::Entity;
use kg_core::query::RelationshipQuery;
use kg_core::relationship::Relationship;
use kg_relational_store::SessionCheckpointJobRow;
use schemars::schema_for;
use serde::{Deserialize, Serialize};

/// A batch of pre-built entities/relationships to load into a store before
/// running a command (spec §6.1: these are produced by the parser
/// front-end, which is outside this crate's scope).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    /// Entities to upsert before the command runs.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Relationships to upsert before the command runs.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Load a [`SeedFile`] from a JSON file.
pub fn load_seed_file(path: &Path) -> Result<SeedFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read seed file '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse seed file '{}'", path.display()))
}

/// Load a [`RelationshipQuery`] from a JSON file.
pub fn load_relationship_query(path: &Path) -> Result<RelationshipQuery> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read query filter '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse query filter '{}'", path.display()))
}

/// Load a list of [`SessionCheckpointJobRow`] from a JSON file.
pub fn load_checkpoint_jobs(path: &Path) -> Result<Vec<SessionCheckpointJobRow>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read jobs file '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse jobs file '{}'", path.display()))
}

/// Schema types that can be printed by the `schema` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// JSON schema for [`Entity`].
    Entity,
    /// JSON schema for [`Relationship`].
    Relationship,
    /// JSON schema for [`RelationshipQuery`].
    RelationshipQuery,
    /// JSON schema for [`SessionCheckpointJobRow`].
    CheckpointJob,
    /// JSON schema for [`GraphConfig`](kg_config::GraphConfig).
    Config,
}

/// Return the JSON schema string for the given kind.
pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let value = match kind {
        SchemaKind::Entity => serde_json::to_value(schema_for!(Entity))?,
        SchemaKind::Relationship => serde_json::to_value(schema_for!(Relationship))?,
        SchemaKind::RelationshipQuery => serde_json::to_value(schema_for!(RelationshipQuery))?,
        SchemaKind::CheckpointJob => serde_json::to_value(schema_for!(SessionCheckpointJobRow))?,
        SchemaKind::Config => serde_json::to_value(schema_for!(GraphConfig))?,
    };
    serde_json::to_string_pretty(&value).context("serialize schema")
}

/// Load and validate a [`GraphConfig`] file, returning human-readable
/// diagnostics (errors and warnings) rather than failing outright.
pub fn config_check(path: Option<&Path>) -> Result<Vec<String>> {
    let mut diagnostics = Vec::new();

    let config = match kg_config::load_config(path) {
        Ok(c) => c,
        Err(e) => {
            diagnostics.push(format!("error: {e}"));
            return Ok(diagnostics);
        }
    };

    match kg_config::validate_config(&config) {
        Ok(warnings) => {
            diagnostics.push("config: ok".into());
            for w in warnings {
                diagnostics.push(format!("warning: {w}"));
            }
        }
        Err(e) => diagnostics.push(format!("error: {e}")),
    }

    Ok(diagnostics)
}
