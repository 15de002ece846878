// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kg_cli::commands::{self, SchemaKind};
use kg_cli::format::{Formatter, OutputFormat};
use kg_core::entity::CheckpointReason;
use kg_facade::Facade;
use kg_graph_store::{BulkOptions, BulkQuery, InMemoryGraphStore};
use kg_relational_store::{CheckpointJobStatus, InMemoryRelationalStore};
use kg_temporal::CheckpointParams;
use kg_validator::ValidatorOptions;
use tracing_subscriber::EnvFilter;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "kg", version, about = "Knowledge graph CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// `kg-config` TOML file. Defaults to the built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// `kg-cli` is a thin shell over `kg-facade` (spec §1 Non-goals,
/// SPEC_FULL.md §S4): it owns no parsing, scoring, or resolution logic of
/// its own. Every data-bearing subcommand starts from an empty in-memory
/// store and, when given `--seed`, bulk-loads pre-built entities and
/// relationships into it before running — there is no persistent backend
/// to attach to across invocations (SPEC_FULL.md §S3 supplement 2).
#[derive(Subcommand, Debug)]
enum Commands {
    /// Bulk-upsert entities/relationships from a seed file (spec §4.4 `bulkQuery`).
    Ingest {
        /// JSON file with `{"entities": [...], "relationships": [...]}`.
        #[arg()]
        seed: PathBuf,

        /// Run each upsert independently instead of as one transaction.
        #[arg(long)]
        continue_on_error: bool,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Query relationships matching a filter (spec §6.2 `RelationshipQuery`).
    Query {
        /// Optional seed file to load before querying.
        #[arg(long)]
        seed: Option<PathBuf>,

        /// JSON file holding a `RelationshipQuery`.
        #[arg()]
        filter: PathBuf,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Checkpoint job operations (spec §4.6/§4.7).
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointCommands,
    },

    /// Run the temporal history validator (spec §4.8).
    Validate {
        /// Optional seed file to load before validating.
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Entities inspected per page (max 100). Defaults to the loaded
        /// config's `validator.batch_size` when omitted.
        #[arg(long)]
        batch_size: Option<u32>,

        /// Maximum versions fetched per entity timeline. Defaults to the
        /// loaded config's `validator.timeline_limit` when omitted.
        #[arg(long)]
        timeline_limit: Option<u32>,

        /// Repair `missing_previous` issues as they're found.
        #[arg(long)]
        auto_repair: bool,

        /// Report what would be repaired without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Stop after inspecting this many entities.
        #[arg(long)]
        max_entities: Option<u32>,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print a JSON schema to stdout.
    Schema {
        /// Which schema to print.
        #[arg(value_enum)]
        kind: SchemaArg,
    },

    /// Load and validate a `kg-config` TOML file.
    ConfigCheck {
        /// Path to the config file. Defaults to the built-in defaults when omitted.
        #[arg()]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum CheckpointCommands {
    /// Materialize a checkpoint immediately (spec §4.6 `createCheckpoint`).
    Create {
        /// Optional seed file to load before checkpointing.
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Seed entity ids to traverse from.
        #[arg(long = "seed-entity", required = true)]
        seed_entities: Vec<String>,

        /// Why the checkpoint is being created.
        #[arg(long, value_enum, default_value_t = CheckpointReasonArg::Manual)]
        reason: CheckpointReasonArg,

        /// Hop bound for the traversal from each seed.
        #[arg(long, default_value_t = 3)]
        hops: u32,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// List persisted checkpoint jobs by status (spec §4.7 hydration query).
    List {
        /// JSON file holding a `Vec<SessionCheckpointJobRow>`.
        #[arg()]
        jobs: PathBuf,

        /// Restrict to these statuses. Defaults to every status.
        #[arg(long = "status", value_enum)]
        statuses: Vec<CheckpointJobStatusArg>,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaArg {
    Entity,
    Relationship,
    RelationshipQuery,
    CheckpointJob,
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CheckpointReasonArg {
    Daily,
    Incident,
    Manual,
}

impl From<CheckpointReasonArg> for CheckpointReason {
    fn from(v: CheckpointReasonArg) -> Self {
        match v {
            CheckpointReasonArg::Daily => CheckpointReason::Daily,
            CheckpointReasonArg::Incident => CheckpointReason::Incident,
            CheckpointReasonArg::Manual => CheckpointReason::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CheckpointJobStatusArg {
    Queued,
    Pending,
    Running,
    Completed,
    Failed,
    ManualIntervention,
}

impl From<CheckpointJobStatusArg> for CheckpointJobStatus {
    fn from(v: CheckpointJobStatusArg) -> Self {
        match v {
            CheckpointJobStatusArg::Queued => CheckpointJobStatus::Queued,
            CheckpointJobStatusArg::Pending => CheckpointJobStatus::Pending,
            CheckpointJobStatusArg::Running => CheckpointJobStatus::Running,
            CheckpointJobStatusArg::Completed => CheckpointJobStatus::Completed,
            CheckpointJobStatusArg::Failed => CheckpointJobStatus::Failed,
            CheckpointJobStatusArg::ManualIntervention => CheckpointJobStatus::ManualIntervention,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { EnvFilter::new("kg=debug") } else { EnvFilter::new("kg=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = kg_config::load_config(cli.config.as_deref()).context("load config")?;

    match cli.command {
        Commands::Ingest { seed, continue_on_error, format } => {
            cmd_ingest(&config, &seed, continue_on_error, format).await
        }
        Commands::Query { seed, filter, format } => cmd_query(&config, seed.as_deref(), &filter, format).await,
        Commands::Checkpoint { action } => match action {
            CheckpointCommands::Create { seed, seed_entities, reason, hops, format } => {
                cmd_checkpoint_create(&config, seed.as_deref(), seed_entities, reason, hops, format).await
            }
            CheckpointCommands::List { jobs, statuses, format } => cmd_checkpoint_list(&jobs, statuses, format).await,
        },
        Commands::Validate { seed, batch_size, timeline_limit, auto_repair, dry_run, max_entities, format } => {
            cmd_validate(&config, seed.as_deref(), batch_size, timeline_limit, auto_repair, dry_run, max_entities, format)
                .await
        }
        Commands::Schema { kind } => cmd_schema(kind),
        Commands::ConfigCheck { file } => cmd_config_check(file.as_deref()),
    }
}

fn new_facade(config: &kg_config::GraphConfig) -> Facade<InMemoryGraphStore, InMemoryRelationalStore> {
    let graph = InMemoryGraphStore::new(config.bulk_writer.to_telemetry_thresholds());
    let relational = InMemoryRelationalStore::new();
    Facade::new(graph, relational, config.checkpoint.to_runner_config())
}

async fn seed_facade(facade: &Facade<InMemoryGraphStore, InMemoryRelationalStore>, seed: Option<&std::path::Path>) -> Result<()> {
    let Some(path) = seed else { return Ok(()) };
    let seed_file = commands::load_seed_file(path)?;
    let mut queries = Vec::with_capacity(seed_file.entities.len() + seed_file.relationships.len());
    queries.extend(seed_file.entities.into_iter().map(|e| BulkQuery::UpsertEntity(Box::new(e))));
    queries.extend(seed_file.relationships.into_iter().map(|r| BulkQuery::UpsertRelationship(Box::new(r))));
    facade
        .bulk_write(queries, BulkOptions { continue_on_error: false }, 0)
        .await
        .context("seed facade from file")?;
    Ok(())
}

async fn cmd_ingest(
    config: &kg_config::GraphConfig,
    seed: &std::path::Path,
    continue_on_error: bool,
    format: OutputFormat,
) -> Result<()> {
    let facade = new_facade(config);
    let seed_file = commands::load_seed_file(seed)?;
    let mut queries = Vec::with_capacity(seed_file.entities.len() + seed_file.relationships.len());
    queries.extend(seed_file.entities.into_iter().map(|e| BulkQuery::UpsertEntity(Box::new(e))));
    queries.extend(seed_file.relationships.into_iter().map(|r| BulkQuery::UpsertRelationship(Box::new(r))));

    let result = facade.bulk_write(queries, BulkOptions { continue_on_error }, 0).await.context("run ingest")?;
    println!("{}", Formatter::new(format).format_bulk_result(&result));
    Ok(())
}

async fn cmd_query(
    config: &kg_config::GraphConfig,
    seed: Option<&std::path::Path>,
    filter: &std::path::Path,
    format: OutputFormat,
) -> Result<()> {
    let facade = new_facade(config);
    seed_facade(&facade, seed).await?;
    let query = commands::load_relationship_query(filter)?;
    let rels = facade.query_relationships(&query).await.context("run query")?;
    println!("{}", Formatter::new(format).format_relationships(&rels));
    Ok(())
}

async fn cmd_checkpoint_create(
    config: &kg_config::GraphConfig,
    seed: Option<&std::path::Path>,
    seed_entities: Vec<String>,
    reason: CheckpointReasonArg,
    hops: u32,
    format: OutputFormat,
) -> Result<()> {
    let facade = new_facade(config);
    seed_facade(&facade, seed).await?;
    let params = CheckpointParams { reason: reason.into(), hops, window: None };
    let checkpoint_id = facade
        .create_checkpoint_now(&seed_entities, params, chrono::Utc::now())
        .await
        .context("create checkpoint")?;
    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            println!("{}", serde_json::json!({"checkpoint_id": checkpoint_id}))
        }
        _ => println!("checkpoint_id: {checkpoint_id}"),
    }
    Ok(())
}

async fn cmd_checkpoint_list(jobs: &std::path::Path, statuses: Vec<CheckpointJobStatusArg>, format: OutputFormat) -> Result<()> {
    let relational = InMemoryRelationalStore::new();
    for job in commands::load_checkpoint_jobs(jobs)? {
        kg_relational_store::RelationalStore::upsert_checkpoint_job(&relational, job).await.context("seed checkpoint jobs")?;
    }

    let wanted: Vec<CheckpointJobStatus> = if statuses.is_empty() {
        vec![
            CheckpointJobStatus::Queued,
            CheckpointJobStatus::Pending,
            CheckpointJobStatus::Running,
            CheckpointJobStatus::Completed,
            CheckpointJobStatus::Failed,
            CheckpointJobStatus::ManualIntervention,
        ]
    } else {
        statuses.into_iter().map(Into::into).collect()
    };

    let rows = kg_relational_store::RelationalStore::load_checkpoint_jobs_by_status(&relational, &wanted)
        .await
        .context("list checkpoint jobs")?;
    println!("{}", Formatter::new(format).format_checkpoint_jobs(&rows));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_validate(
    config: &kg_config::GraphConfig,
    seed: Option<&std::path::Path>,
    batch_size: Option<u32>,
    timeline_limit: Option<u32>,
    auto_repair: bool,
    dry_run: bool,
    max_entities: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let facade = new_facade(config);
    seed_facade(&facade, seed).await?;
    let options = ValidatorOptions {
        batch_size: batch_size.unwrap_or(config.validator.batch_size),
        timeline_limit: timeline_limit.unwrap_or(config.validator.timeline_limit),
        auto_repair,
        dry_run,
        max_entities,
    };
    let report = facade.validate(options, chrono::Utc::now()).await.context("run validator")?;
    println!("{}", Formatter::new(format).format_validation_report(&report));
    Ok(())
}

fn cmd_schema(kind: SchemaArg) -> Result<()> {
    let sk = match kind {
        SchemaArg::Entity => SchemaKind::Entity,
        SchemaArg::Relationship => SchemaKind::Relationship,
        SchemaArg::RelationshipQuery => SchemaKind::RelationshipQuery,
        SchemaArg::CheckpointJob => SchemaKind::CheckpointJob,
        SchemaArg::Config => SchemaKind::Config,
    };
    let json = commands::schema_json(sk)?;
    println!("{json}");
    Ok(())
}

fn cmd_config_check(file: Option<&std::path::Path>) -> Result<()> {
    for line in commands::config_check(file)? {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_reason_arg_maps_every_variant() {
        assert_eq!(CheckpointReason::from(CheckpointReasonArg::Daily), CheckpointReason::Daily);
        assert_eq!(CheckpointReason::from(CheckpointReasonArg::Incident), CheckpointReason::Incident);
        assert_eq!(CheckpointReason::from(CheckpointReasonArg::Manual), CheckpointReason::Manual);
    }

    #[test]
    fn checkpoint_job_status_arg_maps_every_variant() {
        assert_eq!(CheckpointJobStatus::from(CheckpointJobStatusArg::Queued), CheckpointJobStatus::Queued);
        assert_eq!(
            CheckpointJobStatus::from(CheckpointJobStatusArg::ManualIntervention),
            CheckpointJobStatus::ManualIntervention
        );
    }
}
