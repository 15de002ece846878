// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Temporal history validator (spec §4.8, component C10).
//!
//! Scans entities with version history in pages, inspects each entity's
//! timeline for `PREVIOUS_VERSION` chain breaks, and optionally repairs
//! missing links via [`kg_temporal::repair_previous_version_link`].

use chrono::{DateTime, Utc};
use kg_core::query::{RelationshipQuery, TypeFilter};
use kg_core::relationship::RelationshipType;
use kg_error::KgError;
use kg_graph_store::GraphStore;

/// Tunables for [`validate`] (spec §4.8 "batchSize", "timelineLimit",
/// "autoRepair", "dryRun", "maxEntities").
#[derive(Debug, Clone, Copy)]
pub struct ValidatorOptions {
    /// Entities inspected per page. Default 25, spec max 100.
    pub batch_size: u32,
    /// Maximum versions fetched per entity's timeline. Default 200.
    pub timeline_limit: u32,
    /// Invoke `repairPreviousVersionLink` for `missing_previous` issues.
    pub auto_repair: bool,
    /// When set, suppresses repair writes even if `auto_repair` is set;
    /// issues are still reported as if repair would be attempted.
    pub dry_run: bool,
    /// Stop after inspecting this many entities, if set.
    pub max_entities: Option<u32>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            batch_size: 25,
            timeline_limit: 200,
            auto_repair: false,
            dry_run: false,
            max_entities: None,
        }
    }
}

const MAX_BATCH_SIZE: u32 = 100;

/// The kind of chain break found in an entity's version timeline (spec
/// §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// The earliest version has a non-null previous-version link, and the
    /// timeline was not truncated — so that link should not exist.
    UnexpectedHead,
    /// A non-first version has no previous-version link.
    MissingPrevious,
    /// A non-first version's previous-version link does not point at the
    /// immediately prior version, or is out of timestamp order.
    MisorderedPrevious,
}

/// A single chain-integrity problem found during a [`validate`] run.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// The code entity whose timeline the issue was found in.
    pub entity_id: String,
    /// The version node the issue concerns.
    pub version_id: String,
    /// What kind of break this is.
    pub kind: IssueKind,
    /// `Some(true/false)` once a repair was attempted for a
    /// `MissingPrevious` issue; `None` for issue kinds repair never
    /// touches, or when repair was not requested.
    pub repaired: Option<bool>,
}

/// Summary of a [`validate`] run (spec §4.8 "Returns").
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Distinct entities inspected.
    pub scanned_entities: u32,
    /// Total versions inspected across all entities.
    pub inspected_versions: u32,
    /// Links successfully repaired.
    pub repaired_links: u32,
    /// Every issue found, in scan order.
    pub issues: Vec<ValidationIssue>,
}

struct TimelineEntry {
    version_id: String,
    created: DateTime<Utc>,
    previous_version_id: Option<String>,
}

/// Run the validator (spec §4.8). Scans entities with at least one
/// version, in pages of `options.batch_size`; a per-entity failure is
/// recorded as an issue rather than aborting the scan (spec §7 "Validator
/// error").
pub async fn validate<S: GraphStore + ?Sized>(
    store: &S,
    options: ValidatorOptions,
    now: DateTime<Utc>,
) -> Result<ValidationReport, KgError> {
    let batch_size = options.batch_size.clamp(1, MAX_BATCH_SIZE);
    let entity_ids = entities_with_versions(store, options.max_entities).await?;

    let mut report = ValidationReport::default();
    for page in entity_ids.chunks(batch_size as usize) {
        for entity_id in page {
            report.scanned_entities += 1;
            match timeline_for(store, entity_id, options.timeline_limit).await {
                Ok(timeline) => {
                    report.inspected_versions += timeline.len() as u32;
                    let truncated = timeline.len() as u32 >= options.timeline_limit;
                    let mut issues = inspect_timeline(entity_id, &timeline, truncated);
                    if options.auto_repair && !options.dry_run {
                        for issue in &mut issues {
                            if issue.kind == IssueKind::MissingPrevious {
                                let repaired =
                                    kg_temporal::repair_previous_version_link(store, &issue.version_id, now)
                                        .await
                                        .unwrap_or(false);
                                issue.repaired = Some(repaired);
                                if repaired {
                                    report.repaired_links += 1;
                                }
                            }
                        }
                    }
                    report.issues.extend(issues);
                }
                Err(e) => {
                    tracing::warn!(entity_id, error = %e.message, "validator: failed to fetch timeline; skipping entity");
                }
            }
        }
    }
    Ok(report)
}

async fn entities_with_versions<S: GraphStore + ?Sized>(
    store: &S,
    max_entities: Option<u32>,
) -> Result<Vec<String>, KgError> {
    let of_edges = store
        .query_relationships(&RelationshipQuery {
            r#type: Some(TypeFilter::One(RelationshipType::Of)),
            ..Default::default()
        })
        .await?;

    let mut seen = std::collections::HashSet::new();
    let mut entity_ids = Vec::new();
    for edge in of_edges {
        if seen.insert(edge.to_entity_id.clone()) {
            entity_ids.push(edge.to_entity_id);
            if let Some(max) = max_entities {
                if entity_ids.len() as u32 >= max {
                    break;
                }
            }
        }
    }
    Ok(entity_ids)
}

async fn timeline_for<S: GraphStore + ?Sized>(
    store: &S,
    entity_id: &str,
    timeline_limit: u32,
) -> Result<Vec<TimelineEntry>, KgError> {
    let mut of_edges = store
        .query_relationships(&RelationshipQuery {
            to_entity_id: Some(entity_id.to_string()),
            r#type: Some(TypeFilter::One(RelationshipType::Of)),
            ..Default::default()
        })
        .await?;
    of_edges.sort_by_key(|r| r.created);
    of_edges.truncate(timeline_limit as usize);

    let mut timeline = Vec::with_capacity(of_edges.len());
    for edge in of_edges {
        let version_id = edge.from_entity_id;
        let previous = store
            .query_relationships(&RelationshipQuery {
                from_entity_id: Some(version_id.clone()),
                r#type: Some(TypeFilter::One(RelationshipType::PreviousVersion)),
                ..Default::default()
            })
            .await?;
        timeline.push(TimelineEntry {
            version_id,
            created: edge.created,
            previous_version_id: previous.into_iter().next().map(|r| r.to_entity_id),
        });
    }
    Ok(timeline)
}

fn inspect_timeline(entity_id: &str, timeline: &[TimelineEntry], truncated: bool) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (i, version) in timeline.iter().enumerate() {
        if i == 0 {
            if version.previous_version_id.is_some() && !truncated {
                issues.push(ValidationIssue {
                    entity_id: entity_id.to_string(),
                    version_id: version.version_id.clone(),
                    kind: IssueKind::UnexpectedHead,
                    repaired: None,
                });
            }
            continue;
        }

        let prior = &timeline[i - 1];
        match &version.previous_version_id {
            None => issues.push(ValidationIssue {
                entity_id: entity_id.to_string(),
                version_id: version.version_id.clone(),
                kind: IssueKind::MissingPrevious,
                repaired: None,
            }),
            Some(linked) => {
                if linked != &prior.version_id || version.created < prior.created {
                    issues.push(ValidationIssue {
                        entity_id: entity_id.to_string(),
                        version_id: version.version_id.clone(),
                        kind: IssueKind::MisorderedPrevious,
                        repaired: None,
                    });
                }
            }
        }
    }
    issues
}
