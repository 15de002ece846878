// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Inferred-edge confidence scorer (spec §4.3, component C5).
//!
//! Pure function: the same [`ScoreInput`] always produces the same score.
//! No I/O, no shared state — this crate exists to make the additive
//! scoring rules independently testable away from the builders that
//! produce the raw signals.

use kg_core::relationship::RelationshipType;

/// The signal set consulted by [`score`] (spec §4.3).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreInput<'a> {
    /// The relationship type being scored; determines the base score.
    pub relation_type: RelationshipType,
    /// Whether a type-checker call contributed to resolving this edge.
    pub used_type_checker: bool,
    /// Whether the target symbol is exported.
    pub is_exported: bool,
    /// The simple name's character length.
    pub name_length: usize,
    /// The resolved or placeholder target id string.
    pub to_id: &'a str,
    /// Re-export/import traversal depth, when applicable.
    pub import_depth: Option<u32>,
}

fn base_score(relation_type: RelationshipType) -> f64 {
    match relation_type {
        RelationshipType::Calls => 0.85,
        RelationshipType::References | RelationshipType::Reads | RelationshipType::Writes => 0.6,
        RelationshipType::DependsOn => 0.55,
        RelationshipType::TypeUses | RelationshipType::ReturnsType | RelationshipType::ParamType => 0.75,
        _ => 0.5,
    }
}

/// Compute a confidence score in `[0, 1]` for an inferred edge (spec §4.3).
///
/// Base score by `relationType`, then additive signals clamped to `[0,1]`
/// at the end (not after each step, so intermediate over/undershoot does
/// not change the final clamped value).
#[must_use]
pub fn score(input: ScoreInput<'_>) -> f64 {
    let mut s = base_score(input.relation_type);

    if input.used_type_checker {
        s += 0.15;
    }
    if input.is_exported {
        s += 0.05;
    }
    if input.name_length >= 5 {
        s += 0.05;
    } else if input.name_length < 3 {
        s -= 0.15;
    }

    if input.to_id.starts_with("external:") {
        s -= 0.10;
    } else if input.to_id.starts_with("file:") {
        s += 0.05;
    } else if !input.to_id.is_empty() && kg_core::ids::is_plausible_entity_id(input.to_id) {
        s += 0.10;
    }

    match input.import_depth {
        Some(1) => s += 0.05,
        Some(2) => {}
        Some(d) if d >= 3 => s -= 0.05,
        _ => {}
    }

    s.clamp(0.0, 1.0)
}

/// Returns `true` when `score` meets or exceeds `floor`; inferred edges
/// scoring below the floor must not be persisted (spec §3.3 invariant 6,
/// §4.3 "Floor").
#[must_use]
pub fn meets_floor(score: f64, floor: f64) -> bool {
    score >= floor
}
