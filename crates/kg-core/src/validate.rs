//! Relationship invariant checks (spec §3.3).

use crate::relationship::Relationship;
use std::collections::HashSet;
use std::fmt;

/// A single validation failure found in a [`Relationship`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `id` is empty.
    MissingId,
    /// `fromEntityId` or `toEntityId` is empty.
    MissingEndpoint {
        /// Which endpoint is missing (`"from"` or `"to"`).
        endpoint: &'static str,
    },
    /// An inferred edge has no confidence or a confidence below the floor
    /// (invariant 6).
    ConfidenceBelowFloor {
        /// The edge's confidence, if present at all.
        confidence: Option<f64>,
        /// The configured floor it was compared against.
        floor: f64,
    },
    /// `resolutionState=resolved` but `toRef` is not an entity/fileSymbol
    /// target, or vice versa for `unresolved` (invariant 5).
    ResolutionStateMismatch {
        /// Description of the mismatch.
        reason: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId => write!(f, "relationship id must not be empty"),
            Self::MissingEndpoint { endpoint } => {
                write!(f, "{endpoint} entity id must not be empty")
            }
            Self::ConfidenceBelowFloor { confidence, floor } => write!(
                f,
                "confidence {confidence:?} is below the floor {floor}"
            ),
            Self::ResolutionStateMismatch { reason } => {
                write!(f, "resolution state mismatch: {reason}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a single relationship's structural invariants (ids present,
/// confidence floor for inferred edges, resolution-state/target-kind
/// agreement). Does not check cross-edge invariants; see
/// [`check_at_most_one_active`] for invariant 3.
///
/// # Errors
///
/// Returns every problem found, accumulated rather than short-circuited.
pub fn validate_relationship(
    rel: &Relationship,
    min_inferred_confidence: f64,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if rel.id.is_empty() {
        errors.push(ValidationError::MissingId);
    }
    if rel.from_entity_id.is_empty() {
        errors.push(ValidationError::MissingEndpoint { endpoint: "from" });
    }
    if rel.to_entity_id.is_empty() {
        errors.push(ValidationError::MissingEndpoint { endpoint: "to" });
    }

    if let Some(attrs) = &rel.attrs {
        if attrs.inferred {
            match attrs.confidence {
                Some(c) if c >= min_inferred_confidence => {}
                other => errors.push(ValidationError::ConfidenceBelowFloor {
                    confidence: other,
                    floor: min_inferred_confidence,
                }),
            }
        }

        if let (Some(state), Some(to_ref)) = (attrs.resolution_state, &attrs.to_ref) {
            use crate::relationship::ResolutionState::{Partial, Resolved, Unresolved};
            let resolved_kind = to_ref.is_resolved_kind();
            let mismatch = match state {
                Resolved if !resolved_kind => Some("resolved state but target is not entity/fileSymbol"),
                Unresolved if resolved_kind => Some("unresolved state but target is entity/fileSymbol"),
                Partial | Resolved | Unresolved => None,
            };
            if let Some(reason) = mismatch {
                errors.push(ValidationError::ResolutionStateMismatch {
                    reason: reason.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check invariant 3 (at-most-one-active-edge) across a batch of
/// relationships sharing the same store: for any `(from, to, type)` triple,
/// at most one edge has `valid_to == None`.
///
/// Returns the triples that violate the invariant, each paired with the
/// number of active edges found.
#[must_use]
pub fn check_at_most_one_active(rels: &[Relationship]) -> Vec<(String, String, crate::relationship::RelationshipType, usize)> {
    use std::collections::HashMap;

    let mut active_counts: HashMap<(String, String, crate::relationship::RelationshipType), usize> =
        HashMap::new();
    for r in rels.iter().filter(|r| r.is_active()) {
        *active_counts.entry(r.triple_key()).or_insert(0) += 1;
    }
    active_counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((from, to, ty), count)| (from, to, ty, count))
        .collect()
}

/// Check invariant 6 for a batch: no persisted inferred edge may have
/// `confidence < floor`. Returns the offending edge ids.
#[must_use]
pub fn find_edges_below_floor(rels: &[Relationship], floor: f64) -> Vec<String> {
    rels.iter()
        .filter(|r| {
            r.attrs
                .as_ref()
                .is_some_and(|a| a.inferred && a.confidence.is_none_or(|c| c < floor))
        })
        .map(|r| r.id.clone())
        .collect()
}

/// Check invariant 1 (entity id uniqueness) across a batch of entity ids.
/// Returns any id that appears more than once.
#[must_use]
pub fn find_duplicate_entity_ids<'a, I: IntoIterator<Item = &'a str>>(ids: I) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dupes = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            dupes.insert(id.to_string());
        }
    }
    dupes.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::{CodeAttributes, RelationshipType, Target};
    use chrono::Utc;

    fn base_rel() -> Relationship {
        let now = Utc::now();
        Relationship {
            id: "rel:1".into(),
            from_entity_id: "sym:a".into(),
            to_entity_id: "sym:b".into(),
            r#type: RelationshipType::Calls,
            created: now,
            last_modified: now,
            version: 1,
            metadata: Default::default(),
            site_id: None,
            site_hash: None,
            evidence: vec![],
            locations: vec![],
            sites: vec![],
            attrs: None,
            valid_from: Some(now),
            valid_to: None,
            last_seen_at: Some(now),
            change_set_id: None,
        }
    }

    #[test]
    fn rejects_empty_ids() {
        let mut r = base_rel();
        r.id = String::new();
        r.from_entity_id = String::new();
        let errs = validate_relationship(&r, 0.4).unwrap_err();
        assert!(errs.contains(&ValidationError::MissingId));
        assert!(errs.contains(&ValidationError::MissingEndpoint { endpoint: "from" }));
    }

    #[test]
    fn inferred_edge_below_floor_is_rejected() {
        let mut r = base_rel();
        r.attrs = Some(CodeAttributes {
            inferred: true,
            confidence: Some(0.2),
            ..Default::default()
        });
        let errs = validate_relationship(&r, 0.4).unwrap_err();
        assert!(matches!(
            errs[0],
            ValidationError::ConfidenceBelowFloor { .. }
        ));
    }

    #[test]
    fn inferred_edge_at_floor_passes() {
        let mut r = base_rel();
        r.attrs = Some(CodeAttributes {
            inferred: true,
            confidence: Some(0.4),
            ..Default::default()
        });
        assert!(validate_relationship(&r, 0.4).is_ok());
    }

    #[test]
    fn at_most_one_active_detects_duplicates() {
        let mut a = base_rel();
        let mut b = base_rel();
        b.id = "rel:2".into();
        a.valid_to = None;
        b.valid_to = None;
        let violations = check_at_most_one_active(&[a, b]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].3, 2);
    }

    #[test]
    fn at_most_one_active_allows_one_active_one_closed() {
        let mut a = base_rel();
        let mut b = base_rel();
        b.id = "rel:2".into();
        a.valid_to = None;
        b.valid_to = Some(Utc::now());
        let violations = check_at_most_one_active(&[a, b]);
        assert!(violations.is_empty());
    }

    #[test]
    fn resolution_state_mismatch_detected() {
        let mut r = base_rel();
        r.attrs = Some(CodeAttributes {
            resolution_state: Some(crate::relationship::ResolutionState::Resolved),
            to_ref: Some(Target::External { name: "foo".into() }),
            ..Default::default()
        });
        let errs = validate_relationship(&r, 0.4).unwrap_err();
        assert!(matches!(
            errs[0],
            ValidationError::ResolutionStateMismatch { .. }
        ));
    }

    #[test]
    fn duplicate_entity_ids_found() {
        let dupes = find_duplicate_entity_ids(["a", "b", "a", "c", "b"]);
        assert_eq!(dupes.len(), 2);
    }
}
