//! Typed job payload (spec §4.7 `enqueue(payload)`), persisted as the
//! opaque `payload` column of [`kg_relational_store::SessionCheckpointJobRow`].

use chrono::{DateTime, Utc};
use kg_core::entity::CheckpointReason;
use kg_error::{ErrorCode, KgError};
use serde::{Deserialize, Serialize};

/// The arguments a checkpoint job carries between enqueue and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// The session this checkpoint is being created for.
    pub session_id: String,
    /// Seed entity ids to traverse from, deduplicated at enqueue time.
    pub seed_entities: Vec<String>,
    /// Why the checkpoint is being created.
    pub reason: CheckpointReason,
    /// Hop bound for the traversal.
    pub hops: u32,
    /// Optional time-travel instant to traverse as-of.
    pub window: Option<DateTime<Utc>>,
}

impl JobPayload {
    /// Construct a payload, deduplicating `seed_entities` while preserving
    /// first-occurrence order (spec §4.7 "dedupe seed entity ids").
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        seed_entities: Vec<String>,
        reason: CheckpointReason,
        hops: u32,
        window: Option<DateTime<Utc>>,
    ) -> Self {
        let mut seen = std::collections::HashSet::with_capacity(seed_entities.len());
        let deduped = seed_entities
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self { session_id, seed_entities: deduped, reason, hops, window }
    }

    pub(crate) fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("JobPayload always serializes")
    }

    pub(crate) fn from_value(value: &serde_json::Value) -> Result<Self, KgError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            KgError::new(ErrorCode::InvalidParameter, format!("malformed job payload: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_deduplicates_seed_entities_preserving_order() {
        let payload = JobPayload::new(
            "sess-1",
            vec!["a".into(), "b".into(), "a".into(), "c".into()],
            CheckpointReason::Manual,
            2,
            None,
        );
        assert_eq!(payload.seed_entities, vec!["a", "b", "c"]);
    }

    #[test]
    fn round_trips_through_json() {
        let payload = JobPayload::new("sess-1", vec!["a".into()], CheckpointReason::Daily, 1, None);
        let value = payload.to_value();
        let restored = JobPayload::from_value(&value).unwrap();
        assert_eq!(payload, restored);
    }

    #[test]
    fn from_value_rejects_malformed_payload() {
        let err = JobPayload::from_value(&serde_json::json!({"not": "a payload"})).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }
}
