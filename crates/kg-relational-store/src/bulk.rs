//! Bulk-write transaction semantics shared with the graph store (spec
//! §4.5 "All bulk writes use the same telemetry wrapper as §4.4").
//!
//! The control-flow is identical to `kg_graph_store::run_bulk_batch`; it is
//! duplicated here rather than depending on `kg-graph-store` directly so
//! the two store adapters stay independently deployable, each only taking
//! a dependency on the shared `kg-telemetry` crate.

use kg_error::KgError;
use kg_telemetry::{BatchMode, BulkWriteTelemetry};

/// Options controlling a relational bulk batch's transactional behavior,
/// identical in meaning to `kg_graph_store::BulkOptions`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationalBulkOptions {
    /// When `false` (default), one transaction wraps the whole batch and
    /// any failure rolls it back. When `true`, each write is independent.
    pub continue_on_error: bool,
}

/// Run `writes` through `apply_one`, honoring [`RelationalBulkOptions`] and
/// recording telemetry on `telemetry` regardless of outcome.
pub async fn run_relational_bulk_batch<T, F, Fut>(
    telemetry: &BulkWriteTelemetry,
    writes: Vec<T>,
    options: RelationalBulkOptions,
    queue_depth: u32,
    mut apply_one: F,
) -> Result<Vec<Result<(), KgError>>, KgError>
where
    F: FnMut(T) -> Fut,
    Fut: std::future::Future<Output = Result<(), KgError>>,
{
    let mode = if options.continue_on_error {
        BatchMode::Independent
    } else {
        BatchMode::Transaction
    };
    let batch_size = writes.len() as u32;
    let guard = telemetry.start_batch(batch_size, options.continue_on_error, mode, queue_depth);

    if options.continue_on_error {
        let mut outcomes = Vec::with_capacity(writes.len());
        let mut any_err = false;
        for w in writes {
            let outcome = apply_one(w).await;
            if outcome.is_err() {
                any_err = true;
            }
            outcomes.push(outcome);
        }
        guard.finish(!any_err, None);
        Ok(outcomes)
    } else {
        let mut outcomes = Vec::with_capacity(writes.len());
        for w in writes {
            match apply_one(w).await {
                Ok(()) => outcomes.push(Ok(())),
                Err(e) => {
                    guard.finish(false, Some(e.to_string()));
                    return Err(e);
                }
            }
        }
        guard.finish(true, None);
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_error::ErrorCode;
    use kg_telemetry::TelemetryThresholds;

    #[tokio::test]
    async fn independent_mode_records_all_outcomes() {
        let telemetry = BulkWriteTelemetry::new(TelemetryThresholds::default());
        let writes = vec![1, 2, 3];
        let outcomes = run_relational_bulk_batch(
            &telemetry,
            writes,
            RelationalBulkOptions {
                continue_on_error: true,
            },
            0,
            |n| async move {
                if n == 2 {
                    Err(KgError::new(ErrorCode::RelationalStoreFailed, "bad row"))
                } else {
                    Ok(())
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[1].is_err());
        assert_eq!(telemetry.metrics().total_batches, 1);
    }

    #[tokio::test]
    async fn transaction_mode_stops_on_first_error() {
        let telemetry = BulkWriteTelemetry::new(TelemetryThresholds::default());
        let result = run_relational_bulk_batch(
            &telemetry,
            vec![1, 2, 3],
            RelationalBulkOptions::default(),
            0,
            |n| async move {
                if n == 2 {
                    Err(KgError::new(ErrorCode::RelationalStoreFailed, "bad row"))
                } else {
                    Ok(())
                }
            },
        )
        .await;
        assert!(result.is_err());
    }
}
