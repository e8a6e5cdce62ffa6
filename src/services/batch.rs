//! Batch validation across many shipments
//!
//! Each shipment is fetched and validated on the blocking pool,
//! independently of the others. A retrieval failure or a crashed task is kept
//! per shipment and never aborts the batch. Every key gets exactly one
//! outcome, in input order.

use crate::domain::types::ShipmentKey;
use crate::infra::metrics::Metrics;
use crate::io::source::{RecordSource, SourceError};
use crate::services::validator::{validate_shipment, ShipmentReport, Thresholds};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Why a shipment in a batch has no report
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Validation task panicked or was cancelled
    #[error("validation task failed: {0}")]
    Task(String),
}

/// Outcome for one shipment in a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub key: ShipmentKey,
    pub result: Result<ShipmentReport, BatchError>,
}

impl BatchOutcome {
    /// Shipment was retrieved and every rule passed
    pub fn passed(&self) -> bool {
        self.result.as_ref().is_ok_and(ShipmentReport::passed)
    }
}

/// Fetch and validate one shipment synchronously
pub fn validate_from_source(
    source: &dyn RecordSource,
    key: &ShipmentKey,
    thresholds: Thresholds,
    metrics: &Metrics,
) -> Result<ShipmentReport, SourceError> {
    let events = source.fetch(key).inspect_err(|e| {
        metrics.record_source_error();
        error!(shipment = %key, error = %e, "source_error");
    })?;
    let report = validate_shipment(key, &events, thresholds);
    metrics.record_shipment(&report);
    Ok(report)
}

/// Validate every shipment in `keys`, at most `max_concurrency` at a time
pub async fn validate_batch(
    source: Arc<dyn RecordSource>,
    keys: Vec<ShipmentKey>,
    thresholds: Thresholds,
    metrics: Arc<Metrics>,
    max_concurrency: usize,
) -> Vec<BatchOutcome> {
    let total = keys.len();
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (idx, key) in keys.iter().cloned().enumerate() {
        let source = Arc::clone(&source);
        let metrics = Arc::clone(&metrics);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            // The semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            let result = tokio::task::spawn_blocking(move || {
                let result = validate_from_source(source.as_ref(), &key, thresholds, &metrics)
                    .map_err(BatchError::from);
                BatchOutcome { key, result }
            })
            .await;
            (idx, result)
        });
    }

    let mut slots: Vec<Option<BatchOutcome>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, Ok(outcome))) => slots[idx] = Some(outcome),
            Ok((idx, Err(e))) => {
                error!(shipment = %keys[idx], error = %e, "validation_task_failed");
                slots[idx] = Some(BatchOutcome {
                    key: keys[idx].clone(),
                    result: Err(BatchError::Task(e.to_string())),
                });
            }
            Err(e) => error!(error = %e, "validation_task_failed"),
        }
    }

    // A slot left empty belongs to a task that never reported back
    let outcomes: Vec<BatchOutcome> = slots
        .into_iter()
        .zip(keys)
        .map(|(slot, key)| {
            slot.unwrap_or_else(|| BatchOutcome {
                key,
                result: Err(BatchError::Task("task did not complete".to_string())),
            })
        })
        .collect();
    let passed = outcomes.iter().filter(|o| o.passed()).count();
    let errors = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(shipments = %total, passed = %passed, errors = %errors, "batch_completed");
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{parse_timestamp, Event};
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// In-memory source; keys mapped to `None` simulate an unreachable store
    struct MemorySource {
        shipments: HashMap<ShipmentKey, Option<Vec<Event>>>,
    }

    impl RecordSource for MemorySource {
        fn fetch(&self, key: &ShipmentKey) -> Result<Vec<Event>, SourceError> {
            match self.shipments.get(key) {
                Some(Some(events)) => Ok(events.clone()),
                Some(None) => Err(SourceError::Unavailable {
                    path: PathBuf::from("memory"),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "down"),
                }),
                None => Ok(Vec::new()),
            }
        }

        fn shipments(&self) -> Result<Vec<ShipmentKey>, SourceError> {
            let mut keys: Vec<ShipmentKey> = self.shipments.keys().cloned().collect();
            keys.sort();
            Ok(keys)
        }
    }

    fn ev(key: &ShipmentKey, station: &str, direction: &str, at: &str) -> Event {
        Event::new(key, station, direction.parse().unwrap(), parse_timestamp(at).unwrap())
    }

    fn source() -> Arc<dyn RecordSource> {
        let good = ShipmentKey::new("Acme", "good");
        let late = ShipmentKey::new("Acme", "late");
        let down = ShipmentKey::new("Acme", "down");
        let shipments = HashMap::from([
            (
                good.clone(),
                Some(vec![
                    ev(&good, "Depot", "in", "2024-03-01 06:00"),
                    ev(&good, "Depot", "out", "2024-03-01 07:00"),
                    ev(&good, "Truck", "in", "2024-03-01 07:04"),
                ]),
            ),
            (
                late.clone(),
                Some(vec![
                    ev(&late, "Depot", "out", "2024-03-01 07:00"),
                    ev(&late, "Truck", "in", "2024-03-01 07:40"),
                ]),
            ),
            (down, None),
        ]);
        Arc::new(MemorySource { shipments })
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let keys = vec![
            ShipmentKey::new("Acme", "late"),
            ShipmentKey::new("Acme", "good"),
            ShipmentKey::new("Acme", "missing"),
        ];
        let metrics = Arc::new(Metrics::new());
        let outcomes =
            validate_batch(source(), keys.clone(), Thresholds::default(), metrics.clone(), 2).await;

        let order: Vec<&ShipmentKey> = outcomes.iter().map(|o| &o.key).collect();
        assert_eq!(order, keys.iter().collect::<Vec<_>>());
        assert!(!outcomes[0].passed());
        assert!(outcomes[1].passed());
        // No records is a failed validation, not a retrieval error
        let missing = outcomes[2].result.as_ref().unwrap();
        assert!(!missing.passed());
        assert_eq!(metrics.shipments_total(), 3);
    }

    #[tokio::test]
    async fn test_source_error_is_isolated() {
        let keys = vec![ShipmentKey::new("Acme", "down"), ShipmentKey::new("Acme", "good")];
        let metrics = Arc::new(Metrics::new());
        let outcomes = validate_batch(source(), keys, Thresholds::default(), metrics.clone(), 4).await;

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0].result,
            Err(BatchError::Source(SourceError::Unavailable { .. }))
        ));
        assert!(!outcomes[0].passed());
        assert!(outcomes[1].passed());
        assert_eq!(metrics.source_errors(), 1);
        assert_eq!(metrics.shipments_total(), 1);
    }

    /// Source whose fetch panics for one transport id
    struct CrashingSource {
        inner: Arc<dyn RecordSource>,
    }

    impl RecordSource for CrashingSource {
        fn fetch(&self, key: &ShipmentKey) -> Result<Vec<Event>, SourceError> {
            if key.transport_id == "crash" {
                panic!("record decoder crashed");
            }
            self.inner.fetch(key)
        }

        fn shipments(&self) -> Result<Vec<ShipmentKey>, SourceError> {
            self.inner.shipments()
        }
    }

    #[tokio::test]
    async fn test_crashed_task_keeps_its_slot() {
        let source: Arc<dyn RecordSource> = Arc::new(CrashingSource { inner: source() });
        let keys = vec![ShipmentKey::new("Acme", "crash"), ShipmentKey::new("Acme", "good")];
        let outcomes =
            validate_batch(source, keys.clone(), Thresholds::default(), Arc::new(Metrics::new()), 2)
                .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].key, keys[0]);
        assert!(matches!(outcomes[0].result, Err(BatchError::Task(_))));
        assert!(!outcomes[0].passed());
        assert!(outcomes[1].passed());
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_runs() {
        let metrics = Arc::new(Metrics::new());
        let outcomes = validate_batch(
            source(),
            vec![ShipmentKey::new("Acme", "good")],
            Thresholds::default(),
            metrics,
            0,
        )
        .await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].passed());
    }

    #[test]
    fn test_validate_from_source_records_metrics() {
        let metrics = Metrics::new();
        let src = source();
        let report = validate_from_source(
            src.as_ref(),
            &ShipmentKey::new("Acme", "late"),
            Thresholds::default(),
            &metrics,
        )
        .unwrap();
        assert!(!report.passed());
        assert_eq!(metrics.shipments_failed(), 1);
    }
}
