//! Order Ingestion Pipeline
//!
//! Turns raw bus payloads into persisted orders. Each message is decoded,
//! checked for its mandatory identifiers and handed to the order service.
//! Records without an `order_uid` or `track_number` are dropped without an
//! error; redelivered records are harmless because persistence is
//! idempotent.

pub mod nats;

use futures_util::{Stream, StreamExt};
use orderly_core::{Order, OrderError, OrderResult, ValidationError};
use orderly_storage::OrderService;
use tracing::{debug, error, info, instrument};

use crate::telemetry::metrics::metrics;

pub use nats::NatsSubscriber;

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The order is durable and cached. Carries its `order_uid`.
    Persisted(String),
    /// The record lacked a mandatory field and was dropped.
    Discarded(ValidationError),
}

/// Counters returned when a message stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub persisted: usize,
    pub discarded: usize,
    pub failed: usize,
}

impl IngestStats {
    pub fn total(&self) -> usize {
        self.persisted + self.discarded + self.failed
    }
}

fn outcome_label(result: &OrderResult<IngestOutcome>) -> &'static str {
    match result {
        Ok(IngestOutcome::Persisted(_)) => "persisted",
        Ok(IngestOutcome::Discarded(_)) => "discarded",
        Err(OrderError::Decode(_)) => "decode_error",
        Err(_) => "failed",
    }
}

/// Bus message handler bound to an [`OrderService`].
#[derive(Clone, Debug)]
pub struct IngestPipeline {
    service: OrderService,
}

impl IngestPipeline {
    pub fn new(service: OrderService) -> Self {
        Self { service }
    }

    /// Process one raw payload.
    ///
    /// Decode failures and storage failures are returned to the caller;
    /// validation failures are not errors.
    #[instrument(skip_all, fields(bytes = payload.len()))]
    pub async fn process_message(&self, payload: &[u8]) -> OrderResult<IngestOutcome> {
        let result = self.handle(payload).await;
        if let Some(metrics) = metrics() {
            metrics.record_ingest(outcome_label(&result));
        }
        result
    }

    async fn handle(&self, payload: &[u8]) -> OrderResult<IngestOutcome> {
        let order = Order::from_json_slice(payload)?;

        if let Err(reason) = order.validate() {
            debug!(
                order_uid = %order.order_uid,
                %reason,
                "Discarding order without mandatory identifiers"
            );
            return Ok(IngestOutcome::Discarded(reason));
        }

        self.service.create_order(&order).await?;
        info!(order_uid = %order.order_uid, items = order.items.len(), "Order ingested");
        Ok(IngestOutcome::Persisted(order.order_uid))
    }

    /// Process a stream of payloads one at a time, in arrival order.
    ///
    /// A failed message is logged and skipped; the loop only ends with the
    /// stream.
    pub async fn consume<S, B>(&self, payloads: S) -> IngestStats
    where
        S: Stream<Item = B>,
        B: AsRef<[u8]>,
    {
        futures_util::pin_mut!(payloads);
        let mut stats = IngestStats::default();

        while let Some(payload) = payloads.next().await {
            match self.process_message(payload.as_ref()).await {
                Ok(IngestOutcome::Persisted(_)) => stats.persisted += 1,
                Ok(IngestOutcome::Discarded(_)) => stats.discarded += 1,
                Err(e) => {
                    stats.failed += 1;
                    error!(error = %e, "Error processing order message");
                }
            }
        }

        info!(
            persisted = stats.persisted,
            discarded = stats.discarded,
            failed = stats.failed,
            "Order stream ended"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderly_core::DecodeError;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(
            outcome_label(&Ok(IngestOutcome::Persisted("o1".to_string()))),
            "persisted"
        );
        assert_eq!(
            outcome_label(&Ok(IngestOutcome::Discarded(
                ValidationError::RequiredFieldMissing {
                    field: "order_uid".to_string()
                }
            ))),
            "discarded"
        );
        assert_eq!(
            outcome_label(&Err(OrderError::Decode(DecodeError::MalformedJson {
                line: 1,
                column: 1,
                reason: "eof".to_string(),
            }))),
            "decode_error"
        );
        assert_eq!(outcome_label(&Err(OrderError::not_found("o1"))), "failed");
    }

    #[test]
    fn test_stats_total() {
        let stats = IngestStats {
            persisted: 2,
            discarded: 1,
            failed: 3,
        };
        assert_eq!(stats.total(), 6);
    }
}
