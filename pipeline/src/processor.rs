//! Batch order processor.
//!
//! Consumes work items from the order queue and drives each order to a
//! terminal state:
//!
//! 1. Re-read the order from the store (the work item is only a pointer)
//! 2. Skip orders that are already terminal; re-announce `CONFIRMED` ones
//!    whose event never went out
//! 3. Charge the payment simulator
//! 4. Compare-and-set `PENDING → CONFIRMED`, publish `ORDER_CONFIRMED` and
//!    record the announcement on the order
//!
//! Any failure along the way takes the failure path: a best-effort
//! `PENDING → FAILED` with the reason, then a best-effort `ORDER_FAILED`
//! event. The item is reported failed either way so the queue can redeliver
//! or dead-letter it.
//!
//! Items in a batch are independent. They run concurrently up to
//! `max_concurrency`, each under its own deadline, and one item's failure
//! never affects another's outcome.

use crate::config::BatchConfig;
use crate::events::LifecycleEvent;
use crate::work_item::WorkItem;
use futures::stream::{self, StreamExt};
use order_pipeline_core::environment::Clock;
use order_pipeline_core::event_topic::{EventTopic, TopicError};
use order_pipeline_core::message::{Message, MessageError};
use order_pipeline_core::order_store::{OrderStore, OrderStoreError, StatusUpdate};
use order_pipeline_core::payment::{PaymentError, PaymentSimulator};
use order_pipeline_core::types::{Order, OrderId, OrderStatus, PaymentId};
use order_pipeline_runtime::deadline::{DeadlineExceeded, with_deadline};
use order_pipeline_runtime::metrics::{BatchMetrics, PaymentMetrics};
use order_pipeline_runtime::retry::{RetryPolicy, retry_with_predicate};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Instrument;

/// Why a single work item failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    /// The message body was not a work item.
    #[error("Malformed work item: {0}")]
    Malformed(#[from] MessageError),

    /// The order store failed.
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),

    /// The payment was declined.
    #[error("Payment declined: {reason}")]
    Declined {
        /// Decline reason
        reason: String,
    },

    /// The payment provider could not be reached.
    #[error("Payment unavailable: {0}")]
    PaymentUnavailable(String),

    /// The lifecycle event could not be published.
    #[error("Event publish failed: {0}")]
    Publish(#[from] TopicError),

    /// The item exceeded its deadline.
    #[error("Processing timed out: {0}")]
    Timeout(#[from] DeadlineExceeded),
}

impl ProcessingError {
    /// Short label used as a metrics tag.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Store(_) => "store_error",
            Self::Declined { .. } => "declined",
            Self::PaymentUnavailable(_) => "payment_unavailable",
            Self::Publish(_) => "publish_failed",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl From<PaymentError> for ProcessingError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined { reason } => Self::Declined { reason },
            PaymentError::Unavailable(reason) => Self::PaymentUnavailable(reason),
        }
    }
}

/// How a successfully processed item ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Charged, confirmed and announced.
    Confirmed {
        /// Payment reference
        payment_id: PaymentId,
    },
    /// The order was already `FAILED`, or `CONFIRMED` and announced.
    AlreadyTerminal {
        /// Status found in the store
        status: OrderStatus,
    },
    /// The order was `CONFIRMED` but unannounced; its event went out now.
    Reannounced,
    /// Another worker settled the order between our read and our write.
    Converged {
        /// Status the other worker wrote
        status: OrderStatus,
    },
}

impl ItemOutcome {
    /// Short label used as a metrics tag.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "confirmed",
            Self::AlreadyTerminal { .. } => "already_terminal",
            Self::Reannounced => "reannounced",
            Self::Converged { .. } => "converged",
        }
    }
}

/// One failed item in a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    /// Queue message id (what the queue needs to redeliver it)
    pub message_id: String,
    /// Order id, when the body could be decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    /// What went wrong
    #[serde(serialize_with = "display")]
    pub error: ProcessingError,
}

fn display<S: Serializer>(value: &impl fmt::Display, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Summary of one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Items that completed successfully
    pub processed: usize,
    /// Items that failed
    pub failed: usize,
    /// Orders of the successful items, in input order
    #[serde(rename = "processedOrders")]
    pub processed_order_ids: Vec<OrderId>,
    /// Details of the failed items, in input order
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    /// Message ids to report back for partial-batch acknowledgment.
    #[must_use]
    pub fn batch_item_failures(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.message_id.clone()).collect()
    }

    /// Whether every item succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Batch-level errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// Some items failed. The report covers every item.
    #[error("{} of {} items failed", .0.failed, .0.processed + .0.failed)]
    PartialFailure(BatchReport),
}

impl BatchError {
    /// The full batch report.
    #[must_use]
    pub const fn report(&self) -> &BatchReport {
        match self {
            Self::PartialFailure(report) => report,
        }
    }
}

struct ItemResult {
    message_id: String,
    order_id: Option<OrderId>,
    outcome: Result<ItemOutcome, ProcessingError>,
}

/// Processes batches of work items.
pub struct BatchOrderProcessor {
    store: Arc<dyn OrderStore>,
    topic: Arc<dyn EventTopic>,
    payments: Arc<dyn PaymentSimulator>,
    clock: Arc<dyn Clock>,
    config: BatchConfig,
    mark_failed_retry: RetryPolicy,
}

impl BatchOrderProcessor {
    /// Create a processor.
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStore>,
        topic: Arc<dyn EventTopic>,
        payments: Arc<dyn PaymentSimulator>,
        clock: Arc<dyn Clock>,
        config: BatchConfig,
    ) -> Self {
        let mark_failed_retry = RetryPolicy::builder()
            .max_retries(config.mark_failed_retries)
            .initial_delay(Duration::from_millis(50))
            .max_delay(Duration::from_secs(1))
            .build();

        Self {
            store,
            topic,
            payments,
            clock,
            config,
            mark_failed_retry,
        }
    }

    /// Override the retry policy used when marking orders `FAILED`.
    #[must_use]
    pub fn with_mark_failed_retry(mut self, policy: RetryPolicy) -> Self {
        self.mark_failed_retry = policy;
        self
    }

    /// Process a batch of queue messages.
    ///
    /// Every item is attempted regardless of the others.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::PartialFailure`] with the complete report if any
    /// item failed.
    pub async fn process_batch(&self, messages: &[Message]) -> Result<BatchReport, BatchError> {
        let started = Instant::now();

        // Futures are built eagerly (they stay inert until polled) to sidestep
        // rustc's higher-ranked `Send` inference issue with borrowed closures.
        let items: Vec<_> = messages.iter().map(|message| self.process_item(message)).collect();
        let results: Vec<ItemResult> = stream::iter(items)
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut report = BatchReport::default();
        for result in results {
            match result.outcome {
                Ok(outcome) => {
                    BatchMetrics::record_item(outcome.label());
                    report.processed += 1;
                    if let Some(order_id) = result.order_id {
                        report.processed_order_ids.push(order_id);
                    }
                }
                Err(error) => {
                    BatchMetrics::record_item(error.label());
                    report.failed += 1;
                    report.failures.push(ItemFailure {
                        message_id: result.message_id,
                        order_id: result.order_id,
                        error,
                    });
                }
            }
        }

        BatchMetrics::record_batch(started.elapsed());
        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Batch processed"
        );

        if report.is_complete() {
            Ok(report)
        } else {
            Err(BatchError::PartialFailure(report))
        }
    }

    async fn process_item(&self, message: &Message) -> ItemResult {
        let message_id = message.message_id.clone();

        let work_item = match message.decode::<WorkItem>() {
            Ok(work_item) => work_item,
            Err(err) => {
                tracing::warn!(message_id = %message_id, error = %err, "Discarding undecodable work item");
                return ItemResult {
                    message_id,
                    order_id: None,
                    outcome: Err(err.into()),
                };
            }
        };

        let order_id = work_item.order.order_id;
        let span = tracing::info_span!(
            "process_order",
            order_id = %order_id,
            message_id = %message_id,
            priority = work_item.priority.as_str(),
        );

        let outcome = async {
            let outcome = match with_deadline(self.config.item_timeout(), self.settle(&order_id)).await {
                Ok(outcome) => outcome,
                Err(elapsed) => Err(ProcessingError::Timeout(elapsed)),
            };

            match &outcome {
                Ok(outcome) => tracing::info!(outcome = outcome.label(), "Order processed"),
                Err(err) => {
                    tracing::warn!(error = %err, "Order processing failed");
                    self.fail_order(&order_id, err).await;
                }
            }
            outcome
        }
        .instrument(span)
        .await;

        ItemResult {
            message_id,
            order_id: Some(order_id),
            outcome,
        }
    }

    async fn settle(&self, order_id: &OrderId) -> Result<ItemOutcome, ProcessingError> {
        let order = self.store.get(order_id).await?;

        match order.status {
            OrderStatus::Confirmed if order.announced_at.is_none() => {
                tracing::info!("Order confirmed but never announced, re-announcing");
                self.announce(&order).await?;
                return Ok(ItemOutcome::Reannounced);
            }
            OrderStatus::Confirmed | OrderStatus::Failed => {
                tracing::info!(status = %order.status, "Order already settled, skipping");
                return Ok(ItemOutcome::AlreadyTerminal {
                    status: order.status,
                });
            }
            OrderStatus::Pending => {}
        }

        let payment_id = match self.payments.charge(order_id, order.total_amount).await {
            Ok(payment_id) => {
                PaymentMetrics::record("approved");
                payment_id
            }
            Err(err) => {
                PaymentMetrics::record(match err {
                    PaymentError::Declined { .. } => "declined",
                    PaymentError::Unavailable(_) => "unavailable",
                });
                return Err(err.into());
            }
        };

        let update = StatusUpdate::confirm(order_id.clone(), payment_id.clone(), self.clock.now());
        let confirmed = match self.store.update_status(update).await {
            Ok(order) => order,
            Err(OrderStoreError::StatusConflict { actual, .. }) => {
                tracing::info!(status = %actual, payment_id = %payment_id, "Order settled concurrently");
                return Ok(ItemOutcome::Converged { status: actual });
            }
            Err(err) => return Err(err.into()),
        };

        self.announce(&confirmed).await?;
        Ok(ItemOutcome::Confirmed { payment_id })
    }

    /// Publish `ORDER_CONFIRMED`, then record that it went out so later
    /// redeliveries stay silent. A failed record only risks a duplicate event.
    async fn announce(&self, order: &Order) -> Result<(), ProcessingError> {
        self.publish(&LifecycleEvent::confirmed(order, self.clock.now()))
            .await?;

        let update = StatusUpdate::announced(order.order_id.clone(), self.clock.now());
        if let Err(err) = self.store.update_status(update).await {
            tracing::warn!(error = %err, "Could not record announcement");
        }
        Ok(())
    }

    /// Best-effort `PENDING → FAILED` plus `ORDER_FAILED`. Never fails the
    /// caller; everything is logged.
    async fn fail_order(&self, order_id: &OrderId, cause: &ProcessingError) {
        if let ProcessingError::Store(OrderStoreError::NotFound(_)) = cause {
            return;
        }

        let reason = cause.to_string();
        let marked = retry_with_predicate(
            &self.mark_failed_retry,
            "mark_order_failed",
            || {
                self.store.update_status(StatusUpdate::fail(
                    order_id.clone(),
                    reason.clone(),
                    self.clock.now(),
                ))
            },
            OrderStoreError::is_transient,
        )
        .await;

        match marked {
            Ok(order) => {
                tracing::info!(reason = %reason, "Order marked FAILED");
                if let Err(err) = self.publish(&LifecycleEvent::failed(&order, self.clock.now())).await {
                    tracing::warn!(error = %err, "Failed to publish ORDER_FAILED event");
                }
            }
            Err(OrderStoreError::StatusConflict { actual, .. }) => {
                tracing::debug!(status = %actual, "Order already terminal, leaving it as is");
            }
            Err(err) => {
                tracing::warn!(error = %err, "Could not mark order FAILED, leaving it to redelivery");
            }
        }
    }

    async fn publish(&self, event: &LifecycleEvent) -> Result<(), ProcessingError> {
        let message = event.to_topic_message()?;
        self.topic.publish(message).await?;
        tracing::debug!(event_type = event.event_type.as_str(), "Lifecycle event published");
        Ok(())
    }
}

impl fmt::Debug for BatchOrderProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOrderProcessor")
            .field("config", &self.config)
            .field("mark_failed_retry", &self.mark_failed_retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ClassificationConfig;
    use order_pipeline_core::types::Money;
    use order_pipeline_testing::fixtures::pending_order;
    use order_pipeline_testing::mocks::test_time;
    use order_pipeline_testing::{InMemoryEventTopic, InMemoryOrderStore, ScriptedPaymentSimulator, test_clock};

    struct Harness {
        store: InMemoryOrderStore,
        topic: InMemoryEventTopic,
        payments: ScriptedPaymentSimulator,
        processor: BatchOrderProcessor,
    }

    fn harness_with(payments: ScriptedPaymentSimulator, config: BatchConfig) -> Harness {
        let store = InMemoryOrderStore::new();
        let topic = InMemoryEventTopic::new();
        let processor = BatchOrderProcessor::new(
            Arc::new(store.clone()),
            Arc::new(topic.clone()),
            Arc::new(payments.clone()),
            Arc::new(test_clock()),
            config,
        )
        .with_mark_failed_retry(RetryPolicy::fixed(2, Duration::from_millis(1)));
        Harness {
            store,
            topic,
            payments,
            processor,
        }
    }

    fn harness() -> Harness {
        harness_with(ScriptedPaymentSimulator::approving(), BatchConfig::default())
    }

    fn work_message(order: &Order) -> Message {
        WorkItem::classify(order.clone(), &ClassificationConfig::default())
            .to_queue_message(format!("msg-{}", order.order_id))
            .unwrap()
    }

    fn seeded(h: &Harness, id: &str) -> Message {
        let order = pending_order(id);
        h.store.seed(order.clone());
        work_message(&order)
    }

    #[tokio::test]
    async fn confirms_and_announces() {
        let h = harness();
        let message = seeded(&h, "o-1");

        let report = h.processor.process_batch(&[message]).await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.processed_order_ids, vec![OrderId::new("o-1".to_string())]);
        let order = h.store.snapshot("o-1").unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_id.unwrap().as_str(), "PAY-o-1");
        assert_eq!(order.updated_at, test_time());
        assert_eq!(h.topic.published_of_type("ORDER_CONFIRMED").len(), 1);

        let charge = &h.payments.calls()[0];
        assert_eq!(charge.amount, Money::from_cents(10_099));
    }

    #[tokio::test]
    async fn decline_marks_failed_and_announces() {
        let h = harness();
        h.payments.decline_order("o-1", "Insufficient funds");
        let message = seeded(&h, "o-1");

        let err = h.processor.process_batch(&[message]).await.unwrap_err();

        let report = err.report();
        assert_eq!(report.failed, 1);
        assert_eq!(report.batch_item_failures(), vec!["msg-o-1".to_string()]);
        assert!(matches!(report.failures[0].error, ProcessingError::Declined { .. }));

        let order = h.store.snapshot("o-1").unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.failure_reason.as_deref(), Some("Payment declined: Insufficient funds"));
        assert!(order.payment_id.is_none());

        let failed = h.topic.published_of_type("ORDER_FAILED");
        assert_eq!(failed.len(), 1);
        assert!(h.topic.published_of_type("ORDER_CONFIRMED").is_empty());
    }

    #[tokio::test]
    async fn payment_outage_takes_failure_path() {
        let h = harness();
        h.payments
            .push_outcome(Err(PaymentError::Unavailable("gateway timeout".to_string())));
        let message = seeded(&h, "o-1");

        let err = h.processor.process_batch(&[message]).await.unwrap_err();

        assert!(matches!(
            err.report().failures[0].error,
            ProcessingError::PaymentUnavailable(_)
        ));
        assert_eq!(h.store.snapshot("o-1").unwrap().status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn failed_order_is_left_alone() {
        let h = harness();
        let mut order = pending_order("o-1");
        order.status = OrderStatus::Failed;
        h.store.seed(order.clone());

        let report = h.processor.process_batch(&[work_message(&order)]).await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(h.payments.call_count(), 0);
        assert_eq!(h.store.update_calls(), 0);
        assert!(h.topic.published().is_empty());
    }

    #[tokio::test]
    async fn announced_order_is_not_announced_again() {
        let h = harness();
        let message = seeded(&h, "o-1");
        h.processor.process_batch(&[message.clone()]).await.unwrap();
        assert_eq!(h.store.snapshot("o-1").unwrap().announced_at, Some(test_time()));

        let report = h.processor.process_batch(&[message]).await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(h.payments.call_count(), 1);
        assert_eq!(h.topic.published_of_type("ORDER_CONFIRMED").len(), 1);
        assert_eq!(h.store.snapshot("o-1").unwrap().status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn whole_batch_redelivery_emits_nothing_new() {
        let h = harness();
        let batch = vec![
            seeded(&h, "o-1"),
            Message::new("junk".to_string(), "not json".to_string()),
        ];

        // A queue without partial-batch acknowledgment redelivers everything
        for _ in 0..3 {
            let err = h.processor.process_batch(&batch).await.unwrap_err();
            assert_eq!(err.report().batch_item_failures(), vec!["junk".to_string()]);
        }

        assert_eq!(h.store.snapshot("o-1").unwrap().status, OrderStatus::Confirmed);
        assert_eq!(h.topic.published_of_type("ORDER_CONFIRMED").len(), 1);
        assert_eq!(h.payments.call_count(), 1);
    }

    #[tokio::test]
    async fn unannounced_confirmed_order_is_announced_once() {
        let h = harness();
        let mut order = pending_order("o-1");
        order.status = OrderStatus::Confirmed;
        order.payment_id = Some(PaymentId::new("PAY-o-1".to_string()));
        h.store.seed(order.clone());
        let message = work_message(&order);

        let report = h.processor.process_batch(&[message.clone()]).await.unwrap();
        h.processor.process_batch(&[message]).await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(h.payments.call_count(), 0);
        assert_eq!(h.topic.published_of_type("ORDER_CONFIRMED").len(), 1);
        assert!(h.store.snapshot("o-1").unwrap().announced_at.is_some());
    }

    #[tokio::test]
    async fn publish_failure_keeps_order_confirmed() {
        let h = harness();
        let message = seeded(&h, "o-1");
        h.topic.fail_next_publishes(1);

        let err = h.processor.process_batch(&[message.clone()]).await.unwrap_err();

        assert!(matches!(err.report().failures[0].error, ProcessingError::Publish(_)));
        let order = h.store.snapshot("o-1").unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.failure_reason.is_none());
        assert!(h.topic.published_of_type("ORDER_FAILED").is_empty());

        assert!(order.announced_at.is_none());

        // Redelivery converges: the event goes out, no second charge.
        h.processor.process_batch(&[message.clone()]).await.unwrap();
        assert_eq!(h.topic.published_of_type("ORDER_CONFIRMED").len(), 1);
        assert_eq!(h.payments.call_count(), 1);

        h.processor.process_batch(&[message]).await.unwrap();
        assert_eq!(h.topic.published_of_type("ORDER_CONFIRMED").len(), 1);
    }

    #[tokio::test]
    async fn losing_race_is_convergence() {
        let h = harness();
        let message = seeded(&h, "o-1");
        h.store.race_next_update(StatusUpdate::fail(
            OrderId::new("o-1".to_string()),
            "cancelled elsewhere".to_string(),
            test_time(),
        ));

        let report = h.processor.process_batch(&[message]).await.unwrap();

        assert_eq!(report.processed, 1);
        let order = h.store.snapshot("o-1").unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.failure_reason.as_deref(), Some("cancelled elsewhere"));
        assert!(h.topic.published().is_empty());
    }

    #[tokio::test]
    async fn transient_mark_failed_is_retried() {
        let h = harness();
        h.payments.decline_order("o-1", "Card expired");
        let message = seeded(&h, "o-1");
        h.store.fail_next_updates(2);

        let _ = h.processor.process_batch(&[message]).await.unwrap_err();

        assert_eq!(h.store.snapshot("o-1").unwrap().status, OrderStatus::Failed);
        assert_eq!(h.store.update_calls(), 3);
    }

    #[tokio::test]
    async fn unreachable_store_leaves_order_pending() {
        let h = harness();
        h.payments.decline_order("o-1", "Card expired");
        let message = seeded(&h, "o-1");
        h.store.fail_all_updates();

        let err = h.processor.process_batch(&[message]).await.unwrap_err();

        assert_eq!(err.report().failed, 1);
        assert_eq!(h.store.snapshot("o-1").unwrap().status, OrderStatus::Pending);
        assert!(h.topic.published().is_empty());
    }

    #[tokio::test]
    async fn missing_order_fails_item_only() {
        let h = harness();
        let message = work_message(&pending_order("ghost"));

        let err = h.processor.process_batch(&[message]).await.unwrap_err();

        assert!(matches!(
            err.report().failures[0].error,
            ProcessingError::Store(OrderStoreError::NotFound(_))
        ));
        assert_eq!(h.store.update_calls(), 0);
    }

    #[tokio::test]
    async fn malformed_message_has_no_order() {
        let h = harness();
        let message = Message::new("bad-1".to_string(), "{\"nope\":true}".to_string());

        let err = h.processor.process_batch(&[message]).await.unwrap_err();

        let failure = &err.report().failures[0];
        assert_eq!(failure.message_id, "bad-1");
        assert_eq!(failure.order_id, None);
        assert!(matches!(failure.error, ProcessingError::Malformed(_)));
    }

    #[tokio::test]
    async fn slow_payment_times_out_and_fails_order() {
        let config = BatchConfig {
            item_timeout_ms: 50,
            ..BatchConfig::default()
        };
        let h = harness_with(
            ScriptedPaymentSimulator::approving().with_delay(Duration::from_millis(500)),
            config,
        );
        let message = seeded(&h, "o-1");

        let err = h.processor.process_batch(&[message]).await.unwrap_err();

        assert!(matches!(err.report().failures[0].error, ProcessingError::Timeout(_)));
        let order = h.store.snapshot("o-1").unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(
            order.failure_reason.as_deref(),
            Some("Processing timed out: Deadline of 50ms exceeded")
        );
    }

    #[tokio::test]
    async fn items_are_independent() {
        let h = harness();
        h.payments.decline_order("o-2", "Insufficient funds");
        let batch = vec![
            seeded(&h, "o-1"),
            seeded(&h, "o-2"),
            Message::new("junk".to_string(), "not json".to_string()),
            seeded(&h, "o-3"),
        ];

        let err = h.processor.process_batch(&batch).await.unwrap_err();
        let report = err.report();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(
            report.processed_order_ids,
            vec![OrderId::new("o-1".to_string()), OrderId::new("o-3".to_string())]
        );
        assert_eq!(
            report.batch_item_failures(),
            vec!["msg-o-2".to_string(), "junk".to_string()]
        );
        assert_eq!(err.to_string(), "2 of 4 items failed");
    }

    #[tokio::test]
    async fn report_serializes_like_the_queue_response() {
        let h = harness();
        let report = h.processor.process_batch(&[seeded(&h, "o-1")]).await.unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "processed": 1,
                "failed": 0,
                "processedOrders": ["o-1"],
                "failures": []
            })
        );
    }

    #[tokio::test]
    async fn empty_batch_is_ok() {
        let h = harness();
        let report = h.processor.process_batch(&[]).await.unwrap();
        assert_eq!(report, BatchReport::default());
    }
}
