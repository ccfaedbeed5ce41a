//! Order intake.
//!
//! `submit` runs validation, persists a `PENDING` order, then enqueues a work
//! item. The order is stored before the enqueue so a work item never
//! references an order that does not exist. A failed enqueue therefore leaves
//! a stored `PENDING` order with no work item: a reconciliation gap, logged
//! and counted here and closed later by the
//! [`ReenqueueSweep`](crate::reconcile::ReenqueueSweep).

use crate::config::{ClassificationConfig, OrderLimits};
use crate::factory::OrderFactory;
use crate::identity::Identity;
use crate::validator::{OrderRequest, ValidationError, validate};
use crate::work_item::WorkItem;
use order_pipeline_core::message::MessageError;
use order_pipeline_core::order_store::{OrderStore, OrderStoreError};
use order_pipeline_core::types::{Money, OrderId, OrderMetadata, OrderStatus};
use order_pipeline_core::work_queue::{QueueError, WorkQueue};
use order_pipeline_runtime::metrics::IntakeMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Response returned once an order has been accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedOrder {
    /// New order id
    pub order_id: OrderId,
    /// Always `PENDING`
    pub status: OrderStatus,
    /// Human-readable acknowledgement
    pub message: String,
    /// Expected time to a terminal state
    pub estimated_processing_time: String,
    /// Exact order total
    pub total_amount: Money,
}

impl AcceptedOrder {
    /// Acknowledgement text
    pub const MESSAGE: &'static str = "Order received and processing";
    /// Processing estimate
    pub const ESTIMATED_PROCESSING_TIME: &'static str = "2-5 minutes";
}

/// Intake failures.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// The request broke a validation rule. Nothing was stored.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The order could not be stored. Nothing was enqueued.
    #[error("Failed to persist order: {0}")]
    Persistence(#[source] OrderStoreError),

    /// The work item could not be encoded after the order was stored.
    #[error("Failed to encode work item for order {order_id}: {source}")]
    Encode {
        /// Stored order left without a work item
        order_id: OrderId,
        /// Encoding error
        source: MessageError,
    },

    /// The order was stored but the work item was not enqueued.
    #[error("Order {order_id} stored but not enqueued: {source}")]
    Enqueue {
        /// Stored order left without a work item
        order_id: OrderId,
        /// Queue error
        source: QueueError,
    },
}

/// Validates, persists and enqueues new orders.
pub struct IntakeCoordinator {
    store: Arc<dyn OrderStore>,
    queue: Arc<dyn WorkQueue>,
    factory: OrderFactory,
    limits: OrderLimits,
    classification: ClassificationConfig,
}

impl IntakeCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStore>,
        queue: Arc<dyn WorkQueue>,
        factory: OrderFactory,
        limits: OrderLimits,
        classification: ClassificationConfig,
    ) -> Self {
        Self {
            store,
            queue,
            factory,
            limits,
            classification,
        }
    }

    /// Accept an order on behalf of `identity`.
    ///
    /// # Errors
    ///
    /// - [`IntakeError::Validation`] if the request is invalid
    /// - [`IntakeError::Persistence`] if the store write fails
    /// - [`IntakeError::Encode`] / [`IntakeError::Enqueue`] if the order was
    ///   stored but its work item could not be queued
    pub async fn submit(
        &self,
        request: &OrderRequest,
        identity: &Identity,
        metadata: OrderMetadata,
    ) -> Result<AcceptedOrder, IntakeError> {
        let validated = validate(request, &self.limits).inspect_err(|err| {
            IntakeMetrics::record_rejected(err.reason());
            tracing::info!(
                user_id = %identity.user_id,
                reason = err.reason(),
                "Order rejected: {err}"
            );
        })?;

        let order = self.factory.build(validated, identity, metadata);
        let order_id = order.order_id.clone();
        let total_amount = order.total_amount;

        self.store.create(order.clone()).await.map_err(|err| {
            tracing::error!(order_id = %order_id, error = %err, "Failed to persist order");
            IntakeError::Persistence(err)
        })?;

        let work_item = WorkItem::classify(order, &self.classification);
        let message = work_item
            .to_queue_message(format!("{order_id}:intake"))
            .map_err(|source| {
                Self::reconciliation_gap(&order_id, &source);
                IntakeError::Encode {
                    order_id: order_id.clone(),
                    source,
                }
            })?;

        self.queue.enqueue(message).await.map_err(|source| {
            Self::reconciliation_gap(&order_id, &source);
            IntakeError::Enqueue {
                order_id: order_id.clone(),
                source,
            }
        })?;

        IntakeMetrics::record_submitted(work_item.order_type.as_str(), work_item.priority.as_str());
        tracing::info!(
            order_id = %order_id,
            user_id = %identity.user_id,
            auth_method = identity.auth_method.as_str(),
            order_type = work_item.order_type.as_str(),
            priority = work_item.priority.as_str(),
            total = %total_amount,
            "Order accepted"
        );

        Ok(AcceptedOrder {
            order_id,
            status: OrderStatus::Pending,
            message: AcceptedOrder::MESSAGE.to_string(),
            estimated_processing_time: AcceptedOrder::ESTIMATED_PROCESSING_TIME.to_string(),
            total_amount,
        })
    }

    fn reconciliation_gap(order_id: &OrderId, error: &dyn std::fmt::Display) {
        IntakeMetrics::record_reconciliation_gap();
        tracing::error!(
            order_id = %order_id,
            reconciliation_gap = true,
            error = %error,
            "Order persisted as PENDING but work item was not enqueued"
        );
    }
}

impl std::fmt::Debug for IntakeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeCoordinator")
            .field("limits", &self.limits)
            .field("classification", &self.classification)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::identity::{AuthContext, Claims, identify};
    use crate::validator::RawItem;
    use order_pipeline_testing::{InMemoryOrderStore, InMemoryWorkQueue, SequentialIdGenerator, test_clock};

    struct Harness {
        store: InMemoryOrderStore,
        queue: InMemoryWorkQueue,
        intake: IntakeCoordinator,
    }

    fn harness() -> Harness {
        let store = InMemoryOrderStore::new();
        let queue = InMemoryWorkQueue::new();
        let factory = OrderFactory::new(Arc::new(SequentialIdGenerator::default()), Arc::new(test_clock()));
        let intake = IntakeCoordinator::new(
            Arc::new(store.clone()),
            Arc::new(queue.clone()),
            factory,
            OrderLimits::default(),
            ClassificationConfig::default(),
        );
        Harness { store, queue, intake }
    }

    fn identity() -> Identity {
        identify(&AuthContext::Claims(Claims {
            sub: "user-123".to_string(),
            email: "customer@example.com".to_string(),
            ..Claims::default()
        }))
    }

    fn request() -> OrderRequest {
        OrderRequest {
            items: Some(vec![
                RawItem::new("P1", 2.into(), "25.50".parse().unwrap()),
                RawItem::new("P2", 1.into(), "49.99".parse().unwrap()),
            ]),
        }
    }

    #[tokio::test]
    async fn accepted_order_is_stored_then_enqueued() {
        let h = harness();
        let accepted = h
            .intake
            .submit(&request(), &identity(), OrderMetadata::default())
            .await
            .unwrap();

        assert_eq!(accepted.order_id.as_str(), "order-1");
        assert_eq!(accepted.status, OrderStatus::Pending);
        assert_eq!(accepted.total_amount, Money::from_cents(10_099));
        assert_eq!(accepted.message, "Order received and processing");

        let stored = h.store.snapshot("order-1").unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.customer_id.as_str(), "user-123");

        let enqueued = h.queue.enqueued();
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].message_id, "order-1:intake");
        assert_eq!(enqueued[0].attribute("orderType"), Some("STANDARD"));
        assert_eq!(enqueued[0].decode::<WorkItem>().unwrap().order, stored);
    }

    #[tokio::test]
    async fn validation_failure_stores_nothing() {
        let h = harness();
        let err = h
            .intake
            .submit(&OrderRequest::default(), &identity(), OrderMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::Validation(ValidationError::MissingItems)));
        assert_eq!(err.to_string(), "items array is required and must not be empty");
        assert!(h.store.is_empty());
        assert!(h.queue.enqueued().is_empty());
    }

    #[tokio::test]
    async fn over_limit_total_stores_nothing() {
        let h = harness();
        let request = OrderRequest {
            items: Some(vec![RawItem::new("P1", 100.into(), 200.into())]),
        };

        let err = h
            .intake
            .submit(&request, &identity(), OrderMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IntakeError::Validation(ValidationError::TotalTooLarge { max }) if max == Money::from_dollars(10_000)
        ));
        assert!(h.store.is_empty());
        assert!(h.queue.enqueued().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_enqueues_nothing() {
        let h = harness();
        h.store.fail_next_creates(1);

        let err = h
            .intake
            .submit(&request(), &identity(), OrderMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::Persistence(_)));
        assert!(h.queue.enqueued().is_empty());
    }

    #[tokio::test]
    async fn enqueue_failure_leaves_pending_order() {
        let h = harness();
        h.queue.fail_next_enqueues(1);

        let err = h
            .intake
            .submit(&request(), &identity(), OrderMetadata::default())
            .await
            .unwrap_err();

        match err {
            IntakeError::Enqueue { order_id, .. } => assert_eq!(order_id.as_str(), "order-1"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.store.snapshot("order-1").unwrap().status, OrderStatus::Pending);
        assert_eq!(h.queue.pending_len(), 0);
    }
}
