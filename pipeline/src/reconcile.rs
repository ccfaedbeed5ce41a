//! Re-enqueue sweep for stranded `PENDING` orders.
//!
//! Intake stores an order before enqueueing its work item, so a failed
//! enqueue strands the order in `PENDING`. The sweep finds orders that have
//! been pending longer than a threshold and enqueues a fresh work item for
//! each. Orders that were in fact still queued get processed twice; the
//! processor treats the second delivery as a no-op.

use crate::config::ClassificationConfig;
use crate::work_item::WorkItem;
use chrono::TimeDelta;
use order_pipeline_core::environment::Clock;
use order_pipeline_core::order_store::{OrderStore, OrderStoreError};
use order_pipeline_core::types::OrderStatus;
use order_pipeline_core::work_queue::WorkQueue;
use order_pipeline_runtime::metrics::SweepMetrics;
use std::sync::Arc;
use std::time::Duration;

/// Result of one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Work items enqueued
    pub requeued: usize,
    /// Orders whose work item could not be enqueued
    pub failed: usize,
}

/// Re-enqueues work for orders stuck in `PENDING`.
pub struct ReenqueueSweep {
    store: Arc<dyn OrderStore>,
    queue: Arc<dyn WorkQueue>,
    clock: Arc<dyn Clock>,
    classification: ClassificationConfig,
}

impl ReenqueueSweep {
    /// Create a sweep.
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStore>,
        queue: Arc<dyn WorkQueue>,
        clock: Arc<dyn Clock>,
        classification: ClassificationConfig,
    ) -> Self {
        Self {
            store,
            queue,
            clock,
            classification,
        }
    }

    /// Re-enqueue every order pending for longer than `older_than`.
    ///
    /// # Errors
    ///
    /// Returns the store error if pending orders cannot be listed. Individual
    /// enqueue failures are counted in the report instead.
    pub async fn run(&self, older_than: Duration) -> Result<SweepReport, OrderStoreError> {
        let now = self.clock.now();
        let Some(cutoff) = TimeDelta::from_std(older_than)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
        else {
            return Ok(SweepReport::default());
        };

        let stranded = self.store.list_by_status(OrderStatus::Pending, cutoff).await?;
        let mut report = SweepReport::default();

        for order in stranded {
            let order_id = order.order_id.clone();
            let message_id = format!("{order_id}:sweep:{}", now.timestamp_millis());
            let work_item = WorkItem::classify(order, &self.classification);

            let enqueued = match work_item.to_queue_message(message_id) {
                Ok(message) => self.queue.enqueue(message).await.map_err(|e| e.to_string()),
                Err(err) => Err(err.to_string()),
            };

            match enqueued {
                Ok(()) => {
                    tracing::info!(order_id = %order_id, "Re-enqueued stranded order");
                    report.requeued += 1;
                }
                Err(error) => {
                    tracing::warn!(order_id = %order_id, error = %error, "Failed to re-enqueue stranded order");
                    report.failed += 1;
                }
            }
        }

        SweepMetrics::record_requeued(report.requeued);
        if report.requeued > 0 || report.failed > 0 {
            tracing::info!(requeued = report.requeued, failed = report.failed, "Sweep complete");
        }
        Ok(report)
    }
}

impl std::fmt::Debug for ReenqueueSweep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReenqueueSweep")
            .field("classification", &self.classification)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use order_pipeline_testing::fixtures::pending_order;
    use order_pipeline_testing::mocks::test_time;
    use order_pipeline_testing::{InMemoryOrderStore, InMemoryWorkQueue, test_clock};

    fn sweep(store: &InMemoryOrderStore, queue: &InMemoryWorkQueue) -> ReenqueueSweep {
        ReenqueueSweep::new(
            Arc::new(store.clone()),
            Arc::new(queue.clone()),
            Arc::new(test_clock()),
            ClassificationConfig::default(),
        )
    }

    fn aged(id: &str, minutes: i64, status: OrderStatus) -> order_pipeline_core::types::Order {
        let mut order = pending_order(id);
        order.created_at = test_time() - TimeDelta::minutes(minutes);
        order.status = status;
        order
    }

    #[tokio::test]
    async fn requeues_only_stale_pending_orders() {
        let store = InMemoryOrderStore::new();
        let queue = InMemoryWorkQueue::new();
        store.seed(aged("stale", 30, OrderStatus::Pending));
        store.seed(aged("fresh", 1, OrderStatus::Pending));
        store.seed(aged("done", 30, OrderStatus::Confirmed));

        let report = sweep(&store, &queue).run(Duration::from_secs(600)).await.unwrap();

        assert_eq!(report, SweepReport { requeued: 1, failed: 0 });
        let enqueued = queue.enqueued();
        assert_eq!(enqueued.len(), 1);
        assert!(enqueued[0].message_id.starts_with("stale:sweep:"));
        assert_eq!(enqueued[0].decode::<WorkItem>().unwrap().order.order_id.as_str(), "stale");
    }

    #[tokio::test]
    async fn enqueue_failures_are_counted() {
        let store = InMemoryOrderStore::new();
        let queue = InMemoryWorkQueue::new();
        store.seed(aged("a", 30, OrderStatus::Pending));
        store.seed(aged("b", 20, OrderStatus::Pending));
        queue.fail_next_enqueues(1);

        let report = sweep(&store, &queue).run(Duration::from_secs(600)).await.unwrap();

        assert_eq!(report, SweepReport { requeued: 1, failed: 1 });
    }

    #[tokio::test]
    async fn listing_failure_is_an_error() {
        let store = InMemoryOrderStore::new();
        let queue = InMemoryWorkQueue::new();
        store.fail_next_lists(1);

        let err = sweep(&store, &queue).run(Duration::from_secs(600)).await.unwrap_err();
        assert!(err.is_transient());
    }
}
