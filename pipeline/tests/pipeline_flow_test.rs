//! End-to-end pipeline tests.
//!
//! Drive orders through intake, the work queue, batch processing, the event
//! topic and notification dispatch, all over in-memory infrastructure with
//! at-least-once redelivery.

#![allow(clippy::unwrap_used)] // Test code
#![allow(clippy::too_many_lines)]

use chrono::TimeDelta;
use order_pipeline::api::{OrderPipeline, PipelineEnvironment};
use order_pipeline::config::PipelineConfig;
use order_pipeline::events::{EVENT_TYPE_ATTRIBUTE, EventType};
use order_pipeline::identity::{AuthContext, Claims};
use order_pipeline::validator::{OrderRequest, RawItem};
use order_pipeline::{AcceptedOrder, SubmitError};
use order_pipeline_core::message::Message;
use order_pipeline_core::types::{Money, OrderMetadata, OrderStatus};
use order_pipeline_testing::mocks::{FixedClock, test_time};
use order_pipeline_testing::{
    InMemoryEventTopic, InMemoryOrderStore, InMemoryWorkQueue, RecordingChannel,
    ScriptedPaymentSimulator, SequentialIdGenerator, init_test_tracing, test_clock,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Shared in-memory infrastructure plus a pipeline built over it.
struct World {
    store: InMemoryOrderStore,
    queue: InMemoryWorkQueue,
    topic: InMemoryEventTopic,
    payments: ScriptedPaymentSimulator,
    channel: RecordingChannel,
    pipeline: OrderPipeline,
}

impl World {
    fn new() -> Self {
        Self::with_queue(InMemoryWorkQueue::new())
    }

    fn with_queue(queue: InMemoryWorkQueue) -> Self {
        init_test_tracing();
        let store = InMemoryOrderStore::new();
        let topic = InMemoryEventTopic::new();
        let payments = ScriptedPaymentSimulator::approving();
        let channel = RecordingChannel::new();
        let pipeline = build_pipeline(&store, &queue, &topic, &payments, &channel, test_clock());
        Self {
            store,
            queue,
            topic,
            payments,
            channel,
            pipeline,
        }
    }

    /// Pipeline over the same infrastructure, seeing a different time.
    fn at(&self, clock: FixedClock) -> OrderPipeline {
        build_pipeline(&self.store, &self.queue, &self.topic, &self.payments, &self.channel, clock)
    }

    async fn submit(&self, request: &OrderRequest) -> AcceptedOrder {
        self.pipeline
            .submit_order(&customer(), request, OrderMetadata::default())
            .await
            .unwrap()
    }

    /// One consumer pass: receive, process, settle failures back.
    async fn pump_queue(&self) -> Vec<String> {
        let batch = self.queue.receive_batch(10);
        let failed = match self.pipeline.process_queue_batch(&batch).await {
            Ok(_) => Vec::new(),
            Err(err) => err.report().batch_item_failures(),
        };
        self.queue.settle(&failed);
        failed
    }

    fn status_of(&self, accepted: &AcceptedOrder) -> OrderStatus {
        self.store.snapshot(accepted.order_id.as_str()).unwrap().status
    }
}

fn build_pipeline(
    store: &InMemoryOrderStore,
    queue: &InMemoryWorkQueue,
    topic: &InMemoryEventTopic,
    payments: &ScriptedPaymentSimulator,
    channel: &RecordingChannel,
    clock: FixedClock,
) -> OrderPipeline {
    let env = PipelineEnvironment::new(
        Arc::new(store.clone()),
        Arc::new(queue.clone()),
        Arc::new(topic.clone()),
        Arc::new(payments.clone()),
    )
    .with_channel(Arc::new(channel.clone()))
    .with_clock(Arc::new(clock))
    .with_ids(Arc::new(SequentialIdGenerator::default()));

    let mut config = PipelineConfig::default();
    config.notify.retry_delay_ms = 1;
    OrderPipeline::new(env, config)
}

fn customer() -> AuthContext {
    AuthContext::Claims(Claims {
        sub: "user-123".to_string(),
        email: "customer@example.com".to_string(),
        ..Claims::default()
    })
}

fn dec(value: &str) -> Decimal {
    value.parse().unwrap()
}

fn two_item_request() -> OrderRequest {
    OrderRequest {
        items: Some(vec![
            RawItem::new("P1", Decimal::from(2), dec("25.50")),
            RawItem::new("P2", Decimal::from(1), dec("49.99")),
        ]),
    }
}

#[tokio::test]
async fn test_order_is_confirmed_and_customer_notified() {
    let world = World::new();

    let accepted = world.submit(&two_item_request()).await;
    assert_eq!(accepted.total_amount, Money::from_cents(10_099));
    assert_eq!(world.status_of(&accepted), OrderStatus::Pending);

    assert!(world.pump_queue().await.is_empty());

    let order = world.store.snapshot(accepted.order_id.as_str()).unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(
        order.payment_id.as_ref().map(|p| p.as_str().to_string()),
        Some(format!("PAY-{}", accepted.order_id))
    );
    assert_eq!(world.payments.calls()[0].amount, Money::from_cents(10_099));

    let report = world.pipeline.dispatch_events(&world.topic.drain()).await;
    assert_eq!(report.delivered, 1);

    let delivered = world.channel.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].subject, "Order Confirmed");
    assert_eq!(delivered[0].recipient.as_deref(), Some("customer@example.com"));
    assert!(delivered[0].body.contains("has been confirmed"));
    assert!(delivered[0].body.contains("Total: $100.99."));
}

#[tokio::test]
async fn test_declined_payment_fails_order_and_notifies() {
    let world = World::new();
    world.payments.decline_order("order-1", "Insufficient funds");

    let accepted = world.submit(&two_item_request()).await;

    // The declined item is reported back so the queue redelivers it
    let failed = world.pump_queue().await;
    assert_eq!(failed, vec![format!("{}:intake", accepted.order_id)]);

    let order = world.store.snapshot(accepted.order_id.as_str()).unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(order.failure_reason.unwrap().contains("Insufficient funds"));
    assert_eq!(world.topic.published_of_type(EventType::OrderFailed.as_str()).len(), 1);

    // The redelivery finds a FAILED order and leaves it alone
    assert!(world.pump_queue().await.is_empty());
    assert_eq!(world.status_of(&accepted), OrderStatus::Failed);
    assert_eq!(world.topic.published_of_type(EventType::OrderFailed.as_str()).len(), 1);
    assert_eq!(world.payments.call_count(), 1);
    assert_eq!(world.queue.pending_len(), 0);

    world.pipeline.dispatch_events(&world.topic.drain()).await;
    let delivered = world.channel.delivered();
    assert_eq!(delivered[0].subject, "Order Failed");
    assert!(delivered[0].body.contains("Reason: Payment declined: Insufficient funds."));
}

#[tokio::test]
async fn test_batch_items_settle_independently() {
    let world = World::new();
    world.payments.decline_order("order-2", "Card expired");

    let first = world.submit(&two_item_request()).await;
    let second = world.submit(&two_item_request()).await;
    let third = world.submit(&two_item_request()).await;

    world.pump_queue().await;

    assert_eq!(world.status_of(&first), OrderStatus::Confirmed);
    assert_eq!(world.status_of(&second), OrderStatus::Failed);
    assert_eq!(world.status_of(&third), OrderStatus::Confirmed);
    assert_eq!(world.topic.published().len(), 3);
}

#[tokio::test]
async fn test_redelivered_work_is_a_no_op() {
    let world = World::new();
    let accepted = world.submit(&two_item_request()).await;
    let work = world.queue.enqueued();

    world.pump_queue().await;
    assert_eq!(world.payments.call_count(), 1);

    // Same message again, as an at-least-once queue may deliver it
    let report = world.pipeline.process_queue_batch(&work).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(world.payments.call_count(), 1);
    assert_eq!(world.status_of(&accepted), OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_publish_failure_redelivers_until_announced() {
    let world = World::new();
    let accepted = world.submit(&two_item_request()).await;
    world.topic.fail_next_publishes(1);

    let failed = world.pump_queue().await;
    assert_eq!(failed, vec![format!("{}:intake", accepted.order_id)]);
    assert_eq!(world.status_of(&accepted), OrderStatus::Confirmed);
    assert!(world.topic.published().is_empty());
    assert_eq!(world.queue.pending_len(), 1);

    assert!(world.pump_queue().await.is_empty());
    assert_eq!(world.payments.call_count(), 1);
    assert_eq!(world.topic.published_of_type(EventType::OrderConfirmed.as_str()).len(), 1);
    assert_eq!(world.queue.pending_len(), 0);
}

#[tokio::test]
async fn test_persistent_failures_are_dead_lettered() {
    let world = World::with_queue(InMemoryWorkQueue::with_max_receives(2));
    let accepted = world.submit(&two_item_request()).await;
    world.store.fail_all_updates();

    world.pump_queue().await;
    world.pump_queue().await;

    assert_eq!(world.queue.pending_len(), 0);
    assert_eq!(world.queue.dead_letters().len(), 1);
    assert_eq!(world.status_of(&accepted), OrderStatus::Pending);
}

#[tokio::test]
async fn test_sweep_recovers_order_stranded_by_enqueue_failure() {
    let world = World::new();
    world.queue.fail_next_enqueues(1);

    let err = world
        .pipeline
        .submit_order(&customer(), &two_item_request(), OrderMetadata::default())
        .await
        .unwrap_err();
    assert_eq!(err, SubmitError::Internal);
    assert_eq!(world.store.len(), 1);
    assert_eq!(world.queue.pending_len(), 0);

    // Too recent to sweep
    let report = world.pipeline.sweep_pending(Duration::from_secs(300)).await.unwrap();
    assert_eq!(report.requeued, 0);

    let later = world.at(FixedClock::new(test_time() + TimeDelta::minutes(10)));
    let report = later.sweep_pending(Duration::from_secs(300)).await.unwrap();
    assert_eq!(report.requeued, 1);

    assert!(world.pump_queue().await.is_empty());
    let order = world.store.snapshot("order-1").unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_dispatch_absorbs_bad_events() {
    let world = World::new();
    world.channel.fail_always();

    let events = vec![
        Message::new("m-1".to_string(), "not json".to_string()),
        Message::new("m-2".to_string(), r#"{"orderId":"o-2","status":"SHIPPED"}"#.to_string())
            .with_attribute(EVENT_TYPE_ATTRIBUTE, "ORDER_SHIPPED"),
    ];

    let report = world.pipeline.dispatch_events(&events).await;

    assert_eq!(report.delivered, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failures.len(), 2);
}

#[tokio::test]
async fn test_unknown_event_gets_generic_notification() {
    let world = World::new();
    let events = vec![
        Message::new("m-1".to_string(), r#"{"orderId":"o-9","status":"SHIPPED"}"#.to_string())
            .with_attribute(EVENT_TYPE_ATTRIBUTE, "ORDER_SHIPPED"),
    ];

    let report = world.pipeline.dispatch_events(&events).await;

    assert_eq!(report.delivered, 1);
    let delivered = world.channel.delivered();
    assert_eq!(delivered[0].subject, "Order Update");
    assert_eq!(delivered[0].body, "Your order o-9 status is now SHIPPED.");
}

#[tokio::test]
async fn test_invalid_order_is_never_stored() {
    let world = World::new();
    let request = OrderRequest {
        items: Some(vec![RawItem::new("P1", Decimal::from(101), dec("1.00"))]),
    };

    let err = world
        .pipeline
        .submit_order(&customer(), &request, OrderMetadata::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Validation(_)));
    assert!(world.store.is_empty());
    assert!(world.queue.enqueued().is_empty());
}
