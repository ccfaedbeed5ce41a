//! Order lifecycle events.
//!
//! The processor publishes a [`LifecycleEvent`] whenever an order reaches a
//! terminal state. Consumers read them back as [`ReceivedEvent`], which
//! tolerates partial payloads and event types this crate does not produce.

use chrono::{DateTime, Utc};
use order_pipeline_core::message::{Message, MessageError, Payload};
use order_pipeline_core::types::{CustomerId, Money, Order, OrderId, OrderStatus, PaymentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Message attribute carrying the event type.
pub const EVENT_TYPE_ATTRIBUTE: &str = "eventType";

/// Lifecycle event types published by the processor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// The order was paid and confirmed
    OrderConfirmed,
    /// The order could not be completed
    OrderFailed,
}

impl EventType {
    /// Wire value
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrderConfirmed => "ORDER_CONFIRMED",
            Self::OrderFailed => "ORDER_FAILED",
        }
    }

    /// Human-readable subject line
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::OrderConfirmed => "Order Confirmed",
            Self::OrderFailed => "Order Failed",
        }
    }

    /// Parse a wire value
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ORDER_CONFIRMED" => Some(Self::OrderConfirmed),
            "ORDER_FAILED" => Some(Self::OrderFailed),
            _ => None,
        }
    }
}

/// A terminal transition, as published on the event topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    /// Event type
    pub event_type: EventType,
    /// Order the event is about
    pub order_id: OrderId,
    /// Customer who placed the order
    pub customer_id: CustomerId,
    /// Customer contact address
    pub customer_email: String,
    /// Order status after the transition
    pub status: OrderStatus,
    /// Order total
    pub total_amount: Money,
    /// Payment reference (confirmed orders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
    /// Failure reason (failed orders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// When the event was produced
    pub occurred_at: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Event for an order that is (or just became) `CONFIRMED`.
    #[must_use]
    pub fn confirmed(order: &Order, occurred_at: DateTime<Utc>) -> Self {
        Self::from_order(EventType::OrderConfirmed, order, occurred_at)
    }

    /// Event for an order that just became `FAILED`.
    #[must_use]
    pub fn failed(order: &Order, occurred_at: DateTime<Utc>) -> Self {
        Self::from_order(EventType::OrderFailed, order, occurred_at)
    }

    fn from_order(event_type: EventType, order: &Order, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_type,
            order_id: order.order_id.clone(),
            customer_id: order.customer_id.clone(),
            customer_email: order.customer_email.clone(),
            status: order.status,
            total_amount: order.total_amount,
            payment_id: order.payment_id.clone(),
            failure_reason: order.failure_reason.clone(),
            occurred_at,
        }
    }

    /// Encode for the event topic.
    ///
    /// The message id is derived from the order and event type, so a
    /// re-announcement of the same transition carries the same id.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Encode`] if serialization fails.
    pub fn to_topic_message(&self) -> Result<Message, MessageError> {
        let message_id = format!("{}:{}", self.order_id, self.event_type.as_str());
        Ok(self
            .to_message(message_id)?
            .with_subject(self.event_type.subject())
            .with_attribute(EVENT_TYPE_ATTRIBUTE, self.event_type.as_str()))
    }
}

impl Payload for LifecycleEvent {
    fn kind(&self) -> &'static str {
        self.event_type.as_str()
    }
}

/// An event as read back from the topic.
///
/// Only `orderId` is required. The event type comes from the message
/// attribute, then the body, and is kept verbatim so unknown types still flow
/// through.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedEvent {
    /// Event type, `"UNKNOWN"` when absent
    #[serde(default)]
    pub event_type: Option<String>,
    /// Order the event is about
    pub order_id: String,
    /// Customer contact address
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Reported order status
    #[serde(default)]
    pub status: Option<String>,
    /// Order total
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    /// Payment reference
    #[serde(default)]
    pub payment_id: Option<String>,
    /// Failure reason
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl ReceivedEvent {
    /// Event type used when neither attribute nor body names one.
    pub const UNKNOWN_TYPE: &'static str = "UNKNOWN";

    /// Decode a topic message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Decode`] if the body is not JSON or lacks an
    /// `orderId`.
    pub fn from_message(message: &Message) -> Result<Self, MessageError> {
        let mut event: Self = message.decode()?;
        if let Some(attribute) = message.attribute(EVENT_TYPE_ATTRIBUTE) {
            event.event_type = Some(attribute.to_string());
        }
        Ok(event)
    }

    /// Resolved event type
    #[must_use]
    pub fn event_type(&self) -> &str {
        self.event_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(Self::UNKNOWN_TYPE)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use order_pipeline_core::order_store::{StatusUpdate, apply_status_update};
    use order_pipeline_testing::fixtures::pending_order;
    use order_pipeline_testing::mocks::test_time;

    fn confirmed_order() -> Order {
        let mut order = pending_order("o-1");
        let update = StatusUpdate::confirm(order.order_id.clone(), PaymentId::new("PAY-1".to_string()), test_time());
        apply_status_update(&mut order, update)
        .unwrap();
        order
    }

    #[test]
    fn confirmed_event_message() {
        let event = LifecycleEvent::confirmed(&confirmed_order(), test_time());
        let message = event.to_topic_message().unwrap();

        assert_eq!(message.message_id, "o-1:ORDER_CONFIRMED");
        assert_eq!(message.subject.as_deref(), Some("Order Confirmed"));
        assert_eq!(message.attribute(EVENT_TYPE_ATTRIBUTE), Some("ORDER_CONFIRMED"));

        let body: serde_json::Value = serde_json::from_str(&message.body).unwrap();
        assert_eq!(body["eventType"], "ORDER_CONFIRMED");
        assert_eq!(body["status"], "CONFIRMED");
        assert_eq!(body["paymentId"], "PAY-1");
        assert!(body.get("failureReason").is_none());
    }

    #[test]
    fn received_event_prefers_attribute() {
        let message = Message::new(
            "m-1".to_string(),
            r#"{"orderId":"o-9","status":"SHIPPED","eventType":"IGNORED"}"#.to_string(),
        )
        .with_attribute(EVENT_TYPE_ATTRIBUTE, "ORDER_SHIPPED");

        let event = ReceivedEvent::from_message(&message).unwrap();
        assert_eq!(event.event_type(), "ORDER_SHIPPED");
        assert_eq!(event.order_id, "o-9");
        assert_eq!(event.total_amount, None);
    }

    #[test]
    fn received_event_defaults_type() {
        let message = Message::new("m-1".to_string(), r#"{"orderId":"o-9"}"#.to_string());
        let event = ReceivedEvent::from_message(&message).unwrap();
        assert_eq!(event.event_type(), "UNKNOWN");
    }

    #[test]
    fn received_event_requires_order_id() {
        let bad_json = Message::new("m-1".to_string(), "not json".to_string());
        assert!(ReceivedEvent::from_message(&bad_json).is_err());

        let no_order = Message::new("m-2".to_string(), r#"{"status":"CONFIRMED"}"#.to_string());
        assert!(matches!(ReceivedEvent::from_message(&no_order), Err(MessageError::Decode(_))));
    }

    #[test]
    fn published_event_reads_back() {
        let message = LifecycleEvent::confirmed(&confirmed_order(), test_time())
            .to_topic_message()
            .unwrap();
        let event = ReceivedEvent::from_message(&message).unwrap();
        assert_eq!(event.event_type(), "ORDER_CONFIRMED");
        assert_eq!(event.customer_email.as_deref(), Some("customer@example.com"));
        assert_eq!(event.total_amount, Some("100.99".parse().unwrap()));
    }
}
