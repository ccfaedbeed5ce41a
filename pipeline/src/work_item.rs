//! Work items carried by the order queue.
//!
//! A work item is a snapshot of the order at enqueue time plus its
//! classification. The processor only trusts the `orderId` in it; current
//! state is always re-read from the Order Store.

use crate::config::ClassificationConfig;
use order_pipeline_core::message::{Message, MessageError, Payload};
use order_pipeline_core::types::Order;
use serde::{Deserialize, Serialize};

/// Order size class.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Up to the bulk threshold
    Standard,
    /// More line items than the bulk threshold
    Bulk,
}

impl OrderType {
    /// Wire value
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Bulk => "BULK",
        }
    }
}

/// Processing priority.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Total up to the high-priority amount
    Normal,
    /// Total above the high-priority amount
    High,
}

impl Priority {
    /// Wire value
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
        }
    }
}

/// An order snapshot tagged for the processor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Order snapshot at enqueue time
    #[serde(flatten)]
    pub order: Order,
    /// Size class
    pub order_type: OrderType,
    /// Priority
    pub priority: Priority,
}

impl WorkItem {
    /// Message attribute carrying the order type.
    pub const ORDER_TYPE_ATTRIBUTE: &'static str = "orderType";
    /// Message attribute carrying the priority.
    pub const PRIORITY_ATTRIBUTE: &'static str = "priority";

    /// Classify `order` and wrap it.
    #[must_use]
    pub fn classify(order: Order, thresholds: &ClassificationConfig) -> Self {
        let order_type = if order.items.len() > thresholds.bulk_item_threshold {
            OrderType::Bulk
        } else {
            OrderType::Standard
        };
        let priority = if order.total_amount > thresholds.high_priority_amount {
            Priority::High
        } else {
            Priority::Normal
        };

        Self {
            order,
            order_type,
            priority,
        }
    }

    /// Encode as a queue message with classification attributes.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Encode`] if the order cannot be serialized.
    pub fn to_queue_message(&self, message_id: String) -> Result<Message, MessageError> {
        Ok(self
            .to_message(message_id)?
            .with_attribute(Self::ORDER_TYPE_ATTRIBUTE, self.order_type.as_str())
            .with_attribute(Self::PRIORITY_ATTRIBUTE, self.priority.as_str()))
    }
}

impl Payload for WorkItem {
    fn kind(&self) -> &'static str {
        "ORDER_WORK_ITEM"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use order_pipeline_core::types::{LineItem, Money};
    use order_pipeline_testing::fixtures::{order_with_items, pending_order};

    #[test]
    fn small_order_is_standard_normal() {
        let item = WorkItem::classify(pending_order("o-1"), &ClassificationConfig::default());
        assert_eq!(item.order_type, OrderType::Standard);
        assert_eq!(item.priority, Priority::Normal);
    }

    fn items(count: usize, cents: i64) -> Vec<LineItem> {
        (0..count)
            .map(|i| LineItem::new(format!("P{i}"), 1, Money::from_cents(cents)))
            .collect()
    }

    #[test]
    fn thresholds_are_exclusive() {
        let thresholds = ClassificationConfig::default();

        let at_limit = WorkItem::classify(order_with_items("o-1", items(5, 20_000)), &thresholds);
        assert_eq!(at_limit.order_type, OrderType::Standard);
        assert_eq!(at_limit.priority, Priority::Normal);

        let bulk = WorkItem::classify(order_with_items("o-2", items(6, 10_000)), &thresholds);
        assert_eq!(bulk.order_type, OrderType::Bulk);
        assert_eq!(bulk.priority, Priority::Normal);

        let high = WorkItem::classify(order_with_items("o-3", items(6, 20_000)), &thresholds);
        assert_eq!(high.order_type, OrderType::Bulk);
        assert_eq!(high.priority, Priority::High);
    }

    #[test]
    fn message_carries_attributes_and_flat_order() {
        let item = WorkItem::classify(pending_order("o-1"), &ClassificationConfig::default());
        let message = item.to_queue_message("msg-1".to_string()).unwrap();

        assert_eq!(message.attribute("orderType"), Some("STANDARD"));
        assert_eq!(message.attribute("priority"), Some("NORMAL"));

        let body: serde_json::Value = serde_json::from_str(&message.body).unwrap();
        assert_eq!(body["orderId"], "o-1");
        assert_eq!(body["totalAmount"], serde_json::json!(100.99));
        assert_eq!(body["orderType"], "STANDARD");

        assert_eq!(message.decode::<WorkItem>().unwrap(), item);
    }
}
