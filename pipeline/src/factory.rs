//! Order construction.

use crate::identity::Identity;
use crate::validator::ValidatedOrder;
use order_pipeline_core::environment::{Clock, IdGenerator};
use order_pipeline_core::types::{CustomerId, Order, OrderId, OrderMetadata, OrderStatus};
use std::sync::Arc;

/// Builds new `PENDING` orders from validated requests.
///
/// The id and both timestamps come from the injected generator and clock.
#[derive(Clone)]
pub struct OrderFactory {
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl OrderFactory {
    /// Create a factory.
    #[must_use]
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { ids, clock }
    }

    /// Build an order attributed to `identity`.
    #[must_use]
    pub fn build(&self, validated: ValidatedOrder, identity: &Identity, metadata: OrderMetadata) -> Order {
        let now = self.clock.now();
        let (items, total_amount) = validated.into_parts();

        Order {
            order_id: OrderId::new(self.ids.next_id()),
            customer_id: CustomerId::new(identity.user_id.clone()),
            customer_email: identity.email.clone(),
            items,
            total_amount,
            status: OrderStatus::Pending,
            payment_id: None,
            failure_reason: None,
            announced_at: None,
            created_at: now,
            updated_at: now,
            metadata,
        }
    }
}

impl std::fmt::Debug for OrderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderFactory").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::OrderLimits;
    use crate::identity::{AuthContext, Claims, identify};
    use crate::validator::{OrderRequest, RawItem, validate};
    use order_pipeline_core::types::Money;
    use order_pipeline_testing::mocks::test_time;
    use order_pipeline_testing::{SequentialIdGenerator, test_clock};

    #[test]
    fn builds_pending_order_from_identity() {
        let factory = OrderFactory::new(Arc::new(SequentialIdGenerator::default()), Arc::new(test_clock()));
        let identity = identify(&AuthContext::Claims(Claims {
            sub: "user-9".to_string(),
            email: "nine@example.com".to_string(),
            ..Claims::default()
        }));
        let validated = validate(
            &OrderRequest {
                items: Some(vec![RawItem::new("P1", 2.into(), "25.50".parse().unwrap())]),
            },
            &OrderLimits::default(),
        )
        .unwrap();

        let order = factory.build(validated, &identity, OrderMetadata::default());

        assert_eq!(order.order_id.as_str(), "order-1");
        assert_eq!(order.customer_id.as_str(), "user-9");
        assert_eq!(order.customer_email, "nine@example.com");
        assert_eq!(order.total_amount, Money::from_cents(5100));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, test_time());
        assert_eq!(order.created_at, order.updated_at);
        assert_eq!(order.metadata.user_agent, "unknown");
        assert!(order.payment_id.is_none());
    }
}
