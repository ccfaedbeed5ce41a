//! # Order Pipeline Testing
//!
//! Testing utilities for the order pipeline.
//!
//! This crate provides:
//! - Deterministic environment mocks ([`FixedClock`], [`SequentialIdGenerator`])
//! - In-memory collaborators with failure injection: [`InMemoryOrderStore`],
//!   [`InMemoryWorkQueue`], [`InMemoryEventTopic`]
//! - A [`ScriptedPaymentSimulator`] and a [`RecordingChannel`]
//! - Order fixtures
//!
//! ## Example
//!
//! ```
//! use order_pipeline_core::order_store::OrderStore;
//! use order_pipeline_core::types::OrderStatus;
//! use order_pipeline_testing::{InMemoryOrderStore, fixtures};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryOrderStore::new();
//! let order = fixtures::pending_order("order-1");
//! store.create(order.clone()).await?;
//!
//! store.fail_next_gets(1);
//! assert!(store.get(&order.order_id).await.is_err());
//! assert_eq!(store.get(&order.order_id).await?.status, OrderStatus::Pending);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use order_pipeline_core::environment::{Clock, IdGenerator};

mod channel;
mod failure;
mod order_store;
mod payment;
mod queue;
mod topic;

pub use channel::RecordingChannel;
pub use failure::FailureSwitch;
pub use order_store::InMemoryOrderStore;
pub use payment::{ChargeCall, ScriptedPaymentSimulator};
pub use queue::InMemoryWorkQueue;
pub use topic::InMemoryEventTopic;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use order_pipeline_testing::mocks::FixedClock;
    /// use order_pipeline_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }

    /// The instant [`test_clock`] is pinned to.
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Predictable ids: `{prefix}-1`, `{prefix}-2`, ...
    #[derive(Debug)]
    pub struct SequentialIdGenerator {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator producing `{prefix}-N` starting at 1.
        #[must_use]
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(1),
            }
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new("order")
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            format!("{}-{n}", self.prefix)
        }
    }
}

/// Order fixtures shared by unit and integration tests.
pub mod fixtures {
    use crate::mocks::test_time;
    use order_pipeline_core::types::{
        CustomerId, LineItem, Money, Order, OrderId, OrderMetadata, OrderStatus,
    };

    /// Two items totalling `$100.99`: 2 × 25.50 + 1 × 49.99.
    #[must_use]
    pub fn sample_items() -> Vec<LineItem> {
        vec![
            LineItem::new("P1".to_string(), 2, Money::from_cents(2550)),
            LineItem::new("P2".to_string(), 1, Money::from_cents(4999)),
        ]
    }

    /// A `PENDING` order with [`sample_items`], created at the test instant.
    #[must_use]
    pub fn pending_order(order_id: &str) -> Order {
        order_with_items(order_id, sample_items())
    }

    /// A `PENDING` order with the given items.
    #[must_use]
    pub fn order_with_items(order_id: &str, items: Vec<LineItem>) -> Order {
        let now = test_time();
        Order {
            order_id: OrderId::new(order_id.to_string()),
            customer_id: CustomerId::new("user-123".to_string()),
            customer_email: "customer@example.com".to_string(),
            total_amount: Order::calculate_total(&items),
            items,
            status: OrderStatus::Pending,
            payment_id: None,
            failure_reason: None,
            announced_at: None,
            created_at: now,
            updated_at: now,
            metadata: OrderMetadata::default(),
        }
    }
}

/// Install a test-friendly tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIdGenerator, test_clock};
