//! # Order Pipeline Core
//!
//! Domain model and collaborator contracts for the asynchronous order pipeline.
//!
//! This crate provides the pieces every stage of the pipeline agrees on:
//!
//! - **Domain types**: [`Order`](types::Order), [`LineItem`](types::LineItem),
//!   [`Money`](types::Money), [`OrderStatus`](types::OrderStatus)
//! - **Messages**: the [`Message`](message::Message) envelope carried by the work
//!   queue and the event topic
//! - **Collaborators**: [`OrderStore`](order_store::OrderStore),
//!   [`WorkQueue`](work_queue::WorkQueue), [`EventTopic`](event_topic::EventTopic),
//!   [`PaymentSimulator`](payment::PaymentSimulator),
//!   [`NotificationChannel`](notification::NotificationChannel)
//! - **Environment**: [`Clock`](environment::Clock) and
//!   [`IdGenerator`](environment::IdGenerator) for deterministic tests
//!
//! ## Architecture Principles
//!
//! - The Order Store is the single source of truth for order state
//! - The queue and the topic carry transient, at-least-once copies
//! - Every external dependency is a trait object injected at construction
//!
//! ## Example
//!
//! ```
//! use order_pipeline_core::types::{LineItem, Money, OrderStatus};
//!
//! let item = LineItem::new("P1".to_string(), 2, Money::from_cents(2550));
//! assert_eq!(item.total(), Money::from_cents(5100));
//! assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod event_topic;
pub mod message;
pub mod notification;
pub mod order_store;
pub mod payment;
pub mod types;
pub mod work_queue;

/// Environment module - Dependency injection traits
///
/// All sources of nondeterminism the pipeline needs (time, identifiers) are
/// abstracted behind traits and injected, so tests can pin them down.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use order_pipeline_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of globally unique identifiers.
    pub trait IdGenerator: Send + Sync {
        /// Produce a new identifier, unique for the lifetime of the system.
        fn next_id(&self) -> String;
    }

    /// Production id generator producing random UUID v4 strings.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UuidGenerator;

    impl IdGenerator for UuidGenerator {
        fn next_id(&self) -> String {
            uuid::Uuid::new_v4().to_string()
        }
    }
}
