//! Asynchronous order pipeline.
//!
//! Orders move through three decoupled stages connected by a work queue and
//! an event topic:
//!
//! 1. **Intake** ([`intake`]) validates a request, stores a `PENDING` order
//!    and enqueues a work item
//! 2. **Processing** ([`processor`]) charges the payment simulator and moves
//!    each order to `CONFIRMED` or `FAILED`, publishing a lifecycle event
//! 3. **Notification** ([`notifications`]) turns lifecycle events into
//!    customer notifications
//!
//! The Order Store is the only durable state. Queue and topic deliveries are
//! at-least-once, and every stage is idempotent against redelivery:
//! transitions are compare-and-set on `PENDING`, and terminal orders are
//! never changed.
//!
//! [`api::OrderPipeline`] assembles the stages behind one facade. With the
//! `http` feature, [`router`] exposes it over Axum.
//!
//! # Example
//!
//! ```
//! use order_pipeline::api::{OrderPipeline, PipelineEnvironment};
//! use order_pipeline::config::PipelineConfig;
//! use order_pipeline::identity::{AuthContext, Claims};
//! use order_pipeline::payment::ApprovingSimulator;
//! use order_pipeline::validator::{OrderRequest, RawItem};
//! use order_pipeline_core::types::{Money, OrderMetadata, OrderStatus};
//! use order_pipeline_testing::{InMemoryEventTopic, InMemoryOrderStore, InMemoryWorkQueue};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryOrderStore::new();
//! let queue = InMemoryWorkQueue::new();
//! let env = PipelineEnvironment::new(
//!     Arc::new(store.clone()),
//!     Arc::new(queue.clone()),
//!     Arc::new(InMemoryEventTopic::new()),
//!     Arc::new(ApprovingSimulator),
//! );
//! let pipeline = OrderPipeline::new(env, PipelineConfig::default());
//!
//! let caller = AuthContext::Claims(Claims {
//!     sub: "user-123".to_string(),
//!     email: "customer@example.com".to_string(),
//!     ..Claims::default()
//! });
//! let request = OrderRequest {
//!     items: Some(vec![RawItem::new("P1", 2.into(), "25.50".parse()?)]),
//! };
//!
//! let accepted = pipeline.submit_order(&caller, &request, OrderMetadata::default()).await?;
//! assert_eq!(accepted.total_amount, Money::from_cents(5100));
//!
//! pipeline.process_queue_batch(&queue.receive_batch(10)).await?;
//! let order = store.snapshot(accepted.order_id.as_str()).ok_or("missing")?;
//! assert_eq!(order.status, OrderStatus::Confirmed);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod events;
pub mod factory;
pub mod identity;
pub mod intake;
pub mod notifications;
pub mod payment;
pub mod processor;
pub mod reconcile;
pub mod validator;
pub mod work_item;

#[cfg(feature = "http")]
pub mod handlers;
#[cfg(feature = "http")]
pub mod router;

// Re-export commonly used types
pub use api::{OrderLookupError, OrderPipeline, PipelineEnvironment, SubmitError};
pub use config::PipelineConfig;
pub use identity::{AuthContext, Claims, Identity, UserInfo};
pub use intake::AcceptedOrder;
pub use processor::{BatchError, BatchReport};
pub use validator::{OrderRequest, RawItem, ValidationError};
