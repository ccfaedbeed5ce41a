//! Order store trait and related types.
//!
//! The order store is the single source of truth for order state. Queues and
//! topics only ever carry copies; anything that needs the current status of an
//! order asks the store.
//!
//! # Conditional updates
//!
//! Status changes go through [`OrderStore::update_status`] with an expected
//! prior status. Two workers processing redelivered copies of the same work
//! item race on that compare-and-set: exactly one moves the order out of
//! `PENDING`, the other observes [`OrderStoreError::StatusConflict`] and can
//! treat the order as already settled.
//!
//! Implementations share the transition rules through [`apply_status_update`],
//! so an in-memory fake and a database adapter reject the same updates.
//!
//! # Example
//!
//! ```no_run
//! use order_pipeline_core::order_store::{OrderStore, OrderStoreError, StatusUpdate};
//! use order_pipeline_core::types::{OrderId, PaymentId};
//! use order_pipeline_core::Utc;
//!
//! async fn confirm<S: OrderStore>(store: &S, id: OrderId) -> Result<(), OrderStoreError> {
//!     let update = StatusUpdate::confirm(id, PaymentId::new("PAY-1".to_string()), Utc::now());
//!     let order = store.update_status(update).await?;
//!     assert!(order.is_terminal());
//!     Ok(())
//! }
//! ```

use crate::types::{Order, OrderId, OrderStatus, PaymentId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during order store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStoreError {
    /// Create-only write hit an existing record.
    #[error("Order already exists: {0}")]
    AlreadyExists(OrderId),

    /// No order with this id.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Compare-and-set failed: the order is not in the expected status.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        /// The order that was being updated.
        order_id: OrderId,
        /// The status the caller expected.
        expected: OrderStatus,
        /// The status actually stored.
        actual: OrderStatus,
    },

    /// The requested transition is not permitted by the state machine.
    #[error("Invalid transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        /// The order that was being updated.
        order_id: OrderId,
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// Backend unavailable (connection, throttling, timeout).
    #[error("Order store unavailable: {0}")]
    Unavailable(String),
}

impl OrderStoreError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A conditional status change with the fields appended alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Order to update.
    pub order_id: OrderId,
    /// Required current status, or `None` for an unconditional write.
    pub expected: Option<OrderStatus>,
    /// New status.
    pub status: OrderStatus,
    /// Payment reference, attached on confirmation.
    pub payment_id: Option<PaymentId>,
    /// Failure reason, attached on failure.
    pub failure_reason: Option<String>,
    /// Publication time of the confirmation event, recorded once.
    pub announced_at: Option<DateTime<Utc>>,
    /// New `updatedAt` value.
    pub updated_at: DateTime<Utc>,
}

impl StatusUpdate {
    /// `PENDING → CONFIRMED` with the payment reference.
    #[must_use]
    pub const fn confirm(order_id: OrderId, payment_id: PaymentId, now: DateTime<Utc>) -> Self {
        Self {
            order_id,
            expected: Some(OrderStatus::Pending),
            status: OrderStatus::Confirmed,
            payment_id: Some(payment_id),
            failure_reason: None,
            announced_at: None,
            updated_at: now,
        }
    }

    /// `PENDING → FAILED` with a reason.
    #[must_use]
    pub const fn fail(order_id: OrderId, reason: String, now: DateTime<Utc>) -> Self {
        Self {
            order_id,
            expected: Some(OrderStatus::Pending),
            status: OrderStatus::Failed,
            payment_id: None,
            failure_reason: Some(reason),
            announced_at: None,
            updated_at: now,
        }
    }

    /// Record on a `CONFIRMED` order that its event went out.
    ///
    /// Status is re-asserted, not changed. Only the first announcement is
    /// kept.
    #[must_use]
    pub const fn announced(order_id: OrderId, now: DateTime<Utc>) -> Self {
        Self {
            order_id,
            expected: Some(OrderStatus::Confirmed),
            status: OrderStatus::Confirmed,
            payment_id: None,
            failure_reason: None,
            announced_at: Some(now),
            updated_at: now,
        }
    }
}

/// Apply a status update to a stored order in place.
///
/// Checks the expected status first, then the state machine. Re-asserting a
/// terminal status leaves `paymentId` and `updatedAt` untouched; the only
/// field it may fill in is an unset `announcedAt`.
///
/// # Errors
///
/// - `StatusConflict` if `expected` does not match the stored status
/// - `InvalidTransition` if the state machine forbids the move
pub fn apply_status_update(order: &mut Order, update: StatusUpdate) -> Result<(), OrderStoreError> {
    if let Some(expected) = update.expected {
        if order.status != expected {
            return Err(OrderStoreError::StatusConflict {
                order_id: order.order_id.clone(),
                expected,
                actual: order.status,
            });
        }
    }

    if !order.status.can_transition_to(update.status) {
        return Err(OrderStoreError::InvalidTransition {
            order_id: order.order_id.clone(),
            from: order.status,
            to: update.status,
        });
    }

    if order.status == update.status && order.is_terminal() {
        if order.announced_at.is_none() {
            order.announced_at = update.announced_at;
        }
        return Ok(());
    }

    order.status = update.status;
    order.updated_at = update.updated_at;
    if update.payment_id.is_some() {
        order.payment_id = update.payment_id;
    }
    if update.failure_reason.is_some() {
        order.failure_reason = update.failure_reason;
    }
    Ok(())
}

/// Persistence contract for orders.
///
/// # Dyn Compatibility
///
/// Methods return `Pin<Box<dyn Future>>` so the store can be shared as
/// `Arc<dyn OrderStore>` between the intake path and the batch processor.
pub trait OrderStore: Send + Sync {
    /// Create-only write.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if an order with the same id is stored
    /// - `Unavailable` if the backend cannot be reached
    fn create(
        &self,
        order: Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), OrderStoreError>> + Send + '_>>;

    /// Fetch the current record.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such order exists
    /// - `Unavailable` if the backend cannot be reached
    fn get(
        &self,
        order_id: &OrderId,
    ) -> Pin<Box<dyn Future<Output = Result<Order, OrderStoreError>> + Send + '_>>;

    /// Atomically apply a conditional status change and return the stored order.
    ///
    /// Implementations must behave as [`apply_status_update`] executed under a
    /// per-record lock.
    ///
    /// # Errors
    ///
    /// - `NotFound`, `StatusConflict`, `InvalidTransition` or `Unavailable`
    fn update_status(
        &self,
        update: StatusUpdate,
    ) -> Pin<Box<dyn Future<Output = Result<Order, OrderStoreError>> + Send + '_>>;

    /// List orders in `status` created strictly before `created_before`,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backend cannot be reached
    fn list_by_status(
        &self,
        status: OrderStatus,
        created_before: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, OrderStoreError>> + Send + '_>>;
}
