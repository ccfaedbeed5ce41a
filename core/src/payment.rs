//! Payment capability consumed by the batch processor.
//!
//! Settling an order is pluggable: a simulator in development and tests, a
//! real gateway in a deployment. Outcomes must be reproducible for a given
//! order so redelivered work items and failure paths can be tested.

use crate::types::{Money, OrderId, PaymentId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Payment result
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Payment error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// The charge was refused. An expected business outcome.
    #[error("Payment declined: {reason}")]
    Declined {
        /// Decline reason
        reason: String,
    },

    /// The payment provider could not be reached.
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),
}

/// Attempts to settle an order's total amount.
pub trait PaymentSimulator: Send + Sync {
    /// Charge `amount` for `order_id`, returning a `PAY-` prefixed reference.
    ///
    /// # Errors
    ///
    /// - `Declined` when the policy refuses the charge
    /// - `Unavailable` when the provider cannot be reached
    fn charge(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = PaymentResult<PaymentId>> + Send + '_>>;
}
