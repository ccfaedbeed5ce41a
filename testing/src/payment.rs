//! Scripted payment simulator.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use order_pipeline_core::payment::{PaymentError, PaymentResult, PaymentSimulator};
use order_pipeline_core::types::{Money, OrderId, PaymentId};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A recorded call to [`ScriptedPaymentSimulator::charge`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChargeCall {
    /// Order charged.
    pub order_id: OrderId,
    /// Amount requested.
    pub amount: Money,
}

#[derive(Debug, Default)]
struct Script {
    per_order: HashMap<OrderId, PaymentResult<PaymentId>>,
    queued: VecDeque<PaymentResult<PaymentId>>,
    calls: Vec<ChargeCall>,
}

/// Payment simulator whose outcomes are set up by the test.
///
/// Resolution order: a per-order outcome, then the next queued outcome, then
/// the default (approve with `PAY-{order_id}`). Every call is recorded.
///
/// # Example
///
/// ```
/// use order_pipeline_core::payment::{PaymentError, PaymentSimulator};
/// use order_pipeline_core::types::{Money, OrderId};
/// use order_pipeline_testing::ScriptedPaymentSimulator;
///
/// # async fn example() {
/// let payments = ScriptedPaymentSimulator::approving();
/// payments.decline_order("order-2", "Insufficient funds");
///
/// let ok = payments.charge(&OrderId::new("order-1".into()), Money::from_cents(100)).await;
/// assert_eq!(ok.unwrap().as_str(), "PAY-order-1");
///
/// let declined = payments.charge(&OrderId::new("order-2".into()), Money::from_cents(100)).await;
/// assert!(matches!(declined, Err(PaymentError::Declined { .. })));
/// assert_eq!(payments.call_count(), 2);
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ScriptedPaymentSimulator {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl ScriptedPaymentSimulator {
    /// Approves everything not scripted otherwise.
    #[must_use]
    pub fn approving() -> Self {
        Self::default()
    }

    /// Wait `delay` before answering each charge.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Decline every charge for `order_id`.
    pub fn decline_order(&self, order_id: &str, reason: &str) {
        self.script.lock().unwrap().per_order.insert(
            OrderId::new(order_id.to_string()),
            Err(PaymentError::Declined {
                reason: reason.to_string(),
            }),
        );
    }

    /// Queue an outcome for the next unscripted charge.
    pub fn push_outcome(&self, outcome: PaymentResult<PaymentId>) {
        self.script.lock().unwrap().queued.push_back(outcome);
    }

    /// Every charge made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ChargeCall> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Number of charges made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    fn resolve(&self, order_id: &OrderId, amount: Money) -> PaymentResult<PaymentId> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(ChargeCall {
            order_id: order_id.clone(),
            amount,
        });
        if let Some(outcome) = script.per_order.get(order_id) {
            return outcome.clone();
        }
        script.queued.pop_front().unwrap_or_else(|| {
            Ok(PaymentId::new(format!("{}{order_id}", PaymentId::PREFIX)))
        })
    }
}

impl PaymentSimulator for ScriptedPaymentSimulator {
    fn charge(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = PaymentResult<PaymentId>> + Send + '_>> {
        let order_id = order_id.clone();
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.resolve(&order_id, amount)
        })
    }
}
