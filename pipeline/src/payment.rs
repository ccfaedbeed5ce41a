//! Payment simulator policies.
//!
//! [`SeededSimulator`] makes outcomes reproducible: the RNG for a charge is
//! seeded from the configured seed and a stable hash of the order id, so
//! redelivering a work item replays the same decision and reference.

use crate::config::{PaymentConfig, PaymentPolicy};
use order_pipeline_core::payment::{PaymentError, PaymentResult, PaymentSimulator};
use order_pipeline_core::types::{Money, OrderId, PaymentId};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

const DECLINE_REASONS: &[&str] = &[
    "Insufficient funds",
    "Card expired",
    "Issuer declined the transaction",
];

/// Build the simulator selected by `config`.
#[must_use]
pub fn simulator_from_config(config: &PaymentConfig) -> Arc<dyn PaymentSimulator> {
    match config.policy {
        PaymentPolicy::Approve => Arc::new(ApprovingSimulator),
        PaymentPolicy::Decline => Arc::new(DecliningSimulator::default()),
        PaymentPolicy::Seeded => Arc::new(SeededSimulator::new(config.seed, config.approval_rate)),
    }
}

/// Approves every charge with a fresh `PAY-<uuid>` reference.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApprovingSimulator;

impl PaymentSimulator for ApprovingSimulator {
    fn charge(
        &self,
        _order_id: &OrderId,
        _amount: Money,
    ) -> Pin<Box<dyn Future<Output = PaymentResult<PaymentId>> + Send + '_>> {
        Box::pin(async move { Ok(payment_reference(Uuid::new_v4())) })
    }
}

/// Declines every charge with a fixed reason.
#[derive(Clone, Debug)]
pub struct DecliningSimulator {
    reason: String,
}

impl DecliningSimulator {
    /// Decline with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl Default for DecliningSimulator {
    fn default() -> Self {
        Self::new(DECLINE_REASONS[0])
    }
}

impl PaymentSimulator for DecliningSimulator {
    fn charge(
        &self,
        _order_id: &OrderId,
        _amount: Money,
    ) -> Pin<Box<dyn Future<Output = PaymentResult<PaymentId>> + Send + '_>> {
        let reason = self.reason.clone();
        Box::pin(async move { Err(PaymentError::Declined { reason }) })
    }
}

/// Deterministic per-order outcomes.
///
/// # Example
///
/// ```
/// use order_pipeline::payment::SeededSimulator;
///
/// let simulator = SeededSimulator::new(42, 0.9);
/// assert!((simulator.approval_rate() - 0.9).abs() < f64::EPSILON);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct SeededSimulator {
    seed: u64,
    approval_rate: f64,
}

impl SeededSimulator {
    /// Create a simulator approving roughly `approval_rate` of orders.
    ///
    /// The rate is clamped to `0.0..=1.0`.
    #[must_use]
    pub fn new(seed: u64, approval_rate: f64) -> Self {
        let approval_rate = if approval_rate.is_nan() {
            0.0
        } else {
            approval_rate.clamp(0.0, 1.0)
        };
        Self { seed, approval_rate }
    }

    /// Configured approval rate
    #[must_use]
    pub const fn approval_rate(&self) -> f64 {
        self.approval_rate
    }

    fn decide(&self, order_id: &OrderId) -> PaymentResult<PaymentId> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ stable_hash(order_id.as_str()));

        if rng.gen_bool(self.approval_rate) {
            let mut bytes = [0u8; 16];
            rng.fill_bytes(&mut bytes);
            Ok(payment_reference(uuid::Builder::from_random_bytes(bytes).into_uuid()))
        } else {
            let reason = DECLINE_REASONS[rng.gen_range(0..DECLINE_REASONS.len())];
            Err(PaymentError::Declined {
                reason: reason.to_string(),
            })
        }
    }
}

impl PaymentSimulator for SeededSimulator {
    fn charge(
        &self,
        order_id: &OrderId,
        _amount: Money,
    ) -> Pin<Box<dyn Future<Output = PaymentResult<PaymentId>> + Send + '_>> {
        let outcome = self.decide(order_id);
        Box::pin(async move { outcome })
    }
}

fn payment_reference(id: Uuid) -> PaymentId {
    PaymentId::new(format!("{}{id}", PaymentId::PREFIX))
}

/// FNV-1a. Stable across processes and toolchains, unlike `DefaultHasher`.
fn stable_hash(value: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    value
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(id: &str) -> OrderId {
        OrderId::new(id.to_string())
    }

    #[tokio::test]
    async fn approving_issues_references() {
        let reference = ApprovingSimulator
            .charge(&order("o-1"), Money::from_cents(100))
            .await
            .unwrap();
        assert!(reference.as_str().starts_with("PAY-"));
        assert!(Uuid::parse_str(&reference.as_str()[4..]).is_ok());
    }

    #[tokio::test]
    async fn declining_reports_reason() {
        let err = DecliningSimulator::new("Card expired")
            .charge(&order("o-1"), Money::from_cents(100))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PaymentError::Declined {
                reason: "Card expired".to_string()
            }
        );
    }

    #[tokio::test]
    async fn seeded_is_reproducible_per_order() {
        let simulator = SeededSimulator::new(7, 0.5);
        for i in 0..20 {
            let id = order(&format!("order-{i}"));
            let first = simulator.charge(&id, Money::from_cents(100)).await;
            let second = simulator.charge(&id, Money::from_cents(100)).await;
            assert_eq!(first, second);
        }
    }

    #[tokio::test]
    async fn seeded_extremes() {
        let always = SeededSimulator::new(1, 1.0);
        let never = SeededSimulator::new(1, 0.0);
        for i in 0..10 {
            let id = order(&format!("order-{i}"));
            assert!(always.charge(&id, Money::ZERO).await.is_ok());
            assert!(matches!(
                never.charge(&id, Money::ZERO).await,
                Err(PaymentError::Declined { .. })
            ));
        }
    }

    #[test]
    fn seeded_rate_is_roughly_honoured() {
        let simulator = SeededSimulator::new(42, 0.9);
        let approved = (0..1000)
            .filter(|i| simulator.decide(&order(&format!("order-{i}"))).is_ok())
            .count();
        assert!((800..=980).contains(&approved), "approved {approved} of 1000");
    }

    #[test]
    fn rate_is_clamped() {
        assert!((SeededSimulator::new(0, 3.0).approval_rate() - 1.0).abs() < f64::EPSILON);
        assert!(SeededSimulator::new(0, f64::NAN).approval_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn stable_hash_known_value() {
        assert_eq!(stable_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_ne!(stable_hash("order-1"), stable_hash("order-2"));
    }

    #[test]
    fn builds_configured_policy() {
        let config = PaymentConfig {
            policy: PaymentPolicy::Decline,
            ..PaymentConfig::default()
        };
        let simulator = simulator_from_config(&config);
        let outcome = tokio_test::block_on(simulator.charge(&order("o-1"), Money::ZERO));
        assert!(outcome.is_err());
    }
}
