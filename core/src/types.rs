//! Core domain types for the order pipeline.
//!
//! Orders progress through states: Pending → (Confirmed|Failed). Both outcomes
//! are terminal; a terminal status can be re-asserted but never changed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use thiserror::Error;

/// Unique identifier for an order
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Creates a new `OrderId` from a string
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a customer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    /// Creates a new `CustomerId` from a string
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque payment reference returned by a successful charge (`PAY-…`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    /// Prefix every payment reference carries for traceability.
    pub const PREFIX: &'static str = "PAY-";

    /// Creates a new `PaymentId` from a string
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors converting a decimal amount into [`Money`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount has fractional cents.
    #[error("amount {0} has more than two decimal places")]
    TooPrecise(Decimal),

    /// The amount does not fit in the cent representation.
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
}

/// Money amount in cents (to avoid floating point issues)
///
/// On the wire money is a decimal number (`100.99`); internally every sum is
/// computed on whole cents so totals are exact.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(i64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a new money amount from cents
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new money amount from dollars (converted to cents)
    #[must_use]
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// Returns the value in cents
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the exact decimal value (scale 2)
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Multiplies a unit amount by a quantity, `None` on overflow.
    #[must_use]
    pub fn checked_times(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    /// Adds two amounts, `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(MoneyError::OutOfRange(value))?;
        if !cents.fract().is_zero() {
            return Err(MoneyError::TooPrecise(value));
        }
        cents
            .to_i64()
            .map(Self)
            .ok_or(MoneyError::OutOfRange(value))
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.to_decimal()
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.to_decimal())
    }
}

/// A single line item in an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Product identifier
    pub product_id: String,
    /// Quantity ordered (1..=100 once validated)
    pub quantity: u32,
    /// Price per unit
    pub unit_price: Money,
}

impl LineItem {
    /// Creates a new line item
    #[must_use]
    pub const fn new(product_id: String, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    /// Calculates the total price for this line item
    #[must_use]
    pub const fn total(&self) -> Money {
        Money(self.unit_price.0 * self.quantity as i64)
    }
}

/// Status of an order in its lifecycle
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order has been accepted and is awaiting payment
    Pending,
    /// Payment succeeded
    Confirmed,
    /// Payment was declined or processing failed
    Failed,
}

impl OrderStatus {
    /// Wire name of the status
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
        }
    }

    /// `CONFIRMED` and `FAILED` admit no further transition.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Checks whether moving to `next` respects the order state machine.
    ///
    /// Forward moves out of `PENDING` are allowed; a terminal status may only
    /// be re-asserted.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Pending | Self::Confirmed | Self::Failed)
                | (Self::Confirmed, Self::Confirmed)
                | (Self::Failed, Self::Failed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance captured when the order was created. Never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMetadata {
    /// Client user agent
    pub user_agent: String,
    /// Source address of the request
    pub source_ip: String,
}

impl OrderMetadata {
    /// Placeholder used when the transport did not report a value
    pub const UNKNOWN: &'static str = "unknown";
}

impl Default for OrderMetadata {
    fn default() -> Self {
        Self {
            user_agent: Self::UNKNOWN.to_string(),
            source_ip: Self::UNKNOWN.to_string(),
        }
    }
}

/// The central entity: a customer's purchase and its lifecycle state.
///
/// `items` and `total_amount` are fixed at creation. Later mutations only
/// touch `status`, `payment_id`, `failure_reason`, `announced_at` and
/// `updated_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order identifier
    pub order_id: OrderId,
    /// Customer who placed the order
    pub customer_id: CustomerId,
    /// Email copied from the authenticated identity
    pub customer_email: String,
    /// Line items in the order
    pub items: Vec<LineItem>,
    /// Sum of item subtotals at creation
    pub total_amount: Money,
    /// Current order status
    pub status: OrderStatus,
    /// Payment reference, present once confirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
    /// Why the order failed, present once failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// When the `ORDER_CONFIRMED` event was published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announced_at: Option<DateTime<Utc>>,
    /// When the order was created
    pub created_at: DateTime<Utc>,
    /// Refreshed on every state transition
    pub updated_at: DateTime<Utc>,
    /// Request provenance
    #[serde(default)]
    pub metadata: OrderMetadata,
}

impl Order {
    /// Calculates total from items
    #[must_use]
    pub fn calculate_total(items: &[LineItem]) -> Money {
        items.iter().map(LineItem::total).sum()
    }

    /// Whether the order reached `CONFIRMED` or `FAILED`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
