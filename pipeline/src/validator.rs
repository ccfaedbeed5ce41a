//! Order validation.
//!
//! Turns an untrusted [`OrderRequest`] into a [`ValidatedOrder`]: typed line
//! items plus an exact total. Rules are checked item by item and the first
//! violation wins:
//!
//! 1. `items` is present and non-empty
//! 2. every item carries `productId`, `quantity` and `price`
//! 3. quantity and price are positive, quantity is whole
//! 4. quantity does not exceed the per-item maximum
//! 5. price has at most two decimal places
//! 6. the order total does not exceed the configured maximum
//!
//! Totals are computed on whole cents, so float rounding never shows up in an
//! order.

use crate::config::OrderLimits;
use order_pipeline_core::types::{LineItem, Money, MoneyError};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order creation request as received from a client.
///
/// Every field is optional so the validator, rather than the JSON layer,
/// reports what is missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Requested items
    #[serde(default)]
    pub items: Option<Vec<RawItem>>,
}

/// One requested item before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    /// Product identifier
    #[serde(default)]
    pub product_id: Option<String>,
    /// Requested quantity
    #[serde(default)]
    pub quantity: Option<Decimal>,
    /// Unit price
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl RawItem {
    /// Convenience constructor for a complete item.
    #[must_use]
    pub fn new(product_id: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        Self {
            product_id: Some(product_id.into()),
            quantity: Some(quantity),
            price: Some(price),
        }
    }
}

/// Validation failure. The `Display` text is the user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Rule 1
    #[error("items array is required and must not be empty")]
    MissingItems,

    /// Rule 2
    #[error("Each item must have productId, quantity, and price")]
    IncompleteItem {
        /// Position of the offending item
        index: usize,
    },

    /// Rule 3
    #[error("Quantity and price must be positive numbers")]
    NonPositive {
        /// Position of the offending item
        index: usize,
    },

    /// Rule 3, fractional quantity
    #[error("Quantity must be a whole number")]
    FractionalQuantity {
        /// Position of the offending item
        index: usize,
    },

    /// Rule 4
    #[error("Maximum quantity per item is {max}")]
    QuantityTooLarge {
        /// Position of the offending item
        index: usize,
        /// Configured maximum
        max: u32,
    },

    /// Rule 5
    #[error("Price must have at most 2 decimal places")]
    PriceTooPrecise {
        /// Position of the offending item
        index: usize,
    },

    /// Rule 6
    #[error("Order total exceeds maximum limit of {max}")]
    TotalTooLarge {
        /// Configured maximum
        max: Money,
    },
}

impl ValidationError {
    /// Short label used as a metrics tag.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingItems => "missing_items",
            Self::IncompleteItem { .. } => "incomplete_item",
            Self::NonPositive { .. } => "non_positive",
            Self::FractionalQuantity { .. } => "fractional_quantity",
            Self::QuantityTooLarge { .. } => "quantity_too_large",
            Self::PriceTooPrecise { .. } => "price_too_precise",
            Self::TotalTooLarge { .. } => "total_too_large",
        }
    }
}

/// A request that passed every rule.
///
/// Only the validator constructs this, so holding one proves the items and
/// total are within limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedOrder {
    items: Vec<LineItem>,
    total: Money,
}

impl ValidatedOrder {
    /// Validated line items, in request order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Exact order total.
    #[must_use]
    pub const fn total(&self) -> Money {
        self.total
    }

    /// Number of line items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Split into items and total.
    #[must_use]
    pub fn into_parts(self) -> (Vec<LineItem>, Money) {
        (self.items, self.total)
    }
}

/// Validate a request against `limits`.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
pub fn validate(request: &OrderRequest, limits: &OrderLimits) -> Result<ValidatedOrder, ValidationError> {
    let raw_items = match request.items.as_deref() {
        Some(items) if !items.is_empty() => items,
        _ => return Err(ValidationError::MissingItems),
    };

    let total_exceeded = ValidationError::TotalTooLarge {
        max: limits.max_total,
    };

    let mut items = Vec::with_capacity(raw_items.len());
    let mut total = Money::ZERO;

    for (index, raw) in raw_items.iter().enumerate() {
        let item = validate_item(index, raw, limits).map_err(|err| match err {
            ItemRejection::Rule(err) => err,
            ItemRejection::Overflow => total_exceeded.clone(),
        })?;

        total = total
            .checked_add(item.total())
            .ok_or_else(|| total_exceeded.clone())?;
        items.push(item);
    }

    if total > limits.max_total {
        return Err(total_exceeded);
    }

    Ok(ValidatedOrder { items, total })
}

enum ItemRejection {
    Rule(ValidationError),
    Overflow,
}

impl From<ValidationError> for ItemRejection {
    fn from(err: ValidationError) -> Self {
        Self::Rule(err)
    }
}

fn validate_item(index: usize, raw: &RawItem, limits: &OrderLimits) -> Result<LineItem, ItemRejection> {
    let (Some(product_id), Some(quantity), Some(price)) = (
        raw.product_id.as_deref().filter(|id| !id.trim().is_empty()),
        raw.quantity,
        raw.price,
    ) else {
        return Err(ValidationError::IncompleteItem { index }.into());
    };

    if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
        return Err(ValidationError::NonPositive { index }.into());
    }
    if !quantity.fract().is_zero() {
        return Err(ValidationError::FractionalQuantity { index }.into());
    }
    if quantity > Decimal::from(limits.max_quantity_per_item) {
        return Err(ValidationError::QuantityTooLarge {
            index,
            max: limits.max_quantity_per_item,
        }
        .into());
    }
    let quantity = quantity.to_u32().ok_or(ItemRejection::Overflow)?;

    let unit_price = Money::try_from(price).map_err(|err| match err {
        MoneyError::TooPrecise(_) => ItemRejection::Rule(ValidationError::PriceTooPrecise { index }),
        MoneyError::OutOfRange(_) => ItemRejection::Overflow,
    })?;

    // LineItem::total multiplies without overflow checks.
    unit_price.checked_times(quantity).ok_or(ItemRejection::Overflow)?;

    Ok(LineItem::new(product_id.to_string(), quantity, unit_price))
}
