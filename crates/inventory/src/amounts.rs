//! Cost and tax arithmetic for one movement line.
//!
//! Prices are tax-exclusive: `subtotal = quantity * unit_cost`,
//! `tax_amount = subtotal * tax_rate / 100`, `total = subtotal + tax_amount`.
//! Every monetary result is rounded to cents (midpoint away from zero).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kardexpos_core::ValueObject;

const MONEY_SCALE: u32 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("unit cost cannot be negative (got {0})")]
    NegativeUnitCost(Decimal),

    #[error("tax rate must be between 0 and 100 percent (got {0})")]
    InvalidTaxRate(Decimal),

    #[error("quantity must be positive (got {0})")]
    InvalidQuantity(i64),

    #[error("amount overflow")]
    Overflow,
}

/// Round a monetary amount to cents.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Monetary breakdown of a movement or sale line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAmounts {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl ValueObject for LineAmounts {}

impl LineAmounts {
    pub fn zero() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    pub fn compute(quantity: i64, unit_cost: Decimal, tax_rate: Decimal) -> Result<Self, AmountError> {
        if quantity <= 0 {
            return Err(AmountError::InvalidQuantity(quantity));
        }
        if unit_cost < Decimal::ZERO {
            return Err(AmountError::NegativeUnitCost(unit_cost));
        }
        if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
            return Err(AmountError::InvalidTaxRate(tax_rate));
        }

        let subtotal = unit_cost
            .checked_mul(Decimal::from(quantity))
            .map(round_money)
            .ok_or(AmountError::Overflow)?;
        let tax_amount = subtotal
            .checked_mul(tax_rate)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(round_money)
            .ok_or(AmountError::Overflow)?;
        let total = subtotal.checked_add(tax_amount).ok_or(AmountError::Overflow)?;

        Ok(Self {
            subtotal,
            tax_amount,
            total,
        })
    }

    /// Sum two breakdowns (used for sale totals).
    pub fn checked_add(self, other: LineAmounts) -> Option<LineAmounts> {
        Some(LineAmounts {
            subtotal: self.subtotal.checked_add(other.subtotal)?,
            tax_amount: self.tax_amount.checked_add(other.tax_amount)?,
            total: self.total.checked_add(other.total)?,
        })
    }
}
