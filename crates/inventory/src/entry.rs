use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use kardexpos_core::{Entity, UserId, impl_uuid_newtype};
use kardexpos_products::ProductId;

use crate::amounts::{AmountError, LineAmounts};
use crate::movement::{MovementKind, MovementPolicy, PolicyError};

/// Longest free-text reason accepted on a movement.
pub const MAX_REASON_LEN: usize = 500;

/// Ledger entry identifier (UUIDv7, so ids sort by creation time).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KardexEntryId(Uuid);

impl_uuid_newtype!(KardexEntryId, "KardexEntryId");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("reason exceeds {MAX_REASON_LEN} characters")]
    ReasonTooLong,

    #[error("entry {entry_id} is inconsistent: {reason}")]
    Inconsistent {
        entry_id: KardexEntryId,
        reason: String,
    },

    #[error("entry for product {found} appended to the chain of product {expected}")]
    ProductMismatch { expected: ProductId, found: ProductId },

    #[error("chain broken for product {product_id}: previous stock_after {expected}, entry stock_before {found}")]
    ChainBroken {
        product_id: ProductId,
        expected: i64,
        found: i64,
    },
}

/// A requested stock movement for one product (the coordinator's input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub tax_rate: Decimal,
    pub reason: Option<String>,
    pub user_id: UserId,
}

impl MovementRequest {
    /// Validate everything that does not depend on current stock.
    pub fn validate(&self) -> Result<LineAmounts, EntryError> {
        if let Some(reason) = &self.reason {
            if reason.chars().count() > MAX_REASON_LEN {
                return Err(EntryError::ReasonTooLong);
            }
        }
        Ok(LineAmounts::compute(self.quantity, self.unit_cost, self.tax_rate)?)
    }

    fn normalized_reason(&self) -> Option<String> {
        self.reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
    }
}

/// Immutable record of one stock-affecting event for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KardexEntry {
    pub id: KardexEntryId,
    pub product_id: ProductId,
    pub movement_type: MovementKind,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reason: Option<String>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl KardexEntry {
    /// Build the entry that results from applying `request` on top of `stock_before`.
    ///
    /// Fails with [`PolicyError::InsufficientStock`] (wrapped) if a decreasing
    /// movement would take stock below zero.
    pub fn record(
        request: &MovementRequest,
        stock_before: i64,
        id: KardexEntryId,
        created_at: DateTime<Utc>,
    ) -> Result<Self, EntryError> {
        let amounts = request.validate()?;
        let stock_after = MovementPolicy::apply(request.kind, stock_before, request.quantity)?;

        Ok(Self {
            id,
            product_id: request.product_id,
            movement_type: request.kind,
            quantity: request.quantity,
            unit_cost: request.unit_cost,
            subtotal: amounts.subtotal,
            tax_rate: request.tax_rate,
            tax_amount: amounts.tax_amount,
            total: amounts.total,
            stock_before,
            stock_after,
            reason: request.normalized_reason(),
            user_id: request.user_id,
            created_at,
        })
    }

    /// Quantity with the movement's sign applied.
    pub fn signed_quantity(&self) -> i64 {
        self.movement_type.sign() * self.quantity
    }

    pub fn amounts(&self) -> LineAmounts {
        LineAmounts {
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            total: self.total,
        }
    }

    /// Re-check the per-entry invariants (stock arithmetic and amounts).
    pub fn validate(&self) -> Result<(), EntryError> {
        let inconsistent = |reason: String| EntryError::Inconsistent {
            entry_id: self.id,
            reason,
        };

        let expected_after = MovementPolicy::apply(self.movement_type, self.stock_before, self.quantity)
            .map_err(|e| inconsistent(e.to_string()))?;
        if expected_after != self.stock_after {
            return Err(inconsistent(format!(
                "stock_after {} does not match {} {} on {}",
                self.stock_after, self.movement_type, self.quantity, self.stock_before
            )));
        }

        let expected = LineAmounts::compute(self.quantity, self.unit_cost, self.tax_rate)
            .map_err(|e| inconsistent(e.to_string()))?;
        if expected != self.amounts() {
            return Err(inconsistent(format!(
                "amounts {:?} do not match recomputed {:?}",
                self.amounts(),
                expected
            )));
        }

        Ok(())
    }

    /// Check the chain invariant against the product's previous entry.
    ///
    /// With no previous entry any starting point is accepted (genesis stock comes
    /// from the catalog).
    pub fn ensure_follows(&self, previous: Option<&KardexEntry>) -> Result<(), EntryError> {
        let Some(prev) = previous else {
            return Ok(());
        };
        if prev.product_id != self.product_id {
            return Err(EntryError::ProductMismatch {
                expected: prev.product_id,
                found: self.product_id,
            });
        }
        if prev.stock_after != self.stock_before {
            return Err(EntryError::ChainBroken {
                product_id: self.product_id,
                expected: prev.stock_after,
                found: self.stock_before,
            });
        }
        Ok(())
    }
}

impl Entity for KardexEntry {
    type Id = KardexEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn request(product_id: ProductId, kind: MovementKind, quantity: i64) -> MovementRequest {
        MovementRequest {
            product_id,
            kind,
            quantity,
            unit_cost: d("1.50"),
            tax_rate: d("12"),
            reason: Some("  weekly restock ".to_string()),
            user_id: UserId::new(),
        }
    }

    fn record(req: &MovementRequest, before: i64) -> Result<KardexEntry, EntryError> {
        KardexEntry::record(req, before, KardexEntryId::new(), Utc::now())
    }

    #[test]
    fn purchase_then_sale_scenario() {
        let p = ProductId::new();

        let purchase = record(&request(p, MovementKind::Purchase, 5), 10).unwrap();
        assert_eq!((purchase.stock_before, purchase.stock_after), (10, 15));
        assert_eq!(purchase.subtotal, d("7.50"));
        assert_eq!(purchase.tax_amount, d("0.90"));
        assert_eq!(purchase.total, d("8.40"));
        assert_eq!(purchase.reason.as_deref(), Some("weekly restock"));

        let sale = record(&request(p, MovementKind::Sale, 3), purchase.stock_after).unwrap();
        assert_eq!((sale.stock_before, sale.stock_after), (15, 12));
        assert_eq!(sale.signed_quantity(), -3);
        sale.ensure_follows(Some(&purchase)).unwrap();

        let err = record(&request(p, MovementKind::Sale, 20), sale.stock_after).unwrap_err();
        assert!(matches!(
            err,
            EntryError::Policy(PolicyError::InsufficientStock {
                available: 12,
                requested: 20,
                ..
            })
        ));
    }

    #[test]
    fn blank_reason_is_dropped() {
        let mut req = request(ProductId::new(), MovementKind::AdjustmentIn, 1);
        req.reason = Some("   ".to_string());
        assert_eq!(record(&req, 0).unwrap().reason, None);
    }

    #[test]
    fn overly_long_reason_is_rejected() {
        let mut req = request(ProductId::new(), MovementKind::AdjustmentIn, 1);
        req.reason = Some("x".repeat(MAX_REASON_LEN + 1));
        assert_eq!(record(&req, 0).unwrap_err(), EntryError::ReasonTooLong);
    }

    #[test]
    fn chain_break_is_detected() {
        let p = ProductId::new();
        let first = record(&request(p, MovementKind::Purchase, 5), 0).unwrap();
        // Valid on its own, but computed from a stock the ledger has moved past.
        let stale = record(&request(p, MovementKind::Purchase, 1), 0).unwrap();

        assert_eq!(
            stale.ensure_follows(Some(&first)),
            Err(EntryError::ChainBroken {
                product_id: p,
                expected: 5,
                found: 0,
            })
        );
    }

    #[test]
    fn entries_of_other_products_do_not_chain() {
        let first = record(&request(ProductId::new(), MovementKind::Purchase, 5), 0).unwrap();
        let other = record(&request(ProductId::new(), MovementKind::Purchase, 5), 5).unwrap();
        assert!(matches!(
            other.ensure_follows(Some(&first)),
            Err(EntryError::ProductMismatch { .. })
        ));
    }

    #[test]
    fn tampered_entry_fails_validation() {
        let mut entry = record(&request(ProductId::new(), MovementKind::Purchase, 5), 10).unwrap();
        entry.validate().unwrap();

        entry.stock_after = 16;
        assert!(matches!(entry.validate(), Err(EntryError::Inconsistent { .. })));

        entry.stock_after = 15;
        entry.total = d("100");
        assert!(matches!(entry.validate(), Err(EntryError::Inconsistent { .. })));
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let entry = record(&request(ProductId::new(), MovementKind::ReturnIn, 2), 0).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["movementType"], "RETURN_IN");
        assert_eq!(json["stockBefore"], 0);
        assert_eq!(json["stockAfter"], 2);
        assert_eq!(json["subtotal"], "3.00");
    }
}
