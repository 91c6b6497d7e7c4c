//! Replay of a product's ledger history.
//!
//! Replaying walks entries in ledger order and re-checks every per-entry invariant
//! plus the chain between neighbours. A clean replay proves conservation: the final
//! stock equals the genesis stock plus the sum of signed quantities.

use serde::Serialize;
use thiserror::Error;

use kardexpos_products::ProductId;

use crate::entry::{EntryError, KardexEntry, KardexEntryId};

/// First entry that breaks the ledger, with its position in the replayed slice.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("ledger entry #{index} ({entry_id}) is invalid: {source}")]
pub struct ChainViolation {
    pub index: usize,
    pub entry_id: KardexEntryId,
    #[source]
    pub source: EntryError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub product_id: ProductId,
    pub entry_count: usize,
    /// Stock before the first entry. `None` when the product has no history.
    pub genesis_stock: Option<i64>,
    /// Stock after the last entry. `None` when the product has no history.
    pub final_stock: Option<i64>,
    pub units_in: i64,
    pub units_out: i64,
}

impl ReplayReport {
    pub fn net_change(&self) -> i64 {
        self.units_in - self.units_out
    }
}

/// Replay `entries` (oldest first) for `product_id`.
pub fn replay(product_id: ProductId, entries: &[KardexEntry]) -> Result<ReplayReport, ChainViolation> {
    let mut report = ReplayReport {
        product_id,
        entry_count: entries.len(),
        genesis_stock: entries.first().map(|e| e.stock_before),
        final_stock: None,
        units_in: 0,
        units_out: 0,
    };

    let mut previous: Option<&KardexEntry> = None;
    for (index, entry) in entries.iter().enumerate() {
        let violation = |source: EntryError| ChainViolation {
            index,
            entry_id: entry.id,
            source,
        };

        if entry.product_id != product_id {
            return Err(violation(EntryError::ProductMismatch {
                expected: product_id,
                found: entry.product_id,
            }));
        }
        entry.validate().map_err(violation)?;
        entry.ensure_follows(previous).map_err(violation)?;

        let signed = entry.signed_quantity();
        if signed >= 0 {
            report.units_in += signed;
        } else {
            report.units_out -= signed;
        }
        previous = Some(entry);
    }

    report.final_stock = previous.map(|e| e.stock_after);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MovementRequest;
    use crate::movement::MovementKind;
    use chrono::Utc;
    use kardexpos_core::UserId;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn movement(product_id: ProductId, kind: MovementKind, quantity: i64) -> MovementRequest {
        MovementRequest {
            product_id,
            kind,
            quantity,
            unit_cost: Decimal::new(250, 2),
            tax_rate: Decimal::new(12, 0),
            reason: None,
            user_id: UserId::new(),
        }
    }

    /// Build a ledger by applying movements in order, skipping infeasible ones.
    fn build(product_id: ProductId, genesis: i64, moves: &[(MovementKind, i64)]) -> Vec<KardexEntry> {
        let mut stock = genesis;
        let mut out = Vec::new();
        for (kind, qty) in moves {
            if let Ok(entry) = KardexEntry::record(
                &movement(product_id, *kind, *qty),
                stock,
                KardexEntryId::new(),
                Utc::now(),
            ) {
                stock = entry.stock_after;
                out.push(entry);
            }
        }
        out
    }

    #[test]
    fn empty_history_replays_to_nothing() {
        let p = ProductId::new();
        let report = replay(p, &[]).unwrap();
        assert_eq!(report.entry_count, 0);
        assert_eq!(report.genesis_stock, None);
        assert_eq!(report.final_stock, None);
    }

    #[test]
    fn clean_history_reports_final_stock() {
        let p = ProductId::new();
        let entries = build(
            p,
            10,
            &[(MovementKind::Purchase, 5), (MovementKind::Sale, 3), (MovementKind::Damaged, 2)],
        );
        let report = replay(p, &entries).unwrap();
        assert_eq!(report.genesis_stock, Some(10));
        assert_eq!(report.final_stock, Some(10));
        assert_eq!(report.units_in, 5);
        assert_eq!(report.units_out, 5);
        assert_eq!(report.net_change(), 0);
    }

    #[test]
    fn broken_link_is_reported_with_position() {
        let p = ProductId::new();
        let mut entries = build(p, 0, &[(MovementKind::Purchase, 5), (MovementKind::Purchase, 5)]);
        entries[1].stock_before = 4;
        entries[1].stock_after = 9;

        let err = replay(p, &entries).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.entry_id, entries[1].id);
        assert!(matches!(err.source, EntryError::ChainBroken { expected: 5, found: 4, .. }));
    }

    #[test]
    fn foreign_entry_is_rejected() {
        let p = ProductId::new();
        let entries = build(ProductId::new(), 0, &[(MovementKind::Purchase, 1)]);
        let err = replay(p, &entries).unwrap_err();
        assert!(matches!(err.source, EntryError::ProductMismatch { .. }));
    }

    fn arb_kind() -> impl Strategy<Value = MovementKind> {
        prop::sample::select(MovementKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn replay_conserves_stock(
            genesis in 0i64..1_000,
            moves in prop::collection::vec((arb_kind(), 1i64..200), 0..40),
        ) {
            let p = ProductId::new();
            let entries = build(p, genesis, &moves);
            let report = replay(p, &entries).unwrap();

            if let (Some(g), Some(f)) = (report.genesis_stock, report.final_stock) {
                prop_assert_eq!(g, genesis);
                prop_assert_eq!(f, g + report.net_change());
                prop_assert!(f >= 0);
            } else {
                prop_assert!(entries.is_empty());
            }
        }
    }
}
