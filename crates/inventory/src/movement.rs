use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kardexpos_core::DomainError;

/// Effect a movement kind has on stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

/// Closed set of stock movement kinds.
///
/// Adding a kind forces every `match` over it (most importantly
/// [`MovementKind::direction`]) to be revisited at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Purchase,
    ReturnIn,
    TransferIn,
    AdjustmentIn,
    Sale,
    ReturnOut,
    TransferOut,
    AdjustmentOut,
    Damaged,
    Expired,
}

impl MovementKind {
    pub const ALL: [MovementKind; 10] = [
        MovementKind::Purchase,
        MovementKind::ReturnIn,
        MovementKind::TransferIn,
        MovementKind::AdjustmentIn,
        MovementKind::Sale,
        MovementKind::ReturnOut,
        MovementKind::TransferOut,
        MovementKind::AdjustmentOut,
        MovementKind::Damaged,
        MovementKind::Expired,
    ];

    pub fn direction(self) -> Direction {
        match self {
            MovementKind::Purchase
            | MovementKind::ReturnIn
            | MovementKind::TransferIn
            | MovementKind::AdjustmentIn => Direction::Increase,
            MovementKind::Sale
            | MovementKind::ReturnOut
            | MovementKind::TransferOut
            | MovementKind::AdjustmentOut
            | MovementKind::Damaged
            | MovementKind::Expired => Direction::Decrease,
        }
    }

    /// `+1` for kinds that add stock, `-1` for kinds that remove it.
    pub fn sign(self) -> i64 {
        match self.direction() {
            Direction::Increase => 1,
            Direction::Decrease => -1,
        }
    }

    /// Stable storage/wire name (e.g. `"RETURN_IN"`).
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Purchase => "PURCHASE",
            MovementKind::ReturnIn => "RETURN_IN",
            MovementKind::TransferIn => "TRANSFER_IN",
            MovementKind::AdjustmentIn => "ADJUSTMENT_IN",
            MovementKind::Sale => "SALE",
            MovementKind::ReturnOut => "RETURN_OUT",
            MovementKind::TransferOut => "TRANSFER_OUT",
            MovementKind::AdjustmentOut => "ADJUSTMENT_OUT",
            MovementKind::Damaged => "DAMAGED",
            MovementKind::Expired => "EXPIRED",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown movement type '{s}'")))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("insufficient stock for {kind}: available {available}, requested {requested}")]
    InsufficientStock {
        kind: MovementKind,
        available: i64,
        requested: i64,
    },

    #[error("quantity must be positive (got {0})")]
    InvalidQuantity(i64),

    #[error("stock before movement cannot be negative (got {0})")]
    NegativeStock(i64),

    #[error("stock overflow applying {kind} of {quantity} to {stock_before}")]
    Overflow {
        kind: MovementKind,
        stock_before: i64,
        quantity: i64,
    },
}

/// Single source of truth for the sign and feasibility of a movement.
///
/// Pure and total: every input yields either the resulting stock or a reason why the
/// movement cannot happen.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementPolicy;

impl MovementPolicy {
    pub fn apply(kind: MovementKind, stock_before: i64, quantity: i64) -> Result<i64, PolicyError> {
        if quantity <= 0 {
            return Err(PolicyError::InvalidQuantity(quantity));
        }
        if stock_before < 0 {
            return Err(PolicyError::NegativeStock(stock_before));
        }

        let overflow = || PolicyError::Overflow {
            kind,
            stock_before,
            quantity,
        };

        match kind.direction() {
            Direction::Increase => stock_before.checked_add(quantity).ok_or_else(overflow),
            Direction::Decrease => {
                let after = stock_before.checked_sub(quantity).ok_or_else(overflow)?;
                if after < 0 {
                    return Err(PolicyError::InsufficientStock {
                        kind,
                        available: stock_before,
                        requested: quantity,
                    });
                }
                Ok(after)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn increasing_kinds_add_stock() {
        for kind in [
            MovementKind::Purchase,
            MovementKind::ReturnIn,
            MovementKind::TransferIn,
            MovementKind::AdjustmentIn,
        ] {
            assert_eq!(MovementPolicy::apply(kind, 10, 5), Ok(15), "{kind}");
        }
    }

    #[test]
    fn decreasing_kinds_remove_stock() {
        for kind in [
            MovementKind::Sale,
            MovementKind::ReturnOut,
            MovementKind::TransferOut,
            MovementKind::AdjustmentOut,
            MovementKind::Damaged,
            MovementKind::Expired,
        ] {
            assert_eq!(MovementPolicy::apply(kind, 10, 4), Ok(6), "{kind}");
            assert_eq!(MovementPolicy::apply(kind, 4, 4), Ok(0), "{kind}");
        }
    }

    #[test]
    fn overselling_is_rejected_with_context() {
        let err = MovementPolicy::apply(MovementKind::Sale, 12, 20).unwrap_err();
        assert_eq!(
            err,
            PolicyError::InsufficientStock {
                kind: MovementKind::Sale,
                available: 12,
                requested: 20,
            }
        );
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        assert_eq!(
            MovementPolicy::apply(MovementKind::Purchase, 1, 0),
            Err(PolicyError::InvalidQuantity(0))
        );
        assert_eq!(
            MovementPolicy::apply(MovementKind::Sale, 1, -3),
            Err(PolicyError::InvalidQuantity(-3))
        );
    }

    #[test]
    fn overflow_is_an_error_not_a_panic() {
        assert!(matches!(
            MovementPolicy::apply(MovementKind::Purchase, i64::MAX, 1),
            Err(PolicyError::Overflow { .. })
        ));
    }

    #[test]
    fn names_parse_back_case_insensitively() {
        for kind in MovementKind::ALL {
            assert_eq!(kind.as_str().parse::<MovementKind>().unwrap(), kind);
            assert_eq!(kind.as_str().to_lowercase().parse::<MovementKind>().unwrap(), kind);
        }
        assert!("GIFT".parse::<MovementKind>().is_err());
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&MovementKind::AdjustmentOut).unwrap();
        assert_eq!(json, "\"ADJUSTMENT_OUT\"");
        let back: MovementKind = serde_json::from_str("\"RETURN_IN\"").unwrap();
        assert_eq!(back, MovementKind::ReturnIn);
    }

    fn any_kind() -> impl Strategy<Value = MovementKind> {
        (0usize..MovementKind::ALL.len()).prop_map(|i| MovementKind::ALL[i])
    }

    proptest! {
        /// Property: a successful movement changes stock by exactly sign * quantity
        /// and never leaves it negative.
        #[test]
        fn apply_moves_stock_by_signed_quantity(
            kind in any_kind(),
            before in 0i64..1_000_000,
            quantity in 1i64..1_000_000,
        ) {
            match MovementPolicy::apply(kind, before, quantity) {
                Ok(after) => {
                    prop_assert_eq!(after, before + kind.sign() * quantity);
                    prop_assert!(after >= 0);
                }
                Err(PolicyError::InsufficientStock { available, requested, .. }) => {
                    prop_assert_eq!(kind.direction(), Direction::Decrease);
                    prop_assert!(requested > available);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }
}
