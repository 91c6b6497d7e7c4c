//! Basket pricing and payment validation.
//!
//! Everything here runs before checkout touches storage, so a malformed basket or a
//! payment mismatch never opens a transaction.

use rust_decimal::Decimal;
use thiserror::Error;

use kardexpos_inventory::{AmountError, KardexEntryId, LineAmounts};
use kardexpos_products::ProductId;

use crate::sale::{LineItem, PaymentAllocation, SaleItem};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaleError {
    #[error("basket is empty")]
    EmptyBasket,

    #[error("line {line_no} ({product_id}) is invalid: {source}")]
    InvalidLine {
        line_no: u32,
        product_id: ProductId,
        #[source]
        source: AmountError,
    },

    #[error("at least one payment method is required")]
    NoPayments,

    #[error("payment amount must not be negative (got {0})")]
    NegativePayment(Decimal),

    #[error("payments total {received} does not match sale total {expected}")]
    PaymentMismatch { expected: Decimal, received: Decimal },

    #[error("basket total overflows")]
    Overflow,
}

/// One basket line with its computed amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    /// 1-based position in the submitted basket.
    pub line_no: u32,
    pub item: LineItem,
    pub amounts: LineAmounts,
}

impl PricedLine {
    pub fn into_sale_item(self, kardex_entry_id: KardexEntryId) -> SaleItem {
        SaleItem {
            line_no: self.line_no,
            product_id: self.item.product_id,
            quantity: self.item.quantity,
            unit_price: self.item.unit_price,
            tax_rate: self.item.tax_rate,
            total_price: self.amounts.subtotal,
            tax_amount: self.amounts.tax_amount,
            kardex_entry_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedBasket {
    pub lines: Vec<PricedLine>,
    pub totals: LineAmounts,
}

impl PricedBasket {
    /// Price every line with the same tax-exclusive convention the ledger uses.
    pub fn price(items: &[LineItem]) -> Result<Self, SaleError> {
        if items.is_empty() {
            return Err(SaleError::EmptyBasket);
        }

        let mut lines = Vec::with_capacity(items.len());
        let mut totals = LineAmounts::zero();
        for (idx, item) in items.iter().enumerate() {
            let line_no = u32::try_from(idx + 1).map_err(|_| SaleError::Overflow)?;
            let amounts = LineAmounts::compute(item.quantity, item.unit_price, item.tax_rate)
                .map_err(|source| SaleError::InvalidLine {
                    line_no,
                    product_id: item.product_id,
                    source,
                })?;
            totals = totals.checked_add(amounts).ok_or(SaleError::Overflow)?;
            lines.push(PricedLine {
                line_no,
                item: item.clone(),
                amounts,
            });
        }

        Ok(Self { lines, totals })
    }

    /// Lines in lock order: ascending product id, basket order kept for duplicates.
    pub fn in_lock_order(&self) -> Vec<&PricedLine> {
        let mut ordered: Vec<&PricedLine> = self.lines.iter().collect();
        ordered.sort_by_key(|l| l.item.product_id);
        ordered
    }
}

/// Check that the payment allocations cover `total` exactly.
pub fn validate_payments(total: Decimal, payments: &[PaymentAllocation]) -> Result<(), SaleError> {
    if payments.is_empty() {
        return Err(SaleError::NoPayments);
    }
    let mut received = Decimal::ZERO;
    for p in payments {
        if p.amount < Decimal::ZERO {
            return Err(SaleError::NegativePayment(p.amount));
        }
        received = received.checked_add(p.amount).ok_or(SaleError::Overflow)?;
    }
    if received != total {
        return Err(SaleError::PaymentMismatch {
            expected: total,
            received,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sale::PaymentMethod;
    use proptest::prelude::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(product_id: ProductId, quantity: i64, price: &str, rate: &str) -> LineItem {
        LineItem {
            product_id,
            quantity,
            unit_price: d(price),
            tax_rate: d(rate),
        }
    }

    fn pay(method: PaymentMethod, amount: &str) -> PaymentAllocation {
        PaymentAllocation {
            method,
            amount: d(amount),
        }
    }

    #[test]
    fn prices_lines_and_totals() {
        let basket = PricedBasket::price(&[
            line(ProductId::new(), 2, "10.00", "12"),
            line(ProductId::new(), 1, "5.00", "0"),
        ])
        .unwrap();

        assert_eq!(basket.lines[0].line_no, 1);
        assert_eq!(basket.lines[0].amounts.tax_amount, d("2.40"));
        assert_eq!(basket.totals.subtotal, d("25.00"));
        assert_eq!(basket.totals.tax_amount, d("2.40"));
        assert_eq!(basket.totals.total, d("27.40"));
    }

    #[test]
    fn empty_basket_is_rejected() {
        assert_eq!(PricedBasket::price(&[]), Err(SaleError::EmptyBasket));
    }

    #[test]
    fn invalid_line_names_its_position() {
        let p = ProductId::new();
        let err = PricedBasket::price(&[line(ProductId::new(), 1, "1", "0"), line(p, 0, "1", "0")])
            .unwrap_err();
        assert_eq!(
            err,
            SaleError::InvalidLine {
                line_no: 2,
                product_id: p,
                source: AmountError::InvalidQuantity(0),
            }
        );
    }

    #[test]
    fn lock_order_is_by_product_and_stable() {
        let a = ProductId::from_uuid(uuid::Uuid::from_u128(1));
        let b = ProductId::from_uuid(uuid::Uuid::from_u128(2));
        let basket = PricedBasket::price(&[
            line(b, 1, "1", "0"),
            line(a, 1, "1", "0"),
            line(b, 2, "1", "0"),
        ])
        .unwrap();

        let order: Vec<u32> = basket.in_lock_order().iter().map(|l| l.line_no).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn split_payment_must_match_total() {
        let total = d("27.40");
        validate_payments(
            total,
            &[pay(PaymentMethod::Cash, "7.40"), pay(PaymentMethod::CreditCard, "20")],
        )
        .unwrap();

        assert_eq!(
            validate_payments(total, &[pay(PaymentMethod::Cash, "27")]),
            Err(SaleError::PaymentMismatch {
                expected: total,
                received: d("27"),
            })
        );
        assert_eq!(validate_payments(total, &[]), Err(SaleError::NoPayments));
        assert_eq!(
            validate_payments(total, &[pay(PaymentMethod::Cash, "30"), pay(PaymentMethod::Other, "-2.60")]),
            Err(SaleError::NegativePayment(d("-2.60")))
        );
    }

    #[test]
    fn sale_item_carries_pre_tax_total_and_entry_link() {
        let basket = PricedBasket::price(&[line(ProductId::new(), 3, "2.50", "12")]).unwrap();
        let entry = KardexEntryId::new();
        let item = basket.lines[0].clone().into_sale_item(entry);
        assert_eq!(item.total_price, d("7.50"));
        assert_eq!(item.tax_amount, d("0.90"));
        assert_eq!(item.kardex_entry_id, entry);
    }

    proptest! {
        #[test]
        fn basket_total_is_sum_of_line_totals(
            lines in prop::collection::vec((1i64..50, 0i64..100_000, 0i64..=30), 1..10),
        ) {
            let items: Vec<LineItem> = lines
                .iter()
                .map(|(q, cents, rate)| LineItem {
                    product_id: ProductId::new(),
                    quantity: *q,
                    unit_price: Decimal::new(*cents, 2),
                    tax_rate: Decimal::from(*rate),
                })
                .collect();
            let basket = PricedBasket::price(&items).unwrap();

            let sum: Decimal = basket.lines.iter().map(|l| l.amounts.total).sum();
            prop_assert_eq!(basket.totals.total, sum);
            prop_assert_eq!(basket.totals.total, basket.totals.subtotal + basket.totals.tax_amount);
            let cash = [PaymentAllocation {
                method: PaymentMethod::Cash,
                amount: sum,
            }];
            prop_assert!(validate_payments(basket.totals.total, &cash).is_ok());
        }
    }
}
