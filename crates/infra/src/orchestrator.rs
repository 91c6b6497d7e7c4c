//! Checkout: a basket becomes one Sale plus one SALE ledger entry per line, atomically.
//!
//! ```text
//! CheckoutRequest
//!   ↓
//! 1. Price basket, validate payments        (no storage access)
//!   ↓
//! 2. Begin transaction
//!   ↓
//! 3. For each line in ascending product id:  coordinator.mutate(SALE)
//!      shortages are collected, not fatal yet
//!   ↓
//! 4. Any shortage → rollback, report all of them
//!   ↓
//! 5. Insert Sale + items + payments, commit
//! ```
//!
//! Locking products in ascending id order means two baskets can never wait on each
//! other in a cycle. `Conflict` (lock timeout, serialization failure) reruns steps 2-5.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use kardexpos_core::{CustomerId, UserId};
use kardexpos_inventory::{EntryError, KardexEntryId, MovementKind, MovementRequest};
use kardexpos_products::ProductId;
use kardexpos_sales::{
    LineItem, PaymentAllocation, PricedBasket, PricedLine, Sale, SaleError, SaleId, validate_payments,
};

use crate::coordinator::{MutationError, StockMutationCoordinator};
use crate::retry::{RetryPolicy, Retryable};
use crate::store::{InventoryStore, SaleStore, StoreError, rollback_or_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub items: Vec<LineItem>,
    pub customer_id: CustomerId,
    pub user_id: UserId,
    pub payments: Vec<PaymentAllocation>,
}

/// One basket line that could not be served from current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortage {
    pub line_no: u32,
    pub product_id: ProductId,
    pub requested: i64,
    pub available: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error(transparent)]
    Sale(#[from] SaleError),

    #[error("insufficient stock for {} line(s)", .0.len())]
    InsufficientStock(Vec<Shortage>),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product {0} is retired")]
    ProductInactive(ProductId),

    #[error("invalid line for product {product_id}: {source}")]
    InvalidLine {
        product_id: ProductId,
        #[source]
        source: EntryError,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => CheckoutError::Conflict(msg),
            StoreError::ProductNotFound(id) => CheckoutError::ProductNotFound(id),
            other => CheckoutError::Store(other),
        }
    }
}

impl Retryable for CheckoutError {
    fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::Conflict(_))
    }
}

pub struct SaleTransactionOrchestrator<S> {
    store: S,
    coordinator: StockMutationCoordinator,
    retry: RetryPolicy,
}

impl<S> SaleTransactionOrchestrator<S>
where
    S: InventoryStore,
{
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            store,
            coordinator: StockMutationCoordinator::new(),
            retry,
        }
    }

    #[instrument(
        skip(self, request),
        fields(
            user_id = %request.user_id,
            customer_id = %request.customer_id,
            lines = request.items.len()
        ),
        err
    )]
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<Sale, CheckoutError> {
        let basket = PricedBasket::price(&request.items)?;
        validate_payments(basket.totals.total, &request.payments)?;

        let sale_id = SaleId::new();
        let sale = self
            .retry
            .run("checkout", |attempt| self.attempt(sale_id, &basket, request, attempt))
            .await?;

        info!(sale_id = %sale.id, total = %sale.total, "checkout committed");
        Ok(sale)
    }

    async fn attempt(
        &self,
        sale_id: SaleId,
        basket: &PricedBasket,
        request: &CheckoutRequest,
        attempt: u32,
    ) -> Result<Sale, CheckoutError> {
        let mut tx = self.store.begin().await?;

        let mut entry_ids: HashMap<u32, KardexEntryId> = HashMap::with_capacity(basket.lines.len());
        let mut shortages = Vec::new();

        for line in basket.in_lock_order() {
            let movement = MovementRequest {
                product_id: line.item.product_id,
                kind: MovementKind::Sale,
                quantity: line.item.quantity,
                unit_cost: line.item.unit_price,
                tax_rate: line.item.tax_rate,
                reason: Some(format!("sale {sale_id}")),
                user_id: request.user_id,
            };

            match self.coordinator.mutate(tx.as_mut(), &movement).await {
                Ok(entry) => {
                    entry_ids.insert(line.line_no, entry.id);
                }
                Err(MutationError::InsufficientStock {
                    product_id,
                    available,
                    requested,
                    ..
                }) => shortages.push(Shortage {
                    line_no: line.line_no,
                    product_id,
                    requested,
                    available,
                }),
                Err(e) => {
                    rollback_or_warn(tx.as_mut(), "checkout", attempt).await;
                    return Err(line_failure(line, e));
                }
            }
        }

        if !shortages.is_empty() {
            rollback_or_warn(tx.as_mut(), "checkout", attempt).await;
            shortages.sort_by_key(|s| s.line_no);
            return Err(CheckoutError::InsufficientStock(shortages));
        }

        let mut items = Vec::with_capacity(basket.lines.len());
        for line in &basket.lines {
            let Some(entry_id) = entry_ids.get(&line.line_no).copied() else {
                rollback_or_warn(tx.as_mut(), "checkout", attempt).await;
                return Err(CheckoutError::Store(StoreError::ConstraintViolation(format!(
                    "line {} has no ledger entry",
                    line.line_no
                ))));
            };
            items.push(line.clone().into_sale_item(entry_id));
        }

        let sale = Sale {
            id: sale_id,
            items,
            subtotal: basket.totals.subtotal,
            tax_amount: basket.totals.tax_amount,
            total: basket.totals.total,
            payment_methods: request.payments.clone(),
            customer_id: request.customer_id,
            user_id: request.user_id,
            created_at: Utc::now(),
        };

        tx.insert_sale(&sale).await?;
        tx.commit().await?;
        Ok(sale)
    }
}

/// Map a non-shortage coordinator failure for one basket line.
fn line_failure(line: &PricedLine, err: MutationError) -> CheckoutError {
    let product_id = line.item.product_id;
    match err {
        MutationError::InsufficientStock {
            available, requested, ..
        } => CheckoutError::InsufficientStock(vec![Shortage {
            line_no: line.line_no,
            product_id,
            requested,
            available,
        }]),
        MutationError::ProductNotFound(id) => CheckoutError::ProductNotFound(id),
        MutationError::ProductInactive(id) => CheckoutError::ProductInactive(id),
        MutationError::Invalid(source) => CheckoutError::InvalidLine { product_id, source },
        MutationError::RequiresCheckout(kind) => CheckoutError::Store(StoreError::ConstraintViolation(
            format!("{kind} movement rejected for product {product_id}"),
        )),
        MutationError::Conflict(msg) => CheckoutError::Conflict(msg),
        MutationError::Store(e) => CheckoutError::Store(e),
    }
}
