//! Stock mutation pipeline: the only code path that writes `Product.stock`.
//!
//! ```text
//! MovementRequest
//!   ↓
//! 1. Validate amounts/reason (no storage access)
//!   ↓
//! 2. Lock the product row in the caller's transaction (bounded by lock timeout)
//!   ↓
//! 3. Reject retired products
//!   ↓
//! 4. MovementPolicy::apply on current stock → KardexEntry
//!   ↓
//! 5. StockLedger::append + ProductStockStore::set_stock (same transaction)
//! ```
//!
//! The coordinator never begins or commits a transaction. Callers decide the unit of
//! work: one movement ([`crate::MovementService`]) or a whole basket
//! ([`crate::SaleTransactionOrchestrator`]).

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, instrument};

use kardexpos_inventory::{EntryError, KardexEntry, KardexEntryId, MovementKind, MovementRequest, PolicyError};
use kardexpos_products::ProductId;

use crate::retry::Retryable;
use crate::store::{ProductStockStore, StockLedger, StoreError, StoreTransaction};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// Business rejection; never retried.
    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        kind: MovementKind,
        available: i64,
        requested: i64,
    },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product {0} is retired")]
    ProductInactive(ProductId),

    #[error("invalid movement: {0}")]
    Invalid(EntryError),

    #[error("{0} movements are recorded through checkout")]
    RequiresCheckout(MovementKind),

    /// Transient contention; the whole transaction may be retried.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for MutationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => MutationError::Conflict(msg),
            StoreError::ProductNotFound(id) => MutationError::ProductNotFound(id),
            other => MutationError::Store(other),
        }
    }
}

impl Retryable for MutationError {
    fn is_retryable(&self) -> bool {
        matches!(self, MutationError::Conflict(_))
    }
}

fn map_entry_error(product_id: ProductId, err: EntryError) -> MutationError {
    match err {
        EntryError::Policy(PolicyError::InsufficientStock {
            kind,
            available,
            requested,
        }) => MutationError::InsufficientStock {
            product_id,
            kind,
            available,
            requested,
        },
        other => MutationError::Invalid(other),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StockMutationCoordinator;

impl StockMutationCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Apply one movement inside `tx` and return the appended entry.
    ///
    /// On error nothing has been written for this movement, but earlier writes in the
    /// same transaction are untouched; rolling back is the caller's decision.
    #[instrument(
        skip(self, tx, request),
        fields(
            product_id = %request.product_id,
            movement_type = %request.kind,
            quantity = request.quantity
        ),
        err
    )]
    pub async fn mutate(
        &self,
        tx: &mut dyn StoreTransaction,
        request: &MovementRequest,
    ) -> Result<KardexEntry, MutationError> {
        let product_id = request.product_id;
        request.validate().map_err(|e| map_entry_error(product_id, e))?;

        let product = tx.lock_product(product_id).await?;
        if product.ensure_active().is_err() {
            return Err(MutationError::ProductInactive(product_id));
        }

        let entry = KardexEntry::record(request, product.stock, KardexEntryId::new(), Utc::now())
            .map_err(|e| map_entry_error(product_id, e))?;

        let entry = tx.append(entry).await?;
        tx.set_stock(product_id, entry.stock_after).await?;

        debug!(
            entry_id = %entry.id,
            stock_before = entry.stock_before,
            stock_after = entry.stock_after,
            "stock mutated"
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryInventoryStore, InventoryStore, LedgerProjection, ProductCatalog};
    use kardexpos_core::UserId;
    use kardexpos_products::Product;
    use rust_decimal::Decimal;

    async fn seed(store: &InMemoryInventoryStore, stock: i64) -> ProductId {
        store
            .register_product(Product {
                id: ProductId::new(),
                sku: format!("SKU-{}", ProductId::new()),
                name: "Arroz 1kg".to_string(),
                stock,
                created_at: Utc::now(),
                deleted_at: None,
            })
            .await
            .unwrap()
            .id
    }

    fn request(product_id: ProductId, kind: MovementKind, quantity: i64) -> MovementRequest {
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

    #[tokio::test]
    async fn purchase_sale_and_rejected_sale_scenario() {
        let store = InMemoryInventoryStore::new();
        let p = seed(&store, 10).await;
        let coordinator = StockMutationCoordinator::new();

        let mut tx = store.begin().await.unwrap();
        let purchase = coordinator
            .mutate(tx.as_mut(), &request(p, MovementKind::Purchase, 5))
            .await
            .unwrap();
        assert_eq!((purchase.stock_before, purchase.stock_after), (10, 15));

        let sale = coordinator
            .mutate(tx.as_mut(), &request(p, MovementKind::Sale, 3))
            .await
            .unwrap();
        assert_eq!((sale.stock_before, sale.stock_after), (15, 12));

        let err = coordinator
            .mutate(tx.as_mut(), &request(p, MovementKind::Sale, 20))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MutationError::InsufficientStock {
                product_id: p,
                kind: MovementKind::Sale,
                available: 12,
                requested: 20,
            }
        );
        tx.commit().await.unwrap();

        assert_eq!(store.get_product(p).await.unwrap().unwrap().stock, 12);
        assert_eq!(store.history(p).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn retired_products_reject_movements() {
        let store = InMemoryInventoryStore::new();
        let p = seed(&store, 0).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_product(p).await.unwrap();
        tx.mark_retired(p, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = StockMutationCoordinator::new()
            .mutate(tx.as_mut(), &request(p, MovementKind::Purchase, 1))
            .await
            .unwrap_err();
        assert_eq!(err, MutationError::ProductInactive(p));
    }

    #[tokio::test]
    async fn invalid_requests_fail_before_locking() {
        let store = InMemoryInventoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let missing = ProductId::new();

        let mut bad = request(missing, MovementKind::Purchase, 1);
        bad.tax_rate = Decimal::new(150, 0);
        let err = StockMutationCoordinator::new().mutate(tx.as_mut(), &bad).await.unwrap_err();
        assert!(matches!(err, MutationError::Invalid(_)));

        let err = StockMutationCoordinator::new()
            .mutate(tx.as_mut(), &request(missing, MovementKind::Purchase, 1))
            .await
            .unwrap_err();
        assert_eq!(err, MutationError::ProductNotFound(missing));
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(MutationError::from(StoreError::Conflict("lock".into())).is_retryable());
        assert!(!MutationError::ProductInactive(ProductId::new()).is_retryable());
        assert!(!MutationError::from(StoreError::Unavailable("down".into())).is_retryable());
    }
}
