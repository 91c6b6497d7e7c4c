//! Storage boundary for the stock ledger.
//!
//! Writes always go through a [`StoreTransaction`]: the coordinator locks a product,
//! appends its ledger entry and updates its stock inside one transaction, and checkout
//! adds the sale to that same transaction. Reads go through [`LedgerProjection`] and
//! only ever see committed data.
//!
//! Two backends implement the boundary:
//! - [`InMemoryInventoryStore`]: tests/dev, per-product async mutexes as row locks
//! - [`PostgresInventoryStore`]: `SELECT … FOR UPDATE` under a `lock_timeout`

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use kardexpos_inventory::{KardexEntry, KardexEntryId};
use kardexpos_products::{Product, ProductId};
use kardexpos_sales::{Sale, SaleId};

pub mod in_memory;
pub mod postgres;
pub mod query;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use query::{LedgerFilter, LedgerQuery, Page, PageRequest, PaginationMeta, SortField, SortOrder, SortSpec};

/// Storage operation error.
///
/// Infrastructure failures only. Business rejections (insufficient stock, payment
/// mismatch) are decided above this layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Lock timeout, serialization failure or deadlock. Safe to retry the transaction.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A write would break a ledger or schema invariant. Never expected in practice.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// A product together with its ledger chain (oldest first), as of one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductHistory {
    pub product: Product,
    pub entries: Vec<KardexEntry>,
}

/// Append-only ledger, scoped to a transaction.
#[async_trait]
pub trait StockLedger: Send {
    /// Latest entry for a product, including entries appended earlier in this transaction.
    async fn latest_for(&mut self, product_id: ProductId) -> Result<Option<KardexEntry>, StoreError>;

    /// Append an entry. Fails with [`StoreError::ConstraintViolation`] if the entry is
    /// internally inconsistent or does not chain onto [`StockLedger::latest_for`].
    async fn append(&mut self, entry: KardexEntry) -> Result<KardexEntry, StoreError>;
}

/// Product rows as seen by the transaction that owns their locks.
#[async_trait]
pub trait ProductStockStore: Send {
    /// Take the exclusive per-product lock for the rest of the transaction and return
    /// the current row. Waiting longer than the lock timeout yields
    /// [`StoreError::Conflict`]. Locking a product twice is a no-op.
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Product, StoreError>;

    /// Overwrite the stock of a product locked by this transaction.
    async fn set_stock(&mut self, product_id: ProductId, stock: i64) -> Result<(), StoreError>;

    /// Soft-delete a product locked by this transaction.
    async fn mark_retired(&mut self, product_id: ProductId, at: DateTime<Utc>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SaleStore: Send {
    /// Persist a sale with its items and payments. Every item must reference a ledger
    /// entry appended in this transaction.
    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError>;
}

/// A unit of work. Dropping it without [`StoreTransaction::commit`] rolls it back and
/// releases every product lock it holds.
#[async_trait]
pub trait StoreTransaction: StockLedger + ProductStockStore + SaleStore + Send {
    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Roll back on an error path. The caller is already returning its own error, so a
/// failed rollback is logged instead of replacing it. Returns whether it succeeded.
pub(crate) async fn rollback_or_warn(tx: &mut dyn StoreTransaction, operation: &'static str, attempt: u32) -> bool {
    match tx.rollback().await {
        Ok(()) => true,
        Err(e) => {
            warn!(operation, attempt, error = %e, "rollback failed");
            false
        }
    }
}

/// Read-only projections over committed data.
#[async_trait]
pub trait LedgerProjection: Send + Sync {
    async fn page(&self, query: &LedgerQuery) -> Result<Page<KardexEntry>, StoreError>;

    /// Each product's most recent entry; filters apply to that entry.
    async fn latest_per_product(&self, query: &LedgerQuery) -> Result<Page<KardexEntry>, StoreError>;

    async fn get_entry(&self, id: KardexEntryId) -> Result<Option<KardexEntry>, StoreError>;

    /// Full chain of a product, oldest first.
    async fn history(&self, product_id: ProductId) -> Result<Vec<KardexEntry>, StoreError>;

    /// The product row and its full chain read from one snapshot, so a movement
    /// committing concurrently is either in both or in neither.
    async fn product_history(&self, product_id: ProductId) -> Result<Option<ProductHistory>, StoreError>;

    async fn get_sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError>;
}

/// Catalog boundary: product registration and lookup.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Insert a new product with its genesis stock. SKUs are unique.
    async fn register_product(&self, product: Product) -> Result<Product, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
}

/// Full storage backend.
#[async_trait]
pub trait InventoryStore: LedgerProjection + ProductCatalog + Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

#[async_trait]
impl<S> LedgerProjection for Arc<S>
where
    S: LedgerProjection + ?Sized,
{
    async fn page(&self, query: &LedgerQuery) -> Result<Page<KardexEntry>, StoreError> {
        (**self).page(query).await
    }

    async fn latest_per_product(&self, query: &LedgerQuery) -> Result<Page<KardexEntry>, StoreError> {
        (**self).latest_per_product(query).await
    }

    async fn get_entry(&self, id: KardexEntryId) -> Result<Option<KardexEntry>, StoreError> {
        (**self).get_entry(id).await
    }

    async fn history(&self, product_id: ProductId) -> Result<Vec<KardexEntry>, StoreError> {
        (**self).history(product_id).await
    }

    async fn product_history(&self, product_id: ProductId) -> Result<Option<ProductHistory>, StoreError> {
        (**self).product_history(product_id).await
    }

    async fn get_sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        (**self).get_sale(id).await
    }
}

#[async_trait]
impl<S> ProductCatalog for Arc<S>
where
    S: ProductCatalog + ?Sized,
{
    async fn register_product(&self, product: Product) -> Result<Product, StoreError> {
        (**self).register_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id).await
    }
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        (**self).begin().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::store::InMemoryInventoryStore;

    #[tokio::test]
    async fn rollback_releases_locks_and_reports_a_finished_transaction() {
        let store = InMemoryInventoryStore::with_lock_timeout(Duration::from_millis(30));
        let p = store
            .register_product(Product {
                id: ProductId::new(),
                sku: "R".to_string(),
                name: "R".to_string(),
                stock: 1,
                created_at: Utc::now(),
                deleted_at: None,
            })
            .await
            .unwrap()
            .id;

        let mut tx = store.begin().await.unwrap();
        tx.lock_product(p).await.unwrap();
        assert!(rollback_or_warn(tx.as_mut(), "test", 1).await);
        // A second rollback hits a finished transaction; it is logged, not raised.
        assert!(!rollback_or_warn(tx.as_mut(), "test", 1).await);

        let mut next = store.begin().await.unwrap();
        assert_eq!(next.lock_product(p).await.unwrap().stock, 1);
    }
}
