//! Minimal catalog boundary: register with genesis stock, read, soft-retire.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

use kardexpos_core::DomainError;
use kardexpos_products::{NewProduct, Product, ProductId};

use crate::retry::{RetryPolicy, Retryable};
use crate::store::{InventoryStore, ProductCatalog, ProductStockStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => CatalogError::Conflict(msg),
            StoreError::ProductNotFound(id) => CatalogError::NotFound(id),
            StoreError::Duplicate(msg) => CatalogError::Duplicate(msg),
            other => CatalogError::Store(other),
        }
    }
}

impl Retryable for CatalogError {
    fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::Conflict(_))
    }
}

pub struct ProductService<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S> ProductService<S>
where
    S: InventoryStore,
{
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    #[instrument(skip(self, new_product), fields(sku = %new_product.sku), err)]
    pub async fn register(&self, new_product: NewProduct) -> Result<Product, CatalogError> {
        let product = new_product.into_product(ProductId::new(), Utc::now())?;
        let product = self.store.register_product(product).await?;
        info!(product_id = %product.id, stock = product.stock, "product registered");
        Ok(product)
    }

    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.store.get_product(id).await?.ok_or(CatalogError::NotFound(id))
    }

    /// Soft-delete under the product lock so no movement can slip in between the stock
    /// check and the retirement.
    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn retire(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.retry
            .run("retire_product", |_| async move {
                let mut tx = self.store.begin().await?;
                let product = tx.lock_product(id).await?;
                let retired = product.retire(Utc::now())?;
                if let Some(at) = retired.deleted_at {
                    tx.mark_retired(id, at).await?;
                }
                tx.commit().await?;
                Ok::<_, CatalogError>(retired)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryInventoryStore;

    fn service(store: &InMemoryInventoryStore) -> ProductService<InMemoryInventoryStore> {
        ProductService::new(store.clone(), RetryPolicy::immediate(2))
    }

    fn new_product(sku: &str, stock: i64) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: "Azúcar 2kg".to_string(),
            initial_stock: stock,
        }
    }

    #[tokio::test]
    async fn register_and_get() {
        let store = InMemoryInventoryStore::new();
        let products = service(&store);
        let p = products.register(new_product("AZ-2", 12)).await.unwrap();
        assert_eq!(products.get(p.id).await.unwrap().stock, 12);

        let dup = products.register(new_product("AZ-2", 0)).await.unwrap_err();
        assert!(matches!(dup, CatalogError::Duplicate(_)));

        let invalid = products.register(new_product(" ", 0)).await.unwrap_err();
        assert!(matches!(invalid, CatalogError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn retiring_requires_zero_stock() {
        let store = InMemoryInventoryStore::new();
        let products = service(&store);
        let stocked = products.register(new_product("A", 3)).await.unwrap();
        let empty = products.register(new_product("B", 0)).await.unwrap();

        let err = products.retire(stocked.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::Domain(DomainError::InvariantViolation(_))));
        assert!(products.get(stocked.id).await.unwrap().is_active());

        let retired = products.retire(empty.id).await.unwrap();
        assert!(!retired.is_active());
        assert!(!products.get(empty.id).await.unwrap().is_active());

        let again = products.retire(empty.id).await.unwrap_err();
        assert!(matches!(again, CatalogError::Domain(DomainError::Conflict(_))));

        let missing = ProductId::new();
        assert_eq!(products.retire(missing).await.unwrap_err(), CatalogError::NotFound(missing));
    }
}
