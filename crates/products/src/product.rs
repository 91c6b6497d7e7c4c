use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kardexpos_core::{DomainError, DomainResult, Entity, impl_uuid_newtype};

/// Product identifier.
///
/// Ordered so multi-product operations can lock products in a deterministic order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl_uuid_newtype!(ProductId, "ProductId");

/// Product snapshot as seen by the stock ledger.
///
/// `stock` is only ever written through the stock mutation path; the catalog sets it
/// once at registration (genesis stock) and never again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker (catalog retirement).
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Stock movements are only accepted for products that have not been retired.
    pub fn ensure_active(&self) -> DomainResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DomainError::conflict(format!("product {} is retired", self.id)))
        }
    }

    /// Retirement must never hide units that are still on hand.
    pub fn ensure_retirable(&self) -> DomainResult<()> {
        self.ensure_active()?;
        if self.stock != 0 {
            return Err(DomainError::invariant(format!(
                "product {} still has {} units in stock",
                self.id, self.stock
            )));
        }
        Ok(())
    }

    /// Returns the retired copy of this product.
    pub fn retire(&self, at: DateTime<Utc>) -> DomainResult<Product> {
        self.ensure_retirable()?;
        Ok(Product {
            deleted_at: Some(at),
            ..self.clone()
        })
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Catalog registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    /// Genesis stock: units on hand before the first ledger entry.
    #[serde(default)]
    pub initial_stock: i64,
}

impl NewProduct {
    pub fn into_product(self, id: ProductId, created_at: DateTime<Utc>) -> DomainResult<Product> {
        let sku = self.sku.trim();
        let name = self.name.trim();

        if sku.is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }

        Ok(Product {
            id,
            sku: sku.to_string(),
            name: name.to_string(),
            stock: self.initial_stock,
            created_at,
            deleted_at: None,
        })
    }
}
