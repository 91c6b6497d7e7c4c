//! Ledger audit: replay a product's history and compare it with live stock.

use serde::Serialize;
use thiserror::Error;
use tracing::{error, instrument};

use kardexpos_inventory::{ReplayReport, replay};
use kardexpos_products::ProductId;

use crate::store::{InventoryStore, LedgerProjection, ProductHistory, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub product_id: ProductId,
    pub live_stock: i64,
    /// Stock implied by the ledger: last `stockAfter`, or live stock with no history.
    pub replayed_stock: Option<i64>,
    pub entry_count: usize,
    pub consistent: bool,
    /// Present when the chain or an entry failed replay.
    pub violation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<ReplayReport>,
}

pub struct LedgerAuditor<S> {
    store: S,
}

impl<S> LedgerAuditor<S>
where
    S: InventoryStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn audit(&self, product_id: ProductId) -> Result<AuditReport, AuditError> {
        let ProductHistory {
            product,
            entries: history,
        } = self
            .store
            .product_history(product_id)
            .await?
            .ok_or(AuditError::NotFound(product_id))?;

        let report = match replay(product_id, &history) {
            Ok(replayed) => {
                let replayed_stock = replayed.final_stock.unwrap_or(product.stock);
                AuditReport {
                    product_id,
                    live_stock: product.stock,
                    replayed_stock: Some(replayed_stock),
                    entry_count: history.len(),
                    consistent: replayed_stock == product.stock,
                    violation: None,
                    replay: Some(replayed),
                }
            }
            Err(violation) => AuditReport {
                product_id,
                live_stock: product.stock,
                replayed_stock: None,
                entry_count: history.len(),
                consistent: false,
                violation: Some(violation.to_string()),
                replay: None,
            },
        };

        if !report.consistent {
            error!(
                live_stock = report.live_stock,
                replayed_stock = ?report.replayed_stock,
                violation = ?report.violation,
                "ledger audit failed"
            );
        }
        Ok(report)
    }
}
