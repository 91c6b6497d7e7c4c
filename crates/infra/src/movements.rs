//! Standalone stock movements (purchases, returns, transfers, adjustments, shrinkage).
//!
//! Each movement runs the coordinator in its own transaction under the shared retry
//! policy. SALE movements only happen through checkout so every SALE entry has a sale.

use tracing::{info, instrument};

use kardexpos_inventory::{KardexEntry, MovementKind, MovementRequest};

use crate::coordinator::{MutationError, StockMutationCoordinator};
use crate::retry::RetryPolicy;
use crate::store::{InventoryStore, rollback_or_warn};

pub struct MovementService<S> {
    store: S,
    coordinator: StockMutationCoordinator,
    retry: RetryPolicy,
}

impl<S> MovementService<S>
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
        fields(product_id = %request.product_id, movement_type = %request.kind),
        err
    )]
    pub async fn record(&self, request: &MovementRequest) -> Result<KardexEntry, MutationError> {
        if request.kind == MovementKind::Sale {
            return Err(MutationError::RequiresCheckout(request.kind));
        }

        let entry = self.retry.run("movement", |attempt| self.attempt(request, attempt)).await?;
        info!(entry_id = %entry.id, stock_after = entry.stock_after, "movement recorded");
        Ok(entry)
    }

    async fn attempt(&self, request: &MovementRequest, attempt: u32) -> Result<KardexEntry, MutationError> {
        let mut tx = self.store.begin().await?;
        match self.coordinator.mutate(tx.as_mut(), request).await {
            Ok(entry) => {
                tx.commit().await?;
                Ok(entry)
            }
            Err(e) => {
                rollback_or_warn(tx.as_mut(), "movement", attempt).await;
                Err(e)
            }
        }
    }
}
