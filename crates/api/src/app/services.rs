use std::sync::Arc;
use std::time::Duration;

use kardexpos_infra::{
    AppConfig, InMemoryInventoryStore, InventoryStore, LedgerAuditor, MovementService, PostgresInventoryStore,
    ProductService, RetryPolicy, SaleTransactionOrchestrator, StoreError,
};

/// Storage backend shared by every service.
pub type SharedStore = Arc<dyn InventoryStore>;

/// Application services wired over one store.
pub struct AppServices {
    pub store: SharedStore,
    pub checkout: SaleTransactionOrchestrator<SharedStore>,
    pub movements: MovementService<SharedStore>,
    pub products: ProductService<SharedStore>,
    pub auditor: LedgerAuditor<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore, retry: RetryPolicy) -> Self {
        Self {
            checkout: SaleTransactionOrchestrator::new(store.clone(), retry),
            movements: MovementService::new(store.clone(), retry),
            products: ProductService::new(store.clone(), retry),
            auditor: LedgerAuditor::new(store.clone()),
            store,
        }
    }

    pub fn in_memory(lock_timeout: Duration, retry: RetryPolicy) -> Self {
        Self::new(Arc::new(InMemoryInventoryStore::with_lock_timeout(lock_timeout)), retry)
    }

    /// Postgres when `DATABASE_URL` is configured (migrations applied on startup),
    /// otherwise the in-memory store.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        match &config.database {
            Some(database) => {
                let store = PostgresInventoryStore::connect(database, config.lock_timeout).await?;
                store.migrate().await?;
                tracing::info!(max_connections = database.max_connections, "using postgres store");
                Ok(Self::new(Arc::new(store), config.retry))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
                Ok(Self::in_memory(config.lock_timeout, config.retry))
            }
        }
    }
}
