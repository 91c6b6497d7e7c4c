//! Infrastructure layer: storage, transactional stock mutation, checkout, config.
//!
//! - [`store`]: storage boundary (traits) with in-memory and Postgres backends
//! - [`coordinator`]: the single writer of product stock
//! - [`orchestrator`]: atomic checkout across several products
//! - [`movements`], [`catalog`], [`audit`]: the remaining application services
//! - [`retry`]: bounded, jittered retry for transient conflicts
//! - [`config`]: environment-driven configuration

pub mod audit;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod movements;
pub mod orchestrator;
pub mod retry;
pub mod store;

pub use audit::{AuditError, AuditReport, LedgerAuditor};
pub use catalog::{CatalogError, ProductService};
pub use config::{AppConfig, ConfigError};
pub use coordinator::{MutationError, StockMutationCoordinator};
pub use movements::MovementService;
pub use orchestrator::{CheckoutError, CheckoutRequest, SaleTransactionOrchestrator, Shortage};
pub use retry::{RetryPolicy, Retryable};
pub use store::{
    InMemoryInventoryStore, InventoryStore, LedgerProjection, PostgresInventoryStore, ProductCatalog,
    ProductHistory, ProductStockStore, SaleStore, StockLedger, StoreError, StoreTransaction,
};
