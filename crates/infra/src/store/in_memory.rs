use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, instrument};

use kardexpos_inventory::{KardexEntry, KardexEntryId};
use kardexpos_products::{Product, ProductId};
use kardexpos_sales::{Sale, SaleId};

use super::query::{LedgerQuery, Page};
use super::{
    InventoryStore, LedgerProjection, ProductCatalog, ProductHistory, ProductStockStore, SaleStore, StockLedger,
    StoreError, StoreTransaction,
};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Default)]
struct LedgerState {
    products: HashMap<ProductId, Product>,
    /// Committed entries in ledger order; the index is the entry's sequence number.
    entries: Vec<KardexEntry>,
    entry_index: HashMap<KardexEntryId, usize>,
    by_product: HashMap<ProductId, Vec<usize>>,
    sales: HashMap<SaleId, Sale>,
}

impl LedgerState {
    fn history(&self, product_id: ProductId) -> Vec<KardexEntry> {
        self.by_product
            .get(&product_id)
            .map(|ix| ix.iter().filter_map(|&i| self.entries.get(i)).cloned().collect())
            .unwrap_or_default()
    }

    fn latest_for(&self, product_id: ProductId) -> Option<&KardexEntry> {
        self.by_product
            .get(&product_id)
            .and_then(|ix| ix.last())
            .and_then(|&i| self.entries.get(i))
    }
}

#[derive(Debug)]
struct Shared {
    state: RwLock<LedgerState>,
    /// One async mutex per product, standing in for a row lock.
    locks: Mutex<HashMap<ProductId, Arc<AsyncMutex<()>>>>,
    lock_timeout: Duration,
}

impl Shared {
    fn product_lock(&self, product_id: ProductId) -> Result<Arc<AsyncMutex<()>>, StoreError> {
        let mut locks = self.locks.lock().map_err(poisoned)?;
        Ok(locks
            .entry(product_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory stock ledger.
///
/// Intended for tests/dev. Transactions buffer their writes and apply them in one step
/// on commit, so readers only ever observe committed state.
#[derive(Debug, Clone)]
pub struct InMemoryInventoryStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(LedgerState::default()),
                locks: Mutex::new(HashMap::new()),
                lock_timeout,
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, StoreError> {
        self.shared.state.read().map_err(poisoned)
    }

    /// Number of committed ledger entries.
    pub fn entry_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.entries.len())
    }

    /// Number of committed sales.
    pub fn sale_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.sales.len())
    }
}

fn paginate(query: &LedgerQuery, mut matched: Vec<(u64, &KardexEntry)>) -> Page<KardexEntry> {
    matched.sort_by(|a, b| query.compare(*a, *b));
    let total = matched.len() as u64;
    let offset = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
    let items = matched
        .into_iter()
        .skip(offset)
        .take(query.page.limit as usize)
        .map(|(_, e)| e.clone())
        .collect();
    Page::new(items, query.page, total)
}

#[async_trait]
impl LedgerProjection for InMemoryInventoryStore {
    async fn page(&self, query: &LedgerQuery) -> Result<Page<KardexEntry>, StoreError> {
        let state = self.read()?;
        let matched = state
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| query.matches(e))
            .map(|(i, e)| (i as u64, e))
            .collect();
        Ok(paginate(query, matched))
    }

    async fn latest_per_product(&self, query: &LedgerQuery) -> Result<Page<KardexEntry>, StoreError> {
        let state = self.read()?;
        let matched = state
            .by_product
            .values()
            .filter_map(|ix| ix.last())
            .filter_map(|&i| state.entries.get(i).map(|e| (i as u64, e)))
            .filter(|(_, e)| query.matches(e))
            .collect();
        Ok(paginate(query, matched))
    }

    async fn get_entry(&self, id: KardexEntryId) -> Result<Option<KardexEntry>, StoreError> {
        let state = self.read()?;
        Ok(state
            .entry_index
            .get(&id)
            .and_then(|&i| state.entries.get(i))
            .cloned())
    }

    async fn history(&self, product_id: ProductId) -> Result<Vec<KardexEntry>, StoreError> {
        Ok(self.read()?.history(product_id))
    }

    async fn product_history(&self, product_id: ProductId) -> Result<Option<ProductHistory>, StoreError> {
        let state = self.read()?;
        Ok(state.products.get(&product_id).map(|product| ProductHistory {
            product: product.clone(),
            entries: state.history(product_id),
        }))
    }

    async fn get_sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        Ok(self.read()?.sales.get(&id).cloned())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryInventoryStore {
    #[instrument(skip(self, product), fields(product_id = %product.id, sku = %product.sku), err)]
    async fn register_product(&self, product: Product) -> Result<Product, StoreError> {
        let mut state = self.shared.state.write().map_err(poisoned)?;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::Duplicate(format!("product {} already exists", product.id)));
        }
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::Duplicate(format!("sku '{}' already exists", product.sku)));
        }
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            shared: self.shared.clone(),
            guards: HashMap::new(),
            products: HashMap::new(),
            entries: Vec::new(),
            sales: Vec::new(),
            open: true,
        }))
    }
}

/// Transaction over [`InMemoryInventoryStore`].
///
/// Holds the owned guards of every product it locked until commit, rollback or drop.
pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    guards: HashMap<ProductId, OwnedMutexGuard<()>>,
    /// Working copies of the locked product rows.
    products: HashMap<ProductId, Product>,
    entries: Vec<KardexEntry>,
    sales: Vec<Sale>,
    open: bool,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::Backend("transaction already finished".to_string()))
        }
    }

    fn locked(&mut self, product_id: ProductId) -> Result<&mut Product, StoreError> {
        self.products.get_mut(&product_id).ok_or_else(|| {
            StoreError::ConstraintViolation(format!("product {product_id} is not locked by this transaction"))
        })
    }

    fn release(&mut self) {
        self.open = false;
        self.entries.clear();
        self.sales.clear();
        self.products.clear();
        self.guards.clear();
    }
}

#[async_trait]
impl StockLedger for InMemoryTransaction {
    async fn latest_for(&mut self, product_id: ProductId) -> Result<Option<KardexEntry>, StoreError> {
        self.ensure_open()?;
        if let Some(e) = self.entries.iter().rev().find(|e| e.product_id == product_id) {
            return Ok(Some(e.clone()));
        }
        let state = self.shared.state.read().map_err(poisoned)?;
        Ok(state.latest_for(product_id).cloned())
    }

    async fn append(&mut self, entry: KardexEntry) -> Result<KardexEntry, StoreError> {
        self.ensure_open()?;
        let current_stock = self.locked(entry.product_id)?.stock;

        entry
            .validate()
            .map_err(|e| StoreError::ConstraintViolation(e.to_string()))?;
        let previous = self.latest_for(entry.product_id).await?;
        entry
            .ensure_follows(previous.as_ref())
            .map_err(|e| StoreError::ConstraintViolation(e.to_string()))?;
        if entry.stock_before != current_stock {
            return Err(StoreError::ConstraintViolation(format!(
                "entry {} starts at {} but product {} has {} on hand",
                entry.id, entry.stock_before, entry.product_id, current_stock
            )));
        }

        self.entries.push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl ProductStockStore for InMemoryTransaction {
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Product, StoreError> {
        self.ensure_open()?;
        if let Some(p) = self.products.get(&product_id) {
            return Ok(p.clone());
        }

        let lock = self.shared.product_lock(product_id)?;
        let timeout = self.shared.lock_timeout;
        let guard = tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                StoreError::Conflict(format!(
                    "lock on product {product_id} not acquired within {}ms",
                    timeout.as_millis()
                ))
            })?;

        let product = {
            let state = self.shared.state.read().map_err(poisoned)?;
            state.products.get(&product_id).cloned()
        };
        let product = product.ok_or(StoreError::ProductNotFound(product_id))?;

        self.guards.insert(product_id, guard);
        self.products.insert(product_id, product.clone());
        Ok(product)
    }

    async fn set_stock(&mut self, product_id: ProductId, stock: i64) -> Result<(), StoreError> {
        self.ensure_open()?;
        if stock < 0 {
            return Err(StoreError::ConstraintViolation(format!(
                "stock of product {product_id} cannot become {stock}"
            )));
        }
        self.locked(product_id)?.stock = stock;
        Ok(())
    }

    async fn mark_retired(&mut self, product_id: ProductId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.locked(product_id)?.deleted_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl SaleStore for InMemoryTransaction {
    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        self.ensure_open()?;
        for item in &sale.items {
            let linked = self
                .entries
                .iter()
                .any(|e| e.id == item.kardex_entry_id && e.product_id == item.product_id);
            if !linked {
                return Err(StoreError::ConstraintViolation(format!(
                    "sale item {} references entry {} outside this transaction",
                    item.line_no, item.kardex_entry_id
                )));
            }
        }

        let exists = self.sales.iter().any(|s| s.id == sale.id)
            || self.shared.state.read().map_err(poisoned)?.sales.contains_key(&sale.id);
        if exists {
            return Err(StoreError::Duplicate(format!("sale {} already exists", sale.id)));
        }

        self.sales.push(sale.clone());
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let (entry_count, sale_count) = (self.entries.len(), self.sales.len());
        {
            let mut state = self.shared.state.write().map_err(poisoned)?;
            for product in self.products.values() {
                state.products.insert(product.id, product.clone());
            }
            for entry in self.entries.drain(..) {
                let idx = state.entries.len();
                state.entry_index.insert(entry.id, idx);
                state.by_product.entry(entry.product_id).or_default().push(idx);
                state.entries.push(entry);
            }
            for sale in self.sales.drain(..) {
                state.sales.insert(sale.id, sale);
            }
        }
        self.release();
        debug!(entry_count, sale_count, "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.release();
        debug!("in-memory transaction rolled back");
        Ok(())
    }
}
