//! Postgres-backed stock ledger.
//!
//! Per-product serialization uses row locks: [`ProductStockStore::lock_product`] runs
//! `SELECT … FOR UPDATE` inside a transaction whose `lock_timeout` is set from config,
//! so a long wait fails fast instead of queueing requests.
//!
//! ## Error Mapping
//!
//! | SQLSTATE / sqlx error | StoreError | Scenario |
//! |---|---|---|
//! | `40001`, `40P01`, `55P03` | `Conflict` | serialization failure, deadlock, lock timeout |
//! | `23505` | `Duplicate` | SKU or id already taken |
//! | `23502`, `23503`, `23514`, `P0001` | `ConstraintViolation` | schema checks, append-only trigger |
//! | pool timeout/closed, IO, TLS | `Unavailable` | database unreachable |
//! | anything else | `Backend` | |

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{error, instrument};
use uuid::Uuid;

use kardexpos_core::{CustomerId, UserId};
use kardexpos_inventory::{KardexEntry, KardexEntryId, MovementKind};
use kardexpos_products::{Product, ProductId};
use kardexpos_sales::{PaymentAllocation, PaymentMethod, Sale, SaleId, SaleItem};

use super::query::{LedgerQuery, Page, SortField, SortOrder, SortSpec};
use super::{
    InventoryStore, LedgerProjection, ProductCatalog, ProductHistory, ProductStockStore, SaleStore, StockLedger,
    StoreError, StoreTransaction,
};
use crate::config::DatabaseConfig;

const ENTRY_COLUMNS: &str = "id, product_id, movement_type, quantity, unit_cost, subtotal, tax_rate, \
     tax_amount, total, stock_before, stock_after, reason, user_id, created_at";

const PRODUCT_COLUMNS: &str = "id, sku, name, stock, created_at, deleted_at";

/// Latest entry per product; `seq` is kept so ordering ties still break by ledger order.
const LATEST_SOURCE: &str = "(SELECT DISTINCT ON (product_id) * FROM kardex_entries \
     ORDER BY product_id, seq DESC) AS latest";

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub async fn connect(config: &DatabaseConfig, lock_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, lock_timeout))
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }

    async fn query_page(&self, source: &str, query: &LedgerQuery) -> Result<Page<KardexEntry>, StoreError> {
        let mut count: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!("SELECT COUNT(*) FROM {source}"));
        push_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_entries", e))?;

        let mut select: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!("SELECT {ENTRY_COLUMNS} FROM {source}"));
        push_filters(&mut select, query);
        push_order(&mut select, &query.sort);
        select
            .push(" LIMIT ")
            .push_bind(i64::from(query.page.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX));

        let rows: Vec<KardexEntryRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("page_entries", e))?;

        let items = rows.into_iter().map(KardexEntry::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, query.page, u64::try_from(total).unwrap_or(0)))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &LedgerQuery) {
    qb.push(" WHERE TRUE");
    if let Some(kind) = query.filter.movement_type {
        qb.push(" AND movement_type = ").push_bind(kind.as_str());
    }
    if let Some(product_id) = query.filter.product_id {
        qb.push(" AND product_id = ").push_bind(Uuid::from(product_id));
    }
    if let Some(user_id) = query.filter.user_id {
        qb.push(" AND user_id = ").push_bind(Uuid::from(user_id));
    }
    if let Some(term) = query.search_term() {
        qb.push(" AND reason ILIKE ")
            .push_bind(format!("%{}%", escape_like(term)))
            .push(" ESCAPE '\\'");
    }
}

/// Sort columns come from the [`SortField`] whitelist, never from raw input.
fn push_order(qb: &mut QueryBuilder<'_, Postgres>, sort: &[SortSpec]) {
    let default = [SortSpec {
        order_by: SortField::CreatedAt,
        order: SortOrder::Desc,
    }];
    let specs = if sort.is_empty() { &default[..] } else { sort };

    qb.push(" ORDER BY ");
    for spec in specs {
        qb.push(sort_expression(spec.order_by))
            .push(" ")
            .push(spec.order.keyword())
            .push(", ");
    }
    qb.push("seq DESC");
}

/// ORDER BY expression for a sort field. Movement types sort bytewise so Postgres
/// agrees with the in-memory backend whatever the database's default collation.
fn sort_expression(field: SortField) -> &'static str {
    match field {
        SortField::MovementType => "movement_type COLLATE \"C\"",
        other => other.column(),
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("40001" | "40P01" | "55P03") => StoreError::Conflict(msg),
                Some("23505") => StoreError::Duplicate(msg),
                Some("23502" | "23503" | "23514" | "P0001") => {
                    error!(operation, error = %msg, "constraint violation");
                    StoreError::ConstraintViolation(msg)
                }
                _ => StoreError::Backend(msg),
            }
        }
        e @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_)) => {
            StoreError::Unavailable(format!("{operation}: {e}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    stock: i64,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::from_uuid(row.id),
            sku: row.sku,
            name: row.name,
            stock: row.stock,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct KardexEntryRow {
    id: Uuid,
    product_id: Uuid,
    movement_type: String,
    quantity: i64,
    unit_cost: Decimal,
    subtotal: Decimal,
    tax_rate: Decimal,
    tax_amount: Decimal,
    total: Decimal,
    stock_before: i64,
    stock_after: i64,
    reason: Option<String>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<KardexEntryRow> for KardexEntry {
    type Error = StoreError;

    fn try_from(row: KardexEntryRow) -> Result<Self, Self::Error> {
        let movement_type: MovementKind = row
            .movement_type
            .parse()
            .map_err(|e| StoreError::Backend(format!("entry {}: {e}", row.id)))?;
        Ok(KardexEntry {
            id: KardexEntryId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            movement_type,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            subtotal: row.subtotal,
            tax_rate: row.tax_rate,
            tax_amount: row.tax_amount,
            total: row.total,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            reason: row.reason,
            user_id: UserId::from_uuid(row.user_id),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    customer_id: Uuid,
    user_id: Uuid,
    subtotal: Decimal,
    tax_amount: Decimal,
    total: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    line_no: i32,
    product_id: Uuid,
    quantity: i64,
    unit_price: Decimal,
    tax_rate: Decimal,
    total_price: Decimal,
    tax_amount: Decimal,
    kardex_entry_id: Uuid,
}

impl TryFrom<SaleItemRow> for SaleItem {
    type Error = StoreError;

    fn try_from(row: SaleItemRow) -> Result<Self, Self::Error> {
        Ok(SaleItem {
            line_no: u32::try_from(row.line_no)
                .map_err(|_| StoreError::Backend(format!("negative line_no {}", row.line_no)))?,
            product_id: ProductId::from_uuid(row.product_id),
            quantity: row.quantity,
            unit_price: row.unit_price,
            tax_rate: row.tax_rate,
            total_price: row.total_price,
            tax_amount: row.tax_amount,
            kardex_entry_id: KardexEntryId::from_uuid(row.kardex_entry_id),
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    method: String,
    amount: Decimal,
}

impl TryFrom<PaymentRow> for PaymentAllocation {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let method = PaymentMethod::parse(&row.method)
            .ok_or_else(|| StoreError::Backend(format!("unknown payment method '{}'", row.method)))?;
        Ok(PaymentAllocation {
            method,
            amount: row.amount,
        })
    }
}

fn to_i32(value: usize, what: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::ConstraintViolation(format!("{what} {value} out of range")))
}

#[async_trait]
impl LedgerProjection for PostgresInventoryStore {
    #[instrument(skip(self, query), err)]
    async fn page(&self, query: &LedgerQuery) -> Result<Page<KardexEntry>, StoreError> {
        self.query_page("kardex_entries", query).await
    }

    #[instrument(skip(self, query), err)]
    async fn latest_per_product(&self, query: &LedgerQuery) -> Result<Page<KardexEntry>, StoreError> {
        self.query_page(LATEST_SOURCE, query).await
    }

    async fn get_entry(&self, id: KardexEntryId) -> Result<Option<KardexEntry>, StoreError> {
        let row: Option<KardexEntryRow> =
            sqlx::query_as(&format!("SELECT {ENTRY_COLUMNS} FROM kardex_entries WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_entry", e))?;
        row.map(KardexEntry::try_from).transpose()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn history(&self, product_id: ProductId) -> Result<Vec<KardexEntry>, StoreError> {
        let rows: Vec<KardexEntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM kardex_entries WHERE product_id = $1 ORDER BY seq ASC"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("history", e))?;
        rows.into_iter().map(KardexEntry::try_from).collect()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn product_history(&self, product_id: ProductId) -> Result<Option<ProductHistory>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        // Must be the first statement of the transaction for the snapshot to cover both reads.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        let product: Option<ProductRow> = sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("product_history", e))?;
        let Some(product) = product else {
            return Ok(None);
        };

        let rows: Vec<KardexEntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM kardex_entries WHERE product_id = $1 ORDER BY seq ASC"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("product_history", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(Some(ProductHistory {
            product: Product::from(product),
            entries: rows.into_iter().map(KardexEntry::try_from).collect::<Result<_, _>>()?,
        }))
    }

    async fn get_sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        let sale: Option<SaleRow> = sqlx::query_as(
            "SELECT id, customer_id, user_id, subtotal, tax_amount, total, created_at FROM sales WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_sale", e))?;
        let Some(sale) = sale else {
            return Ok(None);
        };

        let items: Vec<SaleItemRow> = sqlx::query_as(
            "SELECT line_no, product_id, quantity, unit_price, tax_rate, total_price, tax_amount, kardex_entry_id \
             FROM sale_items WHERE sale_id = $1 ORDER BY line_no",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_sale_items", e))?;

        let payments: Vec<PaymentRow> =
            sqlx::query_as("SELECT method, amount FROM sale_payments WHERE sale_id = $1 ORDER BY position")
                .bind(id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_sale_payments", e))?;

        Ok(Some(Sale {
            id: SaleId::from_uuid(sale.id),
            items: items.into_iter().map(SaleItem::try_from).collect::<Result<_, _>>()?,
            subtotal: sale.subtotal,
            tax_amount: sale.tax_amount,
            total: sale.total,
            payment_methods: payments
                .into_iter()
                .map(PaymentAllocation::try_from)
                .collect::<Result<_, _>>()?,
            customer_id: CustomerId::from_uuid(sale.customer_id),
            user_id: UserId::from_uuid(sale.user_id),
            created_at: sale.created_at,
        }))
    }
}

#[async_trait]
impl ProductCatalog for PostgresInventoryStore {
    #[instrument(skip(self, product), fields(product_id = %product.id, sku = %product.sku), err)]
    async fn register_product(&self, product: Product) -> Result<Product, StoreError> {
        sqlx::query(
            "INSERT INTO products (id, sku, name, stock, created_at, deleted_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("register_product", e))?;
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        Ok(row.map(Product::from))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // SET does not accept bind parameters; the value is an integer we format ourselves.
        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&set_timeout)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        Ok(Box::new(PostgresTransaction {
            tx: Some(tx),
            locked: HashMap::new(),
        }))
    }
}

/// Transaction over [`PostgresInventoryStore`]. Dropping it un-committed rolls back.
pub struct PostgresTransaction {
    tx: Option<Transaction<'static, Postgres>>,
    /// Products row-locked by this transaction, with their stock as written so far.
    locked: HashMap<ProductId, i64>,
}

impl PostgresTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(StoreError::Backend("transaction already finished".to_string())),
        }
    }

    fn locked_stock(&self, product_id: ProductId) -> Result<i64, StoreError> {
        self.locked.get(&product_id).copied().ok_or_else(|| {
            StoreError::ConstraintViolation(format!("product {product_id} is not locked by this transaction"))
        })
    }
}

#[async_trait]
impl StockLedger for PostgresTransaction {
    async fn latest_for(&mut self, product_id: ProductId) -> Result<Option<KardexEntry>, StoreError> {
        let row: Option<KardexEntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM kardex_entries WHERE product_id = $1 ORDER BY seq DESC LIMIT 1"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("latest_for", e))?;
        row.map(KardexEntry::try_from).transpose()
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.id, product_id = %entry.product_id), err)]
    async fn append(&mut self, entry: KardexEntry) -> Result<KardexEntry, StoreError> {
        let current_stock = self.locked_stock(entry.product_id)?;
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

        sqlx::query(&format!(
            "INSERT INTO kardex_entries ({ENTRY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(entry.id.as_uuid())
        .bind(entry.product_id.as_uuid())
        .bind(entry.movement_type.as_str())
        .bind(entry.quantity)
        .bind(entry.unit_cost)
        .bind(entry.subtotal)
        .bind(entry.tax_rate)
        .bind(entry.tax_amount)
        .bind(entry.total)
        .bind(entry.stock_before)
        .bind(entry.stock_after)
        .bind(entry.reason.as_deref())
        .bind(entry.user_id.as_uuid())
        .bind(entry.created_at)
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("append_entry", e))?;

        Ok(entry)
    }
}

#[async_trait]
impl ProductStockStore for PostgresTransaction {
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Product, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;

        let product = Product::from(row.ok_or(StoreError::ProductNotFound(product_id))?);
        self.locked.insert(product_id, product.stock);
        Ok(product)
    }

    async fn set_stock(&mut self, product_id: ProductId, stock: i64) -> Result<(), StoreError> {
        self.locked_stock(product_id)?;
        let result = sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(product_id.as_uuid())
            .bind(stock)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("set_stock", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id));
        }
        self.locked.insert(product_id, stock);
        Ok(())
    }

    async fn mark_retired(&mut self, product_id: ProductId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.locked_stock(product_id)?;
        sqlx::query("UPDATE products SET deleted_at = $2 WHERE id = $1")
            .bind(product_id.as_uuid())
            .bind(at)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("mark_retired", e))?;
        Ok(())
    }
}

#[async_trait]
impl SaleStore for PostgresTransaction {
    #[instrument(skip(self, sale), fields(sale_id = %sale.id, lines = sale.items.len()), err)]
    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sales (id, customer_id, user_id, subtotal, tax_amount, total, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(sale.id.as_uuid())
        .bind(sale.customer_id.as_uuid())
        .bind(sale.user_id.as_uuid())
        .bind(sale.subtotal)
        .bind(sale.tax_amount)
        .bind(sale.total)
        .bind(sale.created_at)
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e))?;

        for item in &sale.items {
            let line_no = to_i32(item.line_no as usize, "line_no")?;
            sqlx::query(
                "INSERT INTO sale_items (sale_id, line_no, product_id, quantity, unit_price, tax_rate, \
                 total_price, tax_amount, kardex_entry_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(sale.id.as_uuid())
            .bind(line_no)
            .bind(item.product_id.as_uuid())
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.tax_rate)
            .bind(item.total_price)
            .bind(item.tax_amount)
            .bind(item.kardex_entry_id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("insert_sale_item", e))?;
        }

        for (position, payment) in sale.payment_methods.iter().enumerate() {
            sqlx::query("INSERT INTO sale_payments (sale_id, position, method, amount) VALUES ($1, $2, $3, $4)")
                .bind(sale.id.as_uuid())
                .bind(to_i32(position, "payment position")?)
                .bind(payment.method.as_str())
                .bind(payment.amount)
                .execute(self.conn()?)
                .await
                .map_err(|e| map_sqlx_error("insert_sale_payment", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Backend("transaction already finished".to_string()))?;
        self.locked.clear();
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Backend("transaction already finished".to_string()))?;
        self.locked.clear();
        tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))
    }
}
