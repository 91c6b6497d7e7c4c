//! Postgres backend checks. Skipped unless `KARDEXPOS_TEST_DATABASE_URL` points at a
//! scratch database; each run registers fresh products so reruns do not collide.

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;

use kardexpos_core::{CustomerId, UserId};
use kardexpos_infra::config::DatabaseConfig;
use kardexpos_infra::store::{LedgerFilter, LedgerQuery};
use kardexpos_infra::{
    CheckoutError, CheckoutRequest, InventoryStore, LedgerAuditor, LedgerProjection, PostgresInventoryStore,
    ProductCatalog, ProductStockStore, RetryPolicy, SaleTransactionOrchestrator,
};
use kardexpos_inventory::replay;
use kardexpos_products::{Product, ProductId};
use kardexpos_sales::{LineItem, PaymentAllocation, PaymentMethod};

async fn store() -> Option<PostgresInventoryStore> {
    let url = std::env::var("KARDEXPOS_TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url,
        max_connections: 5,
    };
    let store = PostgresInventoryStore::connect(&config, Duration::from_millis(500))
        .await
        .unwrap();
    store.migrate().await.unwrap();
    Some(store)
}

async fn seed(store: &PostgresInventoryStore, stock: i64) -> ProductId {
    let id = ProductId::new();
    store
        .register_product(Product {
            id,
            sku: format!("PG-{id}"),
            name: "Agua 1L".to_string(),
            stock,
            created_at: Utc::now(),
            deleted_at: None,
        })
        .await
        .unwrap();
    id
}

fn checkout(product_id: ProductId, quantity: i64) -> CheckoutRequest {
    let unit_price: Decimal = "0.50".parse().unwrap();
    CheckoutRequest {
        items: vec![LineItem {
            product_id,
            quantity,
            unit_price,
            tax_rate: Decimal::ZERO,
        }],
        customer_id: CustomerId::new(),
        user_id: UserId::new(),
        payments: vec![PaymentAllocation {
            method: PaymentMethod::Cash,
            amount: unit_price * Decimal::from(quantity),
        }],
    }
}

#[tokio::test]
async fn checkout_persists_sale_and_chained_entries() {
    let Some(store) = store().await else {
        return;
    };
    let product = seed(&store, 5).await;
    let orchestrator = SaleTransactionOrchestrator::new(store.clone(), RetryPolicy::default());

    let sale = orchestrator.checkout(&checkout(product, 2)).await.unwrap();
    orchestrator.checkout(&checkout(product, 3)).await.unwrap();

    let err = orchestrator.checkout(&checkout(product, 1)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientStock(_)));

    assert_eq!(store.get_product(product).await.unwrap().unwrap().stock, 0);
    let history = store.history(product).await.unwrap();
    let report = replay(product, &history).unwrap();
    assert_eq!(report.final_stock, Some(0));
    assert_eq!(report.units_out, 5);

    // Timestamps round to microseconds in Postgres, so compare the money and links.
    let stored = store.get_sale(sale.id).await.unwrap().unwrap();
    assert_eq!(stored.items, sale.items);
    assert_eq!(stored.total, sale.total);
    assert_eq!(stored.payment_methods, sale.payment_methods);

    let page = store
        .page(&LedgerQuery {
            filter: LedgerFilter {
                product_id: Some(product),
                ..LedgerFilter::default()
            },
            ..LedgerQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.pagination.total_records, 2);
    assert_eq!(page.items[0].stock_after, 0);
}

#[tokio::test]
async fn uncommitted_transaction_leaves_no_trace() {
    let Some(store) = store().await else {
        return;
    };
    let product = seed(&store, 4).await;

    let mut tx = store.begin().await.unwrap();
    tx.lock_product(product).await.unwrap();
    tx.set_stock(product, 1).await.unwrap();
    drop(tx);

    assert_eq!(store.get_product(product).await.unwrap().unwrap().stock, 4);
}

#[tokio::test]
async fn product_history_is_one_snapshot() {
    let Some(store) = store().await else {
        return;
    };
    let product = seed(&store, 6).await;
    let orchestrator = SaleTransactionOrchestrator::new(store.clone(), RetryPolicy::default());
    orchestrator.checkout(&checkout(product, 2)).await.unwrap();

    let snapshot = store.product_history(product).await.unwrap().unwrap();
    assert_eq!(snapshot.product.stock, 4);
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].stock_after, 4);
    assert!(store.product_history(ProductId::new()).await.unwrap().is_none());

    let report = LedgerAuditor::new(store.clone()).audit(product).await.unwrap();
    assert!(report.consistent);
}
