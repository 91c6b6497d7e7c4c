use rust_decimal::Decimal;
use serde::Deserialize;

use axum::http::StatusCode;

use kardexpos_core::{CustomerId, UserId};
use kardexpos_infra::CheckoutRequest;
use kardexpos_infra::store::{LedgerFilter, LedgerQuery, PageRequest, SortSpec};
use kardexpos_inventory::{MovementKind, MovementRequest};
use kardexpos_products::ProductId;
use kardexpos_sales::{LineItem, PaymentAllocation};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMovementRequest {
    pub product_id: ProductId,
    pub movement_type: MovementKind,
    pub quantity: i64,
    pub unit_cost: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    pub reason: Option<String>,
}

impl RecordMovementRequest {
    pub fn into_request(self, user_id: UserId) -> MovementRequest {
        MovementRequest {
            product_id: self.product_id,
            kind: self.movement_type,
            quantity: self.quantity,
            unit_cost: self.unit_cost,
            tax_rate: self.tax_rate,
            reason: self.reason,
            user_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub items: Vec<LineItem>,
    pub customer_id: CustomerId,
    pub payment_methods: Vec<PaymentAllocation>,
}

impl CheckoutBody {
    pub fn into_request(self, user_id: UserId) -> CheckoutRequest {
        CheckoutRequest {
            items: self.items,
            customer_id: self.customer_id,
            user_id,
            payments: self.payment_methods,
        }
    }
}

/// Query string of `GET /kardex` and `GET /kardex/lasted`.
///
/// `filters` and `sort` arrive as JSON documents, e.g.
/// `filters={"movementType":"SALE"}&sort=[{"orderBy":"createdAt","order":"asc"}]`.
#[derive(Debug, Default, Deserialize)]
pub struct LedgerQueryParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub filters: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
}

impl LedgerQueryParams {
    pub fn into_query(self) -> Result<LedgerQuery, axum::response::Response> {
        let filter: LedgerFilter = match self.filters.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_filters", e.to_string()))?,
            None => LedgerFilter::default(),
        };

        let sort: Vec<SortSpec> = match self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_sort", e.to_string()))?,
            None => Vec::new(),
        };

        Ok(LedgerQuery {
            filter,
            search: self.search,
            sort,
            page: PageRequest::new(self.page, self.limit),
        })
    }
}
