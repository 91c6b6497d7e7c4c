use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use kardexpos_auth::Permission;
use kardexpos_infra::LedgerProjection;
use kardexpos_inventory::KardexEntryId;
use kardexpos_products::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_entries).post(record_movement))
        .route("/lasted", get(latest_per_product))
        .route("/products/:id/audit", get(audit_product))
        .route("/:id", get(get_entry))
}

pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<dto::LedgerQueryParams>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::KARDEX_READ) {
        return resp;
    }
    let query = match params.into_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    match services.store.page(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn latest_per_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<dto::LedgerQueryParams>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::KARDEX_READ) {
        return resp;
    }
    let query = match params.into_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    match services.store.latest_per_product(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::KARDEX_READ) {
        return resp;
    }
    let id: KardexEntryId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid kardex entry id"),
    };

    match services.store.get_entry(id).await {
        Ok(Some(entry)) => Json(entry).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("kardex entry {id} not found")),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RecordMovementRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::KARDEX_MOVEMENTS_CREATE) {
        return resp;
    }

    let request = body.into_request(principal.user_id());
    match services.movements.record(&request).await {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => errors::mutation_error_to_response(e),
    }
}

pub async fn audit_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::KARDEX_READ) {
        return resp;
    }
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };

    match services.auditor.audit(product_id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::audit_error_to_response(e),
    }
}
