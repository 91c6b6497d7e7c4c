use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use kardexpos_auth::Permission;
use kardexpos_infra::LedgerProjection;
use kardexpos_sales::SaleId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(checkout))
        .route("/:id", get(get_sale))
}

/// Commit a basket as one sale. The acting user comes from the token, never the body.
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CheckoutBody>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::SALES_CHECKOUT) {
        return resp;
    }

    let request = body.into_request(principal.user_id());
    match services.checkout.checkout(&request).await {
        Ok(sale) => (StatusCode::CREATED, Json(sale)).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::SALES_READ) {
        return resp;
    }
    let id: SaleId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid sale id"),
    };

    match services.store.get_sale(id).await {
        Ok(Some(sale)) => Json(sale).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("sale {id} not found")),
        Err(e) => errors::store_error_to_response(e),
    }
}
