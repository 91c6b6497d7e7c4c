//! Error → HTTP mapping.
//!
//! Every failure leaves as `{ "error": code, "message": text, "details": … }`.
//! Business rejections are 4xx, contention that survived retries is 409, storage
//! outages are 503 and broken invariants are 500.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use kardexpos_core::DomainError;
use kardexpos_infra::{AuditError, CatalogError, CheckoutError, MutationError, StoreError};
use kardexpos_sales::SaleError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> axum::response::Response {
    json_error_with_details(status, code, message, serde_json::Value::Null)
}

pub fn json_error_with_details(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: serde_json::Value,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::ProductNotFound(id) => product_not_found(id),
        StoreError::Duplicate(msg) => json_error(StatusCode::CONFLICT, "duplicate", msg),
        StoreError::ConstraintViolation(msg) => {
            tracing::error!(error = %msg, "ledger constraint violated");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "constraint_violation", msg)
        }
        StoreError::Unavailable(msg) => json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg),
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn mutation_error_to_response(err: MutationError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        MutationError::InsufficientStock {
            product_id,
            kind,
            available,
            requested,
        } => json_error_with_details(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_stock",
            message,
            json!({
                "productId": product_id,
                "movementType": kind,
                "available": available,
                "requested": requested,
            }),
        ),
        MutationError::ProductNotFound(id) => product_not_found(id),
        MutationError::ProductInactive(id) => product_inactive(id, message),
        MutationError::Invalid(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        MutationError::RequiresCheckout(kind) => json_error_with_details(
            StatusCode::BAD_REQUEST,
            "requires_checkout",
            message,
            json!({ "movementType": kind }),
        ),
        MutationError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        MutationError::Store(e) => store_error_to_response(e),
    }
}

pub fn checkout_error_to_response(err: CheckoutError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        CheckoutError::Sale(SaleError::PaymentMismatch { expected, received }) => json_error_with_details(
            StatusCode::UNPROCESSABLE_ENTITY,
            "payment_mismatch",
            message,
            json!({ "expected": expected, "received": received }),
        ),
        CheckoutError::Sale(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        CheckoutError::InsufficientStock(shortages) => json_error_with_details(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_stock",
            message,
            json!({ "shortages": shortages }),
        ),
        CheckoutError::ProductNotFound(id) => product_not_found(id),
        CheckoutError::ProductInactive(id) => product_inactive(id, message),
        CheckoutError::InvalidLine { product_id, .. } => json_error_with_details(
            StatusCode::BAD_REQUEST,
            "validation_error",
            message,
            json!({ "productId": product_id }),
        ),
        CheckoutError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        CheckoutError::Store(e) => store_error_to_response(e),
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::Domain(e) => {
            let status = match e {
                DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
                DomainError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::Conflict(_) => StatusCode::CONFLICT,
            };
            json_error(status, e.code(), e.message())
        }
        CatalogError::NotFound(id) => product_not_found(id),
        CatalogError::Duplicate(msg) => json_error(StatusCode::CONFLICT, "duplicate", msg),
        CatalogError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        CatalogError::Store(e) => store_error_to_response(e),
    }
}

pub fn audit_error_to_response(err: AuditError) -> axum::response::Response {
    match err {
        AuditError::NotFound(id) => product_not_found(id),
        AuditError::Store(e) => store_error_to_response(e),
    }
}

fn product_not_found(id: kardexpos_products::ProductId) -> axum::response::Response {
    json_error_with_details(
        StatusCode::NOT_FOUND,
        "product_not_found",
        format!("product {id} not found"),
        json!({ "productId": id }),
    )
}

fn product_inactive(id: kardexpos_products::ProductId, message: String) -> axum::response::Response {
    json_error_with_details(
        StatusCode::UNPROCESSABLE_ENTITY,
        "product_inactive",
        message,
        json!({ "productId": id }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kardexpos_inventory::MovementKind;
    use kardexpos_products::ProductId;
    use rust_decimal::Decimal;

    #[test]
    fn business_rejections_are_client_errors() {
        let resp = mutation_error_to_response(MutationError::InsufficientStock {
            product_id: ProductId::new(),
            kind: MovementKind::Damaged,
            available: 1,
            requested: 2,
        });
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = checkout_error_to_response(CheckoutError::Sale(SaleError::PaymentMismatch {
            expected: Decimal::new(112, 2),
            received: Decimal::ONE,
        }));
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = checkout_error_to_response(CheckoutError::Sale(SaleError::EmptyBasket));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn catalog_domain_rejections_map_by_variant() {
        let cases = [
            (DomainError::validation("SKU cannot be empty"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("ProductId: bad"), StatusCode::BAD_REQUEST),
            (DomainError::invariant("units still on hand"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::conflict("product is retired"), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(catalog_error_to_response(CatalogError::Domain(err)).status(), status);
        }
    }

    #[test]
    fn storage_failures_map_by_kind() {
        let cases = [
            (StoreError::Conflict("lock timeout".into()), StatusCode::CONFLICT),
            (StoreError::Unavailable("pool closed".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                StoreError::ConstraintViolation("chain broken".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (StoreError::ProductNotFound(ProductId::new()), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(store_error_to_response(err).status(), status);
        }
    }
}
