//! API-side authorization guard.
//!
//! Handlers check permissions before touching any service, keeping the infra layer
//! auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use kardexpos_auth::{Permission, authorize};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Reject the request with 403 unless the principal's roles grant `permission`.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), Response> {
    authorize(&principal.principal(), permission)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kardexpos_auth::Role;
    use kardexpos_core::UserId;

    #[test]
    fn cashier_can_checkout_but_not_record_movements() {
        let cashier = PrincipalContext::new(UserId::new(), vec![Role::new("cashier")]);
        assert!(require(&cashier, &Permission::SALES_CHECKOUT).is_ok());

        let denied = require(&cashier, &Permission::KARDEX_MOVEMENTS_CREATE).unwrap_err();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }
}
