use std::collections::HashSet;

use thiserror::Error;

use kardexpos_core::UserId;

use crate::{Permission, Role};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Resolve permissions from roles with the built-in policy.
    pub fn from_roles(user_id: UserId, roles: Vec<Role>) -> Self {
        let permissions = roles.iter().flat_map(Role::permissions).collect();
        Self {
            user_id,
            roles,
            permissions,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        tracing::debug!(user_id = %principal.user_id, permission = %required, "authorization denied");
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_wildcard_grants_everything() {
        let p = Principal::from_roles(UserId::new(), vec![Role::new("admin")]);
        assert!(authorize(&p, &Permission::KARDEX_MOVEMENTS_CREATE).is_ok());
        assert!(authorize(&p, &Permission::new("anything.else")).is_ok());
    }

    #[test]
    fn cashier_can_checkout_but_not_adjust_stock() {
        let p = Principal::from_roles(UserId::new(), vec![Role::new("cashier")]);
        assert!(authorize(&p, &Permission::SALES_CHECKOUT).is_ok());
        assert!(authorize(&p, &Permission::KARDEX_READ).is_ok());
        assert_eq!(
            authorize(&p, &Permission::KARDEX_MOVEMENTS_CREATE),
            Err(AuthzError::Forbidden("kardex.movements.create".to_string()))
        );
    }

    #[test]
    fn roles_accumulate_and_unknown_roles_grant_nothing() {
        let none = Principal::from_roles(UserId::new(), vec![Role::new("guest")]);
        assert!(authorize(&none, &Permission::KARDEX_READ).is_err());

        let both = Principal::from_roles(UserId::new(), vec![Role::new("cashier"), Role::new("warehouse")]);
        assert!(authorize(&both, &Permission::SALES_CHECKOUT).is_ok());
        assert!(authorize(&both, &Permission::PRODUCTS_MANAGE).is_ok());
    }
}
