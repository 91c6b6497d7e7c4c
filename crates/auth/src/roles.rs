use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
///
/// Roles stay opaque strings on the wire; [`Role::permissions`] is the built-in
/// policy mapping them to permissions. Unknown roles grant nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn permissions(&self) -> Vec<Permission> {
        match self.as_str() {
            "admin" => vec![Permission::WILDCARD],
            "cashier" => vec![Permission::SALES_CHECKOUT, Permission::SALES_READ, Permission::KARDEX_READ],
            "warehouse" => vec![
                Permission::KARDEX_READ,
                Permission::KARDEX_MOVEMENTS_CREATE,
                Permission::PRODUCTS_MANAGE,
            ],
            "auditor" => vec![Permission::KARDEX_READ, Permission::SALES_READ],
            _ => Vec::new(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
