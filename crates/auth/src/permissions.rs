use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "kardex.read"). The wildcard `"*"` grants
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    pub const KARDEX_READ: Permission = Permission(Cow::Borrowed("kardex.read"));
    pub const KARDEX_MOVEMENTS_CREATE: Permission = Permission(Cow::Borrowed("kardex.movements.create"));
    pub const SALES_CHECKOUT: Permission = Permission(Cow::Borrowed("sales.checkout"));
    pub const SALES_READ: Permission = Permission(Cow::Borrowed("sales.read"));
    pub const PRODUCTS_MANAGE: Permission = Permission(Cow::Borrowed("products.manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
