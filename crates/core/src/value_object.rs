//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two line-amount
/// breakdowns with the same subtotal, tax and total are the same thing, while two
/// ledger entries with identical numbers are still distinct entities.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct PaymentAllocation {
///     method: PaymentMethod,
///     amount: Decimal,
/// }
///
/// impl ValueObject for PaymentAllocation {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
