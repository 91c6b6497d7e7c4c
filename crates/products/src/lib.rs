//! Products catalog boundary.
//!
//! The catalog owns product identity and lifecycle; the inventory ledger owns the
//! `stock` column once a product exists. This crate holds the snapshot type both
//! sides agree on plus the catalog-side guards (no IO, no storage).

pub mod product;

pub use product::{NewProduct, Product, ProductId};
