//! Inventory stock ledger ("Kardex") domain.
//!
//! Business rules for stock movements, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage):
//!
//! - [`movement`]: the closed set of movement kinds and the policy that turns a kind
//!   into a signed stock effect.
//! - [`amounts`]: cost/tax arithmetic for a movement line.
//! - [`entry`]: immutable ledger entries and the per-entry/chain invariants.
//! - [`audit`]: replay of a product's ledger history.

pub mod amounts;
pub mod audit;
pub mod entry;
pub mod movement;

pub use amounts::{AmountError, LineAmounts};
pub use audit::{ChainViolation, ReplayReport, replay};
pub use entry::{EntryError, KardexEntry, KardexEntryId, MovementRequest};
pub use movement::{Direction, MovementKind, MovementPolicy, PolicyError};
