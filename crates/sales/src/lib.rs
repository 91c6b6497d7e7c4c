//! Sales domain module.
//!
//! Basket pricing, payment validation and the committed `Sale` record. Pure domain
//! logic: stock effects of a checkout are applied by the infra orchestrator through the
//! inventory ledger.

pub mod basket;
pub mod sale;

pub use basket::{PricedBasket, PricedLine, SaleError, validate_payments};
pub use sale::{LineItem, PaymentAllocation, PaymentMethod, Sale, SaleId, SaleItem};
