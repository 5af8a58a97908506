//! chronx-state
//!
//! L1 (the hash-chained supply ledger) and L2 (the in-memory transaction
//! engine), the two mutable stores that sit beneath settlement.

pub mod engine;
pub mod ledger;

pub use engine::{Account, TransactionEngine};
pub use ledger::{Ledger, LedgerEntry};
