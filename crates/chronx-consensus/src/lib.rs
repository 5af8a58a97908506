//! chronx-consensus
//!
//! L3: periodic settlement of confirmed L2 transactions into
//! Merkle-committed, time-anchored batches.

pub mod batch;
pub mod settlement;

pub use batch::{BatchStatus, SettlementBatch};
pub use settlement::SettlementEngine;
