//! chronx-timelock
//!
//! The TimeOracle: issues and verifies HMAC-signed timestamps used to
//! anchor settlement batches (spec §4.1).

pub mod oracle;

pub use oracle::{Clock, FixedClock, SystemClock, TimeOracle, MIN_SECRET_BYTES};
