//! Node configuration surface (spec §6): exactly the knobs needed to
//! construct a `TimeOracle`, `Ledger`, `TransactionEngine` and
//! `SettlementEngine`. Loaded from a single local JSON file; nothing here
//! watches for changes or fetches from a remote store.

use std::path::Path;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// L1 genesis total supply, e.g. "1000000.00000000".
    pub initial_supply: String,
    /// Minimum per-mint inflation rate, as a percentage (e.g. `0`).
    pub min_inflation: Decimal,
    /// Maximum per-mint inflation rate, as a percentage (e.g. `10`).
    pub max_inflation: Decimal,
    /// Maximum confirmed transactions pulled into one settlement batch.
    pub batch_size: usize,
    /// Seconds between settlement ticks.
    pub settlement_interval: u64,
    /// Expected L2 mint-target address; checked against the reserved constant.
    pub reserve_address: String,
    /// Expected L2 fee-sink address; checked against the reserved constant.
    pub fee_address: String,
    /// HMAC key material for the TimeOracle. Must be at least 32 bytes.
    pub time_oracle_secret: String,
    /// Maximum accepted clock drift for a `TimeProof`, in seconds.
    pub time_oracle_max_drift: u64,
    /// How long a `TimeProof` remains valid after issuance, in seconds.
    pub time_oracle_proof_validity: u64,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}
