use chronx_core::amount::Amount;
use chronx_core::encoding::ledger_entry_hash_input;
use chronx_core::error::ChronxError;
use chronx_core::types::{Hash32, Timestamp};
use chronx_timelock::TimeOracle;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One append-only step in the supply ledger (spec §3/§4.2): a signed change
/// to total supply, chained to its predecessor by `prev_hash`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub index: u64,
    pub timestamp: Timestamp,
    pub total_supply: Amount,
    pub delta: Amount,
    pub reason: String,
    pub prev_hash: Hash32,
    pub hash: Hash32,
}

impl LedgerEntry {
    fn hash_input(&self) -> Vec<u8> {
        ledger_entry_hash_input(
            self.index,
            self.timestamp,
            self.total_supply,
            self.delta,
            &self.reason,
            self.prev_hash,
        )
    }

    fn compute_hash(&self) -> Hash32 {
        Hash32::sha256(&self.hash_input())
    }
}

struct LedgerState {
    entries: Vec<LedgerEntry>,
}

/// The L1 hash-chained append-only supply ledger (spec §4.2). Every mutation
/// to total supply — genesis included — is a chained, hashed entry; nothing
/// is ever rewritten in place.
pub struct Ledger {
    state: RwLock<LedgerState>,
    min_inflation_pct: Decimal,
    max_inflation_pct: Decimal,
}

impl Ledger {
    /// Seed the ledger with a genesis entry of `initial_supply`. Future
    /// `mint_supply` calls are bounded to `[min_inflation_pct,
    /// max_inflation_pct]` per call.
    pub fn new(
        initial_supply: Amount,
        min_inflation_pct: Decimal,
        max_inflation_pct: Decimal,
        time_oracle: &TimeOracle,
    ) -> Self {
        let genesis = LedgerEntry {
            index: 0,
            timestamp: time_oracle.now(),
            total_supply: initial_supply,
            delta: initial_supply,
            reason: "genesis".to_string(),
            prev_hash: Hash32::ZERO,
            hash: Hash32::ZERO,
        };
        let mut genesis = genesis;
        genesis.hash = genesis.compute_hash();

        info!(total_supply = %initial_supply, "ledger genesis");
        Self {
            state: RwLock::new(LedgerState {
                entries: vec![genesis],
            }),
            min_inflation_pct,
            max_inflation_pct,
        }
    }

    pub fn get_total_supply(&self) -> Amount {
        self.state.read().entries.last().expect("genesis entry always present").total_supply
    }

    pub fn get_latest_hash(&self) -> Hash32 {
        self.state.read().entries.last().expect("genesis entry always present").hash
    }

    /// Mint new supply by `inflation_rate_pct` percent of the current total
    /// (spec §4.2). Rejected with `PolicyViolation` outside the configured
    /// bounds.
    pub fn mint_supply(
        &self,
        inflation_rate_pct: Decimal,
        reason: impl Into<String>,
        time_oracle: &TimeOracle,
    ) -> Result<LedgerEntry, ChronxError> {
        if inflation_rate_pct < self.min_inflation_pct || inflation_rate_pct > self.max_inflation_pct
        {
            return Err(ChronxError::PolicyViolation(format!(
                "inflation rate {inflation_rate_pct}% outside allowed range [{}, {}]",
                self.min_inflation_pct, self.max_inflation_pct
            )));
        }

        let mut state = self.state.write();
        let prev = state.entries.last().expect("genesis entry always present").clone();

        let delta_decimal = prev.total_supply.as_decimal() * inflation_rate_pct
            / Decimal::from(100);
        let delta = Amount::new(delta_decimal);
        let total_supply = prev
            .total_supply
            .checked_add(delta)
            .ok_or_else(|| ChronxError::Other("supply overflow".to_string()))?;

        let mut entry = LedgerEntry {
            index: prev.index + 1,
            timestamp: time_oracle.now(),
            total_supply,
            delta,
            reason: reason.into(),
            prev_hash: prev.hash,
            hash: Hash32::ZERO,
        };
        entry.hash = entry.compute_hash();
        state.entries.push(entry.clone());

        info!(index = entry.index, delta = %delta, total_supply = %total_supply, "minted supply");
        Ok(entry)
    }

    /// Walk the chain from genesis, recomputing every hash and re-deriving
    /// `total_supply` from the running sum of deltas (spec §4.2). Returns
    /// `IntegrityFailure(index)` at the first entry that does not verify.
    pub fn verify_integrity(&self) -> Result<(), ChronxError> {
        let state = self.state.read();
        let mut prev_hash = Hash32::ZERO;
        let mut running_supply = Amount::ZERO;

        for entry in &state.entries {
            if entry.prev_hash != prev_hash {
                return Err(ChronxError::IntegrityFailure(entry.index));
            }
            if entry.compute_hash() != entry.hash {
                return Err(ChronxError::IntegrityFailure(entry.index));
            }
            running_supply = running_supply
                .checked_add(entry.delta)
                .ok_or(ChronxError::IntegrityFailure(entry.index))?;
            if running_supply != entry.total_supply {
                return Err(ChronxError::IntegrityFailure(entry.index));
            }
            prev_hash = entry.hash;
        }
        Ok(())
    }

    /// All entries with `index >= since`, in order.
    pub fn entries_since(&self, since: u64) -> Vec<LedgerEntry> {
        self.state
            .read()
            .entries
            .iter()
            .filter(|e| e.index >= since)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn oracle() -> TimeOracle {
        TimeOracle::with_clock(
            vec![1u8; 32],
            Duration::from_secs(5),
            Duration::from_secs(60),
            Box::new(chronx_timelock::FixedClock(1_000)),
        )
        .unwrap()
    }

    #[test]
    fn genesis_seeds_total_supply() {
        let oracle = oracle();
        let ledger = Ledger::new(
            Amount::parse("1000000.00000000").unwrap(),
            Decimal::new(0, 0),
            Decimal::new(10, 0),
            &oracle,
        );
        assert_eq!(ledger.get_total_supply(), Amount::parse("1000000.00000000").unwrap());
        assert!(ledger.verify_integrity().is_ok());
    }

    #[test]
    fn mint_supply_within_bounds() {
        let oracle = oracle();
        let ledger = Ledger::new(
            Amount::parse("1000.00000000").unwrap(),
            Decimal::new(0, 0),
            Decimal::new(10, 0),
            &oracle,
        );
        let entry = ledger.mint_supply(Decimal::new(5, 0), "quarterly mint", &oracle).unwrap();
        assert_eq!(entry.delta, Amount::parse("50.00000000").unwrap());
        assert_eq!(ledger.get_total_supply(), Amount::parse("1050.00000000").unwrap());
        assert!(ledger.verify_integrity().is_ok());
    }

    #[test]
    fn mint_supply_outside_bounds_rejected() {
        let oracle = oracle();
        let ledger = Ledger::new(
            Amount::parse("1000.00000000").unwrap(),
            Decimal::new(0, 0),
            Decimal::new(10, 0),
            &oracle,
        );
        let err = ledger.mint_supply(Decimal::new(50, 0), "too much", &oracle).unwrap_err();
        assert!(matches!(err, ChronxError::PolicyViolation(_)));
    }

    #[test]
    fn tampered_entry_breaks_integrity() {
        let oracle = oracle();
        let ledger = Ledger::new(
            Amount::parse("1000.00000000").unwrap(),
            Decimal::new(0, 0),
            Decimal::new(10, 0),
            &oracle,
        );
        ledger.mint_supply(Decimal::new(5, 0), "mint", &oracle).unwrap();
        {
            let mut state = ledger.state.write();
            state.entries[1].reason = "tampered".to_string();
        }
        assert!(matches!(
            ledger.verify_integrity().unwrap_err(),
            ChronxError::IntegrityFailure(1)
        ));
    }
}
