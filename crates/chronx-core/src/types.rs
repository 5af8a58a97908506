use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ChronxError;

/// Unix timestamp (seconds, UTC). The sole unit time is expressed in
/// across the core — `TimeOracle` is the only authority on "now".
pub type Timestamp = i64;

// ── Address ──────────────────────────────────────────────────────────────────

/// An L2 account address. Addresses are opaque strings rather than derived
/// key hashes — external producers register whatever address scheme their
/// adapter uses; the core only cares about uniqueness and the three
/// well-known reserved names below.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fee sink: receives the fee portion of Payment/Deposit/Withdrawal.
    pub fn fees() -> Self {
        Self("FEES".to_string())
    }

    /// Mint target for `SupplyIncrease` transactions.
    pub fn reserve() -> Self {
        Self("RESERVE".to_string())
    }

    /// Synthetic sender used for `SupplyIncrease` (never a real signer).
    pub fn system() -> Self {
        Self("SYSTEM".to_string())
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self.0.as_str(), "FEES" | "RESERVE" | "SYSTEM")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Hash32 ───────────────────────────────────────────────────────────────────

/// A 32-byte SHA-256 digest, as used for ledger-entry hashes and Merkle roots.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ChronxError> {
        let bytes = hex::decode(s).map_err(|e| ChronxError::InvalidInput(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(ChronxError::InvalidInput(format!(
                "expected 32-byte hash, got {} bytes",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&digest);
        Self(arr)
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({}…)", &self.to_hex()[..8])
    }
}

// ── 16-hex-char identifiers (TxId / BatchId) ─────────────────────────────────

/// A monotonic, process-lifetime-unique nanosecond counter used to seed
/// transaction and batch ids. Not wall-clock time — just a source of
/// distinct inputs to hash, so two ids requested in the same instant never
/// collide.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_id_seed() -> u64 {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// First 16 hex characters of SHA-256(seed), where seed is a distinct
/// monotonic counter value per call. Producers MAY substitute any 16-char
/// hex id so long as it is unique within the process lifetime (spec §6).
fn generate_hex16(domain: &[u8]) -> String {
    let seed = next_id_seed();
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

fn validate_hex16(s: &str) -> Result<(), ChronxError> {
    if s.len() != 16 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChronxError::InvalidInput(format!(
            "expected 16 hex characters, got {s:?}"
        )));
    }
    Ok(())
}

macro_rules! hex16_id {
    ($name:ident, $domain:expr) => {
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh, process-unique id.
            pub fn generate() -> Self {
                Self(generate_hex16($domain))
            }

            /// Accept a caller-supplied id, validating its shape.
            pub fn from_str_checked(s: impl Into<String>) -> Result<Self, ChronxError> {
                let s = s.into();
                validate_hex16(&s)?;
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

hex16_id!(TxId, b"tx");
hex16_id!(BatchId, b"batch");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = TxId::generate();
        let b = TxId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn rejects_malformed_id() {
        assert!(TxId::from_str_checked("not-hex-at-all!").is_err());
        assert!(TxId::from_str_checked("abcd").is_err());
        assert!(TxId::from_str_checked("0123456789abcdef").is_ok());
    }

    #[test]
    fn reserved_addresses() {
        assert!(Address::fees().is_reserved());
        assert!(Address::reserve().is_reserved());
        assert!(Address::system().is_reserved());
        assert!(!Address::new("alice").is_reserved());
    }
}
