use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chronx_core::encoding::time_proof_hmac_input;
use chronx_core::error::ChronxError;
use chronx_core::time_proof::TimeProof;
use chronx_core::types::Timestamp;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Minimum length of the TimeOracle's HMAC secret (spec §4.1).
pub const MIN_SECRET_BYTES: usize = chronx_core::constants::MIN_TIME_ORACLE_SECRET_BYTES;

/// Source of "now" for the oracle. A narrow seam so tests can supply a
/// fixed clock instead of reading the system clock.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> Timestamp;
}

/// The real wall clock.
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_secs() as Timestamp
    }
}

/// A fixed clock for deterministic tests.
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now_unix(&self) -> Timestamp {
        self.0
    }
}

/// Issues and verifies HMAC-signed timestamps; the sole authority on "now"
/// for settlement (spec §4.1). Stateless modulo a best-effort proof cache.
pub struct TimeOracle {
    secret: Vec<u8>,
    max_drift_secs: i64,
    proof_validity_secs: i64,
    clock: Box<dyn Clock>,
    nonce_counter: AtomicU64,
    cache: Mutex<HashMap<Timestamp, TimeProof>>,
}

impl TimeOracle {
    /// Construct a TimeOracle with the real system clock. `secret` must be
    /// at least 32 bytes.
    pub fn new(
        secret: Vec<u8>,
        max_drift: Duration,
        proof_validity: Duration,
    ) -> Result<Self, ChronxError> {
        Self::with_clock(secret, max_drift, proof_validity, Box::new(SystemClock))
    }

    /// Construct a TimeOracle with an injected clock (used in tests).
    pub fn with_clock(
        secret: Vec<u8>,
        max_drift: Duration,
        proof_validity: Duration,
        clock: Box<dyn Clock>,
    ) -> Result<Self, ChronxError> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(ChronxError::InvalidInput(format!(
                "time oracle secret must be at least {MIN_SECRET_BYTES} bytes, got {}",
                secret.len()
            )));
        }
        Ok(Self {
            secret,
            max_drift_secs: max_drift.as_secs() as i64,
            proof_validity_secs: proof_validity.as_secs() as i64,
            clock,
            nonce_counter: AtomicU64::new(0),
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now_unix()
    }

    /// `FutureTimestamp` if `ts` is beyond the allowed future drift;
    /// `ExpiredProof` if `ts` is older than `proof_validity` (spec §4.1).
    pub fn validate(&self, ts: Timestamp) -> Result<(), ChronxError> {
        let now = self.now();
        if ts > now + self.max_drift_secs {
            return Err(ChronxError::FutureTimestamp);
        }
        if ts < now - self.proof_validity_secs {
            return Err(ChronxError::ExpiredProof);
        }
        Ok(())
    }

    fn sign(&self, timestamp: Timestamp, nonce: u64) -> [u8; 32] {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts a key of any length");
        mac.update(&time_proof_hmac_input(timestamp, nonce));
        let result = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        out
    }

    /// Issue a `TimeProof` for the current second. Cached by integer second;
    /// entries older than `proof_validity` are evicted lazily on each call.
    pub fn generate_proof(&self) -> TimeProof {
        let now = self.now();
        let mut cache = self.cache.lock();
        cache.retain(|ts, _| *ts >= now - self.proof_validity_secs);

        if let Some(existing) = cache.get(&now) {
            return existing.clone();
        }

        let nonce = self.nonce_counter.fetch_add(1, Ordering::Relaxed);
        let signature = self.sign(now, nonce);
        let proof = TimeProof {
            timestamp: now,
            nonce,
            signature,
        };
        cache.insert(now, proof.clone());
        debug!(timestamp = now, "issued time proof");
        proof
    }

    /// `InvalidProof` if the HMAC does not match, or if `validate(p.timestamp)`
    /// fails (spec §4.1).
    pub fn verify_proof(&self, p: &TimeProof) -> Result<(), ChronxError> {
        self.validate(p.timestamp)?;
        let expected = self.sign(p.timestamp, p.nonce);
        if expected == p.signature {
            Ok(())
        } else {
            Err(ChronxError::InvalidProof)
        }
    }

    /// `(now, proof for now)`, in one call.
    pub fn get_time_with_proof(&self) -> (Timestamp, TimeProof) {
        let proof = self.generate_proof();
        (proof.timestamp, proof)
    }
}
