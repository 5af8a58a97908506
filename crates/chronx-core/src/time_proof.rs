use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// An HMAC-signed (timestamp, nonce) pair issued by the TimeOracle. Permits
/// offline verification of a claimed second without trusting an external
/// time service (spec §4.1).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeProof {
    pub timestamp: Timestamp,
    pub nonce: u64,
    pub signature: [u8; 32],
}
