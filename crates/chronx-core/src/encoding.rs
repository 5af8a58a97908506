//! Canonical byte encodings (spec §6). Every signature and hash in the core
//! depends on these being bit-exact; treat this module as frozen wire format,
//! not an implementation detail to refactor freely.

use crate::amount::Amount;
use crate::types::{Hash32, Timestamp, TxId};

/// `SignableData`: the bytes an Ed25519 signature is computed over. Excludes
/// `description` and `hash` (spec §3/§6).
#[allow(clippy::too_many_arguments)]
pub fn signable_data(
    id: &str,
    sender: &str,
    receiver: &str,
    amount: Amount,
    fee: Amount,
    tx_type: &str,
    nonce: &str,
    timestamp: Timestamp,
) -> Vec<u8> {
    let s = format!(
        "{id}|{sender}|{receiver}|{}|{}|{tx_type}|{nonce}|{timestamp}",
        amount.to_canonical_string(),
        fee.to_canonical_string(),
    );
    s.into_bytes()
}

/// Transaction hash input: `SignableData` with `description` appended.
#[allow(clippy::too_many_arguments)]
pub fn tx_hash_input(
    id: &str,
    sender: &str,
    receiver: &str,
    amount: Amount,
    fee: Amount,
    tx_type: &str,
    nonce: &str,
    timestamp: Timestamp,
    description: &str,
) -> Vec<u8> {
    let mut bytes = signable_data(id, sender, receiver, amount, fee, tx_type, nonce, timestamp);
    bytes.push(b'|');
    bytes.extend_from_slice(description.as_bytes());
    bytes
}

/// Ledger entry hash input (spec §6): `index (u64 BE) || timestamp (i64 BE)
/// || total_supply (8dp canonical string) || delta (8dp canonical string)
/// || reason (UTF-8) || prev_hash (32 bytes)`.
pub fn ledger_entry_hash_input(
    index: u64,
    timestamp: Timestamp,
    total_supply: Amount,
    delta: Amount,
    reason: &str,
    prev_hash: Hash32,
) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&index.to_be_bytes());
    bytes.extend_from_slice(&timestamp.to_be_bytes());
    bytes.extend_from_slice(total_supply.to_canonical_string().as_bytes());
    bytes.extend_from_slice(delta.to_canonical_string().as_bytes());
    bytes.extend_from_slice(reason.as_bytes());
    bytes.extend_from_slice(prev_hash.as_bytes());
    bytes
}

/// HMAC input for a `TimeProof`: 8-byte BE timestamp followed by 8-byte BE
/// nonce (spec §6).
pub fn time_proof_hmac_input(timestamp: Timestamp, nonce: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&timestamp.to_be_bytes());
    bytes.extend_from_slice(&nonce.to_be_bytes());
    bytes
}

/// Merkle root (as used here, spec §4.4/§6): SHA-256 over the concatenation
/// of the ASCII bytes of transaction ids in list order. This is a flat hash,
/// not a pairwise tree — there are no inclusion proofs.
pub fn merkle_root(tx_ids: &[TxId]) -> Hash32 {
    let mut bytes = Vec::new();
    for id in tx_ids {
        bytes.extend_from_slice(id.as_str().as_bytes());
    }
    Hash32::sha256(&bytes)
}
