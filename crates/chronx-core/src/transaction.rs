use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::encoding::{signable_data, tx_hash_input};
use crate::error::ChronxError;
use crate::time_proof::TimeProof;
use crate::types::{Address, Hash32, Timestamp, TxId};

/// Maximum length of a transaction's free-text `description` field, in
/// bytes. An ambient input-hygiene bound, not a spec-scoped feature.
pub const MAX_DESCRIPTION_BYTES: usize = 256;

/// The kind of state transition a transaction performs (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Payment,
    Deposit,
    Withdrawal,
    Fee,
    SupplyIncrease,
}

impl TransactionType {
    /// The literal uppercase token used in `SignableData` (spec §6).
    pub fn as_signable_token(&self) -> &'static str {
        match self {
            TransactionType::Payment => "PAYMENT",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Fee => "FEE",
            TransactionType::SupplyIncrease => "SUPPLY_INCREASE",
        }
    }
}

/// Lifecycle status of a transaction (spec §3): `Pending -> Confirmed ->
/// Settled` (terminal) or `Pending -> Failed` (terminal). No other
/// transitions exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
    Settled,
}

/// A signed transaction as produced by an external producer and processed
/// by the L2 `TransactionEngine` (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub sender: Address,
    pub receiver: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub nonce: String,
    /// Ed25519 signature (64 bytes), absent only for `SupplyIncrease`.
    pub signature: Option<[u8; 64]>,
    pub timestamp: Timestamp,
    pub time_proof: Option<TimeProof>,
    pub description: String,
    pub hash: Hash32,
}

/// Unsigned request to build a `Transaction`: everything the sender
/// controls before signing and hashing.
pub struct TransactionRequest {
    pub sender: Address,
    pub receiver: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub tx_type: TransactionType,
    pub nonce: String,
    pub timestamp: Timestamp,
    pub description: String,
}

impl Transaction {
    /// Build a `Transaction` from a request, an id, and a signature
    /// (signing is the caller's job — this only assembles + hashes).
    /// Pass `signature: None` only for `SupplyIncrease`.
    pub fn assemble(
        id: TxId,
        req: TransactionRequest,
        signature: Option<[u8; 64]>,
    ) -> Result<Self, ChronxError> {
        if req.description.len() > MAX_DESCRIPTION_BYTES {
            return Err(ChronxError::InvalidInput(format!(
                "description exceeds {MAX_DESCRIPTION_BYTES} bytes"
            )));
        }
        let mut tx = Transaction {
            id,
            sender: req.sender,
            receiver: req.receiver,
            amount: req.amount,
            fee: req.fee,
            tx_type: req.tx_type,
            status: TransactionStatus::Pending,
            nonce: req.nonce,
            signature,
            timestamp: req.timestamp,
            time_proof: None,
            description: req.description,
            hash: Hash32::ZERO,
        };
        tx.hash = tx.compute_hash();
        Ok(tx)
    }

    /// The bytes an Ed25519 signature must cover (spec §3/§6): excludes
    /// `description` and `hash`.
    pub fn signable_bytes(&self) -> Vec<u8> {
        signable_data(
            self.id.as_str(),
            self.sender.as_str(),
            self.receiver.as_str(),
            self.amount,
            self.fee,
            self.tx_type.as_signable_token(),
            &self.nonce,
            self.timestamp,
        )
    }

    /// `SignableData` plus `description` (spec §3/§6).
    pub fn hash_input_bytes(&self) -> Vec<u8> {
        tx_hash_input(
            self.id.as_str(),
            self.sender.as_str(),
            self.receiver.as_str(),
            self.amount,
            self.fee,
            self.tx_type.as_signable_token(),
            &self.nonce,
            self.timestamp,
            &self.description,
        )
    }

    pub fn compute_hash(&self) -> Hash32 {
        Hash32::sha256(&self.hash_input_bytes())
    }

    /// Self-consistency check: recompute the hash and compare (spec §4.3
    /// step 2).
    pub fn verify_hash(&self) -> Result<(), ChronxError> {
        if self.compute_hash() == self.hash {
            Ok(())
        } else {
            Err(ChronxError::HashMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> TransactionRequest {
        TransactionRequest {
            sender: Address::new("alice"),
            receiver: Address::new("bob"),
            amount: Amount::parse("10.00000000").unwrap(),
            fee: Amount::parse("0.10000000").unwrap(),
            tx_type: TransactionType::Payment,
            nonce: "n1".to_string(),
            timestamp: 1_700_000_000,
            description: "coffee".to_string(),
        }
    }

    #[test]
    fn assemble_computes_consistent_hash() {
        let tx = Transaction::assemble(TxId::generate(), sample_request(), Some([0u8; 64])).unwrap();
        assert!(tx.verify_hash().is_ok());
    }

    #[test]
    fn mutating_a_field_breaks_hash_verification() {
        let mut tx =
            Transaction::assemble(TxId::generate(), sample_request(), Some([0u8; 64])).unwrap();
        tx.amount = Amount::parse("99.00000000").unwrap();
        assert!(tx.verify_hash().is_err());
    }

    #[test]
    fn rejects_oversized_description() {
        let mut req = sample_request();
        req.description = "x".repeat(MAX_DESCRIPTION_BYTES + 1);
        assert!(Transaction::assemble(TxId::generate(), req, Some([0u8; 64])).is_err());
    }
}
