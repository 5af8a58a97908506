use chronx_core::time_proof::TimeProof;
use chronx_core::types::{BatchId, Hash32, Timestamp, TxId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a settlement batch (spec §3/§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Pending,
    Settled,
    Failed,
}

/// A settlement batch (spec §3/§4.4): a Merkle-committed, time-anchored,
/// chained group of confirmed transactions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub id: BatchId,
    pub tx_ids: Vec<TxId>,
    pub merkle_root: Hash32,
    pub timestamp: Timestamp,
    pub time_proof: TimeProof,
    pub prev_batch_id: Option<BatchId>,
    pub status: BatchStatus,
}
