use std::sync::Arc;
use std::time::Duration;

use chronx_core::encoding::merkle_root;
use chronx_core::error::ChronxError;
use chronx_core::types::BatchId;
use chronx_state::TransactionEngine;
use chronx_timelock::TimeOracle;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::batch::{BatchStatus, SettlementBatch};

/// All stored batches plus the id of the most recent `Settled` one — kept
/// together so `settle_once` can chain to it and `get_latest_batch` can
/// report it under a single lock (spec §4.4 step 6: a `Failed` batch is
/// retained for audit but never advances the chain).
#[derive(Default)]
struct BatchLog {
    batches: Vec<SettlementBatch>,
    last_settled_id: Option<BatchId>,
}

/// The L3 settlement engine (spec §4.4): periodically pulls confirmed
/// transactions off the `TransactionEngine`, commits them to a Merkle root,
/// anchors the batch with a `TimeProof`, and chains it to the previous
/// batch.
pub struct SettlementEngine {
    tx_engine: Arc<TransactionEngine>,
    time_oracle: Arc<TimeOracle>,
    batch_size: usize,
    interval: Duration,
    log: RwLock<BatchLog>,
}

impl SettlementEngine {
    pub fn new(
        tx_engine: Arc<TransactionEngine>,
        time_oracle: Arc<TimeOracle>,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            tx_engine,
            time_oracle,
            batch_size,
            interval,
            log: RwLock::new(BatchLog::default()),
        }
    }

    /// Run one settlement pass (spec §4.4):
    /// 1. pull up to `batch_size` confirmed transactions
    /// 2. compute the Merkle root over their ids, in order
    /// 3. stamp a `TimeProof` for the batch
    /// 4. chain the batch to the previous one
    /// 5. mark the included transactions `Settled`
    /// 6. store and return the batch
    ///
    /// Held under a single write lock so concurrent calls cannot claim the
    /// same confirmed transactions twice.
    pub fn settle_once(&self) -> Result<SettlementBatch, ChronxError> {
        let mut log = self.log.write();

        let confirmed = self.tx_engine.get_confirmed_transactions();
        if confirmed.is_empty() {
            return Err(ChronxError::EmptyBatch);
        }
        let tx_ids: Vec<_> = confirmed
            .into_iter()
            .take(self.batch_size)
            .map(|tx| tx.id)
            .collect();

        let root = merkle_root(&tx_ids);
        let (timestamp, time_proof) = self.time_oracle.get_time_with_proof();
        let prev_batch_id = log.last_settled_id.clone();

        let mut batch = SettlementBatch {
            id: BatchId::generate(),
            tx_ids: tx_ids.clone(),
            merkle_root: root,
            timestamp,
            time_proof,
            prev_batch_id,
            status: BatchStatus::Pending,
        };

        if let Err(err) = self.tx_engine.mark_transactions_as_settled(&tx_ids) {
            batch.status = BatchStatus::Failed;
            log.batches.push(batch);
            return Err(err);
        }
        batch.status = BatchStatus::Settled;
        log.last_settled_id = Some(batch.id.clone());
        log.batches.push(batch.clone());

        info!(
            batch_id = %batch.id,
            num_txs = batch.tx_ids.len(),
            merkle_root = %batch.merkle_root,
            "settled batch"
        );
        Ok(batch)
    }

    pub fn get_batch(&self, id: &BatchId) -> Result<SettlementBatch, ChronxError> {
        self.log
            .read()
            .batches
            .iter()
            .find(|b| &b.id == id)
            .cloned()
            .ok_or_else(|| ChronxError::BatchNotFound(id.to_string()))
    }

    /// The most recently *settled* batch — a `Failed` batch never becomes
    /// "latest" even if it is the most recently stored one (spec §4.4 step 6).
    pub fn get_latest_batch(&self) -> Option<SettlementBatch> {
        let log = self.log.read();
        let id = log.last_settled_id.as_ref()?;
        log.batches.iter().find(|b| &b.id == id).cloned()
    }

    /// Recompute the Merkle root and verify the `TimeProof` and chain
    /// linkage for a stored batch (spec §4.4/§8). Chain linkage is checked
    /// against the preceding *settled* batch, skipping over any `Failed`
    /// batches stored in between (those never advance the chain).
    pub fn verify_batch(&self, id: &BatchId) -> Result<(), ChronxError> {
        let log = self.log.read();
        let idx = log
            .batches
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| ChronxError::BatchNotFound(id.to_string()))?;
        let batch = &log.batches[idx];

        if merkle_root(&batch.tx_ids) != batch.merkle_root {
            return Err(ChronxError::HashMismatch);
        }
        self.time_oracle.verify_proof(&batch.time_proof)?;

        let expected_prev = log.batches[..idx]
            .iter()
            .rev()
            .find(|b| b.status == BatchStatus::Settled)
            .map(|b| b.id.clone());
        if batch.prev_batch_id != expected_prev {
            return Err(ChronxError::IntegrityFailure(idx as u64));
        }
        Ok(())
    }

    /// Drive the periodic settlement loop until `cancel` reports `true`
    /// (spec §4.4). Empty rounds (`EmptyBatch`) are logged and skipped;
    /// anything else is a programming error in the caller's wiring and is
    /// logged as a warning without stopping the loop.
    pub async fn run(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.settle_once() {
                        Ok(batch) => info!(batch_id = %batch.id, "settlement tick produced a batch"),
                        Err(ChronxError::EmptyBatch) => {}
                        Err(e) => warn!(error = %e, "settlement tick failed"),
                    }
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        info!("settlement loop stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_core::amount::Amount;
    use chronx_core::transaction::{Transaction, TransactionRequest, TransactionType};
    use chronx_core::types::{Address, TxId};
    use chronx_crypto::KeyPair;

    fn oracle() -> Arc<TimeOracle> {
        Arc::new(
            TimeOracle::with_clock(
                vec![3u8; 32],
                Duration::from_secs(5),
                Duration::from_secs(60),
                Box::new(chronx_timelock::FixedClock(1_000)),
            )
            .unwrap(),
        )
    }

    fn confirm_payment(engine: &TransactionEngine, kp: &KeyPair, sender: &Address, receiver: &Address, nonce: &str) -> TxId {
        let req = TransactionRequest {
            sender: sender.clone(),
            receiver: receiver.clone(),
            amount: Amount::parse("1.00000000").unwrap(),
            fee: Amount::ZERO,
            tx_type: TransactionType::Payment,
            nonce: nonce.to_string(),
            timestamp: 1_000,
            description: "".to_string(),
        };
        let unsigned = Transaction::assemble(TxId::generate(), req, None).unwrap();
        let sig = kp.sign(&unsigned.signable_bytes());
        let mut tx = unsigned;
        tx.signature = Some(sig);
        let id = tx.id.clone();
        engine.process_transaction(tx).unwrap();
        id
    }

    #[test]
    fn settle_once_batches_confirmed_transactions() {
        let tx_engine = Arc::new(TransactionEngine::new());
        let kp = KeyPair::generate();
        let alice = Address::new("alice");
        let bob = Address::new("bob");
        tx_engine
            .create_account(alice.clone(), Some(kp.public_key_bytes()), Amount::parse("10.00000000").unwrap())
            .unwrap();
        tx_engine.create_account(bob.clone(), None, Amount::ZERO).unwrap();

        confirm_payment(&tx_engine, &kp, &alice, &bob, "n1");
        confirm_payment(&tx_engine, &kp, &alice, &bob, "n2");
        confirm_payment(&tx_engine, &kp, &alice, &bob, "n3");

        let settlement = SettlementEngine::new(tx_engine.clone(), oracle(), 2, Duration::from_secs(1));
        let batch1 = settlement.settle_once().unwrap();
        assert_eq!(batch1.tx_ids.len(), 2);
        assert!(batch1.prev_batch_id.is_none());

        let batch2 = settlement.settle_once().unwrap();
        assert_eq!(batch2.tx_ids.len(), 1);
        assert_eq!(batch2.prev_batch_id, Some(batch1.id.clone()));

        assert!(settlement.verify_batch(&batch1.id).is_ok());
        assert!(settlement.verify_batch(&batch2.id).is_ok());

        assert!(matches!(settlement.settle_once().unwrap_err(), ChronxError::EmptyBatch));
    }

    #[test]
    fn settled_transactions_are_marked() {
        let tx_engine = Arc::new(TransactionEngine::new());
        let kp = KeyPair::generate();
        let alice = Address::new("alice");
        let bob = Address::new("bob");
        tx_engine
            .create_account(alice.clone(), Some(kp.public_key_bytes()), Amount::parse("10.00000000").unwrap())
            .unwrap();
        tx_engine.create_account(bob.clone(), None, Amount::ZERO).unwrap();
        let id = confirm_payment(&tx_engine, &kp, &alice, &bob, "n1");

        let settlement = SettlementEngine::new(tx_engine.clone(), oracle(), 10, Duration::from_secs(1));
        settlement.settle_once().unwrap();

        assert_eq!(
            tx_engine.get_transaction(&id).unwrap().status,
            chronx_core::transaction::TransactionStatus::Settled
        );
    }
}
