use std::collections::{HashMap, HashSet};

use chronx_core::amount::Amount;
use chronx_core::error::ChronxError;
use chronx_core::transaction::{Transaction, TransactionStatus, TransactionType};
use chronx_core::types::{Address, Timestamp, TxId};
use chronx_crypto::verify_signature;
use parking_lot::RwLock;
use tracing::{info, warn};

/// An L2 account: a balance and, for anything that can sign transactions,
/// the public key signatures are verified against (spec §3/§4.3).
#[derive(Clone, Debug)]
pub struct Account {
    pub address: Address,
    pub public_key: Option<[u8; 32]>,
    pub balance: Amount,
    /// Timestamp of the last transaction that touched this account's
    /// balance; `0` if the account has never been party to one.
    pub last_active: Timestamp,
}

impl Account {
    fn reserved(address: Address) -> Self {
        Self {
            address,
            public_key: None,
            balance: Amount::ZERO,
            last_active: 0,
        }
    }
}

/// All state changes staged by `process_transaction` before the single
/// atomic commit at the end (spec §4.3: either all effects apply or none
/// do).
#[derive(Default)]
struct StagedMutations {
    balances: Vec<(Address, Amount)>,
    consumed_nonce: Option<(Address, String)>,
}

struct EngineState {
    accounts: HashMap<Address, Account>,
    transactions: HashMap<TxId, Transaction>,
    used_nonces: HashMap<Address, HashSet<String>>,
    order: Vec<TxId>,
}

/// The L2 in-memory transaction engine (spec §4.3): accounts, balances,
/// nonce-based replay protection, and per-type transaction processing.
pub struct TransactionEngine {
    state: RwLock<EngineState>,
}

impl Default for TransactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionEngine {
    /// Seeds the three reserved addresses (spec §3): `FEES`, `RESERVE`,
    /// `SYSTEM`, each starting at a zero balance.
    pub fn new() -> Self {
        let mut accounts = HashMap::new();
        for addr in [Address::fees(), Address::reserve(), Address::system()] {
            accounts.insert(addr.clone(), Account::reserved(addr));
        }
        Self {
            state: RwLock::new(EngineState {
                accounts,
                transactions: HashMap::new(),
                used_nonces: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Register a new ordinary account. `FEES`/`RESERVE`/`SYSTEM` are
    /// reserved — they are seeded internally at construction and cannot be
    /// (re-)created through this path (spec §3).
    pub fn create_account(
        &self,
        address: Address,
        public_key: Option<[u8; 32]>,
        initial_balance: Amount,
    ) -> Result<(), ChronxError> {
        if address.is_reserved() {
            return Err(ChronxError::PolicyViolation(format!(
                "{address} is a reserved address and cannot be registered"
            )));
        }
        let mut state = self.state.write();
        if state.accounts.contains_key(&address) {
            return Err(ChronxError::AccountAlreadyExists(address.to_string()));
        }
        state.accounts.insert(
            address.clone(),
            Account {
                address,
                public_key,
                balance: initial_balance,
                last_active: 0,
            },
        );
        Ok(())
    }

    /// Timestamp of the account's most recent balance-affecting
    /// transaction, or `0` if it has never been party to one.
    pub fn last_active(&self, address: &Address) -> Result<Timestamp, ChronxError> {
        self.get_account(address).map(|a| a.last_active)
    }

    pub fn get_account(&self, address: &Address) -> Result<Account, ChronxError> {
        self.state
            .read()
            .accounts
            .get(address)
            .cloned()
            .ok_or_else(|| ChronxError::AccountNotFound(address.to_string()))
    }

    pub fn get_balance(&self, address: &Address) -> Result<Amount, ChronxError> {
        self.get_account(address).map(|a| a.balance)
    }

    pub fn get_transaction(&self, id: &TxId) -> Result<Transaction, ChronxError> {
        self.state
            .read()
            .transactions
            .get(id)
            .cloned()
            .ok_or_else(|| ChronxError::TransactionNotFound(id.to_string()))
    }

    pub fn get_confirmed_transactions(&self) -> Vec<Transaction> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.transactions.get(id))
            .filter(|tx| tx.status == TransactionStatus::Confirmed)
            .cloned()
            .collect()
    }

    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.transactions.get(id))
            .filter(|tx| tx.status == TransactionStatus::Pending)
            .cloned()
            .collect()
    }

    /// Transition settled transactions to `Settled` (spec §4.4 step 6).
    /// Already-`Settled` ids are a no-op, so a settlement retry over an
    /// overlapping id set never double-applies.
    pub fn mark_transactions_as_settled(&self, ids: &[TxId]) -> Result<(), ChronxError> {
        let mut state = self.state.write();
        for id in ids {
            let tx = state
                .transactions
                .get_mut(id)
                .ok_or_else(|| ChronxError::TransactionNotFound(id.to_string()))?;
            if tx.status == TransactionStatus::Settled {
                continue;
            }
            tx.status = TransactionStatus::Settled;
        }
        Ok(())
    }

    /// Validate and apply a transaction (spec §4.3). On success the
    /// transaction is stored with status `Confirmed`. On failure *after* the
    /// duplicate-id check (step 1), a snapshot is stored with status
    /// `Failed` so producers can still observe the outcome by id (spec §7);
    /// balances and nonces are left untouched either way.
    pub fn process_transaction(&self, tx: Transaction) -> Result<(), ChronxError> {
        tx.verify_hash()?;

        let mut state = self.state.write();

        if state.transactions.contains_key(&tx.id) {
            return Err(ChronxError::DuplicateTransaction(tx.id.to_string()));
        }

        let result = self.apply(&mut state, &tx);

        if let Err(ref err) = result {
            let mut failed = tx.clone();
            failed.status = TransactionStatus::Failed;
            let id = failed.id.clone();
            state.order.push(id.clone());
            state.transactions.insert(id, failed);
            warn!(tx_id = %tx.id, error = %err, "transaction failed");
        }

        result
    }

    /// Steps 2–4 of `process_transaction`: validate, stage, and commit. The
    /// caller is responsible for storing a `Failed` snapshot if this errors.
    fn apply(&self, state: &mut EngineState, tx: &Transaction) -> Result<(), ChronxError> {
        if tx.amount.is_zero() {
            return Err(ChronxError::ZeroAmount);
        }

        let staged = match tx.tx_type {
            TransactionType::Payment => self.stage_payment(state, tx)?,
            TransactionType::Deposit => self.stage_deposit(state, tx)?,
            TransactionType::Withdrawal => self.stage_withdrawal(state, tx)?,
            TransactionType::Fee => self.stage_fee(state, tx)?,
            TransactionType::SupplyIncrease => self.stage_supply_increase(state, tx)?,
        };

        for (address, balance) in staged.balances {
            let account = state.accounts.get_mut(&address).expect("staged address exists");
            account.balance = balance;
            account.last_active = tx.timestamp;
        }
        if let Some((sender, nonce)) = staged.consumed_nonce {
            state.used_nonces.entry(sender).or_default().insert(nonce);
        }

        let mut confirmed = tx.clone();
        confirmed.status = TransactionStatus::Confirmed;
        let id = confirmed.id.clone();
        state.order.push(id.clone());
        state.transactions.insert(id.clone(), confirmed);

        info!(tx_id = %id, "confirmed transaction");
        Ok(())
    }

    // ── Per-type staging ──────────────────────────────────────────────────────

    fn require_signature(&self, sender: &Account, tx: &Transaction) -> Result<(), ChronxError> {
        let pk = sender.public_key.ok_or(ChronxError::InvalidSignature)?;
        let sig = tx.signature.ok_or(ChronxError::InvalidSignature)?;
        verify_signature(&pk, &tx.signable_bytes(), &sig)
    }

    fn check_nonce(&self, state: &EngineState, tx: &Transaction) -> Result<(), ChronxError> {
        if state
            .used_nonces
            .get(&tx.sender)
            .is_some_and(|set| set.contains(&tx.nonce))
        {
            return Err(ChronxError::DuplicateNonce(tx.nonce.clone()));
        }
        Ok(())
    }

    fn stage_payment(
        &self,
        state: &EngineState,
        tx: &Transaction,
    ) -> Result<StagedMutations, ChronxError> {
        if tx.sender == tx.receiver {
            return Err(ChronxError::SelfTransfer);
        }
        let sender = state
            .accounts
            .get(&tx.sender)
            .ok_or_else(|| ChronxError::AccountNotFound(tx.sender.to_string()))?;
        let receiver = state
            .accounts
            .get(&tx.receiver)
            .ok_or_else(|| ChronxError::AccountNotFound(tx.receiver.to_string()))?;
        self.check_nonce(state, tx)?;
        self.require_signature(sender, tx)?;

        let total_debit = tx
            .amount
            .checked_add(tx.fee)
            .ok_or_else(|| ChronxError::Other("amount overflow".to_string()))?;
        let new_sender_balance = sender.balance.checked_sub_nonneg(total_debit).ok_or_else(|| {
            ChronxError::InsufficientFunds {
                need: total_debit.to_canonical_string(),
                have: sender.balance.to_canonical_string(),
            }
        })?;
        let new_receiver_balance = receiver.balance + tx.amount;
        let fees_account = state
            .accounts
            .get(&Address::fees())
            .expect("FEES account always seeded");
        let new_fees_balance = fees_account.balance + tx.fee;

        Ok(StagedMutations {
            balances: vec![
                (tx.sender.clone(), new_sender_balance),
                (tx.receiver.clone(), new_receiver_balance),
                (Address::fees(), new_fees_balance),
            ],
            consumed_nonce: Some((tx.sender.clone(), tx.nonce.clone())),
        })
    }

    fn stage_deposit(
        &self,
        state: &EngineState,
        tx: &Transaction,
    ) -> Result<StagedMutations, ChronxError> {
        let sender = state
            .accounts
            .get(&tx.sender)
            .ok_or_else(|| ChronxError::AccountNotFound(tx.sender.to_string()))?;
        let receiver = state
            .accounts
            .get(&tx.receiver)
            .ok_or_else(|| ChronxError::AccountNotFound(tx.receiver.to_string()))?;
        self.check_nonce(state, tx)?;
        self.require_signature(sender, tx)?;

        let new_receiver_balance = receiver.balance + tx.amount;
        let fees_account = state
            .accounts
            .get(&Address::fees())
            .expect("FEES account always seeded");
        let new_fees_balance = fees_account.balance + tx.fee;

        Ok(StagedMutations {
            balances: vec![
                (tx.receiver.clone(), new_receiver_balance),
                (Address::fees(), new_fees_balance),
            ],
            consumed_nonce: Some((tx.sender.clone(), tx.nonce.clone())),
        })
    }

    fn stage_withdrawal(
        &self,
        state: &EngineState,
        tx: &Transaction,
    ) -> Result<StagedMutations, ChronxError> {
        let sender = state
            .accounts
            .get(&tx.sender)
            .ok_or_else(|| ChronxError::AccountNotFound(tx.sender.to_string()))?;
        self.check_nonce(state, tx)?;
        self.require_signature(sender, tx)?;

        let total_debit = tx
            .amount
            .checked_add(tx.fee)
            .ok_or_else(|| ChronxError::Other("amount overflow".to_string()))?;
        let new_sender_balance = sender.balance.checked_sub_nonneg(total_debit).ok_or_else(|| {
            ChronxError::InsufficientFunds {
                need: total_debit.to_canonical_string(),
                have: sender.balance.to_canonical_string(),
            }
        })?;
        let fees_account = state
            .accounts
            .get(&Address::fees())
            .expect("FEES account always seeded");
        let new_fees_balance = fees_account.balance + tx.fee;

        Ok(StagedMutations {
            balances: vec![
                (tx.sender.clone(), new_sender_balance),
                (Address::fees(), new_fees_balance),
            ],
            consumed_nonce: Some((tx.sender.clone(), tx.nonce.clone())),
        })
    }

    fn stage_fee(
        &self,
        state: &EngineState,
        tx: &Transaction,
    ) -> Result<StagedMutations, ChronxError> {
        // An explicit fee-leg transaction: debits sender, credits FEES directly.
        let sender = state
            .accounts
            .get(&tx.sender)
            .ok_or_else(|| ChronxError::AccountNotFound(tx.sender.to_string()))?;
        self.check_nonce(state, tx)?;
        self.require_signature(sender, tx)?;

        let new_sender_balance = sender.balance.checked_sub_nonneg(tx.amount).ok_or_else(|| {
            ChronxError::InsufficientFunds {
                need: tx.amount.to_canonical_string(),
                have: sender.balance.to_canonical_string(),
            }
        })?;
        let fees_account = state
            .accounts
            .get(&Address::fees())
            .expect("FEES account always seeded");
        let new_fees_balance = fees_account.balance + tx.amount;

        Ok(StagedMutations {
            balances: vec![
                (tx.sender.clone(), new_sender_balance),
                (Address::fees(), new_fees_balance),
            ],
            consumed_nonce: Some((tx.sender.clone(), tx.nonce.clone())),
        })
    }

    fn stage_supply_increase(
        &self,
        state: &EngineState,
        tx: &Transaction,
    ) -> Result<StagedMutations, ChronxError> {
        if tx.sender != Address::system() {
            return Err(ChronxError::PolicyViolation(
                "SupplyIncrease must be sent from the SYSTEM address".to_string(),
            ));
        }
        if tx.receiver != Address::reserve() {
            return Err(ChronxError::PolicyViolation(
                "SupplyIncrease must credit the RESERVE address".to_string(),
            ));
        }
        if tx.signature.is_some() {
            warn!(tx_id = %tx.id, "SupplyIncrease carries an unused signature");
        }
        let reserve = state
            .accounts
            .get(&Address::reserve())
            .expect("RESERVE account always seeded");
        let new_reserve_balance = reserve.balance + tx.amount;

        Ok(StagedMutations {
            balances: vec![(Address::reserve(), new_reserve_balance)],
            consumed_nonce: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_core::transaction::{Transaction, TransactionRequest, TransactionType};
    use chronx_core::types::TxId;
    use chronx_crypto::KeyPair;

    fn signed_payment(
        kp: &KeyPair,
        sender: &Address,
        receiver: &Address,
        amount: &str,
        fee: &str,
        nonce: &str,
    ) -> Transaction {
        let req = TransactionRequest {
            sender: sender.clone(),
            receiver: receiver.clone(),
            amount: Amount::parse(amount).unwrap(),
            fee: Amount::parse(fee).unwrap(),
            tx_type: TransactionType::Payment,
            nonce: nonce.to_string(),
            timestamp: 1_700_000_000,
            description: "test".to_string(),
        };
        let unsigned = Transaction::assemble(TxId::generate(), req, None).unwrap();
        let sig = kp.sign(&unsigned.signable_bytes());
        let mut signed = unsigned;
        signed.signature = Some(sig);
        signed
    }

    fn setup_pair() -> (TransactionEngine, KeyPair, KeyPair, Address, Address) {
        let engine = TransactionEngine::new();
        let alice_kp = KeyPair::generate();
        let bob_kp = KeyPair::generate();
        let alice = Address::new("alice");
        let bob = Address::new("bob");
        engine
            .create_account(
                alice.clone(),
                Some(alice_kp.public_key_bytes()),
                Amount::parse("100.00000000").unwrap(),
            )
            .unwrap();
        engine
            .create_account(bob.clone(), Some(bob_kp.public_key_bytes()), Amount::ZERO)
            .unwrap();
        (engine, alice_kp, bob_kp, alice, bob)
    }

    #[test]
    fn payment_success_moves_balance_and_fee() {
        let (engine, alice_kp, _bob_kp, alice, bob) = setup_pair();
        let tx = signed_payment(&alice_kp, &alice, &bob, "10.00000000", "0.10000000", "n1");
        engine.process_transaction(tx).unwrap();

        assert_eq!(engine.get_balance(&alice).unwrap(), Amount::parse("89.90000000").unwrap());
        assert_eq!(engine.get_balance(&bob).unwrap(), Amount::parse("10.00000000").unwrap());
        assert_eq!(
            engine.get_balance(&Address::fees()).unwrap(),
            Amount::parse("0.10000000").unwrap()
        );
    }

    #[test]
    fn replayed_nonce_rejected() {
        let (engine, alice_kp, _bob_kp, alice, bob) = setup_pair();
        let tx1 = signed_payment(&alice_kp, &alice, &bob, "1.00000000", "0", "n1");
        engine.process_transaction(tx1).unwrap();
        let tx2 = signed_payment(&alice_kp, &alice, &bob, "1.00000000", "0", "n1");
        assert!(matches!(
            engine.process_transaction(tx2).unwrap_err(),
            ChronxError::DuplicateNonce(_)
        ));
    }

    #[test]
    fn insufficient_funds_rejected() {
        let (engine, alice_kp, _bob_kp, alice, bob) = setup_pair();
        let tx = signed_payment(&alice_kp, &alice, &bob, "1000.00000000", "0", "n1");
        assert!(matches!(
            engine.process_transaction(tx).unwrap_err(),
            ChronxError::InsufficientFunds { .. }
        ));
    }

    #[test]
    fn self_transfer_rejected() {
        let (engine, alice_kp, _bob_kp, alice, _bob) = setup_pair();
        let tx = signed_payment(&alice_kp, &alice, &alice, "1.00000000", "0", "n1");
        assert!(matches!(engine.process_transaction(tx).unwrap_err(), ChronxError::SelfTransfer));
    }

    #[test]
    fn tampered_signature_rejected() {
        let (engine, alice_kp, _bob_kp, alice, bob) = setup_pair();
        let mut tx = signed_payment(&alice_kp, &alice, &bob, "1.00000000", "0", "n1");
        let mut sig = tx.signature.unwrap();
        sig[0] ^= 0xFF;
        tx.signature = Some(sig);
        assert!(matches!(
            engine.process_transaction(tx).unwrap_err(),
            ChronxError::InvalidSignature
        ));
    }

    #[test]
    fn duplicate_transaction_id_rejected() {
        let (engine, alice_kp, _bob_kp, alice, bob) = setup_pair();
        let tx = signed_payment(&alice_kp, &alice, &bob, "1.00000000", "0", "n1");
        let replay = tx.clone();
        engine.process_transaction(tx).unwrap();
        assert!(matches!(
            engine.process_transaction(replay).unwrap_err(),
            ChronxError::DuplicateTransaction(_)
        ));
    }

    #[test]
    fn supply_increase_credits_reserve() {
        let engine = TransactionEngine::new();
        let req = TransactionRequest {
            sender: Address::system(),
            receiver: Address::reserve(),
            amount: Amount::parse("500.00000000").unwrap(),
            fee: Amount::ZERO,
            tx_type: TransactionType::SupplyIncrease,
            nonce: "mint-1".to_string(),
            timestamp: 1_700_000_000,
            description: "mint".to_string(),
        };
        let tx = Transaction::assemble(TxId::generate(), req, None).unwrap();
        engine.process_transaction(tx).unwrap();
        assert_eq!(
            engine.get_balance(&Address::reserve()).unwrap(),
            Amount::parse("500.00000000").unwrap()
        );
    }

    #[test]
    fn supply_increase_from_wrong_sender_rejected() {
        let engine = TransactionEngine::new();
        let req = TransactionRequest {
            sender: Address::new("alice"),
            receiver: Address::reserve(),
            amount: Amount::parse("500.00000000").unwrap(),
            fee: Amount::ZERO,
            tx_type: TransactionType::SupplyIncrease,
            nonce: "mint-1".to_string(),
            timestamp: 1_700_000_000,
            description: "mint".to_string(),
        };
        let tx = Transaction::assemble(TxId::generate(), req, None).unwrap();
        assert!(matches!(
            engine.process_transaction(tx).unwrap_err(),
            ChronxError::PolicyViolation(_)
        ));
    }

    #[test]
    fn mark_settled_is_idempotent() {
        let (engine, alice_kp, _bob_kp, alice, bob) = setup_pair();
        let tx = signed_payment(&alice_kp, &alice, &bob, "1.00000000", "0", "n1");
        let id = tx.id.clone();
        engine.process_transaction(tx).unwrap();
        engine.mark_transactions_as_settled(&[id.clone()]).unwrap();
        engine.mark_transactions_as_settled(&[id.clone()]).unwrap();
        assert_eq!(engine.get_transaction(&id).unwrap().status, TransactionStatus::Settled);
    }

    #[test]
    fn failed_transaction_is_stored_with_failed_status() {
        let (engine, alice_kp, _bob_kp, alice, bob) = setup_pair();
        let tx = signed_payment(&alice_kp, &alice, &bob, "1000.00000000", "0", "n1");
        let id = tx.id.clone();
        assert!(matches!(
            engine.process_transaction(tx).unwrap_err(),
            ChronxError::InsufficientFunds { .. }
        ));
        assert_eq!(engine.get_transaction(&id).unwrap().status, TransactionStatus::Failed);
        assert_eq!(engine.get_balance(&alice).unwrap(), Amount::parse("100.00000000").unwrap());
    }

    #[test]
    fn creating_a_reserved_address_is_rejected() {
        let engine = TransactionEngine::new();
        assert!(matches!(
            engine.create_account(Address::fees(), None, Amount::ZERO).unwrap_err(),
            ChronxError::PolicyViolation(_)
        ));
    }

    #[test]
    fn last_active_tracks_the_most_recent_touching_transaction() {
        let (engine, alice_kp, _bob_kp, alice, bob) = setup_pair();
        assert_eq!(engine.last_active(&alice).unwrap(), 0);

        let tx = signed_payment(&alice_kp, &alice, &bob, "1.00000000", "0", "n1");
        let ts = tx.timestamp;
        engine.process_transaction(tx).unwrap();

        assert_eq!(engine.last_active(&alice).unwrap(), ts);
        assert_eq!(engine.last_active(&bob).unwrap(), ts);
    }
}
