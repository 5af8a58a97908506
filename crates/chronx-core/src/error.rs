use thiserror::Error;

/// Error taxonomy for the ChronX ledger core (spec §7). Each component
/// surfaces one of these to its caller; nothing is silently retried
/// inside the core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChronxError {
    // ── Input / validation ───────────────────────────────────────────────────
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transaction hash mismatch")]
    HashMismatch,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("sender and receiver must differ for a Payment")]
    SelfTransfer,

    // ── Lookup ────────────────────────────────────────────────────────────────
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("batch not found: {0}")]
    BatchNotFound(String),

    // ── Existence ─────────────────────────────────────────────────────────────
    #[error("account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("duplicate transaction id: {0}")]
    DuplicateTransaction(String),

    // ── Replay protection ──────────────────────────────────────────────────────
    #[error("nonce already consumed by sender: {0}")]
    DuplicateNonce(String),

    // ── Signatures ──────────────────────────────────────────────────────────────
    #[error("invalid signature")]
    InvalidSignature,

    // ── Balances ──────────────────────────────────────────────────────────────
    #[error("insufficient funds: need {need}, have {have}")]
    InsufficientFunds { need: String, have: String },

    // ── Policy ────────────────────────────────────────────────────────────────
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    // ── Time proofs ───────────────────────────────────────────────────────────
    #[error("time proof timestamp is in the future beyond allowed drift")]
    FutureTimestamp,

    #[error("time proof has expired")]
    ExpiredProof,

    #[error("time proof failed verification")]
    InvalidProof,

    // ── Integrity ─────────────────────────────────────────────────────────────
    #[error("integrity failure at index {0}")]
    IntegrityFailure(u64),

    // ── Settlement ────────────────────────────────────────────────────────────
    #[error("no confirmed transactions available to settle")]
    EmptyBatch,

    // ── Catch-all ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}
