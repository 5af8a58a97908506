//! ─── ChronX Ledger Core Constants ───────────────────────────────────────────

/// Ed25519 public key size in bytes (spec §6).
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size in bytes (spec §6).
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Minimum length of the TimeOracle HMAC secret (spec §4.1).
pub const MIN_TIME_ORACLE_SECRET_BYTES: usize = 32;
