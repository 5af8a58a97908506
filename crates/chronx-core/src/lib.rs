pub mod amount;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod time_proof;
pub mod transaction;
pub mod types;

pub use amount::Amount;
pub use constants::*;
pub use error::ChronxError;
pub use time_proof::TimeProof;
pub use transaction::{Transaction, TransactionRequest, TransactionStatus, TransactionType};
pub use types::{Address, BatchId, Hash32, Timestamp, TxId};
