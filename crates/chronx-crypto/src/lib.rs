pub mod keypair;

pub use keypair::{verify_signature, KeyPair};
