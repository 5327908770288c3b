//! tollgate-crypto
//!
//! Recoverable secp256k1 ECDSA, blake2b-256 hashing with the chain's
//! personalisation, pubkey-hash derivation, and the two deterministic
//! signing messages of the channel protocol (state update and
//! `since`-bound refund).

pub mod hash;
pub mod keypair;
pub mod secp;

pub use hash::{blake2b_256, ct_eq_20, pubkey_hash_bytes, refund_message, state_update_message};
pub use keypair::Keypair;
pub use secp::{parse_public_key_hex, pubkey_hash, recover, sign_recoverable, verify_pubkey_hash};
