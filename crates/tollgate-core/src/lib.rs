//! tollgate-core
//!
//! Shared foundation for the Tollgate payment-channel engine:
//! - [`types`] — ids, balances, timestamps, transaction hashes
//! - [`channel`] — the [`channel::PaymentChannel`] entity and its status machine
//! - [`chunk`] — per-chunk payment records and the streamed [`chunk::ChunkEvent`]
//! - [`user`] — users and streaming sessions
//! - [`tasklog`] — structured scheduler execution records
//! - [`tx`] — on-chain transaction skeletons with fixed-size byte fields
//! - [`error`] — the error taxonomy shared by every crate
//! - [`config`] — environment-driven process configuration

pub mod channel;
pub mod chunk;
pub mod config;
pub mod constants;
pub mod error;
pub mod tasklog;
pub mod tx;
pub mod types;
pub mod user;

pub use config::Config;
pub use error::{ErrorKind, TollgateError};
pub use types::{Balance, Timestamp, TxHash, UserId};
