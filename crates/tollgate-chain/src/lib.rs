//! tollgate-chain
//!
//! The engine's contract with the blockchain: submit a transaction and get a
//! hash or a failure, query a transaction's status. The engine never
//! interprets chain internals beyond [`TxStatus`]; everything else is the
//! node's business.

pub mod client;
pub mod mock;
pub mod rpc;

pub use client::{BlockchainClient, TxStatus};
pub use mock::MockChain;
pub use rpc::HttpChain;
