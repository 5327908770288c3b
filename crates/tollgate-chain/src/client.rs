use async_trait::async_trait;

use tollgate_core::error::TollgateError;
use tollgate_core::tx::Transaction;
use tollgate_core::types::TxHash;

/// Where a submitted transaction stands from the node's point of view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// Known to the node, not yet committed.
    Pending,
    /// Accepted on chain.
    Committed,
    /// Refused by the node; the message is terminal for this attempt.
    Rejected(String),
    /// The node has never seen this hash.
    Unknown,
}

/// Opaque blockchain access. Calls may suspend; timeouts surface as
/// [`TollgateError::BlockchainPending`] and never cause speculative state
/// transitions in the engine.
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    /// Broadcast a transaction; returns its hash on acceptance into the pool.
    async fn submit_transaction(&self, tx: &Transaction) -> Result<TxHash, TollgateError>;

    /// Query the status of a previously submitted transaction.
    async fn transaction_status(&self, tx_hash: &TxHash) -> Result<TxStatus, TollgateError>;
}
