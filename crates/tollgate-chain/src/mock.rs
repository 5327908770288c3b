//! Deterministic in-memory chain for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use tollgate_core::error::TollgateError;
use tollgate_core::tx::Transaction;
use tollgate_core::types::TxHash;

use crate::client::{BlockchainClient, TxStatus};

/// A scripted failure for the next `submit_transaction` call.
#[derive(Clone, Debug)]
pub enum ScriptedFailure {
    Pending,
    Rejected(String),
}

#[derive(Default)]
struct MockState {
    statuses: HashMap<TxHash, TxStatus>,
    submitted: Vec<(TxHash, Transaction)>,
    submit_failures: VecDeque<ScriptedFailure>,
    submit_calls: u64,
}

/// In-memory [`BlockchainClient`]: commits everything by default, with
/// scriptable failures and statuses for driving retry paths.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue failures consumed by subsequent submits, in order.
    pub fn fail_submissions(&self, failures: impl IntoIterator<Item = ScriptedFailure>) {
        let mut state = self.state.lock().unwrap();
        state.submit_failures.extend(failures);
    }

    /// Force the status returned for a given hash.
    pub fn set_status(&self, tx_hash: TxHash, status: TxStatus) {
        self.state.lock().unwrap().statuses.insert(tx_hash, status);
    }

    /// Hashes of transactions accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<TxHash> {
        self.state
            .lock()
            .unwrap()
            .submitted
            .iter()
            .map(|(hash, _)| *hash)
            .collect()
    }

    /// Full transactions accepted so far, in submission order.
    pub fn submitted_txs(&self) -> Vec<Transaction> {
        self.state
            .lock()
            .unwrap()
            .submitted
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect()
    }

    /// Total submit attempts, including scripted failures.
    pub fn submit_calls(&self) -> u64 {
        self.state.lock().unwrap().submit_calls
    }
}

#[async_trait]
impl BlockchainClient for MockChain {
    async fn submit_transaction(&self, tx: &Transaction) -> Result<TxHash, TollgateError> {
        let mut state = self.state.lock().unwrap();
        state.submit_calls += 1;
        if let Some(failure) = state.submit_failures.pop_front() {
            return Err(match failure {
                ScriptedFailure::Pending => {
                    TollgateError::BlockchainPending("scripted timeout".into())
                }
                ScriptedFailure::Rejected(reason) => TollgateError::BlockchainRejected(reason),
            });
        }
        let hash = tollgate_codec::tx_hash(tx);
        state.statuses.insert(hash, TxStatus::Committed);
        state.submitted.push((hash, tx.clone()));
        Ok(hash)
    }

    async fn transaction_status(&self, tx_hash: &TxHash) -> Result<TxStatus, TollgateError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .statuses
            .get(tx_hash)
            .cloned()
            .unwrap_or(TxStatus::Unknown))
    }
}
