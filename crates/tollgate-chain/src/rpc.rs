use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use tollgate_core::error::TollgateError;
use tollgate_core::tx::Transaction;
use tollgate_core::types::TxHash;

use crate::client::{BlockchainClient, TxStatus};

/// JSON-RPC 2.0 client for the blockchain node.
///
/// Raw HTTP POST with serde_json bodies; timeouts and connection failures
/// map to `BlockchainPending` so the scheduler retries them, while explicit
/// node errors map to `BlockchainRejected`.
pub struct HttpChain {
    url: String,
    client: reqwest::Client,
}

impl HttpChain {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TollgateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TollgateError::Storage(format!("building HTTP client: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, TollgateError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(method, e))?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TollgateError::Serialization(format!("parsing {method} response: {e}")))?;

        if let Some(err) = json.get("error") {
            return Err(TollgateError::BlockchainRejected(format!(
                "{method}: {err}"
            )));
        }
        Ok(json["result"].clone())
    }
}

fn transport_error(method: &str, e: reqwest::Error) -> TollgateError {
    if e.is_timeout() || e.is_connect() {
        TollgateError::BlockchainPending(format!("{method}: {e}"))
    } else {
        TollgateError::Storage(format!("{method}: {e}"))
    }
}

#[async_trait]
impl BlockchainClient for HttpChain {
    async fn submit_transaction(&self, tx: &Transaction) -> Result<TxHash, TollgateError> {
        let tx_json = serde_json::to_value(tx)
            .map_err(|e| TollgateError::Serialization(e.to_string()))?;
        let result = self.call("send_transaction", serde_json::json!([tx_json])).await?;
        let hash_hex = result
            .as_str()
            .ok_or_else(|| TollgateError::Serialization("expected tx hash string".into()))?;
        let hash = TxHash::from_hex(hash_hex)?;
        debug!(tx_hash = %hash, "transaction submitted");
        Ok(hash)
    }

    async fn transaction_status(&self, tx_hash: &TxHash) -> Result<TxStatus, TollgateError> {
        let result = self
            .call(
                "get_transaction",
                serde_json::json!([tx_hash.to_hex()]),
            )
            .await?;
        if result.is_null() {
            return Ok(TxStatus::Unknown);
        }
        let status = result["status"].as_str().unwrap_or("unknown");
        Ok(match status {
            "pending" | "proposed" => TxStatus::Pending,
            "committed" => TxStatus::Committed,
            "rejected" => TxStatus::Rejected(
                result["reason"].as_str().unwrap_or("unspecified").to_string(),
            ),
            _ => TxStatus::Unknown,
        })
    }
}
