//! Per-chunk payment records and stream events.

use serde::{Deserialize, Serialize};

use crate::types::{Balance, Timestamp, TokenCount, UserId};

// ── ChunkPayment ─────────────────────────────────────────────────────────────

/// One priced unit of streamed content with its off-chain state update.
///
/// `cumulative_payment` and `remaining_balance` are fixed when the chunk is
/// created — they are part of the event the buyer sees and of the message
/// the buyer signs. `transaction_data`, `buyer_signature` and `paid_at` are
/// persisted when the chunk is paid, exactly once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkPayment {
    /// Store-assigned row id; tie-break for equal `created_at`.
    pub id: u64,
    /// Opaque unique chunk identifier (32 hex chars).
    pub chunk_id: String,
    pub user_id: UserId,
    pub session_id: String,
    pub channel_id: String,
    pub tokens_count: TokenCount,
    pub is_paid: bool,
    /// Running total the buyer authorises the seller to claim, base units.
    pub cumulative_payment: Balance,
    /// Channel amount minus the cumulative, base units.
    pub remaining_balance: Balance,
    /// Canonical JSON of the signed state update; set on pay.
    pub transaction_data: Option<String>,
    /// Buyer's 65-byte recoverable signature over the state-update message.
    pub buyer_signature: Option<Vec<u8>>,
    pub created_at: Timestamp,
    pub paid_at: Option<Timestamp>,
}

// ── ChunkEvent ───────────────────────────────────────────────────────────────

/// The `chunk-payment` data part emitted into the response stream.
/// Field names are the wire contract of the stream layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEvent {
    pub chunk_id: String,
    pub tokens: TokenCount,
    pub session_id: String,
    pub is_paid: bool,
    pub cumulative_payment: Balance,
    pub remaining_balance: Balance,
    pub channel_id: String,
    pub channel_total_amount: Balance,
}

impl ChunkEvent {
    pub fn from_chunk(chunk: &ChunkPayment, channel_total_amount: Balance) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            tokens: chunk.tokens_count,
            session_id: chunk.session_id.clone(),
            is_paid: chunk.is_paid,
            cumulative_payment: chunk.cumulative_payment,
            remaining_balance: chunk.remaining_balance,
            channel_id: chunk.channel_id.clone(),
            channel_total_amount,
        }
    }
}

// ── Pay results ──────────────────────────────────────────────────────────────

/// State returned after a successful (or idempotently repeated) `pay`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidState {
    pub chunk_id: String,
    pub channel_id: String,
    pub cumulative_payment: Balance,
    pub remaining_balance: Balance,
    /// Channel tokens consumed after this payment.
    pub consumed_tokens: u64,
    pub paid_at: Timestamp,
}

/// Aggregate of a user's unpaid chunks across all sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpaidSummary {
    pub count: u64,
    pub tokens: u64,
}
