//! The chunk payment engine: monotonic cumulative accounting, buyer
//! signature verification, idempotent marking-as-paid.

use std::sync::Arc;

use tracing::{debug, info};

use tollgate_core::channel::ChannelStatus;
use tollgate_core::chunk::{ChunkEvent, ChunkPayment, PaidState, UnpaidSummary};
use tollgate_core::error::TollgateError;
use tollgate_core::types::{new_id, unix_now, TokenCount, UserId};
use tollgate_crypto::{parse_public_key_hex, pubkey_hash, state_update_message, verify_pubkey_hash};
use tollgate_store::Store;

use crate::events::EventBus;
use crate::locks::ChannelLocks;

/// Creates priced chunks against a user's default channel and settles their
/// off-chain state updates. All per-channel work runs under the channel's
/// exclusive lock.
pub struct ChunkEngine {
    store: Arc<Store>,
    locks: Arc<ChannelLocks>,
    events: Arc<EventBus>,
    /// Base units per token.
    ratio: u64,
}

impl ChunkEngine {
    pub fn new(
        store: Arc<Store>,
        locks: Arc<ChannelLocks>,
        events: Arc<EventBus>,
        ratio: u64,
    ) -> Self {
        Self {
            store,
            locks,
            events,
            ratio,
        }
    }

    // ── create_chunk ─────────────────────────────────────────────────────────

    /// Create an unpaid chunk of `tokens_count` tokens against the user's
    /// ACTIVE default channel and emit its `chunk-payment` event.
    ///
    /// The new cumulative chains off the most recent chunk (paid or not), so
    /// a pending chunk reserves its capacity: concurrent creations yield
    /// contiguous cumulative values with no gap and no overlap.
    pub async fn create_chunk(
        &self,
        user_id: UserId,
        session_id: &str,
        tokens_count: TokenCount,
    ) -> Result<ChunkEvent, TollgateError> {
        if tokens_count == 0 {
            return Err(TollgateError::ZeroTokens);
        }
        let default = self
            .store
            .default_channel(user_id)?
            .ok_or(TollgateError::NoDefaultChannel(user_id))?;

        let lock = self.locks.for_channel(&default.channel_id);
        let _guard = lock.lock().await;

        // Re-read under the lock; the default may have settled or expired
        // since the unlocked lookup.
        let channel = self
            .store
            .get_channel(&default.channel_id)?
            .ok_or_else(|| TollgateError::ChannelNotFound(default.channel_id.clone()))?;
        if channel.status != ChannelStatus::Active {
            return Err(TollgateError::ChannelNotActive(channel.channel_id));
        }

        let base = match self.store.latest_chunk(&channel.channel_id)? {
            Some(last) => last.cumulative_payment,
            None => channel.consumed_tokens * self.ratio,
        };
        let new_cumulative = base + tokens_count * self.ratio;
        if new_cumulative > channel.amount {
            return Err(TollgateError::CapacityExceeded {
                requested: tokens_count,
                available: (channel.amount - base) / self.ratio,
            });
        }
        let remaining = channel.amount - new_cumulative;

        let now = unix_now();
        self.store.ensure_session(session_id, user_id, now)?;
        let chunk = self.store.create_chunk(ChunkPayment {
            id: 0,
            chunk_id: new_id(),
            user_id,
            session_id: session_id.to_string(),
            channel_id: channel.channel_id.clone(),
            tokens_count,
            is_paid: false,
            cumulative_payment: new_cumulative,
            remaining_balance: remaining,
            transaction_data: None,
            buyer_signature: None,
            created_at: now,
            paid_at: None,
        })?;

        let event = ChunkEvent::from_chunk(&chunk, channel.amount);
        self.events.publish(&event);
        debug!(
            chunk_id = %chunk.chunk_id,
            channel_id = %channel.channel_id,
            tokens = tokens_count,
            cumulative = new_cumulative,
            "chunk created"
        );
        Ok(event)
    }

    // ── pay ──────────────────────────────────────────────────────────────────

    /// Verify the buyer's signature over the chunk's state update and mark
    /// it paid, advancing the channel's `consumed_tokens`.
    ///
    /// Re-submitting the same `(chunk_id, signature)` after success is an
    /// idempotent success; a different signature on a paid chunk is a
    /// conflict. Any failure leaves the chunk unpaid and the channel
    /// untouched.
    pub async fn pay(
        &self,
        chunk_id: &str,
        buyer_signature: &[u8],
    ) -> Result<PaidState, TollgateError> {
        let preview = self
            .store
            .get_chunk(chunk_id)?
            .ok_or_else(|| TollgateError::ChunkNotFound(chunk_id.to_string()))?;

        let lock = self.locks.for_channel(&preview.channel_id);
        let _guard = lock.lock().await;

        let mut chunk = self
            .store
            .get_chunk(chunk_id)?
            .ok_or_else(|| TollgateError::ChunkNotFound(chunk_id.to_string()))?;
        let mut channel = self
            .store
            .get_channel(&chunk.channel_id)?
            .ok_or_else(|| TollgateError::ChannelNotFound(chunk.channel_id.clone()))?;

        if chunk.is_paid {
            return if chunk.buyer_signature.as_deref() == Some(buyer_signature) {
                Ok(PaidState {
                    chunk_id: chunk.chunk_id,
                    channel_id: chunk.channel_id,
                    cumulative_payment: chunk.cumulative_payment,
                    remaining_balance: chunk.remaining_balance,
                    consumed_tokens: channel.consumed_tokens,
                    paid_at: chunk.paid_at.unwrap_or(chunk.created_at),
                })
            } else {
                Err(TollgateError::PaidSignatureMismatch(chunk.chunk_id))
            };
        }

        if channel.status != ChannelStatus::Active {
            return Err(TollgateError::ChannelNotActive(channel.channel_id));
        }

        // Replay protection: the cumulative must move the paid watermark
        // strictly forward.
        let paid_watermark = channel.consumed_tokens * self.ratio;
        if chunk.cumulative_payment <= paid_watermark {
            return Err(TollgateError::NonMonotonicCumulative {
                prior: paid_watermark,
                got: chunk.cumulative_payment,
            });
        }

        let message = state_update_message(
            &chunk.channel_id,
            chunk.cumulative_payment,
            chunk.remaining_balance,
        );
        let user = self
            .store
            .get_user(chunk.user_id)?
            .ok_or_else(|| TollgateError::UserNotFound(chunk.user_id.to_string()))?;
        let pk_hex = user.public_key.as_deref().ok_or_else(|| {
            TollgateError::InvalidPublicKey("user has no registered public key".into())
        })?;
        let buyer_pkh = pubkey_hash(&parse_public_key_hex(pk_hex)?);
        verify_pubkey_hash(buyer_signature, &message, &buyer_pkh)?;

        let now = unix_now();
        chunk.is_paid = true;
        chunk.paid_at = Some(now);
        chunk.buyer_signature = Some(buyer_signature.to_vec());
        chunk.transaction_data = Some(
            serde_json::json!({
                "channelId": chunk.channel_id,
                "cumulativePayment": chunk.cumulative_payment,
                "remainingBalance": chunk.remaining_balance,
                "signature": hex::encode(buyer_signature),
            })
            .to_string(),
        );
        channel.consumed_tokens += chunk.tokens_count;
        channel.updated_at = now;

        self.store.put_chunk(&chunk)?;
        self.store.put_channel(&channel)?;
        self.store.flush()?;

        self.events
            .publish(&ChunkEvent::from_chunk(&chunk, channel.amount));
        info!(
            chunk_id = %chunk.chunk_id,
            channel_id = %chunk.channel_id,
            cumulative = chunk.cumulative_payment,
            consumed_tokens = channel.consumed_tokens,
            "chunk paid"
        );
        Ok(PaidState {
            chunk_id: chunk.chunk_id,
            channel_id: chunk.channel_id,
            cumulative_payment: chunk.cumulative_payment,
            remaining_balance: chunk.remaining_balance,
            consumed_tokens: channel.consumed_tokens,
            paid_at: now,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Most recent chunk of a channel, paid or not. The UI presents this
    /// before accepting a new user turn.
    pub fn latest(&self, channel_id: &str) -> Result<Option<ChunkPayment>, TollgateError> {
        self.store.latest_chunk(channel_id)
    }

    /// Aggregate unpaid chunks across all of the user's sessions.
    pub fn session_unpaid(&self, user_id: UserId) -> Result<UnpaidSummary, TollgateError> {
        self.store.unpaid_summary(user_id)
    }
}
