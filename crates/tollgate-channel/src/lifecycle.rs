//! Channel lifecycle: open → confirm funding → active → settled/expired,
//! with INACTIVE → INVALID as the abandonment path.

use std::sync::Arc;

use tracing::{info, warn};

use tollgate_chain::{BlockchainClient, TxStatus};
use tollgate_codec::{tx_hash, ChannelLockArgs, Since};
use tollgate_core::channel::{ChannelOffer, ChannelStatus, PaymentChannel};
use tollgate_core::config::Config;
use tollgate_core::error::TollgateError;
use tollgate_core::tx::HashType;
use tollgate_core::types::{new_id, unix_now, Balance, Timestamp, TxHash, UserId};
use tollgate_crypto::{parse_public_key_hex, pubkey_hash, Keypair};
use tollgate_settle::{
    attach_settlement_witness, build_funding_tx, build_refund_tx, build_settlement_tx,
    seller_sign_refund, sign_state_update,
};
use tollgate_store::Store;

use crate::locks::ChannelLocks;

/// The non-secret channel parameters the manager needs from configuration.
#[derive(Clone, Debug)]
pub struct ChannelPolicy {
    pub lock_code_hash: [u8; 32],
    pub lock_hash_type: HashType,
    pub fee_rate_per_kb: u64,
    pub token_base_unit_ratio: u64,
}

impl ChannelPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            lock_code_hash: cfg.lock_code_hash,
            lock_hash_type: cfg.lock_hash_type,
            fee_rate_per_kb: cfg.fee_rate_per_kb,
            token_base_unit_ratio: cfg.token_base_unit_ratio,
        }
    }
}

/// Result of a settlement attempt on one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Settlement broadcast and accepted; channel is now SETTLED.
    Settled { settle_hash: TxHash },
    /// No paid chunks: nothing to redeem, channel left as-is.
    NothingToSettle,
}

/// Owns channel state transitions. One instance per process, shared by the
/// request layer and the scheduler.
pub struct ChannelManager {
    store: Arc<Store>,
    chain: Arc<dyn BlockchainClient>,
    seller: Arc<Keypair>,
    policy: ChannelPolicy,
    locks: Arc<ChannelLocks>,
}

impl ChannelManager {
    pub fn new(
        store: Arc<Store>,
        chain: Arc<dyn BlockchainClient>,
        seller: Arc<Keypair>,
        policy: ChannelPolicy,
        locks: Arc<ChannelLocks>,
    ) -> Self {
        Self {
            store,
            chain,
            seller,
            policy,
            locks,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Resolve a user's buyer pubkey hash from their registered key.
    fn buyer_pubkey_hash(&self, user_id: UserId) -> Result<[u8; 20], TollgateError> {
        let user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| TollgateError::UserNotFound(user_id.to_string()))?;
        let pk_hex = user.public_key.as_deref().ok_or_else(|| {
            TollgateError::InvalidPublicKey("user has no registered public key".into())
        })?;
        Ok(pubkey_hash(&parse_public_key_hex(pk_hex)?))
    }

    // ── open ─────────────────────────────────────────────────────────────────

    /// Open a channel: build funding and refund transactions, co-sign the
    /// refund bound to its `since`, and persist durably *before* returning
    /// anything the buyer could fund against.
    ///
    /// Any signing failure aborts with no channel persisted.
    pub async fn open(
        &self,
        user_id: UserId,
        amount: Balance,
        duration_seconds: i64,
    ) -> Result<ChannelOffer, TollgateError> {
        if amount == 0 {
            return Err(TollgateError::ZeroAmount);
        }
        if duration_seconds <= 0 {
            return Err(TollgateError::ZeroDuration);
        }
        let buyer_pkh = self.buyer_pubkey_hash(user_id)?;

        let lock_args = ChannelLockArgs::new(
            self.policy.lock_code_hash,
            self.policy.lock_hash_type,
            buyer_pkh,
            self.seller.pubkey_hash(),
        );
        let funding_tx = build_funding_tx(amount, &lock_args);
        let since = Since::relative_seconds(duration_seconds as u64)?;
        let refund_tx = build_refund_tx(tx_hash(&funding_tx), amount, buyer_pkh, since);
        let seller_signature = seller_sign_refund(&self.seller, &refund_tx)?;

        let now = unix_now();
        let channel = PaymentChannel {
            id: 0,
            user_id,
            channel_id: new_id(),
            amount,
            duration_seconds,
            status: ChannelStatus::Inactive,
            seller_signature: seller_signature.to_vec(),
            refund_tx: refund_tx.clone(),
            funding_tx: funding_tx.clone(),
            tx_hash: None,
            settle_hash: None,
            verified_at: None,
            is_default: false,
            consumed_tokens: 0,
            created_at: now,
            updated_at: now,
        };
        let channel = self.store.create_channel(channel)?;
        // The signed refund must be on disk before the buyer sees the offer.
        self.store.flush()?;

        info!(
            channel_id = %channel.channel_id,
            user_id,
            amount,
            duration_seconds,
            "channel opened"
        );
        Ok(ChannelOffer {
            channel_id: channel.channel_id,
            amount,
            duration_seconds,
            funding_tx,
            refund_tx,
            seller_signature: hex::encode(seller_signature),
            refund_since: since.raw(),
        })
    }

    // ── confirm_funding ──────────────────────────────────────────────────────

    /// Verify the funding transaction on chain and activate the channel.
    /// Idempotent on retries carrying the same `tx_hash`.
    pub async fn confirm_funding(
        &self,
        channel_id: &str,
        funding_hash: TxHash,
    ) -> Result<PaymentChannel, TollgateError> {
        let lock = self.locks.for_channel(channel_id);
        let _guard = lock.lock().await;

        let mut channel = self
            .store
            .get_channel(channel_id)?
            .ok_or_else(|| TollgateError::ChannelNotFound(channel_id.to_string()))?;

        match channel.status {
            ChannelStatus::Inactive => {}
            ChannelStatus::Active => {
                return if channel.tx_hash == Some(funding_hash) {
                    Ok(channel)
                } else {
                    Err(TollgateError::FundingHashMismatch(channel_id.to_string()))
                };
            }
            other => {
                return Err(TollgateError::InvalidTransition {
                    from: other.as_str(),
                    to: ChannelStatus::Active.as_str(),
                })
            }
        }

        match self.chain.transaction_status(&funding_hash).await? {
            TxStatus::Committed => {}
            TxStatus::Pending | TxStatus::Unknown => {
                return Err(TollgateError::BlockchainPending(format!(
                    "funding {funding_hash} not committed yet"
                )))
            }
            TxStatus::Rejected(reason) => {
                return Err(TollgateError::BlockchainRejected(reason))
            }
        }

        let now = unix_now();
        channel.tx_hash = Some(funding_hash);
        channel.verified_at = Some(now);
        channel.status = ChannelStatus::Active;
        channel.updated_at = now;
        // First active channel becomes the user's default.
        if self.store.default_channel(channel.user_id)?.is_none() {
            channel.is_default = true;
        }
        self.store.put_channel(&channel)?;
        self.store.flush()?;

        info!(channel_id, tx_hash = %funding_hash, "channel funding confirmed");
        Ok(channel)
    }

    // ── invalidate ───────────────────────────────────────────────────────────

    /// INACTIVE → INVALID. Idempotent on an already-INVALID channel; any
    /// other source state is a conflict.
    pub async fn invalidate(&self, channel_id: &str) -> Result<PaymentChannel, TollgateError> {
        let lock = self.locks.for_channel(channel_id);
        let _guard = lock.lock().await;

        let mut channel = self
            .store
            .get_channel(channel_id)?
            .ok_or_else(|| TollgateError::ChannelNotFound(channel_id.to_string()))?;

        match channel.status {
            ChannelStatus::Invalid => Ok(channel),
            ChannelStatus::Inactive => {
                channel.status = ChannelStatus::Invalid;
                channel.updated_at = unix_now();
                self.store.put_channel(&channel)?;
                info!(channel_id, "channel invalidated");
                Ok(channel)
            }
            other => Err(TollgateError::InvalidTransition {
                from: other.as_str(),
                to: ChannelStatus::Invalid.as_str(),
            }),
        }
    }

    // ── set_default ──────────────────────────────────────────────────────────

    /// Move the user's default flag to `channel_id`. The target must be an
    /// ACTIVE channel owned by the user.
    pub async fn set_default(
        &self,
        user_id: UserId,
        channel_id: &str,
    ) -> Result<(), TollgateError> {
        let lock = self.locks.for_channel(channel_id);
        let _guard = lock.lock().await;

        let channel = self
            .store
            .get_channel(channel_id)?
            .ok_or_else(|| TollgateError::ChannelNotFound(channel_id.to_string()))?;
        if channel.user_id != user_id {
            return Err(TollgateError::NotChannelOwner {
                channel_id: channel_id.to_string(),
                user_id,
            });
        }
        if channel.status != ChannelStatus::Active {
            return Err(TollgateError::DefaultNotActive(channel_id.to_string()));
        }
        self.store.set_default_channel(user_id, channel_id)?;
        Ok(())
    }

    // ── settle ───────────────────────────────────────────────────────────────

    /// Build, sign and broadcast the settlement for a channel's latest paid
    /// state. With no paid chunks this is a no-op (`NothingToSettle`); the
    /// scheduler lets such channels expire instead.
    ///
    /// A pending or rejected broadcast leaves the channel ACTIVE.
    pub async fn settle(&self, channel_id: &str) -> Result<SettleOutcome, TollgateError> {
        let lock = self.locks.for_channel(channel_id);
        let _guard = lock.lock().await;

        let mut channel = self
            .store
            .get_channel(channel_id)?
            .ok_or_else(|| TollgateError::ChannelNotFound(channel_id.to_string()))?;

        if channel.status == ChannelStatus::Settled {
            if let Some(settle_hash) = channel.settle_hash {
                return Ok(SettleOutcome::Settled { settle_hash });
            }
        }
        if channel.status != ChannelStatus::Active {
            return Err(TollgateError::ChannelNotActive(channel_id.to_string()));
        }
        let funding_hash = channel.tx_hash.ok_or_else(|| {
            TollgateError::Storage(format!("active channel {channel_id} has no funding hash"))
        })?;

        let Some(chunk) = self.store.latest_paid_chunk(channel_id)? else {
            return Ok(SettleOutcome::NothingToSettle);
        };
        let buyer_sig_vec = chunk.buyer_signature.clone().ok_or_else(|| {
            TollgateError::Storage(format!("paid chunk {} has no signature", chunk.chunk_id))
        })?;
        let buyer_sig: [u8; 65] = buyer_sig_vec
            .try_into()
            .map_err(|v: Vec<u8>| TollgateError::MalformedSignature(v.len()))?;

        let buyer_pkh = self.buyer_pubkey_hash(channel.user_id)?;
        let mut settlement = build_settlement_tx(
            funding_hash,
            channel.amount,
            chunk.cumulative_payment,
            self.seller.pubkey_hash(),
            buyer_pkh,
            self.policy.fee_rate_per_kb,
        )?;
        let seller_sig = sign_state_update(
            &self.seller,
            channel_id,
            chunk.cumulative_payment,
            chunk.remaining_balance,
        )?;
        attach_settlement_witness(&mut settlement, buyer_sig, seller_sig);

        let settle_hash = self.chain.submit_transaction(&settlement).await?;

        let now = unix_now();
        channel.status = ChannelStatus::Settled;
        channel.settle_hash = Some(settle_hash);
        channel.is_default = false;
        channel.updated_at = now;
        self.store.put_channel(&channel)?;
        self.store.flush()?;

        info!(
            channel_id,
            settle_hash = %settle_hash,
            cumulative = chunk.cumulative_payment,
            "channel settled"
        );
        Ok(SettleOutcome::Settled { settle_hash })
    }

    // ── mark_expired ─────────────────────────────────────────────────────────

    /// ACTIVE → EXPIRED once the deadline has passed. Idempotent on an
    /// already-EXPIRED channel.
    pub async fn mark_expired(
        &self,
        channel_id: &str,
        now: Timestamp,
    ) -> Result<PaymentChannel, TollgateError> {
        let lock = self.locks.for_channel(channel_id);
        let _guard = lock.lock().await;

        let mut channel = self
            .store
            .get_channel(channel_id)?
            .ok_or_else(|| TollgateError::ChannelNotFound(channel_id.to_string()))?;

        if channel.status == ChannelStatus::Expired {
            return Ok(channel);
        }
        if channel.status != ChannelStatus::Active || !channel.is_expired(now) {
            return Err(TollgateError::InvalidTransition {
                from: channel.status.as_str(),
                to: ChannelStatus::Expired.as_str(),
            });
        }

        channel.status = ChannelStatus::Expired;
        channel.is_default = false;
        channel.updated_at = now;
        self.store.put_channel(&channel)?;
        warn!(channel_id, "channel expired without settlement");
        Ok(channel)
    }
}
