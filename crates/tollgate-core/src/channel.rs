//! The payment-channel entity and its status machine.
//!
//! A channel backs one buyer's metered streaming: `amount` base units locked
//! under a 2-of-2 script on chain, spent incrementally off chain and redeemed
//! by a single settlement transaction before the refund time-lock matures.

use serde::{Deserialize, Serialize};

use crate::tx::Transaction;
use crate::types::{Balance, Timestamp, TxHash, UserId};

// ── ChannelStatus ────────────────────────────────────────────────────────────

/// Channel lifecycle states. Numeric codes are part of the persisted schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    /// Opened and co-signed, funding not yet confirmed on chain.
    Inactive,
    /// Funding confirmed; chunks may be created and paid.
    Active,
    /// Abandoned before funding.
    Invalid,
    /// Closed by an on-chain settlement.
    Settled,
    /// Deadline passed without settlement; buyer may reclaim via refund.
    Expired,
}

impl ChannelStatus {
    pub fn code(&self) -> u8 {
        match self {
            ChannelStatus::Inactive => 1,
            ChannelStatus::Active => 2,
            ChannelStatus::Invalid => 3,
            ChannelStatus::Settled => 4,
            ChannelStatus::Expired => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ChannelStatus::Inactive),
            2 => Some(ChannelStatus::Active),
            3 => Some(ChannelStatus::Invalid),
            4 => Some(ChannelStatus::Settled),
            5 => Some(ChannelStatus::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Inactive => "INACTIVE",
            ChannelStatus::Active => "ACTIVE",
            ChannelStatus::Invalid => "INVALID",
            ChannelStatus::Settled => "SETTLED",
            ChannelStatus::Expired => "EXPIRED",
        }
    }

    /// True if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChannelStatus::Invalid | ChannelStatus::Settled | ChannelStatus::Expired
        )
    }

    /// The legal transition set:
    /// INACTIVE → ACTIVE | INVALID, ACTIVE → SETTLED | EXPIRED.
    pub fn can_transition(&self, to: ChannelStatus) -> bool {
        use ChannelStatus::*;
        matches!(
            (self, to),
            (Inactive, Active) | (Inactive, Invalid) | (Active, Settled) | (Active, Expired)
        )
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── PaymentChannel ───────────────────────────────────────────────────────────

/// A payment channel as stored. `verified_at` is set exactly when the
/// channel becomes ACTIVE and anchors the expiry deadline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentChannel {
    /// Store-assigned row id.
    pub id: u64,
    pub user_id: UserId,
    /// Opaque unique channel identifier (32 hex chars).
    pub channel_id: String,
    /// Total locked value in base units.
    pub amount: Balance,
    pub duration_seconds: i64,
    pub status: ChannelStatus,
    /// Seller's recoverable signature over the refund message
    /// `blake2b256(refund_tx_hash ‖ since_le8)`.
    pub seller_signature: Vec<u8>,
    pub refund_tx: Transaction,
    pub funding_tx: Transaction,
    /// Funding transaction hash, set on activation.
    pub tx_hash: Option<TxHash>,
    /// Settlement transaction hash, set only when SETTLED.
    pub settle_hash: Option<TxHash>,
    /// Funding confirmation time; non-null iff ACTIVE, SETTLED or EXPIRED.
    pub verified_at: Option<Timestamp>,
    pub is_default: bool,
    /// Tokens consumed by paid chunks. Monotonic non-decreasing.
    pub consumed_tokens: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentChannel {
    /// Channel capacity in tokens: `amount` base units at `ratio` base units
    /// per token, integer floor.
    pub fn amount_in_tokens(&self, ratio: u64) -> u64 {
        self.amount / ratio
    }

    /// Expiry deadline, defined once the channel has been verified.
    pub fn deadline(&self) -> Option<Timestamp> {
        self.verified_at.map(|v| v + self.duration_seconds)
    }

    /// A verified channel is expired once `now` reaches its deadline.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.deadline(), Some(d) if now >= d)
    }

    /// Seconds until the deadline (negative once past). None before funding.
    pub fn remaining_seconds(&self, now: Timestamp) -> Option<i64> {
        self.deadline().map(|d| d - now)
    }
}

// ── ChannelOffer ─────────────────────────────────────────────────────────────

/// The payload returned to the buyer by `open`: everything needed to fund
/// the channel and later reclaim it. The seller signature over the refund is
/// durably persisted before this value is ever handed out.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOffer {
    pub channel_id: String,
    pub amount: Balance,
    pub duration_seconds: i64,
    pub funding_tx: Transaction,
    pub refund_tx: Transaction,
    /// Hex of the seller's 65-byte recoverable signature over the refund.
    pub seller_signature: String,
    /// Raw `since` value carried by the refund input.
    pub refund_since: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for s in [
            ChannelStatus::Inactive,
            ChannelStatus::Active,
            ChannelStatus::Invalid,
            ChannelStatus::Settled,
            ChannelStatus::Expired,
        ] {
            assert_eq!(ChannelStatus::from_code(s.code()), Some(s));
        }
        assert_eq!(ChannelStatus::from_code(0), None);
        assert_eq!(ChannelStatus::from_code(6), None);
    }

    #[test]
    fn transition_table() {
        use ChannelStatus::*;
        assert!(Inactive.can_transition(Active));
        assert!(Inactive.can_transition(Invalid));
        assert!(Active.can_transition(Settled));
        assert!(Active.can_transition(Expired));

        assert!(!Active.can_transition(Invalid));
        assert!(!Invalid.can_transition(Active));
        assert!(!Settled.can_transition(Expired));
        assert!(!Expired.can_transition(Settled));
        assert!(!Inactive.can_transition(Settled));
    }

    #[test]
    fn capacity_floors() {
        let ch = PaymentChannel {
            id: 1,
            user_id: 1,
            channel_id: "c".into(),
            amount: 10_050,
            duration_seconds: 3600,
            status: ChannelStatus::Active,
            seller_signature: vec![],
            refund_tx: Transaction::new(vec![], vec![]),
            funding_tx: Transaction::new(vec![], vec![]),
            tx_hash: None,
            settle_hash: None,
            verified_at: Some(1_000),
            is_default: true,
            consumed_tokens: 0,
            created_at: 1_000,
            updated_at: 1_000,
        };
        assert_eq!(ch.amount_in_tokens(100), 100); // 10_050 / 100 floors
        assert_eq!(ch.deadline(), Some(4_600));
        assert!(ch.is_expired(4_600));
        assert!(!ch.is_expired(4_599));
    }
}
