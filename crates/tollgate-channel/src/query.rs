use tollgate_core::channel::{ChannelStatus, PaymentChannel};
use tollgate_core::error::TollgateError;
use tollgate_core::types::Timestamp;
use tollgate_store::Store;

/// Query helpers for payment channels (read-only, no locks taken).
pub struct ChannelQuery<'a> {
    store: &'a Store,
}

impl<'a> ChannelQuery<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Fetch a single channel by its id.
    pub fn get(&self, channel_id: &str) -> Result<Option<PaymentChannel>, TollgateError> {
        self.store.get_channel(channel_id)
    }

    /// Returns true if the channel is ACTIVE and within `window_secs` of its
    /// deadline (the auto-settle selection rule).
    pub fn is_expiring(
        &self,
        channel_id: &str,
        now: Timestamp,
        window_secs: i64,
    ) -> Result<bool, TollgateError> {
        match self.store.get_channel(channel_id)? {
            Some(c) => Ok(c.status == ChannelStatus::Active
                && matches!(c.remaining_seconds(now), Some(r) if r <= window_secs)),
            None => Err(TollgateError::ChannelNotFound(channel_id.to_string())),
        }
    }

    /// Human-readable summary of a channel's state for operator tooling.
    pub fn describe(&self, channel_id: &str, now: Timestamp) -> Result<String, TollgateError> {
        let c = self
            .store
            .get_channel(channel_id)?
            .ok_or_else(|| TollgateError::ChannelNotFound(channel_id.to_string()))?;

        let status_str = match c.status {
            ChannelStatus::Inactive => "INACTIVE — awaiting funding confirmation".to_string(),
            ChannelStatus::Active => match c.remaining_seconds(now) {
                Some(r) if r > 0 => format!("ACTIVE — {r}s until deadline"),
                _ => "ACTIVE — past deadline, pending expiry sweep".to_string(),
            },
            ChannelStatus::Invalid => "INVALID — abandoned before funding".to_string(),
            ChannelStatus::Settled => match c.settle_hash {
                Some(h) => format!("SETTLED — tx {h}"),
                None => "SETTLED".to_string(),
            },
            ChannelStatus::Expired => "EXPIRED — refund claimable by buyer".to_string(),
        };

        Ok(format!(
            "Channel {} | {} base units | consumed {} tokens | default: {} | {}",
            &c.channel_id[..16.min(c.channel_id.len())],
            c.amount,
            c.consumed_tokens,
            c.is_default,
            status_str
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::tx::Transaction;
    use tollgate_core::types::new_id;

    fn channel(status: ChannelStatus, verified_at: Option<i64>) -> PaymentChannel {
        PaymentChannel {
            id: 0,
            user_id: 1,
            channel_id: new_id(),
            amount: 10_000,
            duration_seconds: 3_600,
            status,
            seller_signature: vec![0; 65],
            refund_tx: Transaction::new(vec![], vec![]),
            funding_tx: Transaction::new(vec![], vec![]),
            tx_hash: None,
            settle_hash: None,
            verified_at,
            is_default: false,
            consumed_tokens: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn expiring_selection_matches_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.create_user("alice", None, 0).unwrap();

        let active = store
            .create_channel(channel(ChannelStatus::Active, Some(1_000)))
            .unwrap();
        let query = ChannelQuery::new(&store);

        // Deadline at 4_600; warning window 900 catches it from 3_700 on.
        assert!(!query.is_expiring(&active.channel_id, 3_699, 900).unwrap());
        assert!(query.is_expiring(&active.channel_id, 3_700, 900).unwrap());
        assert!(query.is_expiring(&active.channel_id, 9_999, 900).unwrap());

        assert!(query.is_expiring("missing", 0, 900).is_err());
    }

    #[test]
    fn describe_renders_each_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let query = ChannelQuery::new(&store);

        let inactive = store
            .create_channel(channel(ChannelStatus::Inactive, None))
            .unwrap();
        assert!(query
            .describe(&inactive.channel_id, 0)
            .unwrap()
            .contains("INACTIVE"));

        let expired = store
            .create_channel(channel(ChannelStatus::Expired, Some(1_000)))
            .unwrap();
        assert!(query
            .describe(&expired.channel_id, 9_999)
            .unwrap()
            .contains("refund claimable"));
    }
}
