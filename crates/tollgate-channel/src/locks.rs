use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

/// Registry of per-channel exclusive locks.
///
/// Every mutation of a channel (chunk creation, payment, confirmation,
/// settlement, expiry) serialises on the channel's lock, so monotonic
/// accounting holds under concurrent workers. The registry itself is only
/// held long enough to clone out an `Arc`.
#[derive(Default)]
pub struct ChannelLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `channel_id`, created on first use.
    pub fn for_channel(&self, channel_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().expect("channel lock registry poisoned");
        map.entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_channel_yields_same_lock() {
        let locks = ChannelLocks::new();
        let a = locks.for_channel("c1");
        let b = locks.for_channel("c1");
        let other = locks.for_channel("c2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn lock_serialises_critical_sections() {
        let locks = Arc::new(ChannelLocks::new());
        let counter = Arc::new(Mutex::new(0u32));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let lock = locks.for_channel("shared");
                let _guard = lock.lock().await;
                let value = *counter.lock().unwrap();
                tokio::task::yield_now().await;
                *counter.lock().unwrap() = value + 1;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*counter.lock().unwrap(), 8);
    }
}
