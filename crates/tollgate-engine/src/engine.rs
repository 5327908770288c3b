use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use tollgate_chain::BlockchainClient;
use tollgate_channel::{ChannelLocks, ChannelManager, ChannelPolicy, ChunkEngine, EventBus, SettleOutcome};
use tollgate_core::channel::{ChannelOffer, PaymentChannel};
use tollgate_core::chunk::{ChunkEvent, ChunkPayment, PaidState, UnpaidSummary};
use tollgate_core::config::Config;
use tollgate_core::error::TollgateError;
use tollgate_core::tasklog::ScheduledTaskLog;
use tollgate_core::types::{unix_now, Balance, TxHash, UserId};
use tollgate_core::user::{validate_public_key_hex, User};
use tollgate_crypto::{parse_public_key_hex, Keypair};
use tollgate_scheduler::{IntervalTick, Scheduler};
use tollgate_store::Store;

/// The micropayment engine façade consumed by the external HTTP/stream
/// layer. All operations delegate to the owned subsystems; no durable state
/// lives outside the [`Store`].
pub struct Engine {
    store: Arc<Store>,
    manager: Arc<ChannelManager>,
    chunks: Arc<ChunkEngine>,
    events: Arc<EventBus>,
    scheduler: Arc<Scheduler>,
    shutdown_tx: watch::Sender<bool>,
    tick_auto_settle: Duration,
    tick_check_expired: Duration,
}

impl Engine {
    /// Assemble the engine from configuration, an opened store and a
    /// blockchain client. The seller key is consumed here and lives only
    /// inside the keypair.
    pub fn new(
        cfg: &Config,
        store: Arc<Store>,
        chain: Arc<dyn BlockchainClient>,
    ) -> Result<Self, TollgateError> {
        let seller = Arc::new(Keypair::from_secret_bytes(&cfg.seller_private_key)?);
        let locks = Arc::new(ChannelLocks::new());
        let events = Arc::new(EventBus::new());

        let manager = Arc::new(ChannelManager::new(
            Arc::clone(&store),
            chain,
            seller,
            ChannelPolicy::from_config(cfg),
            Arc::clone(&locks),
        ));
        let chunks = Arc::new(ChunkEngine::new(
            Arc::clone(&store),
            locks,
            Arc::clone(&events),
            cfg.token_base_unit_ratio,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&store),
            Arc::clone(&manager),
            cfg.settle_warning_window_secs,
            shutdown_rx,
        ));

        Ok(Self {
            store,
            manager,
            chunks,
            events,
            scheduler,
            shutdown_tx,
            tick_auto_settle: Duration::from_secs(cfg.tick_auto_settle_secs),
            tick_check_expired: Duration::from_secs(cfg.tick_check_expired_secs),
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    // ── Users ────────────────────────────────────────────────────────────────

    /// Public-key login: validates the key, creates the user on first sight
    /// and stamps `last_login_at` on every success.
    pub fn login(&self, username: &str, public_key_hex: &str) -> Result<User, TollgateError> {
        validate_public_key_hex(public_key_hex)?;
        // Full curve check before anything is persisted.
        parse_public_key_hex(public_key_hex)?;

        if let Some(mut user) = self.store.get_user_by_public_key(public_key_hex)? {
            let now = unix_now();
            user.last_login_at = Some(now);
            user.updated_at = now;
            self.store.put_user(&user)?;
            return Ok(user);
        }
        let user = self
            .store
            .create_user(username, Some(public_key_hex), unix_now())?;
        info!(user_id = user.id, username, "user registered via public key");
        Ok(user)
    }

    pub fn get_user(&self, user_id: UserId) -> Result<Option<User>, TollgateError> {
        self.store.get_user(user_id)
    }

    // ── Channels ─────────────────────────────────────────────────────────────

    pub async fn open_channel(
        &self,
        user_id: UserId,
        amount: Balance,
        duration_seconds: i64,
    ) -> Result<ChannelOffer, TollgateError> {
        self.manager.open(user_id, amount, duration_seconds).await
    }

    pub async fn confirm_funding(
        &self,
        channel_id: &str,
        funding_hash: TxHash,
    ) -> Result<PaymentChannel, TollgateError> {
        self.manager.confirm_funding(channel_id, funding_hash).await
    }

    pub async fn invalidate_channel(
        &self,
        channel_id: &str,
    ) -> Result<PaymentChannel, TollgateError> {
        self.manager.invalidate(channel_id).await
    }

    pub async fn set_default_channel(
        &self,
        user_id: UserId,
        channel_id: &str,
    ) -> Result<(), TollgateError> {
        self.manager.set_default(user_id, channel_id).await
    }

    pub async fn settle_channel(&self, channel_id: &str) -> Result<SettleOutcome, TollgateError> {
        self.manager.settle(channel_id).await
    }

    pub fn channels(&self, user_id: UserId) -> Result<Vec<PaymentChannel>, TollgateError> {
        self.store.channels_for_user(user_id)
    }

    pub fn channel(&self, channel_id: &str) -> Result<Option<PaymentChannel>, TollgateError> {
        self.store.get_channel(channel_id)
    }

    // ── Chunks ───────────────────────────────────────────────────────────────

    pub async fn create_chunk(
        &self,
        user_id: UserId,
        session_id: &str,
        tokens_count: u64,
    ) -> Result<ChunkEvent, TollgateError> {
        self.chunks.create_chunk(user_id, session_id, tokens_count).await
    }

    pub async fn pay_chunk(
        &self,
        chunk_id: &str,
        buyer_signature: &[u8],
    ) -> Result<PaidState, TollgateError> {
        self.chunks.pay(chunk_id, buyer_signature).await
    }

    pub fn latest_chunk(&self, channel_id: &str) -> Result<Option<ChunkPayment>, TollgateError> {
        self.chunks.latest(channel_id)
    }

    pub fn session_unpaid(&self, user_id: UserId) -> Result<UnpaidSummary, TollgateError> {
        self.chunks.session_unpaid(user_id)
    }

    /// Subscribe to a session's `chunk-payment` stream. The SSE layer drains
    /// this receiver and re-emits each event verbatim.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ChunkEvent> {
        self.events.subscribe(session_id)
    }

    // ── Operations ───────────────────────────────────────────────────────────

    pub fn recent_task_logs(&self, limit: usize) -> Result<Vec<ScheduledTaskLog>, TollgateError> {
        self.store.recent_task_logs(limit)
    }

    /// Spawn the two scheduler loops on their configured periods.
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let settle = Arc::clone(&self.scheduler);
        let settle_tick = IntervalTick::every(self.tick_auto_settle);
        let expire = Arc::clone(&self.scheduler);
        let expire_tick = IntervalTick::every(self.tick_check_expired);
        vec![
            tokio::spawn(async move { settle.run_auto_settle_loop(settle_tick).await }),
            tokio::spawn(async move { expire.run_check_expired_loop(expire_tick).await }),
        ]
    }

    /// Request cooperative shutdown: in-flight settlements may complete, no
    /// new ones start.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("engine shutdown requested");
    }
}
