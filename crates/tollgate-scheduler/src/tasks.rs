//! Task bodies and their loops.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tollgate_channel::{ChannelManager, SettleOutcome};
use tollgate_core::channel::ChannelStatus;
use tollgate_core::constants::{SETTLE_BACKOFF_BASE_MS, SETTLE_MAX_ATTEMPTS};
use tollgate_core::error::{ErrorKind, TollgateError};
use tollgate_core::tasklog::ScheduledTaskLog;
use tollgate_core::types::{unix_now, Timestamp};
use tollgate_store::Store;

use crate::log::TaskRun;
use crate::tick::TickSource;

pub const AUTO_SETTLE_TASK: &str = "auto-settle-expiring";
pub const CHECK_EXPIRED_TASK: &str = "check-expired-channels";
const TASK_TYPE_INTERVAL: &str = "interval";

/// Per-channel outcome recorded in a run's `result_data`.
#[derive(Debug, Serialize)]
struct ChannelOutcome {
    channel_id: String,
    outcome: &'static str,
    attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    settle_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Drives the periodic channel maintenance tasks. Settlement attempts go
/// through the [`ChannelManager`], so they take the same per-channel locks
/// as the request path.
pub struct Scheduler {
    store: Arc<Store>,
    manager: Arc<ChannelManager>,
    warning_window_secs: i64,
    max_attempts: u32,
    backoff_base: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        store: Arc<Store>,
        manager: Arc<ChannelManager>,
        warning_window_secs: i64,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            manager,
            warning_window_secs,
            max_attempts: SETTLE_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(SETTLE_BACKOFF_BASE_MS),
            shutdown,
        }
    }

    /// Shrink the retry backoff (deterministic tests).
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    // ── auto-settle-expiring ─────────────────────────────────────────────────

    /// One run: settle every ACTIVE channel whose deadline is within the
    /// warning window, in ascending deadline order. Per-channel failures are
    /// recorded and do not abort the batch; no new settlement starts after
    /// shutdown is requested.
    pub async fn run_auto_settle_once(
        &self,
        now: Timestamp,
    ) -> Result<ScheduledTaskLog, TollgateError> {
        let run = TaskRun::start(Arc::clone(&self.store), AUTO_SETTLE_TASK, TASK_TYPE_INTERVAL)?;

        let mut candidates: Vec<_> = self
            .store
            .channels_with_status(ChannelStatus::Active)?
            .into_iter()
            .filter(|c| matches!(c.remaining_seconds(now), Some(r) if r <= self.warning_window_secs))
            .collect();
        candidates.sort_by_key(|c| c.deadline());

        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut settled = 0u64;
        let mut failed = 0u64;

        for channel in &candidates {
            if self.shutdown_requested() {
                outcomes.push(ChannelOutcome {
                    channel_id: channel.channel_id.clone(),
                    outcome: "skipped_shutdown",
                    attempts: 0,
                    settle_hash: None,
                    error: None,
                });
                continue;
            }
            let outcome = self.settle_with_retries(&channel.channel_id).await;
            match outcome.outcome {
                "settled" => settled += 1,
                "failed" => failed += 1,
                _ => {}
            }
            outcomes.push(outcome);
        }

        let result = serde_json::json!({
            "candidates": candidates.len(),
            "channels": outcomes,
        });
        let log = if failed == 0 {
            run.success(result, Some(settled), Some(candidates.len() as u64))?
        } else {
            run.failure(
                result,
                format!("{failed} of {} settlements failed", candidates.len()),
                Some(settled),
                Some(candidates.len() as u64),
            )?
        };
        info!(
            task = AUTO_SETTLE_TASK,
            candidates = candidates.len(),
            settled,
            failed,
            "run complete"
        );
        Ok(log)
    }

    /// Bounded retries with exponential backoff; only pending (transient)
    /// outcomes retry, rejections are terminal for the attempt.
    async fn settle_with_retries(&self, channel_id: &str) -> ChannelOutcome {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.manager.settle(channel_id).await {
                Ok(SettleOutcome::Settled { settle_hash }) => {
                    return ChannelOutcome {
                        channel_id: channel_id.to_string(),
                        outcome: "settled",
                        attempts,
                        settle_hash: Some(settle_hash.to_hex()),
                        error: None,
                    }
                }
                Ok(SettleOutcome::NothingToSettle) => {
                    return ChannelOutcome {
                        channel_id: channel_id.to_string(),
                        outcome: "nothing_to_settle",
                        attempts,
                        settle_hash: None,
                        error: None,
                    }
                }
                Err(e)
                    if e.kind() == ErrorKind::BlockchainPending
                        && attempts < self.max_attempts
                        && !self.shutdown_requested() =>
                {
                    let delay = self.backoff_base * 2u32.saturating_pow(attempts - 1);
                    debug!(channel_id, attempts, ?delay, "settlement pending, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(channel_id, attempts, error = %e, "settlement failed");
                    return ChannelOutcome {
                        channel_id: channel_id.to_string(),
                        outcome: "failed",
                        attempts,
                        settle_hash: None,
                        error: Some(e.to_string()),
                    };
                }
            }
        }
    }

    // ── check-expired-channels ───────────────────────────────────────────────

    /// One run: transition every ACTIVE channel past its deadline to
    /// EXPIRED, atomically per channel.
    pub async fn run_check_expired_once(
        &self,
        now: Timestamp,
    ) -> Result<ScheduledTaskLog, TollgateError> {
        let run = TaskRun::start(
            Arc::clone(&self.store),
            CHECK_EXPIRED_TASK,
            TASK_TYPE_INTERVAL,
        )?;

        let candidates: Vec<_> = self
            .store
            .channels_with_status(ChannelStatus::Active)?
            .into_iter()
            .filter(|c| c.is_expired(now))
            .collect();

        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut expired = 0u64;
        let mut failed = 0u64;
        for channel in &candidates {
            match self.manager.mark_expired(&channel.channel_id, now).await {
                Ok(_) => {
                    expired += 1;
                    outcomes.push(ChannelOutcome {
                        channel_id: channel.channel_id.clone(),
                        outcome: "expired",
                        attempts: 1,
                        settle_hash: None,
                        error: None,
                    });
                }
                Err(e) => {
                    failed += 1;
                    outcomes.push(ChannelOutcome {
                        channel_id: channel.channel_id.clone(),
                        outcome: "failed",
                        attempts: 1,
                        settle_hash: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let result = serde_json::json!({
            "expired": expired,
            "channels": outcomes,
        });
        let log = if failed == 0 {
            run.success(result, None, Some(candidates.len() as u64))?
        } else {
            run.failure(
                result,
                format!("{failed} of {} expiries failed", candidates.len()),
                None,
                Some(candidates.len() as u64),
            )?
        };
        info!(
            task = CHECK_EXPIRED_TASK,
            checked = candidates.len(),
            expired,
            "run complete"
        );
        Ok(log)
    }

    // ── Loops ────────────────────────────────────────────────────────────────

    /// Run the auto-settle task on every tick until shutdown.
    pub async fn run_auto_settle_loop(&self, mut ticks: impl TickSource) {
        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                alive = ticks.tick() => {
                    if !alive || self.shutdown_requested() {
                        break;
                    }
                    if let Err(e) = self.run_auto_settle_once(unix_now()).await {
                        warn!(task = AUTO_SETTLE_TASK, error = %e, "run errored");
                    }
                }
            }
        }
        info!(task = AUTO_SETTLE_TASK, "loop stopped");
    }

    /// Run the expired-channel sweep on every tick until shutdown.
    pub async fn run_check_expired_loop(&self, mut ticks: impl TickSource) {
        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                alive = ticks.tick() => {
                    if !alive || self.shutdown_requested() {
                        break;
                    }
                    if let Err(e) = self.run_check_expired_once(unix_now()).await {
                        warn!(task = CHECK_EXPIRED_TASK, error = %e, "run errored");
                    }
                }
            }
        }
        info!(task = CHECK_EXPIRED_TASK, "loop stopped");
    }
}
