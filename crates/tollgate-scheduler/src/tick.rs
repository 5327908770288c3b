//! Tick sources decouple the task loops from wall-clock scheduling so tests
//! drive the scheduler deterministically. Production uses [`IntervalTick`];
//! cron-style configuration maps onto its period at the configuration layer.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[async_trait]
pub trait TickSource: Send {
    /// Wait for the next tick. Returns false when the source is exhausted
    /// and the loop should end.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period ticks. Missed ticks are delayed, not bursted.
pub struct IntervalTick {
    interval: tokio::time::Interval,
}

impl IntervalTick {
    pub fn every(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl TickSource for IntervalTick {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Test-driven ticks: fires once per message, ends when the sender drops.
pub struct ManualTick {
    rx: mpsc::Receiver<()>,
}

impl ManualTick {
    pub fn new() -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(16);
        (tx, Self { rx })
    }
}

#[async_trait]
impl TickSource for ManualTick {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
