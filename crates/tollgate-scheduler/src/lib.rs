//! tollgate-scheduler
//!
//! The two background tasks that keep channels honest:
//! `auto-settle-expiring` (settle before the refund time-lock matures) and
//! `check-expired-channels` (materialise the deadline rule). Every run
//! writes one structured [`tollgate_core::tasklog::ScheduledTaskLog`] row.

pub mod log;
pub mod tasks;
pub mod tick;

pub use log::TaskRun;
pub use tasks::{Scheduler, AUTO_SETTLE_TASK, CHECK_EXPIRED_TASK};
pub use tick::{IntervalTick, ManualTick, TickSource};
