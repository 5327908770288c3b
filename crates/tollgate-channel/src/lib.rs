//! tollgate-channel
//!
//! The channel lifecycle manager and the chunk payment engine — the
//! invariant-critical core of Tollgate. All mutations of a channel happen
//! under that channel's exclusive lock from [`locks::ChannelLocks`], which
//! the scheduler shares.

pub mod chunks;
pub mod events;
pub mod lifecycle;
pub mod locks;
pub mod query;

pub use chunks::ChunkEngine;
pub use events::EventBus;
pub use lifecycle::{ChannelManager, ChannelPolicy, SettleOutcome};
pub use locks::ChannelLocks;
pub use query::ChannelQuery;
