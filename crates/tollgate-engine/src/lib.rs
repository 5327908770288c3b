//! tollgate-engine
//!
//! The process-wide façade: one [`Engine`] value owns the store, the seller
//! keypair, the blockchain client, the channel manager, the chunk engine,
//! the event bus and the scheduler. Constructed once at startup and passed
//! by shared reference; interior mutability exists only at the per-channel
//! lock granularity.

pub mod engine;

pub use engine::Engine;
