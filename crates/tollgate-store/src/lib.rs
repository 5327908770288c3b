//! tollgate-store
//!
//! The only authoritative mutator of durable state. Sled-backed trees for
//! users, sessions, channels, chunk payments and task logs, with explicit
//! secondary indices and forward-only schema migrations.

pub mod db;
mod migrate;

pub use db::Store;
pub use migrate::CURRENT_SCHEMA_VERSION;
