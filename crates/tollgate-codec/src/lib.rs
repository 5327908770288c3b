//! tollgate-codec
//!
//! Bit-exact wire layouts of the channel protocol:
//! - [`since::Since`] — the 8-byte little-endian time-lock field and its flag byte
//! - [`script::ChannelLockArgs`] — the 77-byte 2-of-2 script args
//! - [`witness::ChannelWitness`] — the 132-byte two-signature witness
//! - [`txenc`] — canonical transaction byte encoding and the hash over it

pub mod script;
pub mod since;
pub mod txenc;
pub mod witness;

pub use script::ChannelLockArgs;
pub use since::Since;
pub use txenc::{encoded_size, tx_hash};
pub use witness::ChannelWitness;
