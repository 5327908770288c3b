//! tollgate-settle
//!
//! Construction and seller-side signing of the three channel transactions:
//! funding (locks the amount under the 2-of-2 script), refund (returns it to
//! the buyer after the relative time-lock) and settlement (distributes the
//! latest paid cumulative to the seller, remainder minus fee to the buyer).

pub mod builder;
pub mod fee;

pub use builder::{
    attach_settlement_witness, build_funding_tx, build_refund_tx, build_settlement_tx,
    seller_sign_refund, sign_state_update,
};
pub use fee::fee_for_size;
