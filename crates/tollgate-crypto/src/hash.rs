use blake2b_simd::Params;

use tollgate_core::constants::PUBKEY_HASH_LEN;

/// Personalisation of every blake2b-256 hash in the protocol; must match the
/// deployed on-chain scripts.
pub const HASH_PERSONALIZATION: &[u8; 16] = b"ckb-default-hash";

/// blake2b-256 of arbitrary bytes with the protocol personalisation.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let hash = Params::new()
        .hash_length(32)
        .personal(HASH_PERSONALIZATION)
        .hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

fn blake2b_256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut state = Params::new()
        .hash_length(32)
        .personal(HASH_PERSONALIZATION)
        .to_state();
    for part in parts {
        state.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(state.finalize().as_bytes());
    out
}

/// First 20 bytes of blake2b-256 over the uncompressed public key bytes.
pub fn pubkey_hash_bytes(pubkey_uncompressed: &[u8]) -> [u8; PUBKEY_HASH_LEN] {
    let full = blake2b_256(pubkey_uncompressed);
    let mut out = [0u8; PUBKEY_HASH_LEN];
    out.copy_from_slice(&full[..PUBKEY_HASH_LEN]);
    out
}

/// Constant-time equality of two pubkey hashes.
pub fn ct_eq_20(a: &[u8; PUBKEY_HASH_LEN], b: &[u8; PUBKEY_HASH_LEN]) -> bool {
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ── Protocol signing messages ────────────────────────────────────────────────

/// State-update message: `blake2b256(channel_id_utf8 ‖ cumulative_le8 ‖ remaining_le8)`.
///
/// The exact layout is a wire contract shared with the buyer client and the
/// settlement script; every signer and verifier goes through this function.
pub fn state_update_message(channel_id: &str, cumulative: u64, remaining: u64) -> [u8; 32] {
    blake2b_256_parts(&[
        channel_id.as_bytes(),
        &cumulative.to_le_bytes(),
        &remaining.to_le_bytes(),
    ])
}

/// Refund message bound to the refund input's `since` field.
///
/// When `since` is all zeros the on-chain script verifies against the bare
/// transaction hash instead of a rehash; that asymmetry is part of the
/// script contract and is encoded here so no caller can get it wrong.
pub fn refund_message(refund_tx_hash: &[u8; 32], since_le: [u8; 8]) -> [u8; 32] {
    if since_le == [0u8; 8] {
        return *refund_tx_hash;
    }
    blake2b_256_parts(&[refund_tx_hash, &since_le])
}
