//! Recoverable ECDSA over secp256k1.
//!
//! Signatures are 65 bytes: `r(32) ‖ s(32) ‖ recovery_id(1)`. Signing
//! searches the recovery id by recovering each candidate and comparing
//! against the signer's uncompressed public key; verification recovers the
//! key from the signature and compares pubkey hashes in constant time.

use once_cell::sync::Lazy;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

use tollgate_core::constants::{PUBKEY_HASH_LEN, SIGNATURE_LEN};
use tollgate_core::error::TollgateError;

use crate::hash::{ct_eq_20, pubkey_hash_bytes};

static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// 20-byte hash of a public key (uncompressed serialisation).
pub fn pubkey_hash(pubkey: &PublicKey) -> [u8; PUBKEY_HASH_LEN] {
    pubkey_hash_bytes(&pubkey.serialize_uncompressed())
}

/// Parse a hex public key (compressed 33 B or uncompressed 65 B).
pub fn parse_public_key_hex(hex_key: &str) -> Result<PublicKey, TollgateError> {
    let stripped = hex_key.trim_start_matches("0x");
    let bytes = hex::decode(stripped)
        .map_err(|e| TollgateError::InvalidPublicKey(format!("not hex: {e}")))?;
    PublicKey::from_slice(&bytes)
        .map_err(|e| TollgateError::InvalidPublicKey(e.to_string()))
}

/// Sign a 32-byte digest, returning `r ‖ s ‖ recovery_id`.
///
/// The recovery id is found by trying all four candidates and keeping the
/// one that recovers the signer's own uncompressed key. Fails if none does.
pub fn sign_recoverable(
    secret: &SecretKey,
    msg32: &[u8; 32],
) -> Result<[u8; SIGNATURE_LEN], TollgateError> {
    let msg = Message::from_digest(*msg32);
    let compact = SECP.sign_ecdsa(&msg, secret).serialize_compact();
    let expected = PublicKey::from_secret_key(&SECP, secret).serialize_uncompressed();

    for rec_id in 0..4i32 {
        let rid = RecoveryId::from_i32(rec_id).map_err(|_| TollgateError::SignatureRecovery)?;
        let candidate = RecoverableSignature::from_compact(&compact, rid)
            .map_err(|_| TollgateError::SignatureRecovery)?;
        if let Ok(recovered) = SECP.recover_ecdsa(&msg, &candidate) {
            if recovered.serialize_uncompressed() == expected {
                let mut out = [0u8; SIGNATURE_LEN];
                out[..64].copy_from_slice(&compact);
                out[64] = rec_id as u8;
                return Ok(out);
            }
        }
    }
    Err(TollgateError::SignatureRecovery)
}

/// Recover the public key from a 65-byte signature over `msg32`.
pub fn recover(sig65: &[u8], msg32: &[u8; 32]) -> Result<PublicKey, TollgateError> {
    if sig65.len() != SIGNATURE_LEN {
        return Err(TollgateError::MalformedSignature(sig65.len()));
    }
    let rec_byte = sig65[64];
    if rec_byte > 3 {
        return Err(TollgateError::RecoveryIdOutOfRange(rec_byte));
    }
    let rid = RecoveryId::from_i32(rec_byte as i32)
        .map_err(|_| TollgateError::RecoveryIdOutOfRange(rec_byte))?;
    let sig = RecoverableSignature::from_compact(&sig65[..64], rid)
        .map_err(|_| TollgateError::SignatureRecovery)?;
    SECP.recover_ecdsa(&Message::from_digest(*msg32), &sig)
        .map_err(|_| TollgateError::SignatureRecovery)
}

/// Verify that `sig65` over `msg32` was produced by the key hashing to
/// `expected_hash`. Comparison is constant time.
pub fn verify_pubkey_hash(
    sig65: &[u8],
    msg32: &[u8; 32],
    expected_hash: &[u8; PUBKEY_HASH_LEN],
) -> Result<(), TollgateError> {
    let recovered = recover(sig65, msg32)?;
    if ct_eq_20(&pubkey_hash(&recovered), expected_hash) {
        Ok(())
    } else {
        Err(TollgateError::PubkeyHashMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{refund_message, state_update_message};
    use crate::keypair::Keypair;

    #[test]
    fn sign_recover_round_trip() {
        let kp = Keypair::generate();
        let msg = [0x11u8; 32];
        let sig = kp.sign(&msg).unwrap();
        let recovered = recover(&sig, &msg).unwrap();
        assert_eq!(
            recovered.serialize_uncompressed(),
            kp.public_key().serialize_uncompressed()
        );
    }

    #[test]
    fn verify_against_pubkey_hash() {
        let kp = Keypair::generate();
        let msg = state_update_message("chan-1", 1_000, 9_000);
        let sig = kp.sign(&msg).unwrap();
        assert!(verify_pubkey_hash(&sig, &msg, &kp.pubkey_hash()).is_ok());

        let other = Keypair::generate();
        assert!(matches!(
            verify_pubkey_hash(&sig, &msg, &other.pubkey_hash()),
            Err(TollgateError::PubkeyHashMismatch)
        ));
    }

    #[test]
    fn malformed_signatures_rejected_before_recovery() {
        let msg = [0u8; 32];
        assert!(matches!(
            recover(&[0u8; 64], &msg),
            Err(TollgateError::MalformedSignature(64))
        ));
        let mut sig = [0u8; 65];
        sig[64] = 4;
        assert!(matches!(
            recover(&sig, &msg),
            Err(TollgateError::RecoveryIdOutOfRange(4))
        ));
    }

    #[test]
    fn since_binding_holds_across_signatures() {
        // A signature over since=1 must not verify for since=100.
        let kp = Keypair::generate();
        let tx_hash = [0x33u8; 32];
        let signed_msg = refund_message(&tx_hash, 1u64.to_le_bytes());
        let sig = kp.sign(&signed_msg).unwrap();

        let onchain_msg = refund_message(&tx_hash, 100u64.to_le_bytes());
        // Recovery may yield some other key or fail outright; either way the
        // pubkey-hash check must reject.
        if let Ok(recovered) = recover(&sig, &onchain_msg) {
            assert_ne!(
                recovered.serialize_uncompressed(),
                kp.public_key().serialize_uncompressed()
            );
        }
        assert!(verify_pubkey_hash(&sig, &onchain_msg, &kp.pubkey_hash()).is_err());
    }

    #[test]
    fn tampered_digest_fails_hash_check() {
        let kp = Keypair::generate();
        let sig = kp.sign(&[1u8; 32]).unwrap();
        assert!(verify_pubkey_hash(&sig, &[2u8; 32], &kp.pubkey_hash()).is_err());
    }
}
