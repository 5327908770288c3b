//! Users and streaming sessions.

use serde::{Deserialize, Serialize};

use crate::error::TollgateError;
use crate::types::{Timestamp, UserId};

/// A buyer identity, created on first successful public-key login.
/// Users are never deleted; deactivation is a soft flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Hex secp256k1 public key: 33 bytes compressed or 65 uncompressed.
    /// Unique when present.
    pub public_key: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub last_login_at: Option<Timestamp>,
}

/// One conversation a user streams chunks in. Created implicitly on the
/// first chunk for an unknown session id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: UserId,
    pub title: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Validate a hex-encoded secp256k1 public key: well-formed hex of 33
/// (compressed) or 65 (uncompressed) bytes with a plausible prefix byte.
/// Full curve validation happens in `tollgate-crypto` when the key is used.
pub fn validate_public_key_hex(hex_key: &str) -> Result<(), TollgateError> {
    let stripped = hex_key.trim_start_matches("0x");
    let bytes = hex::decode(stripped)
        .map_err(|e| TollgateError::InvalidPublicKey(format!("not hex: {e}")))?;
    match (bytes.len(), bytes.first()) {
        (33, Some(0x02 | 0x03)) => Ok(()),
        (65, Some(0x04)) => Ok(()),
        (len, _) => Err(TollgateError::InvalidPublicKey(format!(
            "expected 33 or 65 bytes with a valid prefix, got {len}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_compressed_and_uncompressed() {
        let compressed = format!("02{}", "11".repeat(32));
        let uncompressed = format!("04{}", "22".repeat(64));
        assert!(validate_public_key_hex(&compressed).is_ok());
        assert!(validate_public_key_hex(&uncompressed).is_ok());
        assert!(validate_public_key_hex(&format!("0x{compressed}")).is_ok());
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(validate_public_key_hex("zz").is_err());
        assert!(validate_public_key_hex("02abcd").is_err()); // wrong length
        let bad_prefix = format!("05{}", "11".repeat(32)); // 33 bytes, bad prefix
        assert!(validate_public_key_hex(&bad_prefix).is_err());
    }
}
