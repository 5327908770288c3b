use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Balance in base units. 1 token = 100 base units at the default ratio;
/// display layers show the inverse (1 base unit = 0.01 token).
pub type Balance = u64;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Monotonic integer user id assigned by the store.
pub type UserId = u64;

/// Number of streamed tokens in a chunk.
pub type TokenCount = u64;

/// Current Unix time in seconds.
pub fn unix_now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

/// Generate an opaque 32-char hex identifier (16 random bytes).
///
/// Used for `channel_id`, `chunk_id` and fallback `session_id` values.
pub fn new_id() -> String {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

// ── TxHash ───────────────────────────────────────────────────────────────────

/// 32-byte transaction hash: blake2b-256 of the canonical raw transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, crate::error::TollgateError> {
        let s = s.trim_start_matches("0x");
        let bytes = hex::decode(s)
            .map_err(|e| crate::error::TollgateError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(crate::error::TollgateError::InvalidHex(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}…)", &self.to_hex()[..16])
    }
}
