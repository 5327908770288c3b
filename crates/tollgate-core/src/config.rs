//! Process configuration, loaded once at startup from the environment.
//!
//! The seller private key is held behind [`zeroize::Zeroizing`] and is
//! excluded from `Debug` output; it must never reach logs.

use std::fmt;
use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::constants;
use crate::error::TollgateError;
use crate::tx::HashType;

/// All tunable engine configuration.
pub struct Config {
    /// 32-byte seller secret key. Required; zeroized on drop.
    pub seller_private_key: Zeroizing<[u8; 32]>,
    /// Blockchain JSON-RPC endpoint.
    pub rpc_url: String,
    /// Blockchain call timeout in seconds; a timeout reports Pending.
    pub rpc_timeout_secs: u64,
    /// Settlement fee in base units per 1000 bytes of transaction.
    pub fee_rate_per_kb: u64,
    /// Channels within this many seconds of their deadline get auto-settled.
    pub settle_warning_window_secs: i64,
    pub tick_auto_settle_secs: u64,
    pub tick_check_expired_secs: u64,
    /// Base units per token; display uses the inverse 0.01 ratio.
    pub token_base_unit_ratio: u64,
    /// sled data directory.
    pub data_dir: PathBuf,
    /// Code hash of the deployed 2-of-2 channel lock script.
    pub lock_code_hash: [u8; 32],
    pub lock_hash_type: HashType,
}

impl Config {
    /// Load configuration from `TOLLGATE_*` environment variables.
    pub fn from_env() -> Result<Self, TollgateError> {
        let seller_private_key = parse_key32(&require_env("TOLLGATE_SELLER_PRIVATE_KEY")?)
            .map_err(|_| TollgateError::InvalidPrivateKey)?;
        let lock_code_hash_arr = *parse_key32(&require_env("TOLLGATE_LOCK_CODE_HASH")?)
            .map_err(|reason| TollgateError::InvalidConfig {
                key: "TOLLGATE_LOCK_CODE_HASH",
                reason,
            })?;

        let lock_hash_type_str =
            env_or("TOLLGATE_LOCK_HASH_TYPE", "type");
        let lock_hash_type = HashType::parse(&lock_hash_type_str).ok_or_else(|| {
            TollgateError::InvalidConfig {
                key: "TOLLGATE_LOCK_HASH_TYPE",
                reason: format!("unknown hash type {lock_hash_type_str:?}"),
            }
        })?;

        Ok(Self {
            seller_private_key,
            rpc_url: env_or("TOLLGATE_RPC_URL", "http://127.0.0.1:8114"),
            rpc_timeout_secs: parse_env("TOLLGATE_RPC_TIMEOUT_SECS", 10)?,
            fee_rate_per_kb: parse_env("TOLLGATE_FEE_RATE_PER_KB", 1_000)?,
            settle_warning_window_secs: parse_env(
                "TOLLGATE_SETTLE_WARNING_WINDOW_SECS",
                constants::SETTLE_WARNING_WINDOW_SECS,
            )?,
            tick_auto_settle_secs: parse_env(
                "TOLLGATE_TICK_AUTO_SETTLE_SECS",
                constants::TICK_AUTO_SETTLE_SECS,
            )?,
            tick_check_expired_secs: parse_env(
                "TOLLGATE_TICK_CHECK_EXPIRED_SECS",
                constants::TICK_CHECK_EXPIRED_SECS,
            )?,
            token_base_unit_ratio: parse_env(
                "TOLLGATE_TOKEN_BASE_UNIT_RATIO",
                constants::TOKEN_BASE_UNIT_RATIO,
            )?,
            data_dir: PathBuf::from(env_or("TOLLGATE_DATA_DIR", "~/.tollgate/data")),
            lock_code_hash: lock_code_hash_arr,
            lock_hash_type,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("seller_private_key", &"<redacted>")
            .field("rpc_url", &self.rpc_url)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .field("fee_rate_per_kb", &self.fee_rate_per_kb)
            .field("settle_warning_window_secs", &self.settle_warning_window_secs)
            .field("tick_auto_settle_secs", &self.tick_auto_settle_secs)
            .field("tick_check_expired_secs", &self.tick_check_expired_secs)
            .field("token_base_unit_ratio", &self.token_base_unit_ratio)
            .field("data_dir", &self.data_dir)
            .field("lock_code_hash", &hex::encode(self.lock_code_hash))
            .field("lock_hash_type", &self.lock_hash_type)
            .finish()
    }
}

// ── Env helpers ──────────────────────────────────────────────────────────────

fn require_env(key: &'static str) -> Result<String, TollgateError> {
    std::env::var(key).map_err(|_| TollgateError::InvalidConfig {
        key,
        reason: "required but not set".into(),
    })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &'static str, default: T) -> Result<T, TollgateError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| TollgateError::InvalidConfig {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_key32(hex_str: &str) -> Result<Zeroizing<[u8; 32]>, String> {
    let stripped = hex_str.trim_start_matches("0x");
    let bytes = hex::decode(stripped).map_err(|e| e.to_string())?;
    if bytes.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", bytes.len()));
    }
    let mut arr = Zeroizing::new([0u8; 32]);
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key32_accepts_prefixed_hex() {
        let key = format!("0x{}", "ab".repeat(32));
        assert_eq!(*parse_key32(&key).unwrap(), [0xab; 32]);
        assert!(parse_key32("deadbeef").is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = Config {
            seller_private_key: Zeroizing::new([9; 32]),
            rpc_url: "http://127.0.0.1:8114".into(),
            rpc_timeout_secs: 10,
            fee_rate_per_kb: 1_000,
            settle_warning_window_secs: 900,
            tick_auto_settle_secs: 60,
            tick_check_expired_secs: 600,
            token_base_unit_ratio: 100,
            data_dir: PathBuf::from("/tmp/t"),
            lock_code_hash: [0; 32],
            lock_hash_type: HashType::Type,
        };
        let dump = format!("{cfg:?}");
        assert!(dump.contains("<redacted>"));
        assert!(!dump.contains("090909"));
    }
}
