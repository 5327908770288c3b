//! Protocol-level constants. Tunable values live in [`crate::config::Config`];
//! everything here is fixed by the wire format or the on-chain contract.

/// Base units per streamed token (default; overridable via config).
/// Display layers use the inverse ratio 0.01 token per base unit.
pub const TOKEN_BASE_UNIT_RATIO: u64 = 100;

/// Recoverable signature length: r(32) ‖ s(32) ‖ recovery_id(1).
pub const SIGNATURE_LEN: usize = 65;

/// Pubkey hash length: first 20 bytes of blake2b-256(uncompressed pubkey).
pub const PUBKEY_HASH_LEN: usize = 20;

/// Full 2-of-2 script args length including the 2-byte prefix:
/// `[0,0] ‖ code_hash(32) ‖ hash_type(1) ‖ threshold(1) ‖ count(1) ‖ pkh×2(40)`.
pub const SCRIPT_ARGS_LEN: usize = 77;

/// 2-of-2 witness length: two 65-byte signatures plus two index bytes.
pub const WITNESS_LEN: usize = 132;

/// Required signature threshold and pubkey count of the channel lock.
pub const MULTISIG_THRESHOLD: u8 = 2;
pub const MULTISIG_PUBKEY_COUNT: u8 = 2;

// ── `since` flag bytes (high byte of the 8-byte little-endian field) ─────────

/// Relative time-lock, value interpreted as seconds.
pub const SINCE_FLAG_RELATIVE_SECONDS: u8 = 0x80;
/// Absolute block height.
pub const SINCE_FLAG_ABSOLUTE_BLOCK: u8 = 0x40;
/// Absolute Unix timestamp.
pub const SINCE_FLAG_ABSOLUTE_TIMESTAMP: u8 = 0x00;

// ── Scheduler defaults ───────────────────────────────────────────────────────

/// Channels whose deadline is this close get settled ahead of expiry.
pub const SETTLE_WARNING_WINDOW_SECS: i64 = 900;
/// Tick period of the auto-settle task.
pub const TICK_AUTO_SETTLE_SECS: u64 = 60;
/// Tick period of the expired-channel sweep.
pub const TICK_CHECK_EXPIRED_SECS: u64 = 600;
/// Per-channel settlement attempts within one scheduler run.
pub const SETTLE_MAX_ATTEMPTS: u32 = 3;
/// First retry delay; doubles per attempt.
pub const SETTLE_BACKOFF_BASE_MS: u64 = 1_000;

// ── Event bus ────────────────────────────────────────────────────────────────

/// Bounded capacity of each per-session chunk-event channel. Slow consumers
/// observe `Lagged` rather than blocking producers.
pub const EVENT_BUS_CAPACITY: usize = 64;

// ── Well-known scripts ───────────────────────────────────────────────────────

/// Code hash of the standard secp256k1/blake160 single-sig lock used for
/// payout outputs (settlement and refund destinations).
pub const SIGHASH_CODE_HASH: [u8; 32] = [
    0x9b, 0xd7, 0xe0, 0x6f, 0x3e, 0xcf, 0x4b, 0xe0, 0xf2, 0xfc, 0xd2, 0x18, 0x8b, 0x23, 0xf1,
    0xb9, 0xfc, 0xc8, 0x8e, 0x5d, 0x4b, 0x65, 0xa8, 0x63, 0x7b, 0x17, 0x72, 0x3b, 0xbd, 0xa3,
    0xcc, 0xe8,
];
