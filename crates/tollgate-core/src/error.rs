use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error-kind tag surfaced at the external boundary.
///
/// Callers branch on the kind, not the variant: variants may grow, kinds
/// are a wire contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InputValidation,
    NotFound,
    StateConflict,
    SignatureInvalid,
    Insufficient,
    BlockchainPending,
    BlockchainRejected,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputValidation => "input_validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::SignatureInvalid => "signature_invalid",
            ErrorKind::Insufficient => "insufficient",
            ErrorKind::BlockchainPending => "blockchain_pending",
            ErrorKind::BlockchainRejected => "blockchain_rejected",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TollgateError {
    // ── Input validation ─────────────────────────────────────────────────────
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid seller private key")]
    InvalidPrivateKey,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("duration must be greater than zero")]
    ZeroDuration,

    #[error("tokens_count must be greater than zero")]
    ZeroTokens,

    #[error("invalid configuration for {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("since value exceeds the 56-bit metric range: {0}")]
    SinceOutOfRange(u64),

    // ── Not found ────────────────────────────────────────────────────────────
    #[error("unknown user: {0}")]
    UserNotFound(String),

    #[error("unknown channel: {0}")]
    ChannelNotFound(String),

    #[error("unknown chunk: {0}")]
    ChunkNotFound(String),

    #[error("user {0} has no default channel")]
    NoDefaultChannel(u64),

    // ── State conflicts ──────────────────────────────────────────────────────
    #[error("illegal channel transition: {from} → {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("channel already exists: {0}")]
    DuplicateChannel(String),

    #[error("chunk already exists: {0}")]
    DuplicateChunk(String),

    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    #[error("public key already registered")]
    DuplicatePublicKey,

    #[error("channel {0} is not active")]
    ChannelNotActive(String),

    #[error("only an active channel may be default: {0}")]
    DefaultNotActive(String),

    #[error("channel {channel_id} does not belong to user {user_id}")]
    NotChannelOwner { channel_id: String, user_id: u64 },

    #[error("non-monotonic cumulative payment: prior {prior}, got {got}")]
    NonMonotonicCumulative { prior: u64, got: u64 },

    #[error("chunk {0} already paid with a different signature")]
    PaidSignatureMismatch(String),

    #[error("funding confirmation hash mismatch for channel {0}")]
    FundingHashMismatch(String),

    // ── Signature ────────────────────────────────────────────────────────────
    #[error("malformed signature: expected 65 bytes, got {0}")]
    MalformedSignature(usize),

    #[error("recovery id out of range: {0}")]
    RecoveryIdOutOfRange(u8),

    #[error("signature recovery failed")]
    SignatureRecovery,

    #[error("recovered public key does not match the channel party")]
    PubkeyHashMismatch,

    // ── Capacity ─────────────────────────────────────────────────────────────
    #[error("chunk would exceed channel capacity: requested {requested} tokens, {available} available")]
    CapacityExceeded { requested: u64, available: u64 },

    // ── Blockchain ───────────────────────────────────────────────────────────
    #[error("blockchain operation pending: {0}")]
    BlockchainPending(String),

    #[error("blockchain rejected the transaction: {0}")]
    BlockchainRejected(String),

    // ── Internal ─────────────────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TollgateError {
    /// Map a variant to its stable kind tag.
    pub fn kind(&self) -> ErrorKind {
        use TollgateError::*;
        match self {
            InvalidPublicKey(_) | InvalidPrivateKey | InvalidHex(_) | ZeroAmount
            | ZeroDuration | ZeroTokens | InvalidConfig { .. } | SinceOutOfRange(_) => {
                ErrorKind::InputValidation
            }
            UserNotFound(_) | ChannelNotFound(_) | ChunkNotFound(_) | NoDefaultChannel(_) => {
                ErrorKind::NotFound
            }
            InvalidTransition { .. }
            | DuplicateChannel(_)
            | DuplicateChunk(_)
            | DuplicateUsername(_)
            | DuplicatePublicKey
            | ChannelNotActive(_)
            | DefaultNotActive(_)
            | NotChannelOwner { .. }
            | NonMonotonicCumulative { .. }
            | PaidSignatureMismatch(_)
            | FundingHashMismatch(_) => ErrorKind::StateConflict,
            MalformedSignature(_) | RecoveryIdOutOfRange(_) | SignatureRecovery
            | PubkeyHashMismatch => ErrorKind::SignatureInvalid,
            CapacityExceeded { .. } => ErrorKind::Insufficient,
            BlockchainPending(_) => ErrorKind::BlockchainPending,
            BlockchainRejected(_) => ErrorKind::BlockchainRejected,
            Storage(_) | Serialization(_) => ErrorKind::Internal,
        }
    }
}
