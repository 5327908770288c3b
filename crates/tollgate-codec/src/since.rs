//! The `since` time-lock field: 8 bytes little-endian, flag in the high byte.
//!
//! Flags: `0x80` relative time in seconds, `0x40` absolute block height,
//! `0x00` absolute Unix timestamp. The metric value occupies the low 56 bits.

use tollgate_core::constants::{
    SINCE_FLAG_ABSOLUTE_BLOCK, SINCE_FLAG_ABSOLUTE_TIMESTAMP, SINCE_FLAG_RELATIVE_SECONDS,
};
use tollgate_core::error::TollgateError;

const METRIC_MASK: u64 = 0x00ff_ffff_ffff_ffff;

/// A validated `since` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Since(u64);

impl Since {
    /// A zero `since`: no time-lock. Signing messages treat this value
    /// specially (the bare tx hash is signed, not a rehash).
    pub const ZERO: Since = Since(0);

    /// Relative time-lock of `seconds` (flag `0x80`).
    pub fn relative_seconds(seconds: u64) -> Result<Self, TollgateError> {
        if seconds > METRIC_MASK {
            return Err(TollgateError::SinceOutOfRange(seconds));
        }
        Ok(Self(((SINCE_FLAG_RELATIVE_SECONDS as u64) << 56) | seconds))
    }

    /// Absolute block height (flag `0x40`).
    pub fn absolute_block(height: u64) -> Result<Self, TollgateError> {
        if height > METRIC_MASK {
            return Err(TollgateError::SinceOutOfRange(height));
        }
        Ok(Self(((SINCE_FLAG_ABSOLUTE_BLOCK as u64) << 56) | height))
    }

    /// Absolute Unix timestamp (flag `0x00`).
    pub fn absolute_timestamp(ts: u64) -> Result<Self, TollgateError> {
        if ts > METRIC_MASK {
            return Err(TollgateError::SinceOutOfRange(ts));
        }
        Ok(Self(ts))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The flag byte (high byte of the raw value).
    pub fn flag(&self) -> u8 {
        (self.0 >> 56) as u8
    }

    /// The metric value without the flag byte.
    pub fn metric(&self) -> u64 {
        self.0 & METRIC_MASK
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_relative_seconds(&self) -> bool {
        self.flag() == SINCE_FLAG_RELATIVE_SECONDS
    }

    /// Little-endian wire form; the high (flag) byte lands at index 7.
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }
}

impl std::fmt::Display for Since {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.flag() {
            SINCE_FLAG_RELATIVE_SECONDS => write!(f, "relative {}s", self.metric()),
            SINCE_FLAG_ABSOLUTE_BLOCK => write!(f, "block {}", self.metric()),
            SINCE_FLAG_ABSOLUTE_TIMESTAMP => write!(f, "timestamp {}", self.metric()),
            other => write!(f, "since(flag={other:#04x}, metric={})", self.metric()),
        }
    }
}
