//! The 2-of-2 channel lock script args.
//!
//! Layout (77 bytes total):
//! `[0x00, 0x00] ‖ code_hash[32] ‖ hash_type[1] ‖ threshold[1] ‖ pubkey_count[1]
//!  ‖ pubkey_hash_buyer[20] ‖ pubkey_hash_seller[20]`

use tollgate_core::constants::{
    MULTISIG_PUBKEY_COUNT, MULTISIG_THRESHOLD, PUBKEY_HASH_LEN, SCRIPT_ARGS_LEN,
};
use tollgate_core::error::TollgateError;
use tollgate_core::tx::{HashType, Script};

/// Parsed channel lock args. Buyer is always pubkey index 0, seller index 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelLockArgs {
    pub code_hash: [u8; 32],
    pub hash_type: HashType,
    pub buyer_pubkey_hash: [u8; PUBKEY_HASH_LEN],
    pub seller_pubkey_hash: [u8; PUBKEY_HASH_LEN],
}

impl ChannelLockArgs {
    pub fn new(
        code_hash: [u8; 32],
        hash_type: HashType,
        buyer_pubkey_hash: [u8; PUBKEY_HASH_LEN],
        seller_pubkey_hash: [u8; PUBKEY_HASH_LEN],
    ) -> Self {
        Self {
            code_hash,
            hash_type,
            buyer_pubkey_hash,
            seller_pubkey_hash,
        }
    }

    /// Fixed 77-byte wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SCRIPT_ARGS_LEN);
        out.extend_from_slice(&[0x00, 0x00]);
        out.extend_from_slice(&self.code_hash);
        out.push(self.hash_type.as_byte());
        out.push(MULTISIG_THRESHOLD);
        out.push(MULTISIG_PUBKEY_COUNT);
        out.extend_from_slice(&self.buyer_pubkey_hash);
        out.extend_from_slice(&self.seller_pubkey_hash);
        out
    }

    /// Parse and validate the fixed layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TollgateError> {
        if bytes.len() != SCRIPT_ARGS_LEN {
            return Err(TollgateError::Serialization(format!(
                "script args must be {SCRIPT_ARGS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != 0 || bytes[1] != 0 {
            return Err(TollgateError::Serialization(
                "script args prefix must be [0x00, 0x00]".into(),
            ));
        }
        let mut code_hash = [0u8; 32];
        code_hash.copy_from_slice(&bytes[2..34]);
        let hash_type = HashType::from_byte(bytes[34]).ok_or_else(|| {
            TollgateError::Serialization(format!("unknown hash_type byte {:#04x}", bytes[34]))
        })?;
        if bytes[35] != MULTISIG_THRESHOLD {
            return Err(TollgateError::Serialization(format!(
                "threshold must be {MULTISIG_THRESHOLD}, got {}",
                bytes[35]
            )));
        }
        if bytes[36] != MULTISIG_PUBKEY_COUNT {
            return Err(TollgateError::Serialization(format!(
                "pubkey count must be {MULTISIG_PUBKEY_COUNT}, got {}",
                bytes[36]
            )));
        }
        let mut buyer_pubkey_hash = [0u8; PUBKEY_HASH_LEN];
        buyer_pubkey_hash.copy_from_slice(&bytes[37..57]);
        let mut seller_pubkey_hash = [0u8; PUBKEY_HASH_LEN];
        seller_pubkey_hash.copy_from_slice(&bytes[57..77]);

        Ok(Self {
            code_hash,
            hash_type,
            buyer_pubkey_hash,
            seller_pubkey_hash,
        })
    }

    /// The lock [`Script`] carrying these args.
    pub fn to_script(&self) -> Script {
        Script::new(self.code_hash, self.hash_type, self.to_bytes())
    }
}
