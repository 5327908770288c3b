//! The 2-of-2 witness: exactly 132 bytes.
//!
//! `sig_buyer[65] ‖ sig_seller[65] ‖ idx_buyer[1] ‖ idx_seller[1]`
//! where each index selects a pubkey-hash slot in the script args and the
//! two indices must be distinct members of {0, 1}.

use tollgate_core::constants::{SIGNATURE_LEN, WITNESS_LEN};
use tollgate_core::error::TollgateError;

#[derive(Clone, PartialEq, Eq)]
pub struct ChannelWitness {
    pub buyer_sig: [u8; SIGNATURE_LEN],
    pub seller_sig: [u8; SIGNATURE_LEN],
    pub buyer_index: u8,
    pub seller_index: u8,
}

impl ChannelWitness {
    /// The standard arrangement: buyer occupies slot 0, seller slot 1.
    pub fn standard(buyer_sig: [u8; SIGNATURE_LEN], seller_sig: [u8; SIGNATURE_LEN]) -> Self {
        Self {
            buyer_sig,
            seller_sig,
            buyer_index: 0,
            seller_index: 1,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WITNESS_LEN);
        out.extend_from_slice(&self.buyer_sig);
        out.extend_from_slice(&self.seller_sig);
        out.push(self.buyer_index);
        out.push(self.seller_index);
        out
    }

    /// Decode, rejecting malformed input before any signature work happens.
    pub fn decode(bytes: &[u8]) -> Result<Self, TollgateError> {
        if bytes.len() != WITNESS_LEN {
            return Err(TollgateError::Serialization(format!(
                "witness must be {WITNESS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let buyer_index = bytes[130];
        let seller_index = bytes[131];
        if buyer_index > 1 || seller_index > 1 {
            return Err(TollgateError::Serialization(format!(
                "witness key indices must be 0 or 1, got ({buyer_index}, {seller_index})"
            )));
        }
        if buyer_index == seller_index {
            return Err(TollgateError::Serialization(format!(
                "witness key indices must be distinct, both are {buyer_index}"
            )));
        }
        let mut buyer_sig = [0u8; SIGNATURE_LEN];
        buyer_sig.copy_from_slice(&bytes[..65]);
        let mut seller_sig = [0u8; SIGNATURE_LEN];
        seller_sig.copy_from_slice(&bytes[65..130]);

        Ok(Self {
            buyer_sig,
            seller_sig,
            buyer_index,
            seller_index,
        })
    }
}

impl std::fmt::Debug for ChannelWitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ChannelWitness {{ buyer: idx {} sig {}…, seller: idx {} sig {}… }}",
            self.buyer_index,
            hex::encode(&self.buyer_sig[..4]),
            self.seller_index,
            hex::encode(&self.seller_sig[..4]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn random_sig() -> [u8; 65] {
        let mut sig = [0u8; 65];
        rand::thread_rng().fill_bytes(&mut sig);
        sig[64] %= 4;
        sig
    }

    #[test]
    fn round_trip_random_witnesses() {
        for _ in 0..32 {
            let w = ChannelWitness {
                buyer_sig: random_sig(),
                seller_sig: random_sig(),
                buyer_index: 1,
                seller_index: 0,
            };
            let bytes = w.encode();
            assert_eq!(bytes.len(), 132);
            assert_eq!(ChannelWitness::decode(&bytes).unwrap(), w);
        }
    }

    #[test]
    fn rejects_131_bytes() {
        let w = ChannelWitness::standard(random_sig(), random_sig());
        let mut bytes = w.encode();
        bytes.pop(); // drop one index byte
        assert!(ChannelWitness::decode(&bytes).is_err());
    }

    #[test]
    fn rejects_oversized() {
        let w = ChannelWitness::standard(random_sig(), random_sig());
        let mut bytes = w.encode();
        bytes.push(0);
        assert!(ChannelWitness::decode(&bytes).is_err());
    }

    #[test]
    fn rejects_duplicate_indices() {
        let mut bytes = ChannelWitness::standard(random_sig(), random_sig()).encode();
        bytes[130] = 1;
        bytes[131] = 1;
        assert!(ChannelWitness::decode(&bytes).is_err());
    }

    #[test]
    fn rejects_out_of_range_index() {
        let mut bytes = ChannelWitness::standard(random_sig(), random_sig()).encode();
        bytes[131] = 2;
        assert!(ChannelWitness::decode(&bytes).is_err());
    }
}
