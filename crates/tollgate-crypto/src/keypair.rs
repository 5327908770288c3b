use rand::RngCore;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use tollgate_core::constants::PUBKEY_HASH_LEN;
use tollgate_core::error::TollgateError;

use crate::secp::{pubkey_hash, sign_recoverable};

/// A secp256k1 keypair. The secret key bytes are wiped on drop.
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    /// Restore a keypair from raw secret bytes (e.g. the configured seller key).
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, TollgateError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| TollgateError::InvalidPrivateKey)?;
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);
        Ok(Self { secret, public })
    }

    /// Generate a fresh keypair from OS randomness.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let mut buf = Zeroizing::new([0u8; 32]);
            rng.fill_bytes(&mut *buf);
            // Out-of-range candidates are vanishingly rare; retry on them.
            if let Ok(kp) = Self::from_secret_bytes(&buf) {
                return kp;
            }
        }
    }

    /// Sign a 32-byte digest, returning the 65-byte recoverable signature.
    pub fn sign(&self, msg32: &[u8; 32]) -> Result<[u8; 65], TollgateError> {
        sign_recoverable(&self.secret, msg32)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Compressed hex of the public key (the login/registration form).
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.serialize())
    }

    pub fn pubkey_hash(&self) -> [u8; PUBKEY_HASH_LEN] {
        pubkey_hash(&self.public)
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Keypair {{ pubkey_hash: {} }}", hex::encode(self.pubkey_hash()))
    }
}
