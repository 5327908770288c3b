//! keygen — generate a secp256k1 keypair for channel parties.
//!
//! Prints the secret key hex (for `TOLLGATE_SELLER_PRIVATE_KEY` or a buyer
//! wallet), the compressed public key (the login form) and the derived
//! 20-byte pubkey hash. Writes to stdout only; nothing touches the store.

use rand::RngCore;

use tollgate_crypto::Keypair;

fn main() {
    let mut secret = [0u8; 32];
    let keypair = loop {
        rand::thread_rng().fill_bytes(&mut secret);
        // Out-of-range scalars are vanishingly rare; retry on them.
        if let Ok(kp) = Keypair::from_secret_bytes(&secret) {
            break kp;
        }
    };

    println!("secret key:  {}", hex::encode(secret));
    println!("public key:  {}", keypair.public_key_hex());
    println!("pubkey hash: {}", hex::encode(keypair.pubkey_hash()));
    eprintln!();
    eprintln!("Keep the secret key out of shell history and logs.");
}
