use tollgate_codec::{tx_hash, ChannelLockArgs, ChannelWitness, Since};
use tollgate_core::constants::WITNESS_LEN;
use tollgate_core::error::TollgateError;
use tollgate_core::tx::{Script, Transaction, TxInput, TxOutput};
use tollgate_core::types::{Balance, TxHash};
use tollgate_crypto::{refund_message, state_update_message, Keypair};

/// Funding skeleton: one output locking `amount` under the 2-of-2 script.
/// The buyer's wallet supplies inputs and change before broadcasting.
pub fn build_funding_tx(amount: Balance, lock_args: &ChannelLockArgs) -> Transaction {
    Transaction::new(
        vec![],
        vec![TxOutput {
            value: amount,
            lock: lock_args.to_script(),
        }],
    )
}

/// Refund: spends the funding output back to the buyer under a relative
/// time-lock. The buyer holds this, co-signed, before funding ever leaves
/// their wallet.
pub fn build_refund_tx(
    funding_tx_hash: TxHash,
    amount: Balance,
    buyer_pubkey_hash: [u8; 20],
    since: Since,
) -> Transaction {
    Transaction::new(
        vec![TxInput {
            prev_tx_hash: funding_tx_hash,
            prev_index: 0,
            since: since.raw(),
        }],
        vec![TxOutput {
            value: amount,
            lock: Script::single_sig(buyer_pubkey_hash),
        }],
    )
}

/// Seller co-signature over the refund, bound to the refund input's `since`.
///
/// The signed message is `blake2b256(refund_tx_hash ‖ since_le8)` (or the
/// bare hash for a zero `since`); a signature produced here verifies only
/// against the exact `since` the transaction carries.
pub fn seller_sign_refund(
    seller: &Keypair,
    refund_tx: &Transaction,
) -> Result<[u8; 65], TollgateError> {
    let input = refund_tx
        .inputs
        .first()
        .ok_or_else(|| TollgateError::Serialization("refund tx has no input".into()))?;
    let since = Since::from_raw(input.since);
    let msg = refund_message(tx_hash(refund_tx).as_bytes(), since.to_le_bytes());
    seller.sign(&msg)
}

/// Sign the off-chain state update `(channel_id, cumulative, remaining)`.
/// Both parties sign this exact message; the settlement witness carries both.
pub fn sign_state_update(
    signer: &Keypair,
    channel_id: &str,
    cumulative: Balance,
    remaining: Balance,
) -> Result<[u8; 65], TollgateError> {
    signer.sign(&state_update_message(channel_id, cumulative, remaining))
}

/// Settlement: spends the confirmed funding output into a seller output of
/// `cumulative` and a buyer output of the remainder minus fee.
///
/// The buyer output is omitted entirely if the fee consumes the remainder.
pub fn build_settlement_tx(
    funding_tx_hash: TxHash,
    amount: Balance,
    cumulative: Balance,
    seller_pubkey_hash: [u8; 20],
    buyer_pubkey_hash: [u8; 20],
    fee_rate_per_kb: u64,
) -> Result<Transaction, TollgateError> {
    if cumulative > amount {
        return Err(TollgateError::NonMonotonicCumulative {
            prior: amount,
            got: cumulative,
        });
    }

    let mut tx = Transaction::new(
        vec![TxInput {
            prev_tx_hash: funding_tx_hash,
            prev_index: 0,
            since: Since::ZERO.raw(),
        }],
        vec![
            TxOutput {
                value: cumulative,
                lock: Script::single_sig(seller_pubkey_hash),
            },
            TxOutput {
                value: 0, // placeholder until the fee is measured
                lock: Script::single_sig(buyer_pubkey_hash),
            },
        ],
    );

    // Measure with the witness the final tx will carry.
    let size = tollgate_codec::encoded_size(&tx) + 4 + WITNESS_LEN;
    let fee = crate::fee::fee_for_size(size, fee_rate_per_kb);

    let buyer_value = (amount - cumulative).saturating_sub(fee);
    if buyer_value == 0 {
        tx.outputs.pop();
    } else {
        tx.outputs[1].value = buyer_value;
    }
    Ok(tx)
}

/// Attach the 132-byte 2-of-2 witness (buyer slot 0, seller slot 1).
pub fn attach_settlement_witness(
    tx: &mut Transaction,
    buyer_sig: [u8; 65],
    seller_sig: [u8; 65],
) {
    tx.witnesses
        .push(ChannelWitness::standard(buyer_sig, seller_sig).encode());
}
