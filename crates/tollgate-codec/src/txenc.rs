//! Canonical transaction byte encoding.
//!
//! The raw encoding (inputs and outputs, no witnesses) is what the
//! transaction hash commits to; the full encoding including witnesses is
//! what the fee policy measures. All integers are little-endian, all
//! variable-length fields are length-prefixed with a u32.

use tollgate_core::tx::{Script, Transaction, TxInput, TxOutput};
use tollgate_core::types::TxHash;
use tollgate_crypto::blake2b_256;

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn encode_script(out: &mut Vec<u8>, script: &Script) {
    out.extend_from_slice(&script.code_hash);
    out.push(script.hash_type.as_byte());
    put_u32(out, script.args.len() as u32);
    out.extend_from_slice(&script.args);
}

fn encode_input(out: &mut Vec<u8>, input: &TxInput) {
    out.extend_from_slice(input.prev_tx_hash.as_bytes());
    put_u32(out, input.prev_index);
    put_u64(out, input.since);
}

fn encode_output(out: &mut Vec<u8>, output: &TxOutput) {
    put_u64(out, output.value);
    encode_script(out, &output.lock);
}

/// Canonical raw bytes: input count, inputs, output count, outputs.
pub fn encode_raw(tx: &Transaction) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + tx.inputs.len() * 44 + tx.outputs.len() * 128);
    put_u32(&mut out, tx.inputs.len() as u32);
    for input in &tx.inputs {
        encode_input(&mut out, input);
    }
    put_u32(&mut out, tx.outputs.len() as u32);
    for output in &tx.outputs {
        encode_output(&mut out, output);
    }
    out
}

/// blake2b-256 over the canonical raw encoding. Witnesses never affect the
/// hash a refund or settlement signature commits to.
pub fn tx_hash(tx: &Transaction) -> TxHash {
    TxHash::from_bytes(blake2b_256(&encode_raw(tx)))
}

/// Size in bytes of the fully encoded transaction (raw + witnesses),
/// the measure the per-kb fee policy applies to.
pub fn encoded_size(tx: &Transaction) -> usize {
    let mut size = encode_raw(tx).len() + 4;
    for w in &tx.witnesses {
        size += 4 + w.len();
    }
    size
}
