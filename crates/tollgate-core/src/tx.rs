//! On-chain transaction skeletons.
//!
//! These are the engine's typed view of the UTXO transactions it builds and
//! signs: fixed-size byte fields, no dynamic JSON. The canonical byte
//! encoding (and the hash it commits to) lives in `tollgate-codec`;
//! `serde_json` renditions of these values appear only at external
//! boundaries (channel offers, persisted `transaction_data`).

use serde::{Deserialize, Serialize};

use crate::types::{Balance, TxHash};

// ── HashType ─────────────────────────────────────────────────────────────────

/// How the lock `code_hash` is resolved by the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    Data,
    Type,
    Data1,
    Data2,
}

impl HashType {
    pub fn as_byte(&self) -> u8 {
        match self {
            HashType::Data => 0,
            HashType::Type => 1,
            HashType::Data1 => 2,
            HashType::Data2 => 4,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(HashType::Data),
            1 => Some(HashType::Type),
            2 => Some(HashType::Data1),
            4 => Some(HashType::Data2),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "data" => Some(HashType::Data),
            "type" => Some(HashType::Type),
            "data1" => Some(HashType::Data1),
            "data2" => Some(HashType::Data2),
            _ => None,
        }
    }
}

// ── Script ───────────────────────────────────────────────────────────────────

/// A lock script reference: which code guards an output and with what args.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub code_hash: [u8; 32],
    pub hash_type: HashType,
    #[serde(with = "hex_bytes")]
    pub args: Vec<u8>,
}

impl Script {
    pub fn new(code_hash: [u8; 32], hash_type: HashType, args: Vec<u8>) -> Self {
        Self {
            code_hash,
            hash_type,
            args,
        }
    }

    /// Standard single-sig payout lock for a 20-byte pubkey hash.
    pub fn single_sig(pubkey_hash: [u8; 20]) -> Self {
        Self {
            code_hash: crate::constants::SIGHASH_CODE_HASH,
            hash_type: HashType::Type,
            args: pubkey_hash.to_vec(),
        }
    }
}

// ── Inputs / outputs ─────────────────────────────────────────────────────────

/// A reference to a previous output being spent, with its time-lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_tx_hash: TxHash,
    pub prev_index: u32,
    /// Raw 8-byte `since` value (0 = no time-lock). Interpretation of the
    /// flag byte lives in `tollgate-codec`.
    pub since: u64,
}

/// A created output: value locked under a script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: Balance,
    pub lock: Script,
}

// ── Transaction ──────────────────────────────────────────────────────────────

/// A transaction skeleton. Witnesses authenticate inputs and are excluded
/// from the raw hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    #[serde(with = "hex_witnesses")]
    pub witnesses: Vec<Vec<u8>>,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            inputs,
            outputs,
            witnesses: Vec::new(),
        }
    }

    /// Total value of all outputs.
    pub fn total_output_value(&self) -> Balance {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

// ── Hex serde helpers ────────────────────────────────────────────────────────

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

mod hex_witnesses {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(ws: &[Vec<u8>], ser: S) -> Result<S::Ok, S::Error> {
        let mut seq = ser.serialize_seq(Some(ws.len()))?;
        for w in ws {
            seq.serialize_element(&hex::encode(w))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let strings = Vec::<String>::deserialize(de)?;
        strings
            .into_iter()
            .map(|s| hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom))
            .collect()
    }
}
