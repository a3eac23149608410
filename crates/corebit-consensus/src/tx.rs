//! Transaction data model and wire codec.

use crate::compactsize::{compact_size_encode, read_compact_size};
use crate::error::{ErrorCode, TxError};
use crate::hash::dsha256;
use crate::wire_read::Reader;

pub const NULL_OUTPOINT_INDEX: u32 = u32::MAX;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Outpoint {
    pub tx_hash: [u8; 32],
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub prev_outpoint: Outpoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl TxInput {
    pub fn is_null_prevout(&self) -> bool {
        self.prev_outpoint.tx_hash == [0u8; 32]
            && self.prev_outpoint.index == NULL_OUTPOINT_INDEX
    }
}

impl Transaction {
    /// The first transaction of a block has one input with a null prevout
    /// (§3). Whether it sits in first position is a block-level concern.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_null_prevout()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&compact_size_encode(self.inputs.len() as u64));
        for input in &self.inputs {
            out.extend_from_slice(&input.prev_outpoint.tx_hash);
            out.extend_from_slice(&input.prev_outpoint.index.to_le_bytes());
            out.extend_from_slice(&compact_size_encode(input.script_sig.len() as u64));
            out.extend_from_slice(&input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        out.extend_from_slice(&compact_size_encode(self.outputs.len() as u64));
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            out.extend_from_slice(&compact_size_encode(output.script_pubkey.len() as u64));
            out.extend_from_slice(&output.script_pubkey);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    pub fn txid(&self) -> [u8; 32] {
        dsha256(&self.to_bytes())
    }

    /// Serialized size in bytes, used by the max-tx-size and block-size
    /// checks. This model carries no witness discount: script internals
    /// are opaque (§1 Non-goals).
    pub fn serialized_size(&self) -> usize {
        self.to_bytes().len()
    }
}

/// Parse a single transaction from the front of `bytes`, returning the
/// transaction and the number of bytes consumed.
pub fn parse_tx(bytes: &[u8]) -> Result<(Transaction, usize), TxError> {
    let mut r = Reader::new(bytes);
    let version = i32::from_le_bytes(r.read_bytes(4)?.try_into().unwrap());

    let (n_inputs, _) = read_compact_size(&mut r)?;
    if n_inputs == 0 {
        return Err(TxError::new(ErrorCode::TxErrEmpty, "no inputs"));
    }
    let mut inputs = Vec::with_capacity(n_inputs as usize);
    for _ in 0..n_inputs {
        let mut tx_hash = [0u8; 32];
        tx_hash.copy_from_slice(r.read_bytes(32)?);
        let index = u32::from_le_bytes(r.read_bytes(4)?.try_into().unwrap());
        let (script_len, _) = read_compact_size(&mut r)?;
        let script_sig = r.read_bytes(script_len as usize)?.to_vec();
        let sequence = u32::from_le_bytes(r.read_bytes(4)?.try_into().unwrap());
        inputs.push(TxInput {
            prev_outpoint: Outpoint { tx_hash, index },
            script_sig,
            sequence,
        });
    }

    let (n_outputs, _) = read_compact_size(&mut r)?;
    if n_outputs == 0 {
        return Err(TxError::new(ErrorCode::TxErrEmpty, "no outputs"));
    }
    let mut outputs = Vec::with_capacity(n_outputs as usize);
    for _ in 0..n_outputs {
        let value = u64::from_le_bytes(r.read_bytes(8)?.try_into().unwrap());
        let (script_len, _) = read_compact_size(&mut r)?;
        let script_pubkey = r.read_bytes(script_len as usize)?.to_vec();
        outputs.push(TxOutput {
            value,
            script_pubkey,
        });
    }

    let lock_time = u32::from_le_bytes(r.read_bytes(4)?.try_into().unwrap());

    Ok((
        Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        },
        r.offset(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_outpoint: Outpoint {
                    tx_hash: [0x11; 32],
                    index: 0,
                },
                script_sig: vec![1, 2, 3],
                sequence: 0xffff_ffff,
            }],
            outputs: vec![TxOutput {
                value: 5000,
                script_pubkey: vec![0xaa, 0xbb],
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn roundtrip() {
        let tx = sample_tx();
        let bytes = tx.to_bytes();
        let (parsed, consumed) = parse_tx(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, tx);
    }

    #[test]
    fn coinbase_detection() {
        let mut tx = sample_tx();
        assert!(!tx.is_coinbase());
        tx.inputs[0].prev_outpoint = Outpoint {
            tx_hash: [0u8; 32],
            index: NULL_OUTPOINT_INDEX,
        };
        assert!(tx.is_coinbase());
    }

    #[test]
    fn rejects_empty_inputs() {
        let tx = sample_tx();
        let mut out = Vec::new();
        out.extend_from_slice(&tx.version.to_le_bytes());
        out.extend_from_slice(&compact_size_encode(0));
        out.extend_from_slice(&compact_size_encode(tx.outputs.len() as u64));
        for output in &tx.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            out.extend_from_slice(&compact_size_encode(output.script_pubkey.len() as u64));
            out.extend_from_slice(&output.script_pubkey);
        }
        out.extend_from_slice(&tx.lock_time.to_le_bytes());
        assert!(parse_tx(&out).is_err());
    }
}
