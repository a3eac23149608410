//! Block data model, wire codec, and the context-free checks of §4.1.2:
//! those that depend only on the block's own bytes, not on chain state.

use crate::block::BlockHeader;
use crate::compactsize::{compact_size_encode, read_compact_size};
use crate::constants::{
    MAX_BLOCK_SIZE_LEGACY, MAX_BLOCK_SIZE_POST_FORK, MAX_COINBASE_SCRIPT_SIG_BYTES,
    MAX_MONEY, MIN_COINBASE_SCRIPT_SIG_BYTES, SIGOPS_PER_SIZE_BYTE_DIVISOR,
};
use crate::error::{ErrorCode, TxError};
use crate::merkle::compute_merkle_root;
use crate::pow::check_proof_of_work;
use crate::tx::{parse_tx, Transaction};
use crate::wire_read::Reader;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header.to_bytes().to_vec();
        out.extend_from_slice(&compact_size_encode(self.transactions.len() as u64));
        for tx in &self.transactions {
            out.extend_from_slice(&tx.to_bytes());
        }
        out
    }

    pub fn txids(&self) -> Vec<[u8; 32]> {
        self.transactions.iter().map(Transaction::txid).collect()
    }
}

pub fn parse_block(bytes: &[u8]) -> Result<Block, TxError> {
    if bytes.len() < crate::block::BLOCK_HEADER_BYTES {
        return Err(TxError::new(ErrorCode::BlockErrParse, "block too short"));
    }
    let header = BlockHeader::from_bytes(&bytes[..crate::block::BLOCK_HEADER_BYTES])?;

    let mut r = Reader::new(&bytes[crate::block::BLOCK_HEADER_BYTES..]);
    let (tx_count, _) = read_compact_size(&mut r)?;
    if tx_count == 0 {
        return Err(TxError::new(ErrorCode::BlockErrFirstTxNotCoinbase, "empty tx list"));
    }

    let rest = &bytes[crate::block::BLOCK_HEADER_BYTES..];
    let mut transactions = Vec::with_capacity(tx_count as usize);
    for _ in 0..tx_count {
        let consumed_so_far = r.offset();
        let (tx, consumed) = parse_tx(&rest[consumed_so_far..])?;
        transactions.push(tx);
        r.read_bytes(consumed)?;
    }

    if crate::block::BLOCK_HEADER_BYTES + r.offset() != bytes.len() {
        return Err(TxError::new(ErrorCode::BlockErrParse, "trailing bytes after tx list"));
    }

    Ok(Block { header, transactions })
}

/// `max_block_size(time)` (§6): a flat step function of the header
/// timestamp, per the Open Question resolution in SPEC_FULL.md §C.
pub fn max_block_size(time: u32) -> u64 {
    if (time as u64) >= crate::constants::BLOCK_SIZE_FORK_TIME {
        MAX_BLOCK_SIZE_POST_FORK
    } else {
        MAX_BLOCK_SIZE_LEGACY
    }
}

/// Approximate sigops: one per scriptSig/scriptPubKey byte pair divided by
/// the size-based ceiling's divisor. Script internals are opaque (§1
/// Non-goals), so this counts total scanned bytes rather than real opcodes.
fn approx_sigops(tx: &Transaction) -> u64 {
    let mut total = 0u64;
    for input in &tx.inputs {
        total += input.script_sig.len() as u64;
    }
    for output in &tx.outputs {
        total += output.script_pubkey.len() as u64;
    }
    total
}

/// Context-free transaction check (§4.1.1): everything derivable from the
/// transaction's own bytes.
pub fn check_transaction(tx: &Transaction) -> Result<(), TxError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TxError::new(ErrorCode::TxErrEmpty, "empty inputs or outputs"));
    }
    if tx.serialized_size() > crate::constants::MAX_TX_SIZE {
        return Err(TxError::new(ErrorCode::TxErrOversize, "tx exceeds max size"));
    }

    let mut sum_out: u64 = 0;
    for out in &tx.outputs {
        if out.value > MAX_MONEY {
            return Err(TxError::new(ErrorCode::TxErrValueOutOfRange, "output value exceeds MAX_MONEY"));
        }
        sum_out = crate::util::add_u64(sum_out, out.value)?;
        if sum_out > MAX_MONEY {
            return Err(TxError::new(ErrorCode::TxErrValueOverflow, "sum of outputs exceeds MAX_MONEY"));
        }
    }

    if tx.is_coinbase() {
        let len = tx.inputs[0].script_sig.len();
        if !(MIN_COINBASE_SCRIPT_SIG_BYTES..=MAX_COINBASE_SCRIPT_SIG_BYTES).contains(&len) {
            return Err(TxError::new(ErrorCode::TxErrCoinbaseScriptSize, "coinbase script_sig out of range"));
        }
    } else {
        for input in &tx.inputs {
            if input.is_null_prevout() {
                return Err(TxError::new(
                    ErrorCode::TxErrNullPrevoutNonCoinbase,
                    "null prevout in non-coinbase tx",
                ));
            }
        }
        let mut seen = std::collections::HashSet::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            if !seen.insert(&input.prev_outpoint) {
                return Err(TxError::new(ErrorCode::TxErrDuplicateInput, "duplicate input outpoint"));
            }
        }
    }

    Ok(())
}

pub struct BlockBasicSummary {
    pub block_hash: [u8; 32],
    pub total_sigops: u64,
    pub serialized_size: usize,
}

/// Context-free block check (§4.1.2): proof-of-work, merkle root (and its
/// duplicate-tail mutation), coinbase positioning, per-tx checks, and the
/// size/sigop ceilings from the header's own timestamp.
pub fn check_block(block: &Block) -> Result<BlockBasicSummary, TxError> {
    check_proof_of_work(&block.header)?;

    if block.transactions.is_empty() {
        return Err(TxError::new(ErrorCode::BlockErrFirstTxNotCoinbase, "empty block"));
    }
    if !block.transactions[0].is_coinbase() {
        return Err(TxError::new(ErrorCode::BlockErrFirstTxNotCoinbase, "first tx is not coinbase"));
    }
    for tx in &block.transactions[1..] {
        if tx.is_coinbase() {
            return Err(TxError::new(ErrorCode::BlockErrMultipleCoinbase, "coinbase-shaped tx beyond index 0"));
        }
    }

    for tx in &block.transactions {
        check_transaction(tx)?;
    }

    let txids = block.txids();
    let merkle = compute_merkle_root(&txids);
    if merkle.mutated {
        return Err(TxError::new(ErrorCode::BlockErrMerkleMutated, "duplicate-tail merkle mutation"));
    }
    if merkle.root != block.header.merkle_root {
        return Err(TxError::new(ErrorCode::BlockErrMerkleInvalid, "merkle root mismatch"));
    }

    let serialized = block.to_bytes();
    let cap = max_block_size(block.header.time);
    if serialized.len() as u64 > cap {
        return Err(TxError::new(ErrorCode::BlockErrSizeExceeded, "block exceeds max_block_size"));
    }

    let total_sigops: u64 = block.transactions.iter().map(approx_sigops).sum();
    let sigop_cap = cap / SIGOPS_PER_SIZE_BYTE_DIVISOR;
    if total_sigops > sigop_cap {
        return Err(TxError::new(ErrorCode::BlockErrSigopsExceeded, "block exceeds sigop ceiling"));
    }

    Ok(BlockBasicSummary {
        block_hash: block.header.block_hash(),
        total_sigops,
        serialized_size: serialized.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{Outpoint, TxInput, TxOutput, NULL_OUTPOINT_INDEX};

    fn coinbase(height_script: Vec<u8>) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_outpoint: Outpoint {
                    tx_hash: [0u8; 32],
                    index: NULL_OUTPOINT_INDEX,
                },
                script_sig: height_script,
                sequence: 0xffff_ffff,
            }],
            outputs: vec![TxOutput {
                value: 50_0000_0000,
                script_pubkey: vec![0xaa],
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn rejects_empty_block() {
        let block = Block {
            header: BlockHeader {
                version: 1,
                prev_hash: [0; 32],
                merkle_root: [0; 32],
                time: 0,
                bits: 0x1d00ffff,
                nonce: 0,
            },
            transactions: vec![],
        };
        assert!(check_block(&block).is_err());
    }

    #[test]
    fn rejects_second_coinbase() {
        let tx0 = coinbase(vec![1, 2]);
        let tx1 = coinbase(vec![1, 2]);
        let txids = vec![tx0.txid(), tx1.txid()];
        let merkle = compute_merkle_root(&txids);
        let block = Block {
            header: BlockHeader {
                version: 1,
                prev_hash: [0; 32],
                merkle_root: merkle.root,
                time: 0,
                bits: 0x1d00ffff,
                nonce: 0,
            },
            transactions: vec![tx0, tx1],
        };
        let err = check_block(&block).unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockErrMultipleCoinbase);
    }

    #[test]
    fn transaction_checks_reject_empty_inputs_or_outputs() {
        let mut tx = coinbase(vec![1, 2]);
        tx.outputs.clear();
        assert!(check_transaction(&tx).is_err());
    }
}
