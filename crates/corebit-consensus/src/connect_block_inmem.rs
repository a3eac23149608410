//! A pure, in-memory block application helper that ties `block_basic`,
//! `validate`, and `utxo_basic` together. Used by tests here and by
//! corebit-chain's real `connect_block`, which layers the persistent store
//! and undo-log bookkeeping on top of the same sequence of calls.

use crate::block_basic::{check_block, Block};
use crate::error::{ErrorCode, TxError};
use crate::subsidy::block_subsidy;
use crate::util::add_u64;
use crate::utxo_basic::InMemoryUtxoSet;
use crate::validate::{check_block_context, check_inputs, AncestorMtp};
use corebit_script::{ScriptFlags, ScriptVerifier};

pub struct ConnectBlockParams<'a> {
    pub height: u64,
    /// `block.time` or `median_time_past(prev)`, per whether BIP113 is
    /// active at this height (§4.1.4).
    pub finality_cutoff_time: u32,
    pub spend_mtp: u32,
    pub bip68_active: bool,
    pub script_flags: ScriptFlags,
    pub grandfathered_bip30_exceptions: &'a [(u64, [u8; 32])],
}

pub struct ConnectBlockSummary {
    pub total_fees: u64,
    pub block_hash: [u8; 32],
}

/// Runs a block's full validation against `utxo` and, if it passes, applies
/// it: spends the inputs it consumes and adds every output (coinbase
/// included) to the set. Leaves `utxo` untouched on error.
pub fn connect_block<S: ScriptVerifier>(
    block: &Block,
    params: &ConnectBlockParams<'_>,
    utxo: &mut InMemoryUtxoSet,
    verifier: &S,
    ancestor_mtp_of: impl Fn(u64) -> AncestorMtp,
) -> Result<ConnectBlockSummary, TxError> {
    let summary = check_block(block)?;

    check_block_context(
        block,
        params.height,
        params.finality_cutoff_time,
        utxo,
        params.grandfathered_bip30_exceptions,
    )?;

    let mut working = utxo.clone();
    let mut total_fees = 0u64;

    for tx in &block.transactions[1..] {
        let result = check_inputs(
            tx,
            params.height,
            params.spend_mtp,
            params.bip68_active,
            &working,
            verifier,
            params.script_flags,
            &ancestor_mtp_of,
        )?;
        total_fees = add_u64(total_fees, result.fee)?;

        for input in &tx.inputs {
            working.spend(&input.prev_outpoint);
        }
        working.add_tx_outputs(tx.txid(), tx, params.height, false);
    }

    let coinbase = &block.transactions[0];
    let mut coinbase_value = 0u64;
    for out in &coinbase.outputs {
        coinbase_value = add_u64(coinbase_value, out.value)?;
    }
    let max_coinbase = add_u64(block_subsidy(params.height), total_fees)?;
    if coinbase_value > max_coinbase {
        return Err(TxError::new(ErrorCode::BlockErrBadCbAmount, "coinbase pays more than subsidy plus fees"));
    }
    working.add_tx_outputs(coinbase.txid(), coinbase, params.height, true);

    *utxo = working;
    Ok(ConnectBlockSummary {
        total_fees,
        block_hash: summary.block_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockHeader;
    use crate::merkle::compute_merkle_root;
    use crate::tx::{Outpoint, Transaction, TxInput, TxOutput, NULL_OUTPOINT_INDEX};
    use corebit_script::{ScriptSigContext, SCRIPT_VERIFY_NONE};

    struct AlwaysValid;
    impl ScriptVerifier for AlwaysValid {
        fn verify(&self, _: &[u8], _: &[u8], _: ScriptFlags, _: &ScriptSigContext<'_>) -> Result<bool, String> {
            Ok(true)
        }
    }

    fn coinbase(value: u64, height_script: Vec<u8>) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_outpoint: Outpoint { tx_hash: [0; 32], index: NULL_OUTPOINT_INDEX },
                script_sig: height_script,
                sequence: 0xffff_ffff,
            }],
            outputs: vec![TxOutput { value, script_pubkey: vec![0xaa] }],
            lock_time: 0,
        }
    }

    fn block_from(txs: Vec<Transaction>, time: u32) -> Block {
        let txids: Vec<_> = txs.iter().map(Transaction::txid).collect();
        let merkle = compute_merkle_root(&txids);
        Block {
            header: BlockHeader {
                version: 1,
                prev_hash: [0; 32],
                merkle_root: merkle.root,
                time,
                bits: 0x207fffff,
                nonce: 0,
            },
            transactions: txs,
        }
    }

    fn params(height: u64, time: u32) -> ConnectBlockParams<'static> {
        ConnectBlockParams {
            height,
            finality_cutoff_time: time,
            spend_mtp: time,
            bip68_active: false,
            script_flags: SCRIPT_VERIFY_NONE,
            grandfathered_bip30_exceptions: &[],
        }
    }

    #[test]
    fn accepts_coinbase_only_block_and_credits_subsidy() {
        let cb = coinbase(50_0000_0000, crate::validate::encode_height_push(1));
        let block = block_from(vec![cb], 1_000);
        let mut utxo = InMemoryUtxoSet::new();
        let p = params(1, 1_000);
        let result = connect_block(&block, &p, &mut utxo, &AlwaysValid, |_| AncestorMtp {
            coin_height: 0,
            coin_ancestor_mtp: 0,
        });
        assert!(result.is_ok());
        assert_eq!(utxo.coins.len(), 1);
    }

    #[test]
    fn rejects_coinbase_paying_more_than_subsidy() {
        let cb = coinbase(50_0000_0001, crate::validate::encode_height_push(1));
        let block = block_from(vec![cb], 1_000);
        let mut utxo = InMemoryUtxoSet::new();
        let p = params(1, 1_000);
        let err = connect_block(&block, &p, &mut utxo, &AlwaysValid, |_| AncestorMtp {
            coin_height: 0,
            coin_ancestor_mtp: 0,
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockErrBadCbAmount);
    }
}
