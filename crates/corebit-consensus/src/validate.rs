//! Contextual validation (§4.1.3–§4.1.6): checks that need chain state, as
//! opposed to `block_basic`'s checks of a block's own bytes alone.

use crate::block::BlockHeader;
use crate::block_basic::Block;
use crate::constants::{
    COINBASE_MATURITY, LOCKTIME_THRESHOLD, MAX_FUTURE_DRIFT_SECS, SEQUENCE_FINAL,
    SEQUENCE_LOCKTIME_DISABLE_FLAG, SEQUENCE_LOCKTIME_GRANULARITY, SEQUENCE_LOCKTIME_MASK,
    SEQUENCE_LOCKTIME_TYPE_FLAG,
};
use crate::error::{ErrorCode, TxError};
use crate::pow::{is_retarget_height, retarget};
use crate::tx::Transaction;
use corebit_script::{ScriptFlags, ScriptSigContext, ScriptVerifier};
use crate::util::{add_u64, is_version_enforced, is_version_rejected, median_time_past, sub_u64};
use crate::utxo_basic::UtxoView;

/// §4.1.3: a header's `bits` must match what the retarget schedule demands.
/// Outside a retarget height the parent's `bits` carries forward unchanged;
/// at a retarget height it's recomputed from the window's first and last
/// timestamps.
pub fn check_header_difficulty(
    header: &BlockHeader,
    height: u64,
    prev_bits: u32,
    window_times: Option<(u32, u32)>,
) -> Result<(), TxError> {
    let expected_bits = if is_retarget_height(height) {
        let (first, last) = window_times.ok_or_else(|| {
            TxError::new(ErrorCode::BlockErrBadDifficultyBits, "missing retarget window")
        })?;
        retarget(prev_bits, first, last)?
    } else {
        prev_bits
    };
    if header.bits != expected_bits {
        return Err(TxError::new(
            ErrorCode::BlockErrBadDifficultyBits,
            "bits do not match retarget schedule",
        ));
    }
    Ok(())
}

/// §4.1.3: a header's time must be strictly after the median of its last
/// `MEDIAN_TIME_SPAN` ancestors.
pub fn check_header_time(header: &BlockHeader, ancestor_times: &[u32]) -> Result<(), TxError> {
    let mtp = median_time_past(ancestor_times);
    if header.time <= mtp {
        return Err(TxError::new(
            ErrorCode::BlockErrTimeTooOld,
            "header time at or before median-time-past",
        ));
    }
    Ok(())
}

/// §4.1.2: a header may not claim a time more than `MAX_FUTURE_DRIFT_SECS`
/// ahead of the adjusted network time the caller supplies.
pub fn check_header_future_drift(header: &BlockHeader, adjusted_network_time: u64) -> Result<(), TxError> {
    if header.time as u64 > adjusted_network_time + MAX_FUTURE_DRIFT_SECS {
        return Err(TxError::new(ErrorCode::BlockErrTimestampFuture, "header time too far in the future"));
    }
    Ok(())
}

/// §4.1.3/§4.1.6: the legacy super-majority upgrade rule. Once enough of the
/// last `MAJORITY_WINDOW` headers signal `min_version`, blocks below it are
/// invalid; once enough signal it even harder, they're rejected outright.
/// Both thresholds have the same practical effect here: a version floor.
pub fn check_version_super_majority(
    header_version: i32,
    min_version: i32,
    signal_count: u64,
) -> Result<(), TxError> {
    let floor_in_effect = is_version_rejected(signal_count) || is_version_enforced(signal_count);
    if floor_in_effect && header_version < min_version {
        return Err(TxError::new(
            ErrorCode::BlockErrBadVersion,
            "version below super-majority floor",
        ));
    }
    Ok(())
}

/// BIP34-style coinbase height commitment: the coinbase `script_sig` must
/// begin with `height` pushed as a minimally-encoded little-endian integer.
pub fn encode_height_push(height: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut h = height;
    while h > 0 {
        bytes.push((h & 0xff) as u8);
        h >>= 8;
    }
    if bytes.last().is_some_and(|&b| b & 0x80 != 0) {
        bytes.push(0);
    }
    if bytes.is_empty() {
        bytes.push(0);
    }
    let mut out = vec![bytes.len() as u8];
    out.extend_from_slice(&bytes);
    out
}

pub fn check_coinbase_height(coinbase: &Transaction, height: u64) -> Result<(), TxError> {
    let expected = encode_height_push(height);
    let script = &coinbase.inputs[0].script_sig;
    if script.len() < expected.len() || script[..expected.len()] != expected[..] {
        return Err(TxError::new(
            ErrorCode::BlockErrHeightMismatch,
            "coinbase does not commit to height",
        ));
    }
    Ok(())
}

/// §4.1.4: a transaction is final at `(height, cutoff_time)` if its
/// `lock_time` is zero, every input signals `SEQUENCE_FINAL`, or its
/// `lock_time` is already in the past relative to whichever of height/time
/// it's denominated in. `cutoff_time` is the header's own time or the
/// median-time-past, depending on whether BIP113 is active (§4.1.4).
pub fn check_transaction_finality(tx: &Transaction, height: u64, cutoff_time: u32) -> Result<(), TxError> {
    if tx.lock_time == 0 {
        return Ok(());
    }
    if tx.inputs.iter().all(|i| i.sequence == SEQUENCE_FINAL) {
        return Ok(());
    }
    let is_final = if tx.lock_time < LOCKTIME_THRESHOLD {
        (tx.lock_time as u64) < height
    } else {
        tx.lock_time < cutoff_time
    };
    if is_final {
        Ok(())
    } else {
        Err(TxError::new(ErrorCode::TxErrNonFinal, "transaction not yet final"))
    }
}

/// BIP30: a block's coinbase `tx_hash` must not collide with an existing
/// unspent transaction, except for the two grandfathered historical blocks
/// where it's known to have happened before the height rule made it
/// impossible (§4.1.5).
pub fn check_bip30<V: UtxoView>(
    coinbase_txid: &[u8; 32],
    height: u64,
    utxo: &V,
    grandfathered_exceptions: &[(u64, [u8; 32])],
) -> Result<(), TxError> {
    if grandfathered_exceptions
        .iter()
        .any(|(h, hash)| *h == height && hash == coinbase_txid)
    {
        return Ok(());
    }
    if utxo.get_coins(coinbase_txid).is_some() {
        return Err(TxError::new(
            ErrorCode::BlockErrBip30,
            "duplicate coinbase tx hash with unspent outputs",
        ));
    }
    Ok(())
}

/// BIP68 relative lock-time (§4.1.5): evaluated against the spent coin's own
/// creation height and the median-time-past as of the block one before it.
/// A disabled sequence (top bit set) always passes; otherwise the low bits
/// encode either a block-count or (granularity-shifted) a time delta.
pub fn check_sequence_lock(
    sequence: u32,
    coin_height: u64,
    coin_ancestor_mtp: u32,
    spend_height: u64,
    spend_mtp: u32,
) -> Result<(), TxError> {
    if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Ok(());
    }
    let masked = sequence & SEQUENCE_LOCKTIME_MASK;
    if sequence & SEQUENCE_LOCKTIME_TYPE_FLAG != 0 {
        let required_delta = (masked as u64) << SEQUENCE_LOCKTIME_GRANULARITY;
        if (spend_mtp as u64) < (coin_ancestor_mtp as u64) + required_delta {
            return Err(TxError::new(ErrorCode::TxErrBadBip68, "relative time-lock not satisfied"));
        }
    } else {
        let required_height = coin_height + masked as u64;
        if spend_height < required_height {
            return Err(TxError::new(ErrorCode::TxErrBadBip68, "relative height-lock not satisfied"));
        }
    }
    Ok(())
}

/// Per-input ancestor data a caller supplies for BIP68 evaluation, since it
/// isn't part of the `Coins` record itself.
pub struct AncestorMtp {
    pub coin_height: u64,
    pub coin_ancestor_mtp: u32,
}

pub struct InputCheckSummary {
    pub fee: u64,
}

/// §4.1.5: full per-input validation for one non-coinbase transaction —
/// existence, coinbase maturity, BIP68, script verification, and value
/// conservation. `ancestor_mtp_of` is called once per input's prevout.
pub fn check_inputs<V: UtxoView, S: ScriptVerifier>(
    tx: &Transaction,
    height: u64,
    spend_mtp: u32,
    bip68_active: bool,
    utxo: &V,
    verifier: &S,
    flags: ScriptFlags,
    ancestor_mtp_of: impl Fn(u64) -> AncestorMtp,
) -> Result<InputCheckSummary, TxError> {
    let mut sum_in: u64 = 0;
    let tx_bytes = tx.to_bytes();

    for (idx, input) in tx.inputs.iter().enumerate() {
        let coins = utxo
            .get_coins(&input.prev_outpoint.tx_hash)
            .ok_or_else(|| TxError::new(ErrorCode::TxErrMissingUtxo, "missing utxo"))?;
        let output = coins
            .get(input.prev_outpoint.index)
            .ok_or_else(|| TxError::new(ErrorCode::TxErrMissingUtxo, "missing or spent utxo"))?
            .clone();

        if coins.is_coinbase && height < coins.height + COINBASE_MATURITY {
            return Err(TxError::new(
                ErrorCode::TxErrPrematureSpendOfCoinbase,
                "coinbase not yet mature",
            ));
        }

        if bip68_active {
            let ancestor = ancestor_mtp_of(coins.height);
            check_sequence_lock(input.sequence, ancestor.coin_height, ancestor.coin_ancestor_mtp, height, spend_mtp)?;
        }

        sum_in = add_u64(sum_in, output.value)?;

        let ctx = ScriptSigContext {
            tx_bytes: &tx_bytes,
            input_index: idx,
            prev_value: output.value,
        };
        let ok = verifier
            .verify(&input.script_sig, &output.script_pubkey, flags, &ctx)
            .map_err(|_| TxError::new(ErrorCode::TxErrScriptVerifyFailed, "script verification failed"))?;
        if !ok {
            return Err(TxError::new(
                ErrorCode::TxErrScriptVerifyFailed,
                "script verification failed",
            ));
        }
    }

    let mut sum_out: u64 = 0;
    for out in &tx.outputs {
        sum_out = add_u64(sum_out, out.value)?;
    }
    let fee = sub_u64(sum_in, sum_out)?;
    Ok(InputCheckSummary { fee })
}

/// §4.1.4: the contextual part of block validity beyond `block_basic`'s
/// byte-level checks — coinbase height commitment, BIP30, and per-tx
/// finality. The block-size schedule is already enforced in `check_block`
/// since it only needs the header's own timestamp.
pub fn check_block_context<V: UtxoView>(
    block: &Block,
    height: u64,
    finality_cutoff_time: u32,
    utxo: &V,
    grandfathered_bip30_exceptions: &[(u64, [u8; 32])],
) -> Result<(), TxError> {
    check_coinbase_height(&block.transactions[0], height)?;
    check_bip30(
        &block.transactions[0].txid(),
        height,
        utxo,
        grandfathered_bip30_exceptions,
    )?;
    for tx in &block.transactions[1..] {
        check_transaction_finality(tx, height, finality_cutoff_time)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_push_roundtrips_through_check() {
        let push = encode_height_push(500_000);
        assert_eq!(push[0] as usize, push.len() - 1);
    }

    #[test]
    fn transaction_final_when_locktime_in_past_by_height() {
        let tx = Transaction {
            version: 1,
            inputs: vec![crate::tx::TxInput {
                prev_outpoint: crate::tx::Outpoint { tx_hash: [0; 32], index: 0 },
                script_sig: vec![],
                sequence: 0,
            }],
            outputs: vec![crate::tx::TxOutput { value: 1, script_pubkey: vec![] }],
            lock_time: 100,
        };
        assert!(check_transaction_finality(&tx, 101, 0).is_ok());
        assert!(check_transaction_finality(&tx, 100, 0).is_err());
    }

    #[test]
    fn future_drift_rejects_headers_too_far_ahead() {
        let mut header = BlockHeader {
            version: 1,
            prev_hash: [0; 32],
            merkle_root: [0; 32],
            time: 1_000,
            bits: 0x1d00ffff,
            nonce: 0,
        };
        assert!(check_header_future_drift(&header, 1_000).is_ok());
        header.time = 1_000 + crate::constants::MAX_FUTURE_DRIFT_SECS as u32;
        assert!(check_header_future_drift(&header, 1_000).is_ok());
        header.time += 1;
        assert!(check_header_future_drift(&header, 1_000).is_err());
    }

    #[test]
    fn sequence_lock_height_based() {
        assert!(check_sequence_lock(5, 100, 0, 105, 0).is_ok());
        assert!(check_sequence_lock(5, 100, 0, 104, 0).is_err());
    }

    #[test]
    fn sequence_lock_time_based() {
        let seq = SEQUENCE_LOCKTIME_TYPE_FLAG | 2; // 2 << 9 = 1024 seconds
        assert!(check_sequence_lock(seq, 100, 1_000, 200, 2_024).is_ok());
        assert!(check_sequence_lock(seq, 100, 1_000, 200, 2_023).is_err());
    }

    #[test]
    fn bip30_rejects_collision_except_at_grandfathered_height() {
        let mut set = crate::utxo_basic::InMemoryUtxoSet::new();
        let txid = [0x42; 32];
        let coinbase = Transaction {
            version: 1,
            inputs: vec![crate::tx::TxInput {
                prev_outpoint: crate::tx::Outpoint {
                    tx_hash: [0; 32],
                    index: crate::tx::NULL_OUTPOINT_INDEX,
                },
                script_sig: vec![1, 2],
                sequence: 0,
            }],
            outputs: vec![crate::tx::TxOutput { value: 1, script_pubkey: vec![] }],
            lock_time: 0,
        };
        set.add_tx_outputs(txid, &coinbase, 10, true);

        assert!(check_bip30(&txid, 91_722, &set, &[(91_722, txid)]).is_ok());
        assert!(check_bip30(&txid, 91_723, &set, &[(91_722, txid)]).is_err());
    }
}
