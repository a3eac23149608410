//! Proof-of-work checking, per-header work accounting, and the classic
//! difficulty retarget.

use crate::block::{bits_from_target, target_from_bits, BlockHeader};
use crate::constants::{RETARGET_INTERVAL, TARGET_TIMESPAN_SECS};
use crate::error::{ErrorCode, TxError};
use num_bigint::BigUint;
use num_traits::One;

/// `work(e) = 2^256 / (target(e) + 1)` (§3 invariants).
pub fn work_from_bits(bits: u32) -> Result<BigUint, TxError> {
    let target = target_from_bits(bits)?;
    let two_256 = BigUint::one() << 256u32;
    Ok(two_256 / (target + BigUint::one()))
}

/// Checks `hash(header) <= target(bits)` and that `bits` itself decodes to
/// a positive, non-overflowing target (§4.1.2).
pub fn check_proof_of_work(header: &BlockHeader) -> Result<(), TxError> {
    let target = target_from_bits(header.bits)?;
    let hash = BigUint::from_bytes_be(&header.block_hash());
    if hash > target {
        return Err(TxError::new(ErrorCode::BlockErrPowInvalid, "hash exceeds target"));
    }
    Ok(())
}

/// Recompute `bits` for the block starting a new retarget window, given the
/// window's first and last header timestamps. `timespan` is clamped to
/// `[expected/4, expected*4]` before being applied, matching the classic
/// difficulty-adjustment algorithm (RETARGET_INTERVAL-block window).
pub fn retarget(prev_bits: u32, first_block_time: u32, last_block_time: u32) -> Result<u32, TxError> {
    let prev_target = target_from_bits(prev_bits)?;

    let actual_timespan = last_block_time.saturating_sub(first_block_time) as u64;
    let min_timespan = TARGET_TIMESPAN_SECS / 4;
    let max_timespan = TARGET_TIMESPAN_SECS * 4;
    let clamped = actual_timespan.clamp(min_timespan, max_timespan);

    let new_target = (&prev_target * BigUint::from(clamped)) / BigUint::from(TARGET_TIMESPAN_SECS);
    Ok(bits_from_target(&new_target))
}

/// Returns `true` if `height` is the first height of a new retarget window
/// (i.e. the block at `height` must carry a recomputed `bits`).
pub fn is_retarget_height(height: u64) -> bool {
    height % RETARGET_INTERVAL == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_increases_as_target_shrinks() {
        let easy = work_from_bits(0x1d00ffff).unwrap();
        let harder = work_from_bits(0x1c00ffff).unwrap();
        assert!(harder > easy);
    }

    #[test]
    fn retarget_is_identity_at_exact_expected_timespan() {
        let bits = 0x1d00ffff;
        let new_bits = retarget(bits, 0, TARGET_TIMESPAN_SECS as u32).unwrap();
        assert_eq!(new_bits, bits);
    }

    #[test]
    fn retarget_clamps_extreme_timespans() {
        let bits = 0x1c00ffff;
        let fast = retarget(bits, 0, 1).unwrap();
        let slow = retarget(bits, 0, (TARGET_TIMESPAN_SECS * 100) as u32).unwrap();
        let t_fast = target_from_bits(fast).unwrap();
        let t_slow = target_from_bits(slow).unwrap();
        let t_orig = target_from_bits(bits).unwrap();
        assert!(t_fast < t_orig, "timespan below min must tighten target");
        assert!(t_slow > t_orig, "timespan above max must loosen target");
    }
}
