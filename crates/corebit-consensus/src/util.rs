//! Small checked-arithmetic and majority-window helpers shared by the
//! validation entry points.

use crate::constants::{MAJORITY_ENFORCE_BLOCK_UPGRADE, MAJORITY_REJECT_BLOCK_OUTDATED, MAJORITY_WINDOW};
use crate::error::{ErrorCode, TxError};

pub(crate) fn add_u64(a: u64, b: u64) -> Result<u64, TxError> {
    a.checked_add(b)
        .ok_or_else(|| TxError::new(ErrorCode::TxErrValueOverflow, "u64 addition overflow"))
}

pub(crate) fn sub_u64(a: u64, b: u64) -> Result<u64, TxError> {
    a.checked_sub(b)
        .ok_or_else(|| TxError::new(ErrorCode::TxErrValueConservation, "u64 subtraction underflow"))
}

/// Median of up to the last 11 ancestor timestamps (§9 glossary), given
/// `timestamps` ordered oldest-first ending at the immediate parent. Near
/// genesis, fewer than 11 ancestors may exist — the median is taken over
/// whatever is available (Open Question #3, resolved in SPEC_FULL.md §C).
pub fn median_time_past(timestamps: &[u32]) -> u32 {
    if timestamps.is_empty() {
        return 0;
    }
    let start = timestamps.len().saturating_sub(crate::constants::MEDIAN_TIME_SPAN);
    let mut window: Vec<u32> = timestamps[start..].to_vec();
    window.sort_unstable();
    window[(window.len() - 1) / 2]
}

/// Legacy per-block super-majority signal: `version` counts as a signal for
/// `min_version` if it's `>= min_version`. Returns the count of signaling
/// headers within the trailing `MAJORITY_WINDOW` (§4.1.3, §4.1.6).
pub fn count_version_signals(recent_versions: &[i32], min_version: i32) -> u64 {
    let start = recent_versions.len().saturating_sub(MAJORITY_WINDOW as usize);
    recent_versions[start..]
        .iter()
        .filter(|&&v| v >= min_version)
        .count() as u64
}

/// Whether `min_version` should be enforced as a block-validity requirement
/// at this height, given the trailing-window signal count (§4.1.3).
pub fn is_version_enforced(signal_count: u64) -> bool {
    signal_count >= MAJORITY_ENFORCE_BLOCK_UPGRADE
}

/// Whether blocks below `min_version` should be outright rejected (§4.1.3).
pub fn is_version_rejected(signal_count: u64) -> bool {
    signal_count >= MAJORITY_REJECT_BLOCK_OUTDATED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_full_window_is_middle_element() {
        let ts: Vec<u32> = (0..11).collect();
        assert_eq!(median_time_past(&ts), 5);
    }

    #[test]
    fn median_near_genesis_uses_available_ancestors() {
        assert_eq!(median_time_past(&[10, 20, 30]), 20);
        assert_eq!(median_time_past(&[]), 0);
    }

    #[test]
    fn majority_thresholds() {
        assert!(!is_version_enforced(749));
        assert!(is_version_enforced(750));
        assert!(!is_version_rejected(949));
        assert!(is_version_rejected(950));
    }
}
