//! Consensus constants. Every magic number the validation engine compares
//! against lives here so a single diff shows the whole rule-parameter
//! surface.

/// Serialized transaction size ceiling (§4.1.1).
pub const MAX_TX_SIZE: usize = 1_000_000;

/// Largest representable output value / running sum (21e6 * 1e8).
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

/// Coinbase `script_sig` length bounds (§4.1.1).
pub const MIN_COINBASE_SCRIPT_SIG_BYTES: usize = 2;
pub const MAX_COINBASE_SCRIPT_SIG_BYTES: usize = 100;

/// Blocks a coinbase output must age before it is spendable (§4.1.5, §6).
pub const COINBASE_MATURITY: u64 = 100;

/// Below this, `lock_time` is a block height; at or above, a unix timestamp.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// An input signals "final, ignore my lock_time" with this sequence value.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// BIP68: top bit disables relative lock-time semantics for this input.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;
/// BIP68: bit distinguishing seconds-granularity (set) from block-count (clear).
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;
/// BIP68: mask over the low bits carrying the relative-lock value.
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;
/// BIP68 seconds-granularity values are left-shifted by this many bits.
pub const SEQUENCE_LOCKTIME_GRANULARITY: u32 = 9;

/// Accepted future-drift for a header's timestamp (§4.1.2): 2 hours.
pub const MAX_FUTURE_DRIFT_SECS: u64 = 2 * 60 * 60;

/// Number of ancestor timestamps folded into median-time-past (§9 glossary).
pub const MEDIAN_TIME_SPAN: usize = 11;

/// Legacy per-block super-majority upgrade windows (§4.1.3).
pub const MAJORITY_WINDOW: u64 = 1000;
pub const MAJORITY_REJECT_BLOCK_OUTDATED: u64 = 950;
pub const MAJORITY_ENFORCE_BLOCK_UPGRADE: u64 = 750;

/// Subsidy halving interval and cutoff (§6).
pub const HALVING_INTERVAL: u64 = 210_000;
pub const INITIAL_SUBSIDY_SATOSHI: u64 = 50 * 100_000_000;
pub const MAX_HALVINGS: u64 = 64;

/// Classic difficulty-retarget window: height % interval == 0 triggers a
/// recompute, and the actual timespan is clamped to a [/4, *4] band.
pub const RETARGET_INTERVAL: u64 = 2016;
pub const TARGET_BLOCK_SPACING_SECS: u64 = 600;
pub const TARGET_TIMESPAN_SECS: u64 = RETARGET_INTERVAL * TARGET_BLOCK_SPACING_SECS;

/// Maximum allowed proof-of-work target (all-ones 256-bit value): the
/// easiest difficulty consensus will ever accept.
pub const POW_LIMIT: [u8; 32] = [0xffu8; 32];

/// §6: block-size schedule fork activation time, midnight UTC 2016-03-01,
/// as a unix timestamp.
pub const BLOCK_SIZE_FORK_TIME: u64 = 1_456_790_400;
/// §6: size cap before the fork.
pub const MAX_BLOCK_SIZE_LEGACY: u64 = 1_000_000;
/// §6: size cap at and after the fork (flat variant — see DESIGN.md Open Question #1).
pub const MAX_BLOCK_SIZE_POST_FORK: u64 = 2_000_000;

/// §6: `max_block_size(time) / 50`.
pub const SIGOPS_PER_SIZE_BYTE_DIVISOR: u64 = 50;

/// BIP9-style deployment signaling window, in blocks, and the lock-in
/// threshold within that window (§6 supplemented deployment shape).
pub const DEPLOYMENT_WINDOW: u64 = 2016;
pub const DEPLOYMENT_THRESHOLD: u32 = 1916;
