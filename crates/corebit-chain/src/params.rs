//! `ChainParams` (§A "Config"): everything a host must supply to pin down
//! which network's rules a [`crate::chainstate::ChainState`] enforces.
//! Never read from a file or environment here — the host decides how its
//! own configuration surface is populated; this crate only defines the shape.

use corebit_consensus::BlockHeader;

/// Genesis block identity and the height-keyed activation points a host
/// plugs in. Full BIP9 bit-signaling is not tracked block-by-block here
/// (see DESIGN.md); instead each soft-fork is a simple height threshold,
/// which is how most of these rules are pinned down in practice once a
/// deployment has long since locked in.
#[derive(Clone, Debug)]
pub struct ChainParams {
    pub genesis_header: BlockHeader,
    pub genesis_hash: [u8; 32],

    /// BIP34: coinbase must commit to height at and after this height.
    pub bip34_height: u64,
    /// BIP30 duplicate-coinbase check stops being necessary at and after
    /// this height (BIP34 makes collisions structurally impossible), but is
    /// still enforced below it except for the grandfathered exceptions.
    pub bip30_height: u64,
    /// The two historical blocks whose coinbase hash collided with an
    /// earlier unspent record before BIP34 (§4.2 BIP30 note).
    pub bip30_grandfathered: Vec<(u64, [u8; 32])>,
    /// BIP113: at and after this height, transaction finality and relative
    /// lock-times are evaluated against median-time-past instead of the
    /// block's own timestamp (§4.1.4).
    pub bip113_height: u64,
    /// BIP68 relative lock-time enforcement begins at this height.
    pub bip68_height: u64,
    /// P2SH sigop counting / script flag activation height.
    pub p2sh_height: u64,
    /// Strict DER signature encoding (BIP66) enforcement height.
    pub dersig_height: u64,
    /// CHECKLOCKTIMEVERIFY (BIP65) enforcement height.
    pub cltv_height: u64,
    /// CHECKSEQUENCEVERIFY enforcement height (normally == bip68_height).
    pub csv_height: u64,

    /// UAHF-style hard-fork hook (§9 Open Question #2): if set, the block at
    /// this height must equal this hash or the branch is rejected outright.
    pub enforced_fork_block: Option<(u64, [u8; 32])>,
    /// Anti-replay commitment a fork may require transactions to carry
    /// (e.g. a mandatory `OP_RETURN` payload) once past the fork height.
    /// Opaque to this crate — interpreting it is the script verifier's job.
    pub anti_replay_commitment: Option<Vec<u8>>,
}

impl ChainParams {
    /// A permissive parameter set with every soft fork active from height 0,
    /// for tests that don't care about historical activation schedules.
    pub fn regtest_like(genesis_header: BlockHeader, genesis_hash: [u8; 32]) -> Self {
        Self {
            genesis_header,
            genesis_hash,
            bip34_height: 0,
            bip30_height: 0,
            bip30_grandfathered: Vec::new(),
            bip113_height: 0,
            bip68_height: 0,
            p2sh_height: 0,
            dersig_height: 0,
            cltv_height: 0,
            csv_height: 0,
            enforced_fork_block: None,
            anti_replay_commitment: None,
        }
    }
}
