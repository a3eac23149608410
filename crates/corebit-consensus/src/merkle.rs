//! Merkle root computation over a block's transaction hashes, including the
//! classic duplicate-tail "mutated" detection (§4.1.2): an attacker can
//! duplicate the last transaction in an odd-sized level without changing
//! the computed root, since the promotion rule already duplicates it. This
//! is reported as a distinct rejection rather than folded into a generic
//! bad-merkle-root error.

use crate::hash::dsha256;

pub struct MerkleResult {
    pub root: [u8; 32],
    /// True if the tree contained an internal node whose two children were
    /// bit-identical — the signature of a duplicated-leaf mutation.
    pub mutated: bool,
}

pub fn compute_merkle_root(txids: &[[u8; 32]]) -> MerkleResult {
    if txids.is_empty() {
        return MerkleResult {
            root: [0u8; 32],
            mutated: false,
        };
    }

    let mut level: Vec<[u8; 32]> = txids.to_vec();
    let mut mutated = false;

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks_exact(2) {
            if pair[0] == pair[1] {
                mutated = true;
            }
            let mut preimage = [0u8; 64];
            preimage[..32].copy_from_slice(&pair[0]);
            preimage[32..].copy_from_slice(&pair[1]);
            next.push(dsha256(&preimage));
        }
        level = next;
    }

    MerkleResult {
        root: level[0],
        mutated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_tx_root_is_its_own_hash() {
        let txid = [0x42; 32];
        let r = compute_merkle_root(&[txid]);
        assert_eq!(r.root, txid);
        assert!(!r.mutated);
    }

    #[test]
    fn odd_count_duplicates_last_and_flags_mutation() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];
        let r3 = compute_merkle_root(&[a, b, c]);
        let r4 = compute_merkle_root(&[a, b, c, c]);
        assert_eq!(r3.root, r4.root);
        assert!(r3.mutated);
        assert!(r4.mutated);
    }

    #[test]
    fn even_distinct_count_is_not_mutated() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let r = compute_merkle_root(&[a, b]);
        assert!(!r.mutated);
    }
}
