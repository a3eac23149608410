//! Cumulative chain work and the candidate ordering the chain activator
//! uses to pick the best tip (§4.3, §4.4): highest work first, ties broken
//! by whichever candidate was received (registered) earliest.

use crate::pow::work_from_bits;
use num_bigint::BigUint;
use num_traits::Zero;

/// Sums per-header work across a chain of `bits` values, oldest to newest.
pub fn cumulative_work(bits_sequence: &[u32]) -> BigUint {
    let mut total = BigUint::zero();
    for &bits in bits_sequence {
        if let Ok(w) = work_from_bits(bits) {
            total += w;
        }
    }
    total
}

/// A tip candidate as tracked by the chain activator's best-block search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub block_hash: [u8; 32],
    pub chain_work: BigUint,
    /// Monotonically increasing arrival order, used to break ties in favor
    /// of the earliest-seen chain (§4.4).
    pub sequence_id: u64,
}

/// Orders candidates by `(chain_work desc, sequence_id asc)`, matching the
/// order the persistent candidate set is kept in.
pub fn better_candidate<'a>(a: &'a Candidate, b: &'a Candidate) -> &'a Candidate {
    match a.chain_work.cmp(&b.chain_work) {
        std::cmp::Ordering::Greater => a,
        std::cmp::Ordering::Less => b,
        std::cmp::Ordering::Equal => {
            if a.sequence_id <= b.sequence_id {
                a
            } else {
                b
            }
        }
    }
}

pub fn best_of<'a>(candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    candidates.iter().reduce(better_candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_work_wins() {
        let a = Candidate {
            block_hash: [1; 32],
            chain_work: BigUint::from(100u32),
            sequence_id: 5,
        };
        let b = Candidate {
            block_hash: [2; 32],
            chain_work: BigUint::from(200u32),
            sequence_id: 1,
        };
        assert_eq!(better_candidate(&a, &b).block_hash, [2; 32]);
    }

    #[test]
    fn ties_favor_earlier_sequence() {
        let a = Candidate {
            block_hash: [1; 32],
            chain_work: BigUint::from(100u32),
            sequence_id: 2,
        };
        let b = Candidate {
            block_hash: [2; 32],
            chain_work: BigUint::from(100u32),
            sequence_id: 7,
        };
        assert_eq!(better_candidate(&a, &b).block_hash, [1; 32]);
    }

    #[test]
    fn cumulative_work_increases_monotonically() {
        let w1 = cumulative_work(&[0x1d00ffff]);
        let w2 = cumulative_work(&[0x1d00ffff, 0x1d00ffff]);
        assert!(w2 > w1);
    }
}
