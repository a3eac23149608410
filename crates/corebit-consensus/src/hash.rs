//! The one hash function consensus actually depends on: double-SHA-256.
//! Kept narrow and separate from [`crate::error`] so callers never need to
//! hand-roll their own digest-then-digest-again call site.

use sha2::{Digest, Sha256};

/// `SHA256(SHA256(data))`, used for block hashes, txids, and the merkle tree.
pub fn dsha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_stable() {
        let a = dsha256(b"");
        let b = dsha256(b"");
        assert_eq!(a, b);
        assert_ne!(a, [0u8; 32]);
    }

    #[test]
    fn differs_from_single_sha256() {
        let d = dsha256(b"rubin");
        let single = Sha256::digest(b"rubin");
        assert_ne!(&d[..], &single[..]);
    }
}
