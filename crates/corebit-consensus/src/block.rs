//! Block headers and the compact ("bits") target encoding.

use crate::error::{ErrorCode, TxError};
use crate::hash::dsha256;
use num_bigint::BigUint;
use num_traits::Zero;

pub const BLOCK_HEADER_BYTES: usize = 80;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_BYTES] {
        let mut buf = [0u8; BLOCK_HEADER_BYTES];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..36].copy_from_slice(&self.prev_hash);
        buf[36..68].copy_from_slice(&self.merkle_root);
        buf[68..72].copy_from_slice(&self.time.to_le_bytes());
        buf[72..76].copy_from_slice(&self.bits.to_le_bytes());
        buf[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, TxError> {
        if b.len() != BLOCK_HEADER_BYTES {
            return Err(TxError::new(
                ErrorCode::BlockErrParse,
                "block header length mismatch",
            ));
        }
        let version = i32::from_le_bytes(b[0..4].try_into().unwrap());
        let mut prev_hash = [0u8; 32];
        prev_hash.copy_from_slice(&b[4..36]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&b[36..68]);
        let time = u32::from_le_bytes(b[68..72].try_into().unwrap());
        let bits = u32::from_le_bytes(b[72..76].try_into().unwrap());
        let nonce = u32::from_le_bytes(b[76..80].try_into().unwrap());
        Ok(Self {
            version,
            prev_hash,
            merkle_root,
            time,
            bits,
            nonce,
        })
    }

    /// Double-SHA-256 of the 80-byte header, byte-reversed so it compares
    /// directly against a big-endian target from [`target_from_bits`].
    pub fn block_hash(&self) -> [u8; 32] {
        let mut h = dsha256(&self.to_bytes());
        h.reverse();
        h
    }
}

/// Decode the compact ("bits") target encoding into a 256-bit big-endian
/// target. Returns an error if the target is negative (sign bit set with a
/// nonzero mantissa), zero, or overflows 256 bits — `bits` must decode to a
/// positive, non-overflowing compact target (§4.1.2).
pub fn target_from_bits(bits: u32) -> Result<BigUint, TxError> {
    let exponent = bits >> 24;
    let mantissa = bits & 0x007f_ffff;
    let is_negative = bits & 0x0080_0000 != 0;

    if is_negative {
        return Err(TxError::new(
            ErrorCode::BlockErrTargetInvalid,
            "negative compact target",
        ));
    }
    if mantissa == 0 {
        return Err(TxError::new(
            ErrorCode::BlockErrTargetInvalid,
            "zero compact target mantissa",
        ));
    }
    // Overflow check: a compact target with exponent > 34 cannot be
    // represented in 256 bits given a 23-bit mantissa.
    if exponent > 34 {
        return Err(TxError::new(
            ErrorCode::BlockErrTargetInvalid,
            "compact target exponent overflow",
        ));
    }

    let mantissa = BigUint::from(mantissa);
    let target = if exponent <= 3 {
        mantissa >> (8 * (3 - exponent))
    } else {
        mantissa << (8 * (exponent - 3))
    };

    let pow_limit = BigUint::from_bytes_be(&crate::constants::POW_LIMIT);
    if target.is_zero() {
        return Err(TxError::new(
            ErrorCode::BlockErrTargetInvalid,
            "compact target is zero",
        ));
    }
    if target > pow_limit {
        return Err(TxError::new(
            ErrorCode::BlockErrTargetInvalid,
            "compact target above pow limit",
        ));
    }
    Ok(target)
}

/// Encode a 256-bit target into the compact ("bits") form, clamped to the
/// proof-of-work limit.
pub fn bits_from_target(target: &BigUint) -> u32 {
    let pow_limit = BigUint::from_bytes_be(&crate::constants::POW_LIMIT);
    let target = if target > &pow_limit {
        pow_limit
    } else {
        target.clone()
    };

    let mut bytes = target.to_bytes_be();
    if bytes.is_empty() {
        bytes.push(0);
    }
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes.remove(0);
    }

    let mut exponent = bytes.len() as u32;
    let mut mantissa: u32;
    if bytes[0] & 0x80 != 0 {
        // Would be read back as negative; shift in an extra leading byte.
        mantissa = (bytes[0] as u32) << 16;
        if bytes.len() > 1 {
            mantissa |= (bytes[1] as u32) << 8;
        }
        if bytes.len() > 2 {
            mantissa |= bytes[2] as u32;
        }
        mantissa >>= 8;
        exponent += 1;
    } else {
        mantissa = (bytes[0] as u32) << 16;
        if bytes.len() > 1 {
            mantissa |= (bytes[1] as u32) << 8;
        }
        if bytes.len() > 2 {
            mantissa |= bytes[2] as u32;
        }
    }

    (exponent << 24) | mantissa
}

pub fn target_to_bytes_be(target: &BigUint) -> [u8; 32] {
    let bytes = target.to_bytes_be();
    let mut out = [0u8; 32];
    let start = 32usize.saturating_sub(bytes.len());
    let src_start = bytes.len().saturating_sub(32);
    out[start..].copy_from_slice(&bytes[src_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let h = BlockHeader {
            version: 1,
            prev_hash: [0x11; 32],
            merkle_root: [0x22; 32],
            time: 1_600_000_000,
            bits: 0x1d00ffff,
            nonce: 42,
        };
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), BLOCK_HEADER_BYTES);
        let back = BlockHeader::from_bytes(&bytes).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn bits_roundtrip_pow_limit() {
        let t = target_from_bits(0x1d00ffff).unwrap();
        let bits = bits_from_target(&t);
        let t2 = target_from_bits(bits).unwrap();
        assert_eq!(t, t2);
    }

    #[test]
    fn rejects_negative_and_zero_mantissa() {
        assert!(target_from_bits(0x01800000).is_err());
        assert!(target_from_bits(0x03000000).is_err());
    }
}
