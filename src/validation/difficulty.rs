//! Compact difficulty target encoding
//!
//! "Bits" is a floating-point-like encoding of a 256-bit target: the
//! high byte is a base-256 exponent, the low three bytes a mantissa.
//! A mantissa with its high bit set would be negative, so encoding
//! shifts it down and bumps the exponent.

use primitive_types::U256;

/// Expand a compact-encoded target to its full 256-bit form
pub fn decode_compact(bits: u32) -> U256 {
    let size = bits >> 24;
    let word = bits & 0x007f_ffff;
    if size <= 3 {
        U256::from(word >> (8 * (3 - size)))
    } else {
        U256::from(word) << (8 * (size - 3))
    }
}

/// Compress a 256-bit target into compact form
pub fn encode_compact(target: U256) -> u32 {
    if target.is_zero() {
        return 0;
    }

    let mut size = (target.bits() as u32 + 7) / 8;
    let mut word = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3))).low_u64() as u32
    };

    // Keep the mantissa's sign bit clear
    if word & 0x0080_0000 != 0 {
        word >>= 8;
        size += 1;
    }

    word | (size << 24)
}
