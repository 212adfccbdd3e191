//! Bit-field codec shared by the decoder, the assembler, and the engine.
//!
//! All instruction formats are fixed 32-bit layouts, so every field access
//! goes through these three helpers. Malformed ranges are rejected with an
//! error rather than silently truncated to zero.

use crate::error::CoreError;

/// Extracts bits `lo..=hi` of `word` as an unsigned value.
///
/// Bit 0 is the least significant bit; `hi` must be below 32 and `lo <= hi`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidBitRange`] when the range is malformed.
pub const fn extract_bits(word: u32, lo: u8, hi: u8) -> Result<u32, CoreError> {
    if lo > hi || hi >= 32 {
        return Err(CoreError::InvalidBitRange { lo, hi });
    }
    let width = hi - lo + 1;
    if width == 32 {
        return Ok(word);
    }
    Ok((word >> lo) & ((1 << width) - 1))
}

/// Writes the low `hi - lo + 1` bits of `value` into bits `lo..=hi` of
/// `word`, leaving all other bits untouched.
///
/// # Errors
///
/// Returns [`CoreError::InvalidBitRange`] when the range is malformed.
pub const fn set_bits(word: u32, value: u32, lo: u8, hi: u8) -> Result<u32, CoreError> {
    if lo > hi || hi >= 32 {
        return Err(CoreError::InvalidBitRange { lo, hi });
    }
    let width = hi - lo + 1;
    if width == 32 {
        return Ok(value);
    }
    let mask = ((1u32 << width) - 1) << lo;
    Ok((word & !mask) | ((value << lo) & mask))
}

/// Sign-extends the low `width` bits of `value`, treated as a two's
/// complement integer, to a full 64-bit signed value.
///
/// `width == 64` is a no-op reinterpretation.
///
/// # Errors
///
/// Returns [`CoreError::InvalidExtendWidth`] when `width` is outside
/// `1..=64`.
#[allow(clippy::cast_possible_wrap)]
pub const fn sign_extend(value: u64, width: u8) -> Result<i64, CoreError> {
    if width == 0 || width > 64 {
        return Err(CoreError::InvalidExtendWidth { width });
    }
    if width == 64 {
        return Ok(value as i64);
    }
    let mask = (1u64 << width) - 1;
    let sign = 1u64 << (width - 1);
    let low = value & mask;
    if low & sign == 0 {
        Ok(low as i64)
    } else {
        Ok((low | !mask) as i64)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::cast_possible_wrap)]

    use super::{extract_bits, set_bits, sign_extend};
    use crate::error::CoreError;
    use proptest::prelude::*;

    #[test]
    fn extract_single_bit_ranges() {
        assert_eq!(extract_bits(0b1010, 1, 1), Ok(1));
        assert_eq!(extract_bits(0b1010, 0, 0), Ok(0));
        assert_eq!(extract_bits(0x8000_0000, 31, 31), Ok(1));
    }

    #[test]
    fn extract_multi_bit_ranges() {
        assert_eq!(extract_bits(0xDEAD_BEEF, 0, 31), Ok(0xDEAD_BEEF));
        assert_eq!(extract_bits(0xDEAD_BEEF, 16, 31), Ok(0xDEAD));
        assert_eq!(extract_bits(0b1110_0110, 1, 2), Ok(0b11));
    }

    #[test]
    fn extract_rejects_malformed_ranges() {
        assert_eq!(
            extract_bits(0, 5, 4),
            Err(CoreError::InvalidBitRange { lo: 5, hi: 4 })
        );
        assert_eq!(
            extract_bits(0, 0, 32),
            Err(CoreError::InvalidBitRange { lo: 0, hi: 32 })
        );
    }

    #[test]
    fn set_bits_leaves_other_bits_untouched() {
        assert_eq!(set_bits(0xFFFF_FFFF, 0, 8, 11), Ok(0xFFFF_F0FF));
        assert_eq!(set_bits(0, 0b101, 4, 6), Ok(0b101_0000));
        assert_eq!(set_bits(0, 0xFFFF_FFFF, 0, 31), Ok(0xFFFF_FFFF));
    }

    #[test]
    fn set_bits_masks_oversized_values() {
        // Only the low (hi-lo+1) bits of the value land in the word.
        assert_eq!(set_bits(0, 0xFF, 0, 3), Ok(0x0F));
    }

    #[test]
    fn sign_extend_positive_and_negative() {
        assert_eq!(sign_extend(0b0111, 4), Ok(7));
        assert_eq!(sign_extend(0b1111, 4), Ok(-1));
        assert_eq!(sign_extend(0b1000, 4), Ok(-8));
        assert_eq!(sign_extend(0x1FF, 9), Ok(-1));
        assert_eq!(sign_extend(0xFF, 9), Ok(255));
    }

    #[test]
    fn sign_extend_full_width_is_identity() {
        assert_eq!(sign_extend(u64::MAX, 64), Ok(-1));
        assert_eq!(sign_extend(42, 64), Ok(42));
    }

    #[test]
    fn sign_extend_rejects_bad_widths() {
        assert_eq!(
            sign_extend(0, 0),
            Err(CoreError::InvalidExtendWidth { width: 0 })
        );
        assert_eq!(
            sign_extend(0, 65),
            Err(CoreError::InvalidExtendWidth { width: 65 })
        );
    }

    proptest! {
        #[test]
        fn extract_after_set_roundtrips(word: u32, value: u32, lo in 0u8..32, width in 1u8..=16) {
            let hi = (lo + width - 1).min(31);
            let set = set_bits(word, value, lo, hi).unwrap();
            let field_width = hi - lo + 1;
            let mask = if field_width == 32 { u32::MAX } else { (1 << field_width) - 1 };
            prop_assert_eq!(extract_bits(set, lo, hi).unwrap(), value & mask);
        }

        #[test]
        fn sign_extend_agrees_with_shift_reference(value: u64, width in 1u8..=63) {
            let shift = 64 - u32::from(width);
            let expected = ((value << shift) as i64) >> shift;
            prop_assert_eq!(sign_extend(value, width).unwrap(), expected);
        }
    }
}
