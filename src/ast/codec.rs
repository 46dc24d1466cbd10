//! Bit-level helpers for LC-4 instruction words.
//!
//! Every operand of an LC-4 instruction lives in a fixed bit range of the word.
//! [`field`] pulls such a range out, and [`sign_extend`] / [`zero_extend`]
//! turn an `n`-bit field into a full 16-bit value.

/// A mask covering every bit at or above bit `bits`.
const fn high_mask(bits: u32) -> u16 {
    match bits {
        0 => u16::MAX,
        16.. => 0,
        n => u16::MAX << n,
    }
}

/// Sign-extends the low `bits` bits of `data` to 16 bits.
///
/// If bit `bits - 1` is set, every bit above it is set.
/// Otherwise, every bit above it is cleared.
///
/// ```
/// # use lc4_sim::ast::codec::sign_extend;
/// assert_eq!(sign_extend(0b1_1111, 5), 0xFFFF);
/// assert_eq!(sign_extend(0b0_1111, 5), 0x000F);
/// ```
pub fn sign_extend(data: u16, bits: u32) -> u16 {
    if bits == 0 || bits >= 16 { return data };

    let mask = high_mask(bits);
    match data & (1 << (bits - 1)) != 0 {
        true  => data | mask,
        false => data & !mask,
    }
}

/// Zero-extends the low `bits` bits of `data` to 16 bits.
pub fn zero_extend(data: u16, bits: u32) -> u16 {
    data & !high_mask(bits)
}

/// Extracts the bit range `[lo + len - 1 : lo]` of `word`, shifted down to bit 0.
///
/// ```
/// # use lc4_sim::ast::codec::field;
/// //              rd  rs
/// let word = 0b0001_001_010_000_011;
/// assert_eq!(field(word, 9, 3), 0b001);
/// assert_eq!(field(word, 6, 3), 0b010);
/// ```
pub fn field(word: u16, lo: u32, len: u32) -> u16 {
    zero_extend(word >> lo, len)
}

/// Extracts a signed field (see [`field`]) and sign-extends it.
pub fn signed_field(word: u16, lo: u32, len: u32) -> i16 {
    sign_extend(field(word, lo, len), len) as i16
}

/// Tests whether bit `bit` of `word` is set.
pub fn bit(word: u16, bit: u32) -> bool {
    (word >> bit) & 1 != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend_nine_bits() {
        // bit 8 clear: everything above is cleared
        assert_eq!(sign_extend(0b1010101010101010, 9), 0b0000000010101010);
        // bit 8 set: everything above is set
        assert_eq!(sign_extend(0b0101010101010101, 9), 0b1111111101010101);
    }

    #[test]
    fn sign_extend_table() {
        let cases: &[(u16, u32, u16)] = &[
            (0b1111,        4,  0xFFFF),
            (0b0111,        4,  0x0007),
            (0b1000,        4,  0xFFF8),
            (0b10000,       5,  0xFFF0),
            (0b011111,      6,  0x001F),
            (0b1000000,     7,  0xFFC0),
            (0b11111111,    8,  0xFFFF),
            (0b010000000,   9,  0x0080),
            (0b10000000000, 11, 0xFC00),
            (0b01111111111, 11, 0x03FF),
        ];

        for &(data, bits, expected) in cases {
            assert_eq!(sign_extend(data, bits), expected, "sign_extend({data:#b}, {bits})");
        }
    }

    #[test]
    fn sign_extend_matches_native_cast() {
        for bits in 4..=11u32 {
            for raw in 0..(1u16 << bits) {
                let shift = 16 - bits;
                let native = (((raw << shift) as i16) >> shift) as u16;
                assert_eq!(sign_extend(raw, bits), native, "{bits}-bit field {raw:#b}");
            }
        }
    }

    #[test]
    fn sign_extend_full_width() {
        assert_eq!(sign_extend(0x8000, 16), 0x8000);
        assert_eq!(sign_extend(0x1234, 0), 0x1234);
    }

    #[test]
    fn fields() {
        // TRAP xFF
        assert_eq!(field(0xF0FF, 12, 4), 0xF);
        assert_eq!(field(0xF0FF, 0, 8), 0xFF);
        // ADDI R1, R1, #-1
        assert_eq!(field(0x127F, 9, 3), 1);
        assert_eq!(signed_field(0x127F, 0, 5), -1);
        assert!(bit(0x127F, 5));
        assert!(!bit(0x1240, 5));
        assert_eq!(zero_extend(0xFFFF, 16), 0xFFFF);
        assert_eq!(zero_extend(0xFFFF, 7), 0x7F);
    }
}
