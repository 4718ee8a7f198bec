//! SFP byte encoding.

use bytemuck::{Pod, Zeroable};
use quantra_core::Packed;

const SIGN: u8 = 0x80;
const LARGE: u8 = 0x40;

/// Exponent of the smallest magnitude in the large layout.
const LARGE_MIN_EXP: i32 = -7;
/// Exponent of the smallest nonzero magnitude in the small layout.
const SMALL_MIN_EXP: i32 = -22;
/// Magnitudes below this round to zero.
const HALF_SMALLEST: f32 = 1.0 / 8_388_608.0;

/// One SFP-encoded value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(transparent)]
pub struct SfpStream(pub u8);

/// Rounds the 23-bit fraction `frac` to `bits` bits, half away from zero.
#[inline]
fn round_fraction(frac: u32, bits: u32) -> u32 {
    let drop = 23 - bits;
    (frac + (1 << (drop - 1))) >> drop
}

impl SfpStream {
    /// Largest representable magnitude.
    pub const MAX: f32 = 1.875;

    /// Encodes `value`, rounding to the nearest representable magnitude.
    pub fn encode(value: f32) -> Self {
        if value.is_nan() {
            return SfpStream(0);
        }
        let magnitude = value.abs().min(Self::MAX);
        if magnitude < HALF_SMALLEST {
            return SfpStream(0);
        }
        let sign = if value < 0.0 { SIGN } else { 0 };

        let bits = magnitude.to_bits();
        let mut exp = (bits >> 23) as i32 - 127;
        let frac = bits & 0x7F_FFFF;

        if exp < SMALL_MIN_EXP {
            // [2^-23, 2^-22) rounds up to the smallest nonzero code.
            return SfpStream(sign | (1 << 2));
        }

        if exp >= LARGE_MIN_EXP {
            let mut m = round_fraction(frac, 3);
            if m == 8 {
                m = 0;
                exp += 1;
            }
            // MAX has exponent 0 and mantissa 7, so rounding cannot overflow
            // past it.
            let e = (exp - LARGE_MIN_EXP) as u8;
            return SfpStream(sign | LARGE | (e << 3) | m as u8);
        }

        let mut m = round_fraction(frac, 2);
        if m == 4 {
            m = 0;
            exp += 1;
        }
        if exp == LARGE_MIN_EXP {
            return SfpStream(sign | LARGE);
        }
        let e = (exp - SMALL_MIN_EXP + 1) as u8;
        SfpStream(sign | (e << 2) | m as u8)
    }

    /// Decodes to `f32`.
    #[inline]
    pub fn decode(self) -> f32 {
        let code = self.0;
        let magnitude = if code & LARGE != 0 {
            let e = u32::from((code >> 3) & 0x7);
            let m = u32::from(code & 0x7);
            f32::from_bits(((e + 120) << 23) | (m << 20))
        } else {
            let e = u32::from((code >> 2) & 0xF);
            if e == 0 {
                return 0.0;
            }
            let m = u32::from(code & 0x3);
            f32::from_bits(((e + 104) << 23) | (m << 21))
        };
        if code & SIGN != 0 {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl Packed for SfpStream {
    const NAME: &'static str = "sfp";
    const KEY_PREFIX: char = 'S';

    fn extend_le_bytes(units: &[Self], out: &mut Vec<u8>) {
        out.extend_from_slice(bytemuck::cast_slice(units));
    }
}
