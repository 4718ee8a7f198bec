//! Decode target element types.

use half::bf16;

/// Element type a codec decodes into.
///
/// Conversion from `f32` rounds to nearest even; it never truncates.
pub trait Lane: Copy + PartialEq + Send + Sync + core::fmt::Debug + 'static {
    /// Additive identity, also the zero-padding value.
    const ZERO: Self;

    /// Convert from `f32`.
    fn from_f32(value: f32) -> Self;

    /// Widen to `f32`.
    fn to_f32(self) -> f32;
}

impl Lane for f32 {
    const ZERO: Self = 0.0;

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value
    }

    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }
}

impl Lane for bf16 {
    const ZERO: Self = bf16::ZERO;

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        bf16::from_f32(value)
    }

    #[inline(always)]
    fn to_f32(self) -> f32 {
        bf16::to_f32(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bf16_rounds_to_nearest() {
        // 1 + 2^-8 + 2^-10 lies above the midpoint between 1.0 and 1 + 2^-7.
        let value = 1.0 + 2f32.powi(-8) + 2f32.powi(-10);
        assert_eq!(<bf16 as Lane>::from_f32(value).to_f32(), 1.0 + 2f32.powi(-7));

        // Exactly halfway resolves to the even mantissa.
        let halfway = 1.0 + 2f32.powi(-8);
        assert_eq!(<bf16 as Lane>::from_f32(halfway).to_f32(), 1.0);
    }

    #[test]
    fn test_zero() {
        assert_eq!(<f32 as Lane>::ZERO, 0.0);
        assert_eq!(<bf16 as Lane>::ZERO.to_f32(), 0.0);
    }
}
