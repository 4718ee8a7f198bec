//! Vector register width, detected once per process.
//!
//! Codec loops run over `[T; N]` lane arrays and leave vectorization to the
//! compiler. The width detected here only selects which `N` the dispatched
//! entry points in `quantra` instantiate.

use std::sync::OnceLock;

use tracing::debug;

/// Widest vector register usable for `f32` arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SimdLevel {
    /// No usable vector unit.
    #[default]
    Scalar,
    /// 128-bit registers (SSE4.2, NEON).
    V128,
    /// 256-bit registers (AVX2).
    V256,
    /// 512-bit registers (AVX-512F).
    V512,
}

impl SimdLevel {
    /// `f32` lanes per lane array, at least 4 so scalar code still unrolls.
    pub fn f32_lanes(self) -> usize {
        match self {
            SimdLevel::Scalar | SimdLevel::V128 => 4,
            SimdLevel::V256 => 8,
            SimdLevel::V512 => 16,
        }
    }
}

/// Query the CPU for the widest supported register.
pub fn detect_simd() -> SimdLevel {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx512f") {
            SimdLevel::V512
        } else if is_x86_feature_detected!("avx2") {
            SimdLevel::V256
        } else if is_x86_feature_detected!("sse4.2") {
            SimdLevel::V128
        } else {
            SimdLevel::Scalar
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        SimdLevel::V128
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        SimdLevel::Scalar
    }
}

static SIMD_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

/// Cached result of [`detect_simd`].
pub fn simd_level() -> SimdLevel {
    *SIMD_LEVEL.get_or_init(|| {
        let level = detect_simd();
        debug!(?level, lanes = level.f32_lanes(), "detected vector width");
        level
    })
}
