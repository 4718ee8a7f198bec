//! Checked decode entry points and fused decode-reduce.

use quantra_core::{Lane, PackedSpan, Result};

use crate::kernel::{Accumulators, Kernel};
use crate::traits::CompressTraits;

/// Decodes `2N` elements of `packed` at any `offset`.
#[inline]
pub fn decompress2<P: CompressTraits, T: Lane, const N: usize>(
    packed: &PackedSpan<'_, P>,
    offset: usize,
) -> Result<([T; N], [T; N])> {
    packed.bounds_check(offset, 2 * N)?;
    Ok(P::load2(packed, offset))
}

/// Decodes `num` elements at any `offset` into `out`, then zero-fills `out`
/// up to the next multiple of `N`.
///
/// Scaling back to the original range is left to the caller.
pub fn decompress_and_zero_pad<P: CompressTraits, T: Lane, const N: usize>(
    packed: &PackedSpan<'_, P>,
    offset: usize,
    out: &mut [T],
    num: usize,
) -> Result<()> {
    packed.bounds_check(offset, num)?;
    P::decompress_and_zero_pad::<T, N>(packed, offset, out, num)
}

/// Decodes `num` elements of `w` from `w_offset` and of `v` from 0, and
/// reduces them pairwise with `kernel`.
///
/// Full strides of `4N` go through [`Kernel::update4`]. The remainder is
/// decoded into zero-padded stack buffers and fed to [`Kernel::update1`] one
/// unit at a time, only for units that hold decoded elements.
pub fn decompress_and_call<T, const N: usize, W, V, K>(
    w: &PackedSpan<'_, W>,
    w_offset: usize,
    v: &PackedSpan<'_, V>,
    num: usize,
    kernel: &K,
) -> Result<f32>
where
    T: Lane,
    W: CompressTraits,
    V: CompressTraits,
    K: Kernel,
{
    w.bounds_check(w_offset, num)?;
    v.bounds_check(0, num)?;

    let mut acc = Accumulators::<N>::new();
    let stride = 4 * N;
    let mut i = 0;
    while i + stride <= num {
        let (w0, w1) = W::load2::<T, N>(w, w_offset + i);
        let (w2, w3) = W::load2::<T, N>(w, w_offset + i + 2 * N);
        let (v0, v1) = V::load2::<T, N>(v, i);
        let (v2, v3) = V::load2::<T, N>(v, i + 2 * N);
        kernel.update4(&[w0, w1, w2, w3], &[v0, v1, v2, v3], &mut acc);
        i += stride;
    }

    let remaining = num - i;
    if remaining != 0 {
        let mut w_buf = [[T::ZERO; N]; 4];
        let mut v_buf = [[T::ZERO; N]; 4];
        W::decompress_and_zero_pad::<T, N>(w, w_offset + i, w_buf.as_flattened_mut(), remaining)?;
        V::decompress_and_zero_pad::<T, N>(v, i, v_buf.as_flattened_mut(), remaining)?;
        for unit in 0..remaining.div_ceil(N) {
            kernel.update1(&w_buf[unit], &v_buf[unit], &mut acc);
        }
    }
    Ok(kernel.reduce(&acc))
}

/// Single-input variant of [`decompress_and_call`]: the kernel sees `v` as
/// both operands.
pub fn decompress_and_call1<T, const N: usize, V, K>(v: &PackedSpan<'_, V>, num: usize, kernel: &K) -> Result<f32>
where
    T: Lane,
    V: CompressTraits,
    K: Kernel,
{
    v.bounds_check(0, num)?;

    let mut acc = Accumulators::<N>::new();
    let stride = 4 * N;
    let mut i = 0;
    while i + stride <= num {
        let (v0, v1) = V::load2::<T, N>(v, i);
        let (v2, v3) = V::load2::<T, N>(v, i + 2 * N);
        let units = [v0, v1, v2, v3];
        kernel.update4(&units, &units, &mut acc);
        i += stride;
    }

    let remaining = num - i;
    if remaining != 0 {
        let mut v_buf = [[T::ZERO; N]; 4];
        V::decompress_and_zero_pad::<T, N>(v, i, v_buf.as_flattened_mut(), remaining)?;
        for unit in 0..remaining.div_ceil(N) {
            kernel.update1(&v_buf[unit], &v_buf[unit], &mut acc);
        }
    }
    Ok(kernel.reduce(&acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{DotKernelCompensated, DotKernelDefault, SquaredNormKernel};
    use quantra_core::{bf16, Error};

    fn naive_dot(a: &[f32], b: &[f32]) -> f64 {
        a.iter().zip(b).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum()
    }

    #[test]
    fn test_dot_remainders() {
        let w: Vec<f32> = (0..200).map(|i| (i as f32 * 0.1).cos()).collect();
        let v: Vec<f32> = (0..200).map(|i| (i as f32 * 0.07).sin()).collect();
        let ws = PackedSpan::from_slice(&w);

        for num in [0, 1, 7, 8, 31, 32, 33, 100, 150] {
            let vs = PackedSpan::new(&v[..num], num);
            let expected = naive_dot(&w[10..10 + num], &v[..num]);
            let got = decompress_and_call::<f32, 8, _, _, _>(&ws, 10, &vs, num, &DotKernelDefault).unwrap();
            assert!((f64::from(got) - expected).abs() < 1e-4, "num {num}: {got} vs {expected}");
            let got = decompress_and_call::<f32, 4, _, _, _>(&ws, 10, &vs, num, &DotKernelCompensated).unwrap();
            assert!((f64::from(got) - expected).abs() < 1e-5, "num {num}: {got} vs {expected}");
        }
    }

    #[test]
    fn test_bf16_lanes() {
        let w: Vec<bf16> = (0..40).map(|i| bf16::from_f32(i as f32 * 0.25)).collect();
        let v = vec![1.0f32; 40];
        let got = decompress_and_call::<bf16, 8, _, _, _>(
            &PackedSpan::from_slice(&w),
            0,
            &PackedSpan::from_slice(&v),
            40,
            &DotKernelDefault,
        )
        .unwrap();
        // 0.25 * (0 + 1 + .. + 39)
        assert_eq!(got, 195.0);
    }

    #[test]
    fn test_squared_norm_single_input() {
        let v: Vec<f32> = (0..45).map(|i| i as f32).collect();
        let got = decompress_and_call1::<f32, 4, _, _>(&PackedSpan::from_slice(&v), 45, &SquaredNormKernel).unwrap();
        let expected: f32 = v.iter().map(|x| x * x).sum();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_bounds_checked() {
        let w = vec![0.0f32; 16];
        let v = vec![0.0f32; 8];
        let err = decompress_and_call::<f32, 4, _, _, _>(
            &PackedSpan::from_slice(&w),
            10,
            &PackedSpan::from_slice(&v),
            8,
            &DotKernelDefault,
        )
        .unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));
        assert!(decompress2::<f32, f32, 4>(&PackedSpan::from_slice(&v), 1).is_err());
    }
}
