//! Reduction kernels consumed by [`decompress_and_call`](crate::decompress_and_call).
//!
//! A kernel sees decoded lanes four processing units at a time through
//! [`Kernel::update4`], then the zero-padded remainder one unit at a time
//! through [`Kernel::update1`], and finally folds its accumulators with
//! [`Kernel::reduce`]. Zero lanes must leave the result unchanged.

use quantra_core::Lane;

/// Per-call accumulator registers, four rows of `N` lanes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulators<const N: usize> {
    pub sum: [[f32; N]; 4],
    /// Running error terms for compensated kernels.
    pub comp: [[f32; N]; 4],
}

impl<const N: usize> Accumulators<N> {
    pub fn new() -> Self {
        Self {
            sum: [[0.0; N]; 4],
            comp: [[0.0; N]; 4],
        }
    }
}

impl<const N: usize> Default for Accumulators<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fused reduction over pairs of decoded lanes.
pub trait Kernel: Sync {
    /// Consume four units of weights `w` and vector `v`.
    fn update4<T: Lane, const N: usize>(&self, w: &[[T; N]; 4], v: &[[T; N]; 4], acc: &mut Accumulators<N>);

    /// Consume one unit.
    fn update1<T: Lane, const N: usize>(&self, w: &[T; N], v: &[T; N], acc: &mut Accumulators<N>);

    /// Fold the accumulators into the result.
    fn reduce<const N: usize>(&self, acc: &Accumulators<N>) -> f32;
}

#[inline]
fn sum_lanes<const N: usize>(rows: &[[f32; N]; 4]) -> f32 {
    let mut total = [0.0f32; N];
    for row in rows {
        for (t, &r) in total.iter_mut().zip(row.iter()) {
            *t += r;
        }
    }
    total.iter().sum()
}

/// Error-free transformation of `a + b` into a sum and its rounding error.
#[inline(always)]
fn two_sum(a: f32, b: f32) -> (f32, f32) {
    let s = a + b;
    let bp = s - a;
    let err = (a - (s - bp)) + (b - bp);
    (s, err)
}

/// Error-free transformation of `a * b` into a product and its rounding error.
#[inline(always)]
fn two_product(a: f32, b: f32) -> (f32, f32) {
    let p = a * b;
    (p, a.mul_add(b, -p))
}

/// Dot product with fused multiply-add accumulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotKernelDefault;

impl Kernel for DotKernelDefault {
    #[inline]
    fn update4<T: Lane, const N: usize>(&self, w: &[[T; N]; 4], v: &[[T; N]; 4], acc: &mut Accumulators<N>) {
        for k in 0..4 {
            for i in 0..N {
                acc.sum[k][i] = w[k][i].to_f32().mul_add(v[k][i].to_f32(), acc.sum[k][i]);
            }
        }
    }

    #[inline]
    fn update1<T: Lane, const N: usize>(&self, w: &[T; N], v: &[T; N], acc: &mut Accumulators<N>) {
        for i in 0..N {
            acc.sum[0][i] = w[i].to_f32().mul_add(v[i].to_f32(), acc.sum[0][i]);
        }
    }

    fn reduce<const N: usize>(&self, acc: &Accumulators<N>) -> f32 {
        sum_lanes(&acc.sum)
    }
}

/// Dot product with compensated (twofold) summation, accurate to nearly
/// twice the working precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotKernelCompensated;

impl DotKernelCompensated {
    #[inline(always)]
    fn accumulate(sum: &mut f32, comp: &mut f32, w: f32, v: f32) {
        let (p, e_mul) = two_product(w, v);
        let (s, e_add) = two_sum(*sum, p);
        *sum = s;
        *comp += e_mul + e_add;
    }
}

impl Kernel for DotKernelCompensated {
    #[inline]
    fn update4<T: Lane, const N: usize>(&self, w: &[[T; N]; 4], v: &[[T; N]; 4], acc: &mut Accumulators<N>) {
        for k in 0..4 {
            for i in 0..N {
                Self::accumulate(&mut acc.sum[k][i], &mut acc.comp[k][i], w[k][i].to_f32(), v[k][i].to_f32());
            }
        }
    }

    #[inline]
    fn update1<T: Lane, const N: usize>(&self, w: &[T; N], v: &[T; N], acc: &mut Accumulators<N>) {
        for i in 0..N {
            Self::accumulate(&mut acc.sum[0][i], &mut acc.comp[0][i], w[i].to_f32(), v[i].to_f32());
        }
    }

    fn reduce<const N: usize>(&self, acc: &Accumulators<N>) -> f32 {
        let mut sum = 0.0f32;
        let mut comp = 0.0f32;
        for k in 0..4 {
            for i in 0..N {
                let (s, e) = two_sum(sum, acc.sum[k][i]);
                sum = s;
                comp += e + acc.comp[k][i];
            }
        }
        sum + comp
    }
}

/// Sum of squares of `v`; `w` is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredNormKernel;

impl Kernel for SquaredNormKernel {
    #[inline]
    fn update4<T: Lane, const N: usize>(&self, _w: &[[T; N]; 4], v: &[[T; N]; 4], acc: &mut Accumulators<N>) {
        for k in 0..4 {
            for i in 0..N {
                let x = v[k][i].to_f32();
                acc.sum[k][i] = x.mul_add(x, acc.sum[k][i]);
            }
        }
    }

    #[inline]
    fn update1<T: Lane, const N: usize>(&self, _w: &[T; N], v: &[T; N], acc: &mut Accumulators<N>) {
        for i in 0..N {
            let x = v[i].to_f32();
            acc.sum[0][i] = x.mul_add(x, acc.sum[0][i]);
        }
    }

    fn reduce<const N: usize>(&self, acc: &Accumulators<N>) -> f32 {
        sum_lanes(&acc.sum)
    }
}
