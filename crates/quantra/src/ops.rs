//! Convenience reductions that pick the lane width from the detected CPU.

use quantra_core::{simd_level, Error, PackedSpan, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::decompress::{decompress_and_call, decompress_and_call1};
use crate::kernel::{DotKernelDefault, SquaredNormKernel};
use crate::traits::CompressTraits;

/// Columns reduced per call, so the vector chunk stays in L1.
const MAX_COLS: usize = 2048;

/// Dot product of `num` elements of `w` from `w_offset` with `v` from 0.
pub fn dot<W: CompressTraits, V: CompressTraits>(
    w: &PackedSpan<'_, W>,
    w_offset: usize,
    v: &PackedSpan<'_, V>,
    num: usize,
) -> Result<f32> {
    match simd_level().f32_lanes() {
        16 => decompress_and_call::<f32, 16, W, V, _>(w, w_offset, v, num, &DotKernelDefault),
        8 => decompress_and_call::<f32, 8, W, V, _>(w, w_offset, v, num, &DotKernelDefault),
        _ => decompress_and_call::<f32, 4, W, V, _>(w, w_offset, v, num, &DotKernelDefault),
    }
}

/// Sum of squares of the first `num` elements of `v`.
pub fn squared_norm<V: CompressTraits>(v: &PackedSpan<'_, V>, num: usize) -> Result<f32> {
    match simd_level().f32_lanes() {
        16 => decompress_and_call1::<f32, 16, V, _>(v, num, &SquaredNormKernel),
        8 => decompress_and_call1::<f32, 8, V, _>(v, num, &SquaredNormKernel),
        _ => decompress_and_call1::<f32, 4, V, _>(v, num, &SquaredNormKernel),
    }
}

fn rows_per_strip(rows: usize, lanes: usize) -> usize {
    if rows < 128 {
        return lanes;
    }
    lanes.max(1 << (rows / 128).ilog2())
}

/// `out[r] = dot(mat row r, v) + add[r]` for a row-major `rows x cols`
/// matrix stored in `mat` from element `mat_offset`.
///
/// Rows are split into strips that run in parallel on `pool`.
#[allow(clippy::too_many_arguments)]
pub fn mat_vec<W: CompressTraits>(
    mat: &PackedSpan<'_, W>,
    mat_offset: usize,
    rows: usize,
    cols: usize,
    v: &[f32],
    add: Option<&[f32]>,
    out: &mut [f32],
    pool: &ThreadPool,
) -> Result<()> {
    let total = rows
        .checked_mul(cols)
        .ok_or_else(|| Error::out_of_bounds(mat_offset, usize::MAX, mat.num()))?;
    mat.bounds_check(mat_offset, total)?;
    if v.len() < cols {
        return Err(Error::buffer_too_small(cols, v.len()));
    }
    if out.len() < rows {
        return Err(Error::buffer_too_small(rows, out.len()));
    }
    if let Some(add) = add {
        if add.len() < rows {
            return Err(Error::buffer_too_small(rows, add.len()));
        }
    }

    let strip = rows_per_strip(rows, simd_level().f32_lanes());
    debug!(codec = W::NAME, rows, cols, strip, "mat_vec");

    pool.install(|| {
        out[..rows]
            .par_chunks_mut(strip)
            .enumerate()
            .try_for_each(|(s, chunk)| -> Result<()> {
                for (i, o) in chunk.iter_mut().enumerate() {
                    let r = s * strip + i;
                    let row = mat_offset + r * cols;
                    let mut sum = 0.0f32;
                    let mut c = 0;
                    while c < cols {
                        let n = MAX_COLS.min(cols - c);
                        let vs = PackedSpan::new(&v[c..c + n], n);
                        sum += dot(mat, row + c, &vs, n)?;
                        c += n;
                    }
                    *o = sum + add.map_or(0.0, |a| a[r]);
                }
                Ok(())
            })
    })
}
