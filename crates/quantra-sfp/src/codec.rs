//! SFP encoder and decoders.

use quantra_core::{Error, Lane, PackedSpan, PackedSpanMut, Result};
use tracing::debug;

use crate::stream::SfpStream;

/// Encoder and decoders for [`SfpStream`].
pub struct SfpCodec;

impl SfpCodec {
    /// Encodes `raw` into `packed` starting at element `offset`.
    pub fn enc(raw: &[f32], packed: &mut PackedSpanMut<'_, SfpStream>, offset: usize) -> Result<()> {
        packed.bounds_check(offset, raw.len())?;
        let dst = &mut packed.storage_mut()[offset..offset + raw.len()];
        for (d, &v) in dst.iter_mut().zip(raw) {
            *d = SfpStream::encode(v);
        }
        Ok(())
    }

    /// Decodes `num` elements starting at `offset` into `out`, then zero-fills
    /// up to the next multiple of `N`.
    pub fn decompress_and_zero_pad<T: Lane, const N: usize>(
        packed: &PackedSpan<'_, SfpStream>,
        offset: usize,
        out: &mut [T],
        num: usize,
    ) -> Result<()> {
        packed.bounds_check(offset, num)?;
        let padded = num.next_multiple_of(N);
        if out.len() < padded {
            return Err(Error::buffer_too_small(padded, out.len()));
        }
        let src = &packed.storage()[offset..offset + num];
        for (d, s) in out.iter_mut().zip(src) {
            *d = T::from_f32(s.decode());
        }
        out[num..padded].fill(T::ZERO);
        Ok(())
    }

    /// Decodes `2N` elements at `offset` into two lane arrays.
    ///
    /// The caller has already checked `[offset, offset + 2N)` against the
    /// span.
    #[inline]
    pub fn dec2<T: Lane, const N: usize>(
        packed: &PackedSpan<'_, SfpStream>,
        offset: usize,
    ) -> ([T; N], [T; N]) {
        let src = &packed.storage()[offset..offset + 2 * N];
        (
            core::array::from_fn(|i| T::from_f32(src[i].decode())),
            core::array::from_fn(|i| T::from_f32(src[N + i].decode())),
        )
    }
}

/// Rescales `raw` in place so every magnitude fits [`SfpStream::MAX`].
///
/// Returns the factor to multiply decoded values by, 1.0 if no scaling was
/// needed.
pub fn scale_weights(raw: &mut [f32]) -> f32 {
    let max_abs = raw.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    if max_abs <= SfpStream::MAX {
        return 1.0;
    }
    let scale = max_abs / SfpStream::MAX;
    let inv_scale = 1.0 / scale;
    for v in raw.iter_mut() {
        // Rounding of the product may land just above MAX.
        *v = (*v * inv_scale).clamp(-SfpStream::MAX, SfpStream::MAX);
    }
    debug!(max_abs, scale, "scaled weights for sfp");
    scale
}
