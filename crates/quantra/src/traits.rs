//! Uniform codec interface over every packed representation.
//!
//! The set of implementors is closed: `f32`, `bf16`, [`SfpStream`] and
//! [`NuqStream`]. The element type of a span selects its codec at compile
//! time.

use half::bf16;
use quantra_core::{Error, Lane, Packed, PackedSpan, PackedSpanMut, Result};
use quantra_nuq::{NuqCodec, NuqStream};
use quantra_sfp::{SfpCodec, SfpStream};

use crate::work::CompressPerThread;

/// Encode and decode operations shared by all packed representations.
pub trait CompressTraits: Packed {
    /// Encodes `raw` into `packed` at element `offset`.
    ///
    /// When `tls.collect_stats` is set, records the distortion of every
    /// element in `tls.stats`.
    fn compress(
        raw: &[f32],
        tls: &mut CompressPerThread,
        packed: &mut PackedSpanMut<'_, Self>,
        offset: usize,
    ) -> Result<()>;

    /// Decodes `2N` elements at `offset` into two lane arrays.
    ///
    /// Unchecked; [`decompress2`](crate::decompress2) is the checked entry
    /// point. Equals the first `2N` elements of
    /// [`Self::decompress_and_zero_pad`] at the same offset.
    fn load2<T: Lane, const N: usize>(packed: &PackedSpan<'_, Self>, offset: usize) -> ([T; N], [T; N]);

    /// Decodes `num` elements at `offset` into `out` and zero-fills `out` up
    /// to the next multiple of `N`.
    fn decompress_and_zero_pad<T: Lane, const N: usize>(
        packed: &PackedSpan<'_, Self>,
        offset: usize,
        out: &mut [T],
        num: usize,
    ) -> Result<()>;
}

/// Direct stores of two lane arrays, for the element-wise representations.
pub trait Store2: CompressTraits {
    /// Stores `v0` then `v1` at `offset`. Unchecked; see
    /// [`compress2`](crate::compress2).
    fn store2<const N: usize>(v0: &[f32; N], v1: &[f32; N], packed: &mut PackedSpanMut<'_, Self>, offset: usize);
}

/// Checks shared by the element-wise decoders.
#[inline]
fn check_decode<P: Packed, T>(
    packed: &PackedSpan<'_, P>,
    offset: usize,
    out: &[T],
    num: usize,
    lanes: usize,
) -> Result<usize> {
    packed.bounds_check(offset, num)?;
    let padded = num.next_multiple_of(lanes);
    if out.len() < padded {
        return Err(Error::buffer_too_small(padded, out.len()));
    }
    Ok(padded)
}

impl CompressTraits for f32 {
    fn compress(
        raw: &[f32],
        _tls: &mut CompressPerThread,
        packed: &mut PackedSpanMut<'_, Self>,
        offset: usize,
    ) -> Result<()> {
        packed.bounds_check(offset, raw.len())?;
        packed.storage_mut()[offset..offset + raw.len()].copy_from_slice(raw);
        Ok(())
    }

    #[inline]
    fn load2<T: Lane, const N: usize>(packed: &PackedSpan<'_, Self>, offset: usize) -> ([T; N], [T; N]) {
        let src = &packed.storage()[offset..offset + 2 * N];
        (
            core::array::from_fn(|i| T::from_f32(src[i])),
            core::array::from_fn(|i| T::from_f32(src[N + i])),
        )
    }

    fn decompress_and_zero_pad<T: Lane, const N: usize>(
        packed: &PackedSpan<'_, Self>,
        offset: usize,
        out: &mut [T],
        num: usize,
    ) -> Result<()> {
        let padded = check_decode(packed, offset, out, num, N)?;
        for (d, &s) in out.iter_mut().zip(&packed.storage()[offset..offset + num]) {
            *d = T::from_f32(s);
        }
        out[num..padded].fill(T::ZERO);
        Ok(())
    }
}

impl Store2 for f32 {
    #[inline]
    fn store2<const N: usize>(v0: &[f32; N], v1: &[f32; N], packed: &mut PackedSpanMut<'_, Self>, offset: usize) {
        let dst = &mut packed.storage_mut()[offset..offset + 2 * N];
        dst[..N].copy_from_slice(v0);
        dst[N..].copy_from_slice(v1);
    }
}

impl CompressTraits for bf16 {
    fn compress(
        raw: &[f32],
        tls: &mut CompressPerThread,
        packed: &mut PackedSpanMut<'_, Self>,
        offset: usize,
    ) -> Result<()> {
        packed.bounds_check(offset, raw.len())?;
        let dst = &mut packed.storage_mut()[offset..offset + raw.len()];
        for (d, &v) in dst.iter_mut().zip(raw) {
            *d = bf16::from_f32(v);
        }
        if tls.collect_stats {
            for (d, &v) in dst.iter().zip(raw) {
                tls.stats.notify(v, d.to_f32());
            }
        }
        Ok(())
    }

    #[inline]
    fn load2<T: Lane, const N: usize>(packed: &PackedSpan<'_, Self>, offset: usize) -> ([T; N], [T; N]) {
        let src = &packed.storage()[offset..offset + 2 * N];
        (
            core::array::from_fn(|i| T::from_f32(src[i].to_f32())),
            core::array::from_fn(|i| T::from_f32(src[N + i].to_f32())),
        )
    }

    fn decompress_and_zero_pad<T: Lane, const N: usize>(
        packed: &PackedSpan<'_, Self>,
        offset: usize,
        out: &mut [T],
        num: usize,
    ) -> Result<()> {
        let padded = check_decode(packed, offset, out, num, N)?;
        for (d, s) in out.iter_mut().zip(&packed.storage()[offset..offset + num]) {
            *d = T::from_f32(s.to_f32());
        }
        out[num..padded].fill(T::ZERO);
        Ok(())
    }
}

impl Store2 for bf16 {
    #[inline]
    fn store2<const N: usize>(v0: &[f32; N], v1: &[f32; N], packed: &mut PackedSpanMut<'_, Self>, offset: usize) {
        let dst = &mut packed.storage_mut()[offset..offset + 2 * N];
        for (d, &v) in dst.iter_mut().zip(v0.iter().chain(v1.iter())) {
            *d = bf16::from_f32(v);
        }
    }
}

impl CompressTraits for SfpStream {
    fn compress(
        raw: &[f32],
        tls: &mut CompressPerThread,
        packed: &mut PackedSpanMut<'_, Self>,
        offset: usize,
    ) -> Result<()> {
        SfpCodec::enc(raw, packed, offset)?;
        if tls.collect_stats {
            let encoded = &packed.storage()[offset..offset + raw.len()];
            for (e, &v) in encoded.iter().zip(raw) {
                tls.stats.notify(v, e.decode());
            }
        }
        Ok(())
    }

    #[inline]
    fn load2<T: Lane, const N: usize>(packed: &PackedSpan<'_, Self>, offset: usize) -> ([T; N], [T; N]) {
        SfpCodec::dec2(packed, offset)
    }

    fn decompress_and_zero_pad<T: Lane, const N: usize>(
        packed: &PackedSpan<'_, Self>,
        offset: usize,
        out: &mut [T],
        num: usize,
    ) -> Result<()> {
        SfpCodec::decompress_and_zero_pad::<T, N>(packed, offset, out, num)
    }
}

impl CompressTraits for NuqStream {
    fn compress(
        raw: &[f32],
        tls: &mut CompressPerThread,
        packed: &mut PackedSpanMut<'_, Self>,
        offset: usize,
    ) -> Result<()> {
        let unused = NuqCodec::enc(raw, &mut tls.buf, packed, offset)?;
        tls.unused_clusters += unused;

        if tls.collect_stats {
            tls.decoded.clear();
            tls.decoded.resize(raw.len(), 0.0);
            NuqCodec::decompress_and_zero_pad::<f32, 1>(&packed.as_const(), offset, &mut tls.decoded, raw.len())?;
            for (&v, &d) in raw.iter().zip(tls.decoded.iter()) {
                tls.stats.notify_input(v);
                tls.stats.notify(v, d);
            }
        }
        Ok(())
    }

    #[inline]
    fn load2<T: Lane, const N: usize>(packed: &PackedSpan<'_, Self>, offset: usize) -> ([T; N], [T; N]) {
        NuqCodec::dec2(packed, offset)
    }

    fn decompress_and_zero_pad<T: Lane, const N: usize>(
        packed: &PackedSpan<'_, Self>,
        offset: usize,
        out: &mut [T],
        num: usize,
    ) -> Result<()> {
        NuqCodec::decompress_and_zero_pad::<T, N>(packed, offset, out, num)
    }
}
