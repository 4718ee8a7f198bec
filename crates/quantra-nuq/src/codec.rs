//! NUQ encoder and decoders.

use quantra_core::{Error, Lane, PackedSpan, PackedSpanMut, Result};
use tracing::trace;

use crate::cluster::{ClusterBuf, NuqClustering};
use crate::nibble::NibbleCodec;
use crate::stream::{
    nibble_location, NuqStream, CENTER_BYTES, CLUSTERS, GROUP_BYTES, GROUP_SIZE, NIBBLE_LANES,
    UNIT_BYTES, UNIT_INDICES,
};

/// Encoder and decoders for [`NuqStream`].
pub struct NuqCodec;

#[inline]
fn read_f32(bytes: &[u8], at: usize) -> f32 {
    let b = &bytes[at..at + 4];
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// Centers of the group starting at byte `base`, converted to `T`.
#[inline]
fn center_table<T: Lane>(bytes: &[u8], base: usize) -> [T; CLUSTERS] {
    core::array::from_fn(|c| T::from_f32(read_f32(bytes, base + 4 * c)))
}

/// Decodes `out.len()` elements of one group starting at `within`.
fn decode_group<T: Lane>(index_bytes: &[u8], table: &[T; CLUSTERS], within: usize, out: &mut [T]) {
    let mut pos = within;
    let mut done = 0;
    while done < out.len() {
        let remaining = out.len() - done;
        if pos % UNIT_INDICES == 0 && remaining >= UNIT_INDICES {
            let unit = &index_bytes[(pos / UNIT_INDICES) * UNIT_BYTES..][..UNIT_BYTES];
            let (lo, hi) = unit.split_at(NIBBLE_LANES);
            let lanes = [
                NibbleCodec::ordered_unpack_u16::<0, NIBBLE_LANES>(lo),
                NibbleCodec::ordered_unpack_u16::<1, NIBBLE_LANES>(lo),
                NibbleCodec::ordered_unpack_u16::<0, NIBBLE_LANES>(hi),
                NibbleCodec::ordered_unpack_u16::<1, NIBBLE_LANES>(hi),
            ];
            let dst = &mut out[done..done + UNIT_INDICES];
            for (chunk, lane) in dst.chunks_exact_mut(NIBBLE_LANES).zip(lanes.iter()) {
                for (d, &idx) in chunk.iter_mut().zip(lane.iter()) {
                    *d = table[idx as usize];
                }
            }
            pos += UNIT_INDICES;
            done += UNIT_INDICES;
        } else {
            let (byte, shift) = nibble_location(pos);
            out[done] = table[usize::from((index_bytes[byte] >> shift) & 0xF)];
            pos += 1;
            done += 1;
        }
    }
}

impl NuqCodec {
    /// Encodes `raw` into `packed` starting at element `offset`.
    ///
    /// `offset` must be a multiple of [`GROUP_SIZE`]. Only the groups covering
    /// `[offset, offset + raw.len())` are written; a trailing partial group is
    /// clustered with zero padding. Returns the total number of unused
    /// clusters over all groups.
    pub fn enc(
        raw: &[f32],
        buf: &mut ClusterBuf,
        packed: &mut PackedSpanMut<'_, NuqStream>,
        offset: usize,
    ) -> Result<usize> {
        if offset % GROUP_SIZE != 0 {
            return Err(Error::misaligned(offset, GROUP_SIZE));
        }
        packed.bounds_check(offset, raw.len())?;

        let bytes = NuqStream::as_bytes_mut(packed.storage_mut());
        let first_group = offset / GROUP_SIZE;
        let mut centers = [0.0f32; CLUSTERS];
        let mut indices = [0u16; GROUP_SIZE];
        let mut unused = 0;

        for (g, group_raw) in raw.chunks(GROUP_SIZE).enumerate() {
            unused += NuqClustering::cluster_exact_l2(group_raw, buf, &mut centers, &mut indices);

            let base = (first_group + g) * GROUP_BYTES;
            let (table, index_bytes) = bytes[base..base + GROUP_BYTES].split_at_mut(CENTER_BYTES);
            for (dst, center) in table.chunks_exact_mut(4).zip(centers.iter()) {
                dst.copy_from_slice(&center.to_le_bytes());
            }
            for (unit, out) in indices
                .chunks_exact(UNIT_INDICES)
                .zip(index_bytes.chunks_exact_mut(UNIT_BYTES))
            {
                let lane = |q: usize| -> [u16; NIBBLE_LANES] {
                    core::array::from_fn(|j| unit[q * NIBBLE_LANES + j])
                };
                NibbleCodec::ordered_pack_u16(&lane(0), &lane(1), &lane(2), &lane(3), out);
            }
        }
        trace!(offset, num = raw.len(), unused, "nuq encoded");
        Ok(unused)
    }

    /// Decodes `num` elements starting at any `offset` into `out`, then
    /// zero-fills up to the next multiple of `N`.
    ///
    /// `out` must hold `num` rounded up to `N`. No index or center beyond the
    /// groups covering `[offset, offset + num)` is read.
    pub fn decompress_and_zero_pad<T: Lane, const N: usize>(
        packed: &PackedSpan<'_, NuqStream>,
        offset: usize,
        out: &mut [T],
        num: usize,
    ) -> Result<()> {
        packed.bounds_check(offset, num)?;
        let padded = num.next_multiple_of(N);
        if out.len() < padded {
            return Err(Error::buffer_too_small(padded, out.len()));
        }

        let bytes = NuqStream::as_bytes(packed.storage());
        let mut done = 0;
        while done < num {
            let pos = offset + done;
            let base = (pos / GROUP_SIZE) * GROUP_BYTES;
            let within = pos % GROUP_SIZE;
            let take = (GROUP_SIZE - within).min(num - done);

            let table = center_table::<T>(bytes, base);
            let index_bytes = &bytes[base + CENTER_BYTES..base + GROUP_BYTES];
            decode_group(index_bytes, &table, within, &mut out[done..done + take]);
            done += take;
        }
        out[num..padded].fill(T::ZERO);
        Ok(())
    }

    /// Decodes `2N` elements at any `offset` into two lane arrays.
    ///
    /// The caller has already checked `[offset, offset + 2N)` against the
    /// span.
    #[inline]
    pub fn dec2<T: Lane, const N: usize>(
        packed: &PackedSpan<'_, NuqStream>,
        offset: usize,
    ) -> ([T; N], [T; N]) {
        let bytes = NuqStream::as_bytes(packed.storage());
        let at = |i: usize| -> T {
            let pos = offset + i;
            let base = (pos / GROUP_SIZE) * GROUP_BYTES;
            let (byte, shift) = nibble_location(pos % GROUP_SIZE);
            let idx = usize::from((bytes[base + CENTER_BYTES + byte] >> shift) & 0xF);
            T::from_f32(read_f32(bytes, base + 4 * idx))
        };
        (core::array::from_fn(at), core::array::from_fn(|i| at(N + i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quantra_core::{bf16, DistortionStats, Packed};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn gaussian(num: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..num).map(|_| rng.sample(StandardNormal)).collect()
    }

    fn encode(raw: &[f32]) -> Vec<NuqStream> {
        let mut storage = vec![NuqStream::default(); NuqStream::packed_end(raw.len())];
        let mut span = PackedSpanMut::new(&mut storage, raw.len());
        NuqCodec::enc(raw, &mut ClusterBuf::new(), &mut span, 0).unwrap();
        storage
    }

    #[test]
    fn test_enc_dec_gaussian() {
        let num = 4 * GROUP_SIZE;
        let raw = gaussian(num, 1);
        let mut storage = vec![NuqStream::default(); NuqStream::packed_end(num)];
        let mut span = PackedSpanMut::new(&mut storage, num);
        let unused = NuqCodec::enc(&raw, &mut ClusterBuf::new(), &mut span, 0).unwrap();
        assert_eq!(unused, 0);

        let mut out = vec![0.0f32; num];
        NuqCodec::decompress_and_zero_pad::<f32, 8>(&span.as_const(), 0, &mut out, num).unwrap();

        let mut stats = DistortionStats::new();
        for (&o, &d) in raw.iter().zip(out.iter()) {
            stats.notify(o, d);
        }
        assert!(stats.num_sign_flip() < num / CLUSTERS);
        assert_eq!(stats.num_rounded_to_zero(), 0);
        assert!(stats.l1().mean() < 0.08, "mean l1 {}", stats.l1().mean());
        assert!(stats.l1().max() <= 0.25);
    }

    #[test]
    fn test_offset_reencode() {
        let total = 10 * GROUP_SIZE;
        let mid_len = 2 * GROUP_SIZE;
        let raw = gaussian(total, 2);

        let mut storage = vec![NuqStream::default(); NuqStream::packed_end(total)];
        let mut span = PackedSpanMut::new(&mut storage, total);
        let mut buf = ClusterBuf::new();
        NuqCodec::enc(&raw, &mut buf, &mut span, 0).unwrap();
        let mut dec1 = vec![bf16::ZERO; total];
        NuqCodec::decompress_and_zero_pad::<bf16, 16>(&span.as_const(), 0, &mut dec1, total).unwrap();

        // Overwrite the middle with the first inputs.
        let offset = 5 * GROUP_SIZE;
        NuqCodec::enc(&raw[..mid_len], &mut buf, &mut span, offset).unwrap();

        let mut dec2 = vec![bf16::ZERO; mid_len];
        NuqCodec::decompress_and_zero_pad::<bf16, 16>(&span.as_const(), offset, &mut dec2, mid_len)
            .unwrap();
        assert_eq!(&dec2[..], &dec1[..mid_len]);

        // Neighbouring groups are untouched.
        let mut after = vec![bf16::ZERO; total];
        NuqCodec::decompress_and_zero_pad::<bf16, 16>(&span.as_const(), 0, &mut after, total).unwrap();
        assert_eq!(&after[..offset], &dec1[..offset]);
        assert_eq!(&after[offset + mid_len..], &dec1[offset + mid_len..]);
    }

    #[test]
    fn test_misaligned_offset() {
        let mut storage = vec![NuqStream::default(); NuqStream::packed_end(512)];
        let mut span = PackedSpanMut::new(&mut storage, 512);
        let err = NuqCodec::enc(&[1.0; 16], &mut ClusterBuf::new(), &mut span, 100).unwrap_err();
        assert!(matches!(err, Error::Misaligned { offset: 100, alignment: GROUP_SIZE }));
    }

    #[test]
    fn test_enc_out_of_bounds() {
        let mut storage = vec![NuqStream::default(); NuqStream::packed_end(256)];
        let mut span = PackedSpanMut::new(&mut storage, 256);
        let err = NuqCodec::enc(&[1.0; 300], &mut ClusterBuf::new(), &mut span, 0).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));
    }

    #[test]
    fn test_partial_group_zero_pad() {
        let num = 300;
        let raw = gaussian(num, 3);
        let storage = encode(&raw);
        let span = PackedSpan::new(&storage, num);

        let mut out = vec![f32::NAN; num.next_multiple_of(16)];
        NuqCodec::decompress_and_zero_pad::<f32, 16>(&span, 0, &mut out, num).unwrap();
        assert!(out[num..].iter().all(|&v| v == 0.0));
        for (&o, &d) in raw.iter().zip(out.iter()) {
            assert!((o - d).abs() <= 0.25);
        }
    }

    #[test]
    fn test_buffer_too_small() {
        let raw = gaussian(100, 4);
        let storage = encode(&raw);
        let span = PackedSpan::new(&storage, 100);
        let mut out = vec![0.0f32; 100];
        let err = NuqCodec::decompress_and_zero_pad::<f32, 8>(&span, 0, &mut out, 100).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { required: 104, provided: 100 }));
    }

    #[test]
    fn test_no_read_past_region() {
        let num = 2 * GROUP_SIZE;
        let raw = gaussian(num, 5);
        let mut storage = encode(&raw);
        let span = PackedSpan::new(&storage, num);
        let mut expected = vec![0.0f32; num];
        NuqCodec::decompress_and_zero_pad::<f32, 4>(&span, 0, &mut expected, num).unwrap();

        // Poison the second group; decoding inside the first must not see it.
        for unit in &mut storage[GROUP_BYTES..] {
            *unit = NuqStream(0xFF);
        }
        let span = PackedSpan::new(&storage, num);
        let (offset, len) = (37, 200);
        let mut out = vec![0.0f32; len];
        NuqCodec::decompress_and_zero_pad::<f32, 4>(&span, offset, &mut out, len).unwrap();
        assert_eq!(&out[..], &expected[offset..offset + len]);
    }

    #[test]
    fn test_dec2_matches_decompress() {
        let num = 3 * GROUP_SIZE;
        let raw = gaussian(num, 6);
        let storage = encode(&raw);
        let span = PackedSpan::new(&storage, num);
        let mut full = vec![0.0f32; num];
        NuqCodec::decompress_and_zero_pad::<f32, 8>(&span, 0, &mut full, num).unwrap();

        for offset in [0, 5, 64, 250, 511] {
            let (a, b) = NuqCodec::dec2::<f32, 8>(&span, offset);
            assert_eq!(&a[..], &full[offset..offset + 8]);
            assert_eq!(&b[..], &full[offset + 8..offset + 16]);
        }
    }

    #[test]
    fn test_zeros() {
        let raw = vec![0.0f32; GROUP_SIZE];
        let storage = encode(&raw);
        let span = PackedSpan::new(&storage, GROUP_SIZE);
        let mut out = vec![1.0f32; GROUP_SIZE];
        NuqCodec::decompress_and_zero_pad::<f32, 16>(&span, 0, &mut out, GROUP_SIZE).unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
