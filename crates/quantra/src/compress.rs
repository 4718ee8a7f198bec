//! Parallel batch compression.

use std::time::Instant;

use quantra_core::{Error, PackedSpanMut, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info};

use crate::array::CompressedArray;
use crate::traits::{CompressTraits, Store2};
use crate::work::{CompressPerThread, CompressWorkingSet};

/// Elements compressed by one task.
pub const BATCH_SIZE: usize = 8192;

// Batches must start on NUQ group boundaries so their storage is disjoint.
const _: () = assert!(BATCH_SIZE % quantra_nuq::GROUP_SIZE == 0);

/// Compresses `raw` into `packed` starting at element `offset`, on `pool`.
///
/// The region is split into [`BATCH_SIZE`] batches whose storage ranges are
/// disjoint; each worker encodes whole batches with its own
/// [`CompressPerThread`]. The per-worker states are merged into `work` after
/// all batches finish. The first error from any batch is returned.
pub fn compress<P: CompressTraits>(
    raw: &[f32],
    work: &mut CompressWorkingSet,
    packed: &mut PackedSpanMut<'_, P>,
    offset: usize,
    pool: &ThreadPool,
) -> Result<()> {
    if offset % P::ALIGNMENT != 0 {
        return Err(Error::misaligned(offset, P::ALIGNMENT));
    }
    let num = raw.len();
    packed.bounds_check(offset, num)?;

    let config = *work.config();
    let start = Instant::now();

    let begin = P::packed_end(offset);
    let end = P::packed_end(offset + num);
    let region = &mut packed.storage_mut()[begin..end];
    let batch_units = P::packed_end(BATCH_SIZE);

    let tls = pool.install(|| {
        region
            .par_chunks_mut(batch_units)
            .zip(raw.par_chunks(BATCH_SIZE))
            .try_fold(
                || CompressPerThread::new(config.collect_stats),
                |mut tls, (dst, src)| {
                    let mut batch = PackedSpanMut::new(dst, src.len());
                    P::compress(src, &mut tls, &mut batch, 0)?;
                    Ok::<_, Error>(tls)
                },
            )
            .collect::<Result<Vec<_>>>()
    })?;
    debug!(codec = P::NAME, num, workers = tls.len(), "batches complete");
    work.absorb(tls);

    if config.collect_stats || num > config.report_throughput_above {
        let elapsed = start.elapsed().as_secs_f64();
        let mb = (num * core::mem::size_of::<f32>()) as f64 / 1_000_000.0;
        let throughput_mbs = if elapsed > 0.0 { mb / elapsed } else { 0.0 };
        info!(codec = P::NAME, num, throughput_mbs, "compressed");
    }
    if config.collect_stats {
        work.stats().log_summary(P::NAME);
    }
    Ok(())
}

/// Compresses `raw` into the start of `compressed`.
///
/// For [`SfpStream`](quantra_sfp::SfpStream), `raw` must already be scaled
/// into range; see [`scale_weights`](quantra_sfp::scale_weights).
pub fn compress_scaled<P: CompressTraits, const CAPACITY: usize>(
    raw: &[f32],
    work: &mut CompressWorkingSet,
    compressed: &mut CompressedArray<P, CAPACITY>,
    pool: &ThreadPool,
) -> Result<()> {
    compress(raw, work, &mut compressed.span_mut(), 0, pool)
}

/// Stores two lane arrays to `packed` at `offset`, for `f32` and `bf16`.
pub fn compress2<P: Store2, const N: usize>(
    raw0: &[f32; N],
    raw1: &[f32; N],
    packed: &mut PackedSpanMut<'_, P>,
    offset: usize,
) -> Result<()> {
    packed.bounds_check(offset, 2 * N)?;
    P::store2(raw0, raw1, packed, offset);
    Ok(())
}
