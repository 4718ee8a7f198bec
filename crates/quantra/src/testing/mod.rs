//! Helpers for validating codecs in test suites.
//!
//! Available when the `testing` feature is enabled, or when running tests.
//!
//! ```toml
//! [dev-dependencies]
//! quantra = { version = "...", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use quantra::testing::{compute_quality, gaussian, round_trip};
//! use quantra::NuqStream;
//!
//! let weights = gaussian(4096, 0.1, 42);
//! let decoded = round_trip::<NuqStream>(&weights)?;
//! println!("{}", compute_quality(&weights, &decoded));
//! ```

pub mod metrics;

pub use metrics::{compute_quality, cosine_similarity, max_error, mse, psnr_from_mse, QualityReport};

use quantra_core::{PackedSpanMut, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::traits::CompressTraits;
use crate::work::CompressPerThread;

/// `num` samples of N(0, sigma²) from a seeded generator.
pub fn gaussian(num: usize, sigma: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num).map(|_| rng.sample::<f32, _>(StandardNormal) * sigma).collect()
}

/// `num` samples uniform in `[lo, hi)`.
pub fn uniform(num: usize, lo: f32, hi: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num).map(|_| rng.gen_range(lo..hi)).collect()
}

/// Compresses `raw` as `P` on the calling thread and decodes it back.
pub fn round_trip<P: CompressTraits>(raw: &[f32]) -> Result<Vec<f32>> {
    let num = raw.len();
    let mut storage = vec![P::default(); P::packed_end(num)];
    let mut span = PackedSpanMut::new(&mut storage, num);
    P::compress(raw, &mut CompressPerThread::new(false), &mut span, 0)?;

    let mut out = vec![0.0f32; num];
    P::decompress_and_zero_pad::<f32, 1>(&span.as_const(), 0, &mut out, num)?;
    Ok(out)
}
