// Allow explicit indexing in numerical code where it's clearer
#![allow(clippy::needless_range_loop)]

//! # Quantra
//!
//! Lossy compression of model weight tensors with decode fused into the
//! consuming reduction.
//!
//! Weights are compressed once, offline or at load time, into one of four
//! representations. At inference time kernels decode a few lanes at a time
//! and feed them straight into a dot product or norm, so no full-precision
//! copy of the tensor is ever materialized.
//!
//! ## Quick Start
//!
//! ```ignore
//! use quantra::{compress, dot, thread_pool, CompressConfig, CompressWorkingSet};
//! use quantra::{NuqStream, Packed, PackedSpan, PackedSpanMut};
//!
//! let pool = thread_pool(4)?;
//! let mut work = CompressWorkingSet::new(CompressConfig::default());
//! let mut storage = vec![NuqStream::default(); NuqStream::packed_end(weights.len())];
//! compress(&weights, &mut work, &mut PackedSpanMut::new(&mut storage, weights.len()), 0, &pool)?;
//!
//! let w = PackedSpan::new(&storage, weights.len());
//! let y = dot(&w, 0, &PackedSpan::from_slice(&x), x.len())?;
//! ```
//!
//! ## Representations
//!
//! | Type | Bits/weight | Notes |
//! |------|-------------|-------|
//! | `f32` | 32 | Exact |
//! | `bf16` | 16 | Round to nearest even |
//! | [`SfpStream`] | 8 | Magnitudes up to 1.875, scale first |
//! | [`NuqStream`] | 6 | 16 clusters per group of 256 |
//!
//! ## Feature Flags
//!
//! - `testing` - Quality metrics and data generators for test suites

pub mod array;
pub mod compress;
pub mod compressor;
pub mod decompress;
pub mod kernel;
pub mod ops;
pub mod traits;
pub mod work;

// Available when `testing` feature is enabled or during tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use array::CompressedArray;
pub use compress::{compress, compress2, compress_scaled, BATCH_SIZE};
pub use compressor::{cache_key, BlobWriter, Compressor, FileBlobWriter};
pub use decompress::{decompress2, decompress_and_call, decompress_and_call1, decompress_and_zero_pad};
pub use kernel::{Accumulators, DotKernelCompensated, DotKernelDefault, Kernel, SquaredNormKernel};
pub use ops::{dot, mat_vec, squared_norm};
pub use traits::{CompressTraits, Store2};
pub use work::{thread_pool, CompressConfig, CompressPerThread, CompressWorkingSet};

// Re-export the codec layer
pub use quantra_core::{
    bf16, simd_level, DistortionStats, DistortionSummary, Error, Lane, Packed, PackedSpan,
    PackedSpanMut, Result, SimdLevel, Stats,
};
pub use quantra_nuq::{ClusterBuf, NibbleCodec, NuqClustering, NuqCodec, NuqStream};
pub use quantra_sfp::{scale_weights, SfpCodec, SfpStream};
