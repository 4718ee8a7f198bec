//! # Quantra NUQ
//!
//! Non-uniform quantization: every group of 256 weights is clustered into at
//! most 16 centers with exact minimum squared error, and each weight is
//! stored as a 4-bit index into its group's center table.
//!
//! ## Features
//!
//! - **Exact clustering**: optimal 1-D partition, not Lloyd iterations
//! - **6 bits per weight**: 64 bytes of centers + 128 bytes of indices per
//!   group
//! - **Sub-region encode**: any group-aligned region can be re-encoded in
//!   place without touching its neighbours
//! - **Random access decode**: any offset, any lane width
//!
//! ## Example
//!
//! ```ignore
//! use quantra_core::{Packed, PackedSpanMut};
//! use quantra_nuq::{ClusterBuf, NuqCodec, NuqStream};
//!
//! let mut storage = vec![NuqStream::default(); NuqStream::packed_end(weights.len())];
//! let mut span = PackedSpanMut::new(&mut storage, weights.len());
//! let unused = NuqCodec::enc(&weights, &mut ClusterBuf::new(), &mut span, 0)?;
//! ```

pub mod cluster;
pub mod codec;
pub mod nibble;
pub mod stream;

// Re-export main types
pub use cluster::{ClusterBuf, NuqClustering};
pub use codec::NuqCodec;
pub use nibble::NibbleCodec;
pub use stream::{NuqStream, CLUSTERS, GROUP_BYTES, GROUP_SIZE};
