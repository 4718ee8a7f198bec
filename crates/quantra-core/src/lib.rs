//! # Quantra Core
//!
//! Core types shared by every quantra codec.
//!
//! Quantra stores model weight tensors in compact lossy representations and
//! decodes them on demand, usually fused with a reduction such as a dot
//! product so that no full-precision copy of the tensor is ever built.
//!
//! ## Design Philosophy
//!
//! - **Caller-owned buffers**: codecs write into storage the caller sized
//!   with [`Packed::packed_end`]
//! - **Checked entry points**: every codec operation validates its region
//!   against the [`PackedSpan`] before touching memory
//! - **Static dispatch**: the packed element type selects the codec at
//!   compile time, lane width is a const generic
//!
//! ## Core Types
//!
//! - [`Packed`] - Storage element of a compressed stream
//! - [`PackedSpan`] / [`PackedSpanMut`] - Bounds-checked views over storage
//! - [`Lane`] - Decode target (`f32` or `bf16`)
//! - [`DistortionStats`] - Diagnostic error metrics
//!
//! ## Example
//!
//! ```ignore
//! use quantra_core::{PackedSpan, Packed};
//!
//! let storage = vec![0.0f32; 64];
//! let span = PackedSpan::new(&storage, 64);
//! span.bounds_check(32, 32)?;
//! ```

pub mod error;
pub mod lane;
pub mod simd;
pub mod span;
pub mod stats;

pub use error::{Error, Result};
pub use half::bf16;
pub use lane::Lane;
pub use simd::{detect_simd, simd_level, SimdLevel};
pub use span::{Packed, PackedSpan, PackedSpanMut};
pub use stats::{DistortionStats, DistortionSummary, Stats};
