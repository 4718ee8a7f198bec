//! # Quantra SFP
//!
//! Switching floating point: one byte per weight, a sign bit plus a 7-bit
//! magnitude that switches between two minifloat layouts.
//!
//! ## Format
//!
//! | bit 6 | layout | value | range |
//! |---|---|---|---|
//! | 1 | 3-bit exponent, 3-bit mantissa | `(1 + m/8) * 2^(e-7)` | `[2^-7, 1.875]` |
//! | 0 | 4-bit exponent, 2-bit mantissa | `(1 + m/4) * 2^(e-23)`, `e = 0` is zero | `[2^-22, 2^-7)` |
//!
//! Magnitudes above [`SfpStream::MAX`] saturate, so weights are usually
//! rescaled with [`scale_weights`] first.
//!
//! ## Example
//!
//! ```ignore
//! use quantra_sfp::{scale_weights, SfpCodec, SfpStream};
//!
//! let scale = scale_weights(&mut weights);
//! SfpCodec::enc(&weights, &mut span, 0)?;
//! ```

pub mod codec;
pub mod stream;

// Re-export main types
pub use codec::{scale_weights, SfpCodec};
pub use stream::SfpStream;
