//! Owned, fixed-capacity compressed tensors.

use quantra_core::{Packed, PackedSpan, PackedSpanMut};

/// Storage for `CAPACITY` elements in representation `P`, plus the scale
/// that was divided out of the weights before compression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedArray<P: Packed, const CAPACITY: usize> {
    data: Box<[P]>,
    scale: f32,
}

impl<P: Packed, const CAPACITY: usize> CompressedArray<P, CAPACITY> {
    /// Zero-initialized storage sized by [`Packed::packed_end`].
    pub fn new() -> Self {
        Self {
            data: vec![P::default(); P::packed_end(CAPACITY)].into_boxed_slice(),
            scale: 1.0,
        }
    }

    /// Number of logical elements.
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    pub fn data(&self) -> &[P] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [P] {
        &mut self.data
    }

    /// Factor to multiply decoded values by.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    /// Size of the packed storage in bytes.
    pub fn compressed_size(&self) -> usize {
        self.data.len() * core::mem::size_of::<P>()
    }

    pub fn span(&self) -> PackedSpan<'_, P> {
        PackedSpan::new(&self.data, CAPACITY)
    }

    pub fn span_mut(&mut self) -> PackedSpanMut<'_, P> {
        PackedSpanMut::new(&mut self.data, CAPACITY)
    }

    /// Little-endian serialization of the packed storage.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.compressed_size());
        P::extend_le_bytes(&self.data, &mut out);
        out
    }
}

impl<P: Packed, const CAPACITY: usize> Default for CompressedArray<P, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
