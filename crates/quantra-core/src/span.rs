//! Packed storage elements and bounds-checked views over them.
//!
//! A span pairs a storage slice with the *logical* number of elements it
//! encodes. For element-wise formats the two coincide; grouped formats such
//! as NUQ need [`Packed::packed_end`] storage units for `num` elements.
//! Constructing a span validates nothing, so one span can back many
//! sub-region operations; each operation calls [`PackedSpan::bounds_check`].

use half::bf16;

use crate::error::{Error, Result};

/// Storage element of a compressed stream.
pub trait Packed: Copy + Default + Send + Sync + 'static {
    /// Short name for logs.
    const NAME: &'static str;

    /// Prefix distinguishing blob keys of different representations.
    const KEY_PREFIX: char;

    /// Granularity, in elements, that sub-region offsets must respect when
    /// encoding.
    const ALIGNMENT: usize = 1;

    /// Storage units required to hold `num` elements.
    #[inline]
    fn packed_end(num: usize) -> usize {
        num
    }

    /// Append the little-endian serialization of `units` to `out`.
    fn extend_le_bytes(units: &[Self], out: &mut Vec<u8>);
}

impl Packed for f32 {
    const NAME: &'static str = "f32";
    const KEY_PREFIX: char = 'F';

    fn extend_le_bytes(units: &[Self], out: &mut Vec<u8>) {
        out.reserve(units.len() * 4);
        for value in units {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

impl Packed for bf16 {
    const NAME: &'static str = "bf16";
    const KEY_PREFIX: char = 'B';

    fn extend_le_bytes(units: &[Self], out: &mut Vec<u8>) {
        out.reserve(units.len() * 2);
        for value in units {
            out.extend_from_slice(&value.to_bits().to_le_bytes());
        }
    }
}

/// Checks `[offset, offset + len)` against `num` and the storage capacity.
#[inline]
fn check_region<P: Packed>(offset: usize, len: usize, num: usize, provided: usize) -> Result<()> {
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= num)
        .ok_or_else(|| Error::out_of_bounds(offset, len, num))?;
    let required = P::packed_end(end);
    if required > provided {
        return Err(Error::capacity_mismatch(required, provided));
    }
    Ok(())
}

/// Shared view over packed storage, used for decoding.
#[derive(Debug)]
pub struct PackedSpan<'a, P> {
    storage: &'a [P],
    num: usize,
}

impl<P> Clone for PackedSpan<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for PackedSpan<'_, P> {}

impl<'a, P: Packed> PackedSpan<'a, P> {
    /// Create a span over `storage` holding `num` logical elements.
    pub fn new(storage: &'a [P], num: usize) -> Self {
        Self { storage, num }
    }

    /// Logical element count.
    #[inline]
    pub fn num(&self) -> usize {
        self.num
    }

    /// Underlying storage units.
    #[inline]
    pub fn storage(&self) -> &'a [P] {
        self.storage
    }

    /// Fails unless `[offset, offset + len)` lies within the span and its
    /// storage.
    #[inline]
    pub fn bounds_check(&self, offset: usize, len: usize) -> Result<()> {
        check_region::<P>(offset, len, self.num, self.storage.len())
    }
}

impl<'a, P: Packed> PackedSpan<'a, P> {
    /// Span over an element-wise slice, one element per storage unit.
    ///
    /// For grouped formats the logical count differs from the unit count;
    /// use [`PackedSpan::new`] there.
    pub fn from_slice(storage: &'a [P]) -> Self {
        Self::new(storage, storage.len())
    }
}

/// Exclusive view over packed storage, used for encoding.
#[derive(Debug)]
pub struct PackedSpanMut<'a, P> {
    storage: &'a mut [P],
    num: usize,
}

impl<'a, P: Packed> PackedSpanMut<'a, P> {
    /// Create a span over `storage` holding `num` logical elements.
    pub fn new(storage: &'a mut [P], num: usize) -> Self {
        Self { storage, num }
    }

    /// Logical element count.
    #[inline]
    pub fn num(&self) -> usize {
        self.num
    }

    /// Underlying storage units.
    #[inline]
    pub fn storage(&self) -> &[P] {
        self.storage
    }

    /// Underlying storage units, mutably.
    #[inline]
    pub fn storage_mut(&mut self) -> &mut [P] {
        self.storage
    }

    /// Fails unless `[offset, offset + len)` lies within the span and its
    /// storage.
    #[inline]
    pub fn bounds_check(&self, offset: usize, len: usize) -> Result<()> {
        check_region::<P>(offset, len, self.num, self.storage.len())
    }

    /// Reborrow as a shared span.
    #[inline]
    pub fn as_const(&self) -> PackedSpan<'_, P> {
        PackedSpan::new(self.storage, self.num)
    }
}
