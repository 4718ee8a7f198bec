//! NUQ stream layout.
//!
//! Elements are split into groups of [`GROUP_SIZE`]. Each group occupies
//! [`GROUP_BYTES`] of storage:
//!
//! ```text
//! +--------------------------------+-----------------------------------+
//! | 16 x f32 centers (LE, 64 B)    | 256 x 4-bit indices (128 B)       |
//! +--------------------------------+-----------------------------------+
//! ```
//!
//! Indices are stored in units of [`UNIT_INDICES`] elements, each unit
//! packed by [`NibbleCodec`](crate::NibbleCodec) with [`NIBBLE_LANES`] lanes.

use bytemuck::{Pod, Zeroable};
use quantra_core::Packed;

/// Elements per independently clustered group.
pub const GROUP_SIZE: usize = 256;

/// Cluster centers per group.
pub const CLUSTERS: usize = 16;

/// Bytes of the center table at the start of each group.
pub const CENTER_BYTES: usize = CLUSTERS * core::mem::size_of::<f32>();

/// Bytes of packed indices per group.
pub const INDEX_BYTES: usize = GROUP_SIZE / 2;

/// Total bytes per group.
pub const GROUP_BYTES: usize = CENTER_BYTES + INDEX_BYTES;

/// Lanes of the nibble interleave used by the stored layout.
pub const NIBBLE_LANES: usize = 16;

/// Indices per nibble unit.
pub const UNIT_INDICES: usize = 4 * NIBBLE_LANES;

/// Bytes per nibble unit.
pub const UNIT_BYTES: usize = 2 * NIBBLE_LANES;

const _: () = assert!(GROUP_SIZE % UNIT_INDICES == 0);
const _: () = assert!(CLUSTERS <= 16);

/// One byte of a NUQ stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(transparent)]
pub struct NuqStream(pub u8);

impl NuqStream {
    /// View stream units as raw bytes.
    #[inline]
    pub fn as_bytes(units: &[NuqStream]) -> &[u8] {
        bytemuck::cast_slice(units)
    }

    /// View stream units as raw bytes, mutably.
    #[inline]
    pub fn as_bytes_mut(units: &mut [NuqStream]) -> &mut [u8] {
        bytemuck::cast_slice_mut(units)
    }
}

impl Packed for NuqStream {
    const NAME: &'static str = "nuq";
    const KEY_PREFIX: char = 'N';
    const ALIGNMENT: usize = GROUP_SIZE;

    #[inline]
    fn packed_end(num: usize) -> usize {
        num.div_ceil(GROUP_SIZE) * GROUP_BYTES
    }

    fn extend_le_bytes(units: &[Self], out: &mut Vec<u8>) {
        out.extend_from_slice(Self::as_bytes(units));
    }
}

/// Byte offset and shift of index `pos` within a group's packed indices.
#[inline]
pub(crate) fn nibble_location(pos: usize) -> (usize, u32) {
    let unit = pos / UNIT_INDICES;
    let r = pos % UNIT_INDICES;
    let q = r / NIBBLE_LANES;
    let j = r % NIBBLE_LANES;
    let byte = unit * UNIT_BYTES + (q / 2) * NIBBLE_LANES + j;
    (byte, ((q % 2) * 4) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_end() {
        assert_eq!(GROUP_BYTES, 192);
        assert_eq!(NuqStream::packed_end(0), 0);
        assert_eq!(NuqStream::packed_end(1), 192);
        assert_eq!(NuqStream::packed_end(256), 192);
        assert_eq!(NuqStream::packed_end(257), 384);
        assert_eq!(NuqStream::packed_end(10 * 256), 1920);
    }

    #[test]
    fn test_nibble_location_covers_every_slot_once() {
        let mut seen = [0u8; INDEX_BYTES];
        for pos in 0..GROUP_SIZE {
            let (byte, shift) = nibble_location(pos);
            assert!(byte < INDEX_BYTES);
            seen[byte] |= 1 << (shift / 4);
        }
        assert!(seen.iter().all(|&s| s == 0b11));
    }
}
