//! 4-bit index packing.

/// Packs four lanes of 4-bit values into bytes and back.
///
/// For `N` lanes the packed form is `2N` bytes: the first half holds `v0` in
/// the low nibble and `v1` in the high nibble of each byte, the second half
/// holds `v2` and `v3` the same way.
pub struct NibbleCodec;

impl NibbleCodec {
    /// Pack `v0..v3` into `out[..2N]`. Only the low 4 bits of each value are
    /// kept.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than `2N` bytes.
    #[inline]
    pub fn ordered_pack_u16<const N: usize>(
        v0: &[u16; N],
        v1: &[u16; N],
        v2: &[u16; N],
        v3: &[u16; N],
        out: &mut [u8],
    ) {
        let (lo, hi) = out[..2 * N].split_at_mut(N);
        for i in 0..N {
            lo[i] = ((v0[i] & 0xF) | ((v1[i] & 0xF) << 4)) as u8;
            hi[i] = ((v2[i] & 0xF) | ((v3[i] & 0xF) << 4)) as u8;
        }
    }

    /// Unpack nibble `K` (0 = low, 1 = high) from each of the first `N`
    /// bytes of `half`.
    ///
    /// # Panics
    ///
    /// Panics if `half` is shorter than `N` bytes.
    #[inline]
    pub fn ordered_unpack_u16<const K: usize, const N: usize>(half: &[u8]) -> [u16; N] {
        let half = &half[..N];
        core::array::from_fn(|i| (u16::from(half[i]) >> (4 * K)) & 0xF)
    }
}
