/// Initial hash state.
const SEED: u32 = 5381;

/// Hashes a byte string to a 32-bit value.
///
/// This is the classic djb hash — `h = (h * 33) ^ byte`, seeded at 5381 —
/// with wrapping arithmetic, so it computes the same value on every platform.
/// It is the only hash the format supports: there is no selector byte in the
/// header, so writer and reader agree by construction. Collisions are
/// expected and resolved by the probe loop.
#[inline]
pub fn hash(data: &[u8]) -> u32 {
    let mut h = SEED;
    for &b in data {
        h = h.wrapping_shl(5).wrapping_add(h) ^ u32::from(b);
    }
    h
}
