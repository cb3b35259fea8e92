//! Binary layout constants and the 16-byte tuple codec.
//!
//! Every fixed-width structure in a database file is a pair of little-endian
//! u64s: head-index entries are `(table_offset, table_length)`, record
//! headers are `(key_len, value_len)` and hash-table slots are
//! `(slot_hash, record_offset)`.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{Result as IoResult, Write};

/// Number of buckets, one per low byte of the key's hash. Each bucket owns
/// one hash table and one head-index entry.
pub const NUM_BUCKETS: usize = 256;

/// Width of one tuple: two little-endian u64s.
pub const TUPLE_BYTES: u64 = 16;

/// Size of the head index reserved at the front of every database file. This
/// is also the minimum legal file size: an empty database is exactly the
/// all-zero head index and nothing else.
pub const INDEX_BYTES: u64 = NUM_BUCKETS as u64 * TUPLE_BYTES;

/// Writes `a` then `b` as little-endian u64s (16 bytes) to `w`.
pub fn write_tuple<W: Write>(w: &mut W, a: u64, b: u64) -> IoResult<()> {
    w.write_u64::<LittleEndian>(a)?;
    w.write_u64::<LittleEndian>(b)?;
    Ok(())
}

/// Reads two little-endian u64s at byte offset `off` of `buf`.
///
/// Returns `None` when the 16-byte tuple would extend past the end of `buf`,
/// so probes over a truncated or corrupt region see a clean miss instead of
/// a panic.
pub fn read_tuple(buf: &[u8], off: u64) -> Option<(u64, u64)> {
    let off = usize::try_from(off).ok()?;
    let end = off.checked_add(TUPLE_BYTES as usize)?;
    if end > buf.len() {
        return None;
    }
    let a = LittleEndian::read_u64(&buf[off..off + 8]);
    let b = LittleEndian::read_u64(&buf[off + 8..end]);
    Some((a, b))
}

/// Bounds-checked view of `len` bytes at offset `off` of `buf`.
///
/// `None` whenever any part of the requested range falls outside `buf`.
pub fn slice(buf: &[u8], off: u64, len: u64) -> Option<&[u8]> {
    let start = usize::try_from(off).ok()?;
    let len = usize::try_from(len).ok()?;
    let end = start.checked_add(len)?;
    if end > buf.len() {
        return None;
    }
    Some(&buf[start..end])
}
