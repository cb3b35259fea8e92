//! Sequential scans over the data region.
//!
//! The scanner walks records front to back by their length prefixes and
//! stops where the hash-table region begins (the smallest table offset named
//! in the head index). It never consults the tables themselves, so records
//! come out in the exact order they were put.

use crate::format::{read_tuple, slice, INDEX_BYTES, TUPLE_BYTES};
use crate::reader::Reader;

/// Iterator over `(key, value)` pairs in insertion order.
///
/// Yielded slices borrow the mapped file. A length prefix pointing past the
/// end of the map (truncated or corrupt file) ends the walk early instead of
/// faulting.
pub struct Records<'a> {
    data: &'a [u8],
    pos: u64,
    end: u64,
}

impl<'a> Records<'a> {
    pub(crate) fn new(reader: &'a Reader) -> Self {
        // The data region ends where the first hash table begins. With no
        // tables at all the database is empty and the walk covers nothing.
        let end = reader
            .tables()
            .iter()
            .filter(|t| t.length > 0)
            .map(|t| t.offset)
            .min()
            .unwrap_or(INDEX_BYTES);

        Records {
            data: reader.data(),
            pos: INDEX_BYTES,
            end,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        let (key_len, value_len) = read_tuple(self.data, self.pos)?;

        let key_start = self.pos.checked_add(TUPLE_BYTES)?;
        let value_start = key_start.checked_add(key_len)?;
        let next_pos = value_start.checked_add(value_len)?;

        let key = slice(self.data, key_start, key_len)?;
        let value = slice(self.data, value_start, value_len)?;

        self.pos = next_pos;
        Some((key, value))
    }
}

/// Iterator over keys in insertion order.
pub struct Keys<'a>(Records<'a>);

impl<'a> Keys<'a> {
    pub(crate) fn new(reader: &'a Reader) -> Self {
        Keys(Records::new(reader))
    }
}

impl<'a> Iterator for Keys<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(key, _)| key)
    }
}

/// Iterator over values in insertion order.
pub struct Values<'a>(Records<'a>);

impl<'a> Values<'a> {
    pub(crate) fn new(reader: &'a Reader) -> Self {
        Values(Records::new(reader))
    }
}

impl<'a> Iterator for Values<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, value)| value)
    }
}
