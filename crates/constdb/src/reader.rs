use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};
use crate::format::{read_tuple, slice, INDEX_BYTES, NUM_BUCKETS, TUPLE_BYTES};
use crate::hash::hash;
use crate::iter::{Keys, Records, Values};

/// One decoded head-index entry: where a bucket's hash table lives and how
/// many 16-byte slots it holds. `(0, 0)` for empty buckets.
#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct Table {
    pub(crate) offset: u64,
    pub(crate) length: u64,
}

/// A read-only view of a finalized database.
///
/// The whole file is mapped shared and read-only. Lookups and scans return
/// slices borrowing the map: no copies, valid for as long as the `Reader`
/// lives, and enforced by the borrow checker. A `&Reader` can be shared
/// across threads — lookups take no locks and touch no mutable state.
#[derive(Debug)]
pub struct Reader {
    map: Mmap,
    index: [Table; NUM_BUCKETS],
    // Keeps the descriptor alive as long as the mapping.
    _file: File,
}

impl Reader {
    /// Opens the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file(File::open(path)?)
    }

    /// Opens a database over an already-open file handle.
    ///
    /// The file must be at least 4096 bytes long (the head index); the index
    /// is decoded once here and cached for the life of the reader.
    pub fn from_file(file: File) -> Result<Self> {
        if file.metadata()?.len() < INDEX_BYTES {
            return Err(Error::Corrupt("file too small to hold a head index"));
        }
        let map = unsafe { Mmap::map(&file)? };

        let mut index = [Table::default(); NUM_BUCKETS];
        for (bucket, table) in index.iter_mut().enumerate() {
            let (offset, length) = read_tuple(&map, bucket as u64 * TUPLE_BYTES)
                .ok_or(Error::Corrupt("short head index"))?;
            *table = Table { offset, length };
        }

        Ok(Self {
            map,
            index,
            _file: file,
        })
    }

    /// Looks up `key`, returning its value as a slice into the mapped file.
    ///
    /// `None` means the key is absent. Offsets that point outside the mapped
    /// region — a truncated or corrupt file — also read as `None` rather
    /// than faulting the process. For keys put more than once, the first
    /// value put is returned.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let h = hash(key);
        let table = self.index[(h & 0xff) as usize];
        if table.length == 0 {
            return None;
        }

        let start = (u64::from(h) >> 8) % table.length;
        let mut slot = start;
        loop {
            let slot_offset = table.offset.checked_add(slot.checked_mul(TUPLE_BYTES)?)?;
            let (slot_hash, record_offset) = read_tuple(&self.map, slot_offset)?;

            // An empty slot ends the probe: the key is not here.
            if slot_hash == 0 {
                return None;
            }
            if slot_hash == u64::from(h) {
                if let Some(value) = self.value_at(record_offset, key) {
                    return Some(value);
                }
            }

            slot = (slot + 1) % table.length;
            if slot == start {
                return None;
            }
        }
    }

    /// Reads the record at `offset` and returns its value when the stored
    /// key equals `expected_key`.
    fn value_at(&self, offset: u64, expected_key: &[u8]) -> Option<&[u8]> {
        let (key_len, value_len) = read_tuple(&self.map, offset)?;

        // A length mismatch rules the record out before touching its bytes.
        if key_len != expected_key.len() as u64 {
            return None;
        }

        let key_start = offset.checked_add(TUPLE_BYTES)?;
        let key = slice(&self.map, key_start, key_len)?;
        if key != expected_key {
            return None;
        }
        slice(&self.map, key_start.checked_add(key_len)?, value_len)
    }

    /// Length of the mapped region in bytes.
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Unmaps the region and closes the file handle.
    ///
    /// Dropping the `Reader` does the same; `close` only makes the intent
    /// explicit. Either way, slices previously returned by [`get`] or the
    /// scanners cannot outlive it.
    ///
    /// [`get`]: Reader::get
    pub fn close(self) {}

    /// Scans `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> Records<'_> {
        Records::new(self)
    }

    /// Scans keys in insertion order.
    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self)
    }

    /// Scans values in insertion order.
    pub fn values(&self) -> Values<'_> {
        Values::new(self)
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.map
    }

    pub(crate) fn tables(&self) -> &[Table; NUM_BUCKETS] {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Writer;
    use tempfile::tempdir;

    const TRIO: &[(&[u8], &[u8])] = &[
        (b"Alice", b"Practice"),
        (b"Bob", b"Hope"),
        (b"Charlie", b"Horse"),
    ];

    fn build<P: AsRef<Path>>(path: P, records: &[(&[u8], &[u8])]) -> Reader {
        let mut w = Writer::create(path).unwrap();
        for (k, v) in records {
            w.put(k, v).unwrap();
        }
        w.freeze().unwrap()
    }

    // -------------------- Point lookups --------------------

    #[test]
    fn roundtrip_and_miss() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let db = build(dir.path().join("trio.cdb"), TRIO);

        assert_eq!(db.get(b"Alice"), Some(&b"Practice"[..]));
        assert_eq!(db.get(b"Bob"), Some(&b"Hope"[..]));
        assert_eq!(db.get(b"Charlie"), Some(&b"Horse"[..]));
        assert_eq!(db.get(b"Dave"), None);
        Ok(())
    }

    #[test]
    fn empty_value_is_found_not_missing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let db = build(dir.path().join("ev.cdb"), &[(b"empty", b"")]);

        assert_eq!(db.get(b"empty"), Some(&b""[..]));
        assert_eq!(db.get(b"absent"), None);
        Ok(())
    }

    #[test]
    fn empty_key_is_a_real_key() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let db = build(dir.path().join("ek.cdb"), &[(b"", b"empty_key")]);

        assert_eq!(db.get(b""), Some(&b"empty_key"[..]));
        Ok(())
    }

    #[test]
    fn binary_keys_with_embedded_nul() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let db = build(
            dir.path().join("bin.cdb"),
            &[(b"null-in-key:\x00suffix", b"works")],
        );

        assert_eq!(db.get(b"null-in-key:\x00suffix"), Some(&b"works"[..]));
        assert_eq!(db.get(b"null-in-key:"), None);
        Ok(())
    }

    #[test]
    fn duplicate_key_returns_first_value_put() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let db = build(dir.path().join("dup.cdb"), &[(b"dup", b"v1"), (b"dup", b"v2")]);

        assert_eq!(db.get(b"dup"), Some(&b"v1"[..]));
        Ok(())
    }

    #[test]
    fn thousand_keys_all_resolve() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("big.cdb");

        let mut w = Writer::create(&path)?;
        for i in 0..1000u32 {
            w.put(i.to_string().as_bytes(), format!("value-{i}").as_bytes())?;
        }
        let db = w.freeze()?;

        for i in 0..1000u32 {
            assert_eq!(
                db.get(i.to_string().as_bytes()),
                Some(format!("value-{i}").as_bytes()),
                "key {i}"
            );
        }
        assert_eq!(db.get(b"1000"), None);
        assert_eq!(db.get(b"-1"), None);
        Ok(())
    }

    #[test]
    fn large_value_roundtrip() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bigval.cdb");

        let big = vec![b'x'; 500_000];
        let mut w = Writer::create(&path)?;
        w.put(b"big", &big)?;
        let db = w.freeze()?;

        assert_eq!(db.get(b"big"), Some(&big[..]));
        Ok(())
    }

    #[test]
    fn repeated_gets_on_the_same_reader() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("multi.cdb");

        let mut w = Writer::create(&path)?;
        for i in 0..100u32 {
            w.put(format!("k{i:03}").as_bytes(), format!("v{i:03}").as_bytes())?;
        }
        let db = w.freeze()?;

        for _ in 0..2 {
            for i in 0..100u32 {
                assert_eq!(
                    db.get(format!("k{i:03}").as_bytes()),
                    Some(format!("v{i:03}").as_bytes())
                );
            }
        }
        Ok(())
    }

    // -------------------- Open validation --------------------

    #[test]
    fn open_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = Reader::open(dir.path().join("nope.cdb")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn open_rejects_short_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("short.cdb");
        std::fs::write(&path, vec![0u8; 100])?;

        let err = Reader::open(&path).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
        Ok(())
    }

    #[test]
    fn bare_head_index_is_a_valid_empty_database() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("zeros.cdb");
        std::fs::write(&path, vec![0u8; INDEX_BYTES as usize])?;

        let db = Reader::open(&path)?;
        assert_eq!(db.size() as u64, INDEX_BYTES);
        assert_eq!(db.get(b"anything"), None);
        assert_eq!(db.get(b""), None);
        Ok(())
    }

    #[test]
    fn size_reports_mapped_length() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sized.cdb");
        let db = build(&path, TRIO);

        assert_eq!(db.size() as u64, std::fs::metadata(&path)?.len());
        Ok(())
    }

    // -------------------- Corruption tolerance --------------------

    #[test]
    fn truncated_file_misses_instead_of_faulting() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("whole.cdb");
        build(&path, TRIO).close();

        // Chop the tables (and most of the data) off the tail; the head
        // index still points at them.
        let mut bytes = std::fs::read(&path)?;
        bytes.truncate(INDEX_BYTES as usize + 10);
        let cut = dir.path().join("cut.cdb");
        std::fs::write(&cut, &bytes)?;

        let db = Reader::open(&cut)?;
        for (k, _) in TRIO {
            assert_eq!(db.get(k), None);
        }
        assert_eq!(db.iter().count(), 0);
        Ok(())
    }

    // -------------------- Lifecycle --------------------

    #[test]
    fn reopening_matches_the_frozen_reader() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("reopen.cdb");

        let frozen = build(&path, TRIO);
        let live: Vec<_> = TRIO.iter().map(|(k, _)| frozen.get(k).map(<[u8]>::to_vec)).collect();
        frozen.close();

        let reopened = Reader::open(&path)?;
        for ((k, _), expect) in TRIO.iter().zip(live) {
            assert_eq!(reopened.get(k).map(<[u8]>::to_vec), expect);
        }
        Ok(())
    }

    #[test]
    fn close_then_open_is_equivalent_to_freeze() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("closed.cdb");

        let mut w = Writer::create(&path)?;
        for (k, v) in TRIO {
            w.put(k, v)?;
        }
        w.close()?;

        let db = Reader::open(&path)?;
        assert_eq!(db.get(b"Bob"), Some(&b"Hope"[..]));
        Ok(())
    }

    // -------------------- Concurrency --------------------

    #[test]
    fn concurrent_gets_from_multiple_threads() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("shared.cdb");

        let mut w = Writer::create(&path)?;
        for i in 0..500u32 {
            w.put(format!("k{i}").as_bytes(), format!("v{i}").as_bytes())?;
        }
        let db = w.freeze()?;

        std::thread::scope(|scope| {
            for t in 0..4 {
                let db = &db;
                scope.spawn(move || {
                    for i in (t..500u32).step_by(4) {
                        assert_eq!(
                            db.get(format!("k{i}").as_bytes()),
                            Some(format!("v{i}").as_bytes())
                        );
                        assert_eq!(db.get(format!("missing{i}").as_bytes()), None);
                    }
                });
            }
        });
        Ok(())
    }
}
