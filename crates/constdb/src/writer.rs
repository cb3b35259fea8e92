use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::format::{write_tuple, INDEX_BYTES, NUM_BUCKETS, TUPLE_BYTES};
use crate::hash::hash;
use crate::reader::Reader;

/// Capacity of the write buffer in front of the sink.
const WRITE_BUF_BYTES: usize = 64 * 1024;

/// A record waiting for table placement: its full hash and the absolute file
/// offset of its header.
#[derive(Clone, Copy)]
struct Entry {
    hash: u32,
    offset: u64,
}

/// Builds a database record by record.
///
/// Records stream straight to the sink; only the per-bucket `(hash, offset)`
/// lists are held in memory. [`close`](Writer::close) or
/// [`freeze`](Writer::freeze) must be called to finalize the database — a
/// `Writer` dropped without either leaves the file with an all-zero head
/// index and every record unreachable.
///
/// Not safe for concurrent use; a `Writer` owns its sink exclusively until it
/// is consumed.
pub struct Writer<W: Write + Seek = File> {
    out: BufWriter<W>,
    entries: [Vec<Entry>; NUM_BUCKETS],
    /// Absolute file offset of the next byte to be written.
    buffered_offset: u64,
    /// Exact number of hash-table bytes finalization will append.
    table_bytes: u64,
}

impl Writer<File> {
    /// Creates a database at `path`. An existing file is overwritten.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Read access too: freeze maps this same descriptor.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::new(file)
    }

    /// Finalizes the database and reopens it for reading over the same file.
    pub fn freeze(mut self) -> Result<Reader> {
        self.finalize()?;
        let file = self.out.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        Reader::from_file(file)
    }
}

impl<W: Write + Seek> Writer<W> {
    /// Opens a writer over any seekable sink.
    ///
    /// Reserves the head-index space at the front of the sink; finalization
    /// seeks back and overwrites it with the real table locations.
    pub fn new(mut writer: W) -> Result<Self> {
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&[0u8; INDEX_BYTES as usize])?;

        Ok(Self {
            out: BufWriter::with_capacity(WRITE_BUF_BYTES, writer),
            entries: std::array::from_fn(|_| Vec::new()),
            buffered_offset: INDEX_BYTES,
            table_bytes: 0,
        })
    }

    /// Appends a key/value pair.
    ///
    /// Keys need not be unique: every pair is stored, and lookups return the
    /// first one put. Fails with [`Error::TooMuchData`] when the finished
    /// file could no longer be addressed with signed 64-bit offsets; any
    /// error leaves the writer unusable.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let entry_bytes = TUPLE_BYTES + key.len() as u64 + value.len() as u64;

        // Each record eventually costs two 16-byte slots in its bucket's
        // table, so the final file size is known exactly at every put.
        let projected = self
            .buffered_offset
            .checked_add(entry_bytes)
            .and_then(|n| n.checked_add(self.table_bytes))
            .and_then(|n| n.checked_add(2 * TUPLE_BYTES));
        match projected {
            Some(n) if n <= i64::MAX as u64 => {}
            _ => return Err(Error::TooMuchData),
        }

        let h = hash(key);
        self.entries[(h & 0xff) as usize].push(Entry {
            hash: h,
            offset: self.buffered_offset,
        });

        write_tuple(&mut self.out, key.len() as u64, value.len() as u64)?;
        self.out.write_all(key)?;
        self.out.write_all(value)?;

        self.buffered_offset += entry_bytes;
        self.table_bytes += 2 * TUPLE_BYTES;
        Ok(())
    }

    /// Finalizes the database and releases the sink.
    pub fn close(mut self) -> Result<()> {
        self.finalize()
    }

    /// Writes the 256 hash tables after the data region, then seeks back and
    /// patches the head index over the placeholder. Runs exactly once: both
    /// public callers consume the writer.
    fn finalize(&mut self) -> Result<()> {
        let mut table_offsets = [0u64; NUM_BUCKETS];

        for bucket in 0..NUM_BUCKETS {
            let entries = &self.entries[bucket];
            if entries.is_empty() {
                continue;
            }
            table_offsets[bucket] = self.buffered_offset;

            // Twice as many slots as entries: probing always terminates on an
            // empty slot and lookups stay short.
            let table_len = entries.len() as u64 * 2;
            let mut table = vec![Entry { hash: 0, offset: 0 }; table_len as usize];

            // Placement in insertion order makes the first record put the
            // first one found for a duplicated key.
            for &entry in entries {
                let start = (u64::from(entry.hash) >> 8) % table_len;
                let mut slot = start;
                loop {
                    if table[slot as usize].hash == 0 {
                        table[slot as usize] = entry;
                        break;
                    }
                    slot = (slot + 1) % table_len;
                    if slot == start {
                        return Err(Error::TableFull);
                    }
                }
            }

            for placed in &table {
                write_tuple(&mut self.out, u64::from(placed.hash), placed.offset)?;
            }
            self.buffered_offset += table_len * TUPLE_BYTES;
        }

        let mut index = Vec::with_capacity(INDEX_BYTES as usize);
        for bucket in 0..NUM_BUCKETS {
            let table_len = self.entries[bucket].len() as u64 * 2;
            write_tuple(&mut index, table_offsets[bucket], table_len)?;
        }

        // Seeking through the BufWriter flushes the buffered tables first.
        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(&index)?;
        self.out.flush()?;
        Ok(())
    }
}
