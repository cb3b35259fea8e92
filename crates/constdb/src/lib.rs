//! # constdb — a constant 64-bit key/value database
//!
//! A `constdb` database is built once, in a single streaming pass, and then
//! serves point lookups and full scans with no further mutation. The format
//! descends from Bernstein's cdb, widened to 64-bit offsets so files may
//! grow past four gigabytes.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ HEAD INDEX (4096 bytes)                       │
//! │ 256 × (table_offset u64 | table_length u64)   │
//! ├───────────────────────────────────────────────┤
//! │ DATA REGION                                   │
//! │ key_len (u64) | value_len (u64) | key | value │
//! │ ... repeated for each record ...              │
//! ├───────────────────────────────────────────────┤
//! │ HASH TABLES (non-empty buckets, in order)     │
//! │ slot_hash (u64) | record_offset (u64)         │
//! │ ... 2n slots per table of n records ...       │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian, on every host. A lookup hashes the key,
//! picks a bucket from the low hash byte, and probes that bucket's
//! open-addressed table: at most two random reads touch the file (one slot,
//! one record). Values come back as slices borrowing the memory-mapped file —
//! no copies, valid for as long as the [`Reader`] is open.
//!
//! ## Example
//!
//! ```no_run
//! use constdb::Writer;
//!
//! # fn main() -> constdb::Result<()> {
//! let mut writer = Writer::create("widgets.cdb")?;
//! writer.put(b"Alice", b"Practice")?;
//! writer.put(b"Bob", b"Hope")?;
//! let db = writer.freeze()?;
//!
//! assert_eq!(db.get(b"Alice"), Some(&b"Practice"[..]));
//! assert_eq!(db.get(b"Eve"), None);
//! for (key, value) in db.iter() {
//!     println!("{:?} => {:?}", key, value);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod format;
mod hash;
mod iter;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use hash::hash;
pub use iter::{Keys, Records, Values};
pub use reader::Reader;
pub use writer::Writer;
