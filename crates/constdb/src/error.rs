use std::io;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while building or opening a database.
///
/// Lookups never return an error: a corrupt or truncated file reads as a
/// sequence of misses instead (see [`Reader::get`](crate::Reader::get)).
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying read, write, seek, stat or mmap operation failed. A
    /// writer that surfaced this is poisoned and must be discarded.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The file cannot be a database, e.g. it is shorter than the head index.
    #[error("corrupt database: {0}")]
    Corrupt(&'static str),

    /// The record would push the finished file past the signed 64-bit offset
    /// range.
    #[error("database files are limited to 8EB of data")]
    TooMuchData,

    /// Open-addressed placement wrapped around a full table during
    /// finalization. Tables hold twice as many slots as entries, so this is a
    /// bug and not a data-dependent condition.
    #[error("hash table full during finalization")]
    TableFull,
}
