//! Error types for ITSS archive parsing

use thiserror::Error;

/// Result type for ITSS operations
pub type Result<T> = std::result::Result<T, Error>;

/// ITSS error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Magic bytes did not match
    #[error("Invalid {what} magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        what: &'static str,
        expected: [u8; 4],
        actual: [u8; 4],
    },

    /// Header version this implementation does not handle
    #[error("Unsupported {what} version: {version}")]
    UnsupportedVersion { what: &'static str, version: i64 },

    /// Declared header length inconsistent with the header version
    #[error("Invalid {what} header length: {len:#x}")]
    InvalidHeaderLength { what: &'static str, len: i32 },

    /// Short read where the structure requires the full byte count
    #[error("Truncated data: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    /// Field magnitude only a corrupted file would produce
    #[error("Implausible {what}: {value:#x}")]
    ImplausibleValue { what: &'static str, value: u64 },

    /// Page free space larger than the page itself
    #[error("Invalid page free space {free_space:#x} for block length {block_len:#x}")]
    InvalidFreeSpace { free_space: u32, block_len: u32 },

    /// Directory entry path length over the format maximum
    #[error("Entry path length {0} exceeds maximum")]
    PathTooLong(u64),

    /// Directory entry fields ran past the page's usable bytes
    #[error("Directory page exhausted mid-entry")]
    DirectoryUnderrun,

    /// No directory entry could be decoded
    #[error("Directory contains no entries")]
    EmptyDirectory,

    /// Window size with no LZX tier
    #[error("Unsupported LZX window size: {0:#x}")]
    UnsupportedWindowSize(u32),

    /// Reset interval that is not a multiple of half the window size
    #[error("Invalid reset interval {reset_interval:#x} for window size {window_size:#x}")]
    InvalidResetInterval {
        reset_interval: u32,
        window_size: u32,
    },

    /// Compressed block index past the reset table
    #[error("Compressed block {block} is out of range, must be less than {count}")]
    BlockOutOfRange { block: u64, count: u64 },

    /// Reset table slots describe a negative or oversized compressed block
    #[error("Compressed block {block} has invalid bounds: start {start:#x}, end {end:#x}")]
    InvalidBlockBounds { block: u64, start: u64, end: u64 },

    /// The LZX decoder rejected a compressed block
    #[error("LZX decode failed: {0}")]
    LzxDecode(String),
}
