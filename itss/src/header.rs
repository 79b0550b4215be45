//! ITSS header parsing
//!
//! Covers the ITSF master header, the ITSP directory-index header, PMGL
//! directory page headers, the LZX reset table and the LZXC control data
//! block. Every parser decodes its fixed fields through [`SliceReader`] and
//! then validates; huge offsets and lengths are rejected as corruption
//! rather than trusted as 64-bit values.

use crate::error::{Error, Result};
use crate::ioutils::SliceReader;
use tracing::debug;

/// ITSF magic bytes
pub const ITSF_MAGIC: [u8; 4] = *b"ITSF";
/// ITSP magic bytes
pub const ITSP_MAGIC: [u8; 4] = *b"ITSP";
/// PMGL page magic bytes
pub const PMGL_MAGIC: [u8; 4] = *b"PMGL";
/// LZXC control data magic bytes
pub const LZXC_MAGIC: [u8; 4] = *b"LZXC";

/// Serialized ITSF header length, version 2
pub(crate) const ITSF_V2_LEN: usize = 0x58;
/// Serialized ITSF header length, version 3
pub(crate) const ITSF_V3_LEN: usize = 0x60;
/// Serialized ITSP header length, version 1
pub(crate) const ITSP_V1_LEN: usize = 0x54;
/// Serialized PMGL page header length
pub(crate) const PMGL_LEN: u32 = 0x14;
/// Serialized LZX reset table header length
pub(crate) const RESET_TABLE_LEN: usize = 0x28;

/// Offsets and lengths above this are corruption, not real archives.
const SANITY_MAX: u64 = u32::MAX as u64;

fn read_magic(r: &mut SliceReader) -> [u8; 4] {
    let mut magic = [0u8; 4];
    let d = r.read_bytes(4);
    if d.len() == 4 {
        magic.copy_from_slice(d);
    }
    magic
}

/// ITSF master header at the start of every archive.
#[derive(Debug, Clone)]
pub struct ItsfHeader {
    pub version: i32,
    pub header_len: i32,
    pub last_modified: u32,
    pub lang_id: u32,
    pub dir_uuid: [u8; 16],
    pub stream_uuid: [u8; 16],
    /// Offset of the directory (ITSP header plus listing pages)
    pub dir_offset: u64,
    /// Length of the directory
    pub dir_len: u64,
    /// Offset of the content sections. Stored in version 3, derived as
    /// `dir_offset + dir_len` in version 2.
    pub data_offset: u64,
}

impl ItsfHeader {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut r = SliceReader::new(data);

        let magic = read_magic(&mut r);
        let version = r.read_i32le();
        let header_len = r.read_i32le();
        let _reserved = r.read_i32le();
        let last_modified = r.read_u32le();
        let lang_id = r.read_u32le();
        let dir_uuid = r.read_uuid();
        let stream_uuid = r.read_uuid();
        let _reserved_offset = r.read_u64le();
        let _reserved_len = r.read_u64le();
        let dir_offset = r.read_u64le();
        let dir_len = r.read_u64le();

        if version != 2 && version != 3 {
            debug!(version, "unsupported ITSF version");
            return Err(Error::UnsupportedVersion {
                what: "ITSF",
                version: version.into(),
            });
        }

        let data_offset = if version == 3 {
            r.read_u64le()
        } else {
            dir_offset.wrapping_add(dir_len)
        };

        if !r.ok() {
            return Err(Error::Truncated {
                expected: ITSF_V3_LEN as u64,
                actual: data.len() as u64,
            });
        }
        if magic != ITSF_MAGIC {
            return Err(Error::InvalidMagic {
                what: "ITSF",
                expected: ITSF_MAGIC,
                actual: magic,
            });
        }

        let min_len = if version == 2 { ITSF_V2_LEN } else { ITSF_V3_LEN };
        if i64::from(header_len) < min_len as i64 {
            return Err(Error::InvalidHeaderLength {
                what: "ITSF",
                len: header_len,
            });
        }

        // Huge values are usually due to broken files
        if dir_offset > SANITY_MAX {
            return Err(Error::ImplausibleValue {
                what: "directory offset",
                value: dir_offset,
            });
        }
        if dir_len > SANITY_MAX {
            return Err(Error::ImplausibleValue {
                what: "directory length",
                value: dir_len,
            });
        }

        Ok(Self {
            version,
            header_len,
            last_modified,
            lang_id,
            dir_uuid,
            stream_uuid,
            dir_offset,
            dir_len,
            data_offset,
        })
    }
}

/// ITSP directory-index header at `dir_offset`.
#[derive(Debug, Clone)]
pub struct ItspHeader {
    pub version: i32,
    pub header_len: i32,
    /// Length of one directory listing page
    pub block_len: u32,
    pub blockidx_interval: i32,
    pub index_depth: i32,
    pub index_root: i32,
    /// First listing page in the chain
    pub index_head: i32,
    pub num_blocks: u32,
    pub lang_id: u32,
    pub system_uuid: [u8; 16],
}

impl ItspHeader {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut r = SliceReader::new(data);

        let magic = read_magic(&mut r);
        let version = r.read_i32le();
        let header_len = r.read_i32le();
        let _reserved = r.read_i32le();
        let block_len = r.read_u32le();
        let blockidx_interval = r.read_i32le();
        let index_depth = r.read_i32le();
        let index_root = r.read_i32le();
        let index_head = r.read_i32le();
        let _reserved = r.read_i32le();
        let num_blocks = r.read_u32le();
        let _reserved = r.read_i32le();
        let lang_id = r.read_u32le();
        let system_uuid = r.read_uuid();
        let _reserved = r.read_bytes(16);

        if !r.ok() {
            return Err(Error::Truncated {
                expected: ITSP_V1_LEN as u64,
                actual: data.len() as u64,
            });
        }
        if magic != ITSP_MAGIC {
            return Err(Error::InvalidMagic {
                what: "ITSP",
                expected: ITSP_MAGIC,
                actual: magic,
            });
        }
        if version != 1 {
            return Err(Error::UnsupportedVersion {
                what: "ITSP",
                version: version.into(),
            });
        }
        if header_len != ITSP_V1_LEN as i32 {
            return Err(Error::InvalidHeaderLength {
                what: "ITSP",
                len: header_len,
            });
        }
        if block_len == 0 {
            return Err(Error::ImplausibleValue {
                what: "listing page length",
                value: 0,
            });
        }

        Ok(Self {
            version,
            header_len,
            block_len,
            blockidx_interval,
            index_depth,
            index_root,
            index_head,
            num_blocks,
            lang_id,
            system_uuid,
        })
    }
}

/// PMGL header at the start of each directory listing page.
#[derive(Debug, Clone)]
pub(crate) struct PmglHeader {
    /// Unused trailing bytes of the page
    pub free_space: u32,
    pub block_prev: i32,
    /// Next page in the chain, -1 terminates
    pub block_next: i32,
}

impl PmglHeader {
    /// Parse from the front of a listing page, leaving the reader at the
    /// first entry.
    pub(crate) fn parse(r: &mut SliceReader, block_len: u32) -> Result<Self> {
        if block_len < PMGL_LEN {
            return Err(Error::ImplausibleValue {
                what: "listing page length",
                value: block_len.into(),
            });
        }

        let magic = read_magic(r);
        let free_space = r.read_u32le();
        let _reserved = r.read_u32le();
        let block_prev = r.read_i32le();
        let block_next = r.read_i32le();

        if !r.ok() {
            return Err(Error::DirectoryUnderrun);
        }
        if magic != PMGL_MAGIC {
            return Err(Error::InvalidMagic {
                what: "PMGL",
                expected: PMGL_MAGIC,
                actual: magic,
            });
        }
        if free_space > block_len - PMGL_LEN {
            return Err(Error::InvalidFreeSpace {
                free_space,
                block_len,
            });
        }

        Ok(Self {
            free_space,
            block_prev,
            block_next,
        })
    }
}

/// LZX reset table: maps compressed-block indices to compressed offsets.
#[derive(Debug, Clone)]
pub(crate) struct LzxcResetTable {
    pub block_count: u32,
    /// Offset of the per-block slot array, relative to the table object
    pub table_offset: u32,
    pub uncompressed_len: u64,
    pub compressed_len: u64,
    /// Decompressed length of one block
    pub block_len: u64,
}

impl LzxcResetTable {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut r = SliceReader::new(data);

        let version = r.read_u32le();
        let block_count = r.read_u32le();
        let _reserved = r.read_u32le();
        let table_offset = r.read_u32le();
        let uncompressed_len = r.read_u64le();
        let compressed_len = r.read_u64le();
        let block_len = r.read_u64le();

        if !r.ok() {
            return Err(Error::Truncated {
                expected: RESET_TABLE_LEN as u64,
                actual: data.len() as u64,
            });
        }
        if version != 2 {
            return Err(Error::UnsupportedVersion {
                what: "LZX reset table",
                version: version.into(),
            });
        }
        if uncompressed_len > SANITY_MAX {
            return Err(Error::ImplausibleValue {
                what: "uncompressed length",
                value: uncompressed_len,
            });
        }
        if compressed_len > SANITY_MAX {
            return Err(Error::ImplausibleValue {
                what: "compressed length",
                value: compressed_len,
            });
        }
        if block_len == 0 || block_len > SANITY_MAX {
            return Err(Error::ImplausibleValue {
                what: "block length",
                value: block_len,
            });
        }

        Ok(Self {
            block_count,
            table_offset,
            uncompressed_len,
            compressed_len,
            block_len,
        })
    }
}

/// LZXC control data: window size and reset interval used for compression.
#[derive(Debug, Clone)]
pub(crate) struct LzxcControlData {
    pub reset_interval: u32,
    pub window_size: u32,
    pub windows_per_reset: u32,
}

impl LzxcControlData {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut r = SliceReader::new(data);

        let _size = r.read_u32le();
        let magic = read_magic(&mut r);
        let version = r.read_u32le();
        let mut reset_interval = r.read_u32le();
        let mut window_size = r.read_u32le();
        let windows_per_reset = r.read_u32le();
        // Trailing reserved field, present in some archives
        if r.ok() && r.remaining() >= 4 {
            let _reserved = r.read_u32le();
        }

        if !r.ok() {
            return Err(Error::Truncated {
                expected: 0x18,
                actual: data.len() as u64,
            });
        }
        if magic != LZXC_MAGIC {
            return Err(Error::InvalidMagic {
                what: "LZXC",
                expected: LZXC_MAGIC,
                actual: magic,
            });
        }

        // Version 2 stores both fields as multiples of 0x8000
        if version == 2 {
            reset_interval = reset_interval.wrapping_mul(0x8000);
            window_size = window_size.wrapping_mul(0x8000);
        }

        if window_size < 2 {
            return Err(Error::UnsupportedWindowSize(window_size));
        }
        // Only reset intervals that are a multiple of half the window size
        // are supported
        if reset_interval == 0 || reset_interval % (window_size / 2) != 0 {
            return Err(Error::InvalidResetInterval {
                reset_interval,
                window_size,
            });
        }

        Ok(Self {
            reset_interval,
            window_size,
            windows_per_reset,
        })
    }
}
