//! Byte-range sources backing an archive
//!
//! The engine only ever asks for `len` bytes at absolute offset `off`; it
//! carries no archive semantics into the source. A short read is legal only
//! when the range extends past the end of the medium.

use crate::error::{Error, Result};
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Positioned reads from an underlying medium.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes at absolute `offset`.
    ///
    /// Returns the number of bytes read, which may be less than requested
    /// only when the range runs past the end of the medium.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// Read a full buffer at `offset`, treating a short read as corruption.
///
/// Header and structural parsing goes through this; content reads clip
/// instead.
pub(crate) fn read_exact_at<S: ByteSource>(source: &mut S, offset: u64, buf: &mut [u8]) -> Result<()> {
    let n = source.read_at(offset, buf)?;
    if n != buf.len() {
        return Err(Error::Truncated {
            expected: buf.len() as u64,
            actual: n as u64,
        });
    }
    Ok(())
}

/// In-memory byte source.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for MemorySource {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl ByteSource for MemorySource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(offset) = usize::try_from(offset) else {
            return Ok(0);
        };
        if offset >= self.data.len() {
            return Ok(0);
        }
        let avail = &self.data[offset..];
        let n = buf.len().min(avail.len());
        buf[..n].copy_from_slice(&avail[..n]);
        Ok(n)
    }
}

/// File-backed byte source with memory mapping support
///
/// Maps the file when possible and falls back to seek-and-read otherwise.
pub struct FileSource {
    /// Memory-mapped file (if available)
    mmap: Option<Mmap>,
    /// Regular file reader (fallback)
    file: Option<BufReader<File>>,
    /// Size of the file
    size: u64,
}

impl FileSource {
    /// Open a file for positioned reads
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        let size = metadata.len();

        debug!("Opening archive file: {:?} (size: {} bytes)", path, size);

        // Limit mmap to 2GB files
        let mmap = if size > 0 && size < 2_147_483_648 {
            match unsafe { MmapOptions::new().map(&file) } {
                Ok(mmap) => Some(mmap),
                Err(e) => {
                    debug!("Failed to memory-map archive, using file reader: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let file = if mmap.is_none() {
            Some(BufReader::new(file))
        } else {
            None
        };

        Ok(Self { mmap, file, size })
    }

    /// Size of the underlying file
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Check if memory mapping is available
    pub fn is_memory_mapped(&self) -> bool {
        self.mmap.is_some()
    }
}

impl ByteSource for FileSource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        let n = buf
            .len()
            .min(usize::try_from(self.size - offset).unwrap_or(usize::MAX));

        if let Some(ref mmap) = self.mmap {
            // Fast path: memory-mapped access
            let start = offset as usize;
            buf[..n].copy_from_slice(&mmap[start..start + n]);
            Ok(n)
        } else if let Some(ref mut file) = self.file {
            // Slow path: seek and read
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf[..n])?;
            Ok(n)
        } else {
            Err(io::Error::other("file source not initialized"))
        }
    }
}
