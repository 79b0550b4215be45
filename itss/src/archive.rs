//! Archive facade
//!
//! [`Archive`] owns the byte source and everything parsed out of it. Opening
//! runs header parsing, directory construction and compression setup;
//! dropping the archive releases the decoder, the block cache and the entry
//! table. Content is served through [`Archive::retrieve`], which reports
//! short results as byte counts rather than errors — the count is the
//! authoritative outcome.

use crate::decompress::Decompressor;
use crate::directory::read_directory;
use crate::entry::{Entry, Space};
use crate::error::Result;
use crate::header::{
    ItsfHeader, ItspHeader, LzxcControlData, LzxcResetTable, ITSF_V3_LEN, ITSP_V1_LEN,
    RESET_TABLE_LEN,
};
use crate::source::{read_exact_at, ByteSource};
use crate::{CONTENT_PATH, CONTROL_DATA_PATH, RESET_TABLE_PATH};
use tracing::{debug, trace, warn};

/// Largest control data object a real archive produces.
const CONTROL_DATA_MAX_LEN: u64 = 256;

/// An opened ITSS archive.
///
/// The handle is mutable shared state (cache contents, decoder position);
/// reads take `&mut self`, so one caller is in flight at a time.
#[derive(Debug)]
pub struct Archive<S: ByteSource> {
    source: S,
    itsf: ItsfHeader,
    itsp: ItspHeader,
    entries: Vec<Entry>,
    degraded: bool,
    /// `None` means compression is disabled and compressed entries read as
    /// empty
    decompressor: Option<Decompressor>,
}

impl<S: ByteSource> Archive<S> {
    /// Parse an archive from a byte source.
    ///
    /// Fails on a bad master or index header and on a directory with no
    /// decodable entries. A directory cut short by corruption opens
    /// degraded, and broken compression metadata opens with compression
    /// disabled.
    pub fn open(mut source: S) -> Result<Self> {
        let mut buf = [0u8; ITSF_V3_LEN];
        read_exact_at(&mut source, 0, &mut buf)?;
        let itsf = ItsfHeader::parse(&buf)?;

        let mut buf = [0u8; ITSP_V1_LEN];
        read_exact_at(&mut source, itsf.dir_offset, &mut buf)?;
        let itsp = ItspHeader::parse(&buf)?;

        let directory = read_directory(&mut source, &itsf, &itsp)?;

        let decompressor = setup_compression(&mut source, &itsf, &directory.entries);

        debug!(
            entries = directory.entries.len(),
            degraded = directory.degraded,
            compression = decompressor.is_some(),
            "archive opened"
        );

        Ok(Self {
            source,
            itsf,
            itsp,
            entries: directory.entries,
            degraded: directory.degraded,
            decompressor,
        })
    }

    /// All directory entries, in the order the directory pages listed them.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Look up an entry by path, ignoring ASCII case.
    pub fn entry(&self, path: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.path.eq_ignore_ascii_case(path))
    }

    /// True when the directory was cut short by corruption and only a
    /// prefix of the entries is available.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// True when compressed entries can actually be decompressed.
    pub fn compression_enabled(&self) -> bool {
        self.decompressor.is_some()
    }

    pub fn itsf(&self) -> &ItsfHeader {
        &self.itsf
    }

    pub fn itsp(&self) -> &ItspHeader {
        &self.itsp
    }

    /// Read entry content at `addr` into `buf`.
    ///
    /// The range is clipped to `[0, entry.length)`. Returns the number of
    /// bytes produced; fewer than requested means the rest cannot be served
    /// (end of entry, disabled compression, I/O or decode failure).
    pub fn retrieve(&mut self, entry: &Entry, buf: &mut [u8], addr: u64) -> usize {
        if addr >= entry.length {
            return 0;
        }
        let len = buf.len().min((entry.length - addr) as usize);
        let buf = &mut buf[..len];

        match entry.space {
            Space::Uncompressed => {
                let offset = self.itsf.data_offset + entry.start + addr;
                match self.source.read_at(offset, buf) {
                    Ok(n) => n,
                    Err(e) => {
                        trace!(path = %entry.path, error = %e, "uncompressed read failed");
                        0
                    }
                }
            }
            Space::Compressed => {
                let Some(dec) = self.decompressor.as_mut() else {
                    return 0;
                };
                let mut total = 0;
                while total < len {
                    let n = dec.read_region(
                        &mut self.source,
                        &mut buf[total..],
                        entry.start + addr + total as u64,
                    );
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                total
            }
            Space::Other(space) => {
                trace!(path = %entry.path, space, "entry in unknown space");
                0
            }
        }
    }

    /// Change how many decompressed blocks are cached.
    ///
    /// Capacity is clamped to `[1, 128]`. Cached blocks are re-mapped to
    /// their new slots; when two collide the incoming block wins. No-op
    /// when compression is disabled.
    pub fn set_cache_capacity(&mut self, capacity: usize) {
        if let Some(dec) = self.decompressor.as_mut() {
            dec.set_cache_capacity(capacity);
        }
    }
}

/// Locate the compression metadata objects and build the decompressor.
///
/// Returns `None` — compression disabled, compressed entries read as empty —
/// whenever any piece is missing or invalid; the archive itself stays
/// usable.
fn setup_compression<S: ByteSource>(
    source: &mut S,
    itsf: &ItsfHeader,
    entries: &[Entry],
) -> Option<Decompressor> {
    let mut reset_entry = None;
    let mut content_entry = None;
    let mut control_entry = None;
    for e in entries {
        if e.path.eq_ignore_ascii_case(RESET_TABLE_PATH) {
            reset_entry = Some(e);
        } else if e.path.eq_ignore_ascii_case(CONTENT_PATH) {
            content_entry = Some(e);
        } else if e.path.eq_ignore_ascii_case(CONTROL_DATA_PATH) {
            control_entry = Some(e);
        }
    }

    // All three must exist and live in the uncompressed section
    let (reset_entry, content_entry, control_entry) =
        match (reset_entry, content_entry, control_entry) {
            (Some(r), Some(cn), Some(cd))
                if r.space == Space::Uncompressed
                    && cn.space == Space::Uncompressed
                    && cd.space == Space::Uncompressed =>
            {
                (r, cn, cd)
            }
            _ => {
                debug!("compression metadata objects missing, compression disabled");
                return None;
            }
        };

    if reset_entry.length < RESET_TABLE_LEN as u64 {
        debug!("reset table object too short, compression disabled");
        return None;
    }
    let mut buf = [0u8; RESET_TABLE_LEN];
    if read_exact_at(source, itsf.data_offset + reset_entry.start, &mut buf).is_err() {
        debug!("reset table read failed, compression disabled");
        return None;
    }
    let reset_table = match LzxcResetTable::parse(&buf) {
        Ok(t) => t,
        Err(e) => {
            debug!(error = %e, "reset table invalid, compression disabled");
            return None;
        }
    };

    if control_entry.length > CONTROL_DATA_MAX_LEN {
        debug!("control data object too large, compression disabled");
        return None;
    }
    let mut buf = vec![0u8; control_entry.length as usize];
    if read_exact_at(source, itsf.data_offset + control_entry.start, &mut buf).is_err() {
        debug!("control data read failed, compression disabled");
        return None;
    }
    let control = match LzxcControlData::parse(&buf) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "control data invalid, compression disabled");
            return None;
        }
    };

    let reset_block_count = u64::from(control.reset_interval / (control.window_size / 2))
        * u64::from(control.windows_per_reset);
    if reset_block_count == 0 {
        // Seen in corrupted archives; a zero interval cannot drive replay
        warn!("zero reset block count, compression disabled");
        return None;
    }

    let slot_base =
        itsf.data_offset + reset_entry.start + u64::from(reset_table.table_offset);
    let content_base = itsf.data_offset + content_entry.start;

    Some(Decompressor::new(
        reset_table,
        control.window_size,
        reset_block_count,
        slot_base,
        content_base,
    ))
}
