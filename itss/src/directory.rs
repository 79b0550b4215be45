//! Directory index walking
//!
//! Listing pages form a singly linked chain starting at the ITSP header's
//! head index. Entries are decoded back-to-back until each page's declared
//! free space. A corrupted page ends the walk but keeps everything decoded
//! before it; only a directory with no entries at all fails the open.

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::header::{ItsfHeader, ItspHeader, PmglHeader, ITSP_V1_LEN};
use crate::ioutils::SliceReader;
use crate::source::{read_exact_at, ByteSource};
use tracing::{debug, trace, warn};

/// Longest entry path a well-formed archive produces.
pub(crate) const MAX_PATH_LEN: u64 = 512;

pub(crate) struct Directory {
    pub entries: Vec<Entry>,
    /// True when the page chain was cut short by corruption
    pub degraded: bool,
}

pub(crate) fn read_directory<S: ByteSource>(
    source: &mut S,
    itsf: &ItsfHeader,
    itsp: &ItspHeader,
) -> Result<Directory> {
    // Pages start right after the ITSP header
    let base = itsf.dir_offset + ITSP_V1_LEN as u64;
    let block_len = itsp.block_len;

    let mut entries = Vec::new();
    let mut failure = None;
    let mut buf = vec![0u8; block_len as usize];
    let mut page = itsp.index_head;

    while page != -1 {
        let offset = base + page as u64 * u64::from(block_len);
        if let Err(e) = read_exact_at(source, offset, &mut buf) {
            failure = Some(e);
            break;
        }

        let mut r = SliceReader::new(&buf);
        let hdr = match PmglHeader::parse(&mut r, block_len) {
            Ok(hdr) => hdr,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };
        trace!(
            page,
            free_space = hdr.free_space,
            prev = hdr.block_prev,
            next = hdr.block_next,
            "listing page"
        );
        r.truncate_tail(hdr.free_space as usize);

        // Decode all entries in this page
        while r.remaining() > 0 {
            match parse_entry(&mut r) {
                Ok(e) => entries.push(e),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if failure.is_some() {
            break;
        }

        page = hdr.block_next;
    }

    if let Some(e) = failure {
        if entries.is_empty() {
            return Err(e);
        }
        // Serve what was decoded before the corruption
        warn!(
            entries = entries.len(),
            error = %e,
            "directory truncated by corruption, keeping entries decoded so far"
        );
        return Ok(Directory {
            entries,
            degraded: true,
        });
    }

    if entries.is_empty() {
        return Err(Error::EmptyDirectory);
    }

    debug!(entries = entries.len(), "directory parsed");
    Ok(Directory {
        entries,
        degraded: false,
    })
}

fn parse_entry(r: &mut SliceReader) -> Result<Entry> {
    let path_len = r.read_cword();
    if path_len > MAX_PATH_LEN {
        return Err(Error::PathTooLong(path_len));
    }
    if !r.ok() {
        return Err(Error::DirectoryUnderrun);
    }

    let path = String::from_utf8_lossy(r.read_bytes(path_len as usize)).into_owned();
    let space = r.read_cword();
    let start = r.read_cword();
    let length = r.read_cword();
    if !r.ok() {
        return Err(Error::DirectoryUnderrun);
    }

    Ok(Entry::new(path, space, start, length))
}
