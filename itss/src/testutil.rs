//! Shared test support: synthetic archive fixtures and a fake LZX decoder.

use crate::decompress::LzxStream;
use crate::error::{Error, Result};
use crate::{CONTENT_PATH, CONTROL_DATA_PATH, RESET_TABLE_PATH};

/// Decompressed length of one block in fixtures.
pub(crate) const BLOCK_LEN: u64 = 16;
/// Number of compressed blocks in fixtures.
pub(crate) const BLOCK_COUNT: u32 = 8;
/// Blocks per reset segment in fixtures.
pub(crate) const RESET_BLOCKS: u64 = 4;
/// Length of each fake-compressed block in the content object.
const COMPRESSED_BLOCK_LEN: u64 = 4;

/// Append a big-endian base-128 compressed word.
pub(crate) fn push_cword(out: &mut Vec<u8>, value: u64) {
    let mut tmp = [0u8; 10];
    let mut n = 0;
    let mut v = value;
    loop {
        tmp[n] = (v & 0x7f) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let mut b = tmp[i];
        if i != 0 {
            b |= 0x80;
        }
        out.push(b);
    }
}

/// History-dependent stand-in for the LZX decoder.
///
/// Real LZX streams cannot be authored by hand, and a history-free fake
/// would not notice replay-order bugs. This one keys its output on how many
/// blocks it has produced since the last reset: decoding block `b` yields
/// `src[0] + seq` repeated, so bytes are only correct when the engine
/// replays each reset segment in order from its base.
pub(crate) struct FakeLzx {
    seq: u8,
    fail_from: Option<u8>,
}

impl FakeLzx {
    pub fn new() -> Self {
        Self {
            seq: 0,
            fail_from: None,
        }
    }

    /// A decoder that rejects blocks whose first compressed byte is at
    /// least `block`.
    pub fn failing_from(block: u8) -> Self {
        Self {
            seq: 0,
            fail_from: Some(block),
        }
    }
}

impl LzxStream for FakeLzx {
    fn reset(&mut self) {
        self.seq = 0;
    }

    fn decode(&mut self, src: &[u8], out_len: usize) -> Result<Vec<u8>> {
        let first = src.first().copied().unwrap_or(0);
        if let Some(limit) = self.fail_from {
            if first >= limit {
                return Err(Error::LzxDecode("synthetic failure".into()));
            }
        }
        let value = first.wrapping_add(self.seq);
        self.seq = self.seq.wrapping_add(1);
        Ok(vec![value; out_len])
    }
}

/// Builds a complete single-page archive with compression metadata.
///
/// The data section holds the reset table object (header plus slot array),
/// the fake-compressed content object (block `b` is four copies of `b`) and
/// the LZXC control data, plus one compressed entry spanning blocks 0..=6.
pub(crate) struct Fixture {
    control_space: u64,
    windows_per_reset: u32,
    reset_table_version: u32,
}

impl Fixture {
    pub fn with_compression() -> Self {
        Self {
            control_space: 0,
            windows_per_reset: 2,
            reset_table_version: 2,
        }
    }

    /// Move the control data object into the compressed space, which must
    /// disable compression.
    pub fn control_in_compressed_space(&mut self) {
        self.control_space = 1;
    }

    pub fn windows_per_reset(&mut self, n: u32) {
        self.windows_per_reset = n;
    }

    pub fn corrupt_reset_table_version(&mut self) {
        self.reset_table_version = 1;
    }

    pub fn build(&self) -> Vec<u8> {
        // Reset table object: header then the per-block slot array
        let mut reset_obj = Vec::new();
        reset_obj.extend_from_slice(&self.reset_table_version.to_le_bytes());
        reset_obj.extend_from_slice(&BLOCK_COUNT.to_le_bytes());
        reset_obj.extend_from_slice(&8u32.to_le_bytes()); // reserved
        reset_obj.extend_from_slice(&0x28u32.to_le_bytes()); // table offset
        reset_obj.extend_from_slice(&(u64::from(BLOCK_COUNT) * BLOCK_LEN).to_le_bytes());
        reset_obj
            .extend_from_slice(&(u64::from(BLOCK_COUNT) * COMPRESSED_BLOCK_LEN).to_le_bytes());
        reset_obj.extend_from_slice(&BLOCK_LEN.to_le_bytes());
        for b in 0..u64::from(BLOCK_COUNT) {
            reset_obj.extend_from_slice(&(b * COMPRESSED_BLOCK_LEN).to_le_bytes());
        }

        let mut content_obj = Vec::new();
        for b in 0..BLOCK_COUNT {
            content_obj.extend_from_slice(&[b as u8; COMPRESSED_BLOCK_LEN as usize]);
        }

        let mut control_obj = Vec::new();
        control_obj.extend_from_slice(&6u32.to_le_bytes()); // size
        control_obj.extend_from_slice(b"LZXC");
        control_obj.extend_from_slice(&1u32.to_le_bytes()); // version
        control_obj.extend_from_slice(&0x8000u32.to_le_bytes()); // reset interval
        control_obj.extend_from_slice(&0x8000u32.to_le_bytes()); // window size
        control_obj.extend_from_slice(&self.windows_per_reset.to_le_bytes());

        // Data section: the three objects back-to-back
        let mut data = Vec::new();
        let reset_start = data.len() as u64;
        data.extend_from_slice(&reset_obj);
        let content_start = data.len() as u64;
        data.extend_from_slice(&content_obj);
        let control_start = data.len() as u64;
        data.extend_from_slice(&control_obj);

        let entries: [(&str, u64, u64, u64); 4] = [
            (RESET_TABLE_PATH, 0, reset_start, reset_obj.len() as u64),
            (
                CONTROL_DATA_PATH,
                self.control_space,
                control_start,
                control_obj.len() as u64,
            ),
            (CONTENT_PATH, 0, content_start, content_obj.len() as u64),
            ("/compressed.bin", 1, 4, 100),
        ];

        build_archive(0x200, &entries, &data)
    }
}

/// Assemble a version-3 archive with one listing page.
pub(crate) fn build_archive(
    block_len: u32,
    entries: &[(&str, u64, u64, u64)],
    data: &[u8],
) -> Vec<u8> {
    let mut entry_bytes = Vec::new();
    for (path, space, start, length) in entries {
        push_cword(&mut entry_bytes, path.len() as u64);
        entry_bytes.extend_from_slice(path.as_bytes());
        push_cword(&mut entry_bytes, *space);
        push_cword(&mut entry_bytes, *start);
        push_cword(&mut entry_bytes, *length);
    }

    let free_space = block_len as usize - 0x14 - entry_bytes.len();
    let mut page = Vec::new();
    page.extend_from_slice(b"PMGL");
    page.extend_from_slice(&(free_space as u32).to_le_bytes());
    page.extend_from_slice(&0u32.to_le_bytes());
    page.extend_from_slice(&(-1i32).to_le_bytes());
    page.extend_from_slice(&(-1i32).to_le_bytes());
    page.extend_from_slice(&entry_bytes);
    page.resize(block_len as usize, 0);

    let dir_offset = 0x60u64;
    let dir_len = 0x54 + u64::from(block_len);
    let data_offset = dir_offset + dir_len;

    let mut out = Vec::new();
    out.extend_from_slice(b"ITSF");
    out.extend_from_slice(&3i32.to_le_bytes());
    out.extend_from_slice(&0x60i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // last modified
    out.extend_from_slice(&0x0409u32.to_le_bytes()); // lang id
    out.extend_from_slice(&[0x6a; 16]); // dir uuid
    out.extend_from_slice(&[0x6b; 16]); // stream uuid
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&dir_offset.to_le_bytes());
    out.extend_from_slice(&dir_len.to_le_bytes());
    out.extend_from_slice(&data_offset.to_le_bytes());

    out.extend_from_slice(b"ITSP");
    out.extend_from_slice(&1i32.to_le_bytes());
    out.extend_from_slice(&0x54i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&block_len.to_le_bytes());
    out.extend_from_slice(&2i32.to_le_bytes()); // blockidx interval
    out.extend_from_slice(&1i32.to_le_bytes()); // index depth
    out.extend_from_slice(&(-1i32).to_le_bytes()); // index root
    out.extend_from_slice(&0i32.to_le_bytes()); // index head
    out.extend_from_slice(&(-1i32).to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // num blocks
    out.extend_from_slice(&(-1i32).to_le_bytes());
    out.extend_from_slice(&0x0409u32.to_le_bytes());
    out.extend_from_slice(&[0x6c; 16]); // system uuid
    out.extend_from_slice(&[0u8; 16]);

    out.extend_from_slice(&page);
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cword_encoding_round_trips() {
        use crate::ioutils::SliceReader;

        for value in [0u64, 5, 127, 128, 0xa3, 512, 100_000, u64::from(u32::MAX)] {
            let mut d = Vec::new();
            push_cword(&mut d, value);
            let mut r = SliceReader::new(&d);
            assert_eq!(r.read_cword(), value, "value {value}");
            assert!(r.ok());
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn fake_lzx_depends_on_decode_order() {
        let mut lzx = FakeLzx::new();
        let a = lzx.decode(&[3, 3, 3, 3], 4).unwrap();
        let b = lzx.decode(&[3, 3, 3, 3], 4).unwrap();
        assert_ne!(a, b);

        lzx.reset();
        let c = lzx.decode(&[3, 3, 3, 3], 4).unwrap();
        assert_eq!(a, c);
    }
}
