//! Field decoding over fixed buffers
//!
//! Header and directory structures are decoded with [`SliceReader`], a
//! cursor with a sticky failure flag: once a read runs out of bytes, every
//! later read is a zero-valued no-op. Parsers read their whole field
//! sequence unchecked and test [`SliceReader::ok`] once at the end.

use byteorder::{ByteOrder, LittleEndian};

pub(crate) struct SliceReader<'a> {
    data: &'a [u8],
    ok: bool,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, ok: true }
    }

    /// False once any read has run out of bytes.
    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Drop the last `n` bytes from the readable region.
    ///
    /// Directory pages declare trailing free space that must not be decoded
    /// as entries.
    pub fn truncate_tail(&mut self, n: usize) {
        if n > self.data.len() {
            self.data = &[];
            self.ok = false;
            return;
        }
        self.data = &self.data[..self.data.len() - n];
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if !self.ok {
            return None;
        }
        if self.data.len() < n {
            self.ok = false;
            return None;
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Some(head)
    }

    /// Read a little-endian `u32`.
    pub fn read_u32le(&mut self) -> u32 {
        self.take(4).map_or(0, LittleEndian::read_u32)
    }

    /// Read a little-endian `i32`.
    pub fn read_i32le(&mut self) -> i32 {
        self.take(4).map_or(0, LittleEndian::read_i32)
    }

    /// Read a little-endian `u64`.
    pub fn read_u64le(&mut self) -> u64 {
        self.take(8).map_or(0, LittleEndian::read_u64)
    }

    /// Read `n` raw bytes; empty on underrun.
    pub fn read_bytes(&mut self, n: usize) -> &'a [u8] {
        self.take(n).unwrap_or(&[])
    }

    /// Read a 16-byte UUID. The bytes are opaque, not interpreted.
    pub fn read_uuid(&mut self) -> [u8; 16] {
        let mut uuid = [0u8; 16];
        if let Some(d) = self.take(16) {
            uuid.copy_from_slice(d);
        }
        uuid
    }

    /// Read a compressed word: big-endian base-128, the top bit of each
    /// byte marking continuation.
    pub fn read_cword(&mut self) -> u64 {
        let mut res: u64 = 0;
        loop {
            let Some(d) = self.take(1) else {
                return 0;
            };
            let b = d[0];
            res <<= 7;
            if b & 0x80 != 0 {
                res = res.wrapping_add(u64::from(b & 0x7f));
            } else {
                return res.wrapping_add(u64::from(b));
            }
        }
    }
}
