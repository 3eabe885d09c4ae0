//! Little-endian field primitives shared by the header and table codecs.
//!
//! [`FieldWriter`] appends fields to a growable buffer and hands out slots
//! for values that are only known later (the data-start and table-start
//! offsets).  A slot is just the byte position of the placeholder; patching
//! overwrites that slice in place.
//!
//! [`FieldReader`] is a bounds-checked cursor over a borrowed buffer.  Every
//! short read is reported as [`PacError::Truncated`] naming the field and the
//! position it started at.

use std::io::{self, Cursor};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::error::{PacError, Result};

/// Largest payload a u16 length prefix can describe.
pub const MAX_PREFIXED_LEN: usize = u16::MAX as usize;

// ── Writing ──────────────────────────────────────────────────────────────────

/// Position of a reserved u32 awaiting [`FieldWriter::patch_u32`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U32Slot(usize);

/// Position of a reserved u64 awaiting [`FieldWriter::patch_u64`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U64Slot(usize);

#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Move the buffer out, leaving the writer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    fn grow(&mut self, n: usize) -> &mut [u8] {
        let at = self.buf.len();
        self.buf.resize(at + n, 0);
        &mut self.buf[at..]
    }

    pub fn put_u16(&mut self, v: u16) {
        LittleEndian::write_u16(self.grow(2), v);
    }

    pub fn put_u32(&mut self, v: u32) {
        LittleEndian::write_u32(self.grow(4), v);
    }

    pub fn put_u64(&mut self, v: u64) {
        LittleEndian::write_u64(self.grow(8), v);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// u16 length followed by the bytes themselves.  Nothing is written when
    /// `bytes` is too long for the prefix.
    pub fn put_prefixed(&mut self, what: &'static str, bytes: &[u8]) -> Result<()> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| PacError::TooLong { what, len: bytes.len() })?;
        self.put_u16(len);
        self.put_bytes(bytes);
        Ok(())
    }

    pub fn reserve_u32(&mut self) -> U32Slot {
        let slot = U32Slot(self.buf.len());
        self.put_u32(0);
        slot
    }

    pub fn reserve_u64(&mut self) -> U64Slot {
        let slot = U64Slot(self.buf.len());
        self.put_u64(0);
        slot
    }

    pub fn patch_u32(&mut self, slot: U32Slot, v: u32) {
        LittleEndian::write_u32(&mut self.buf[slot.0..slot.0 + 4], v);
    }

    pub fn patch_u64(&mut self, slot: U64Slot, v: u64) {
        LittleEndian::write_u64(&mut self.buf[slot.0..slot.0 + 8], v);
    }
}

// ── Reading ──────────────────────────────────────────────────────────────────

pub struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(buf) }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    fn truncated(&self, field: &'static str, position: u64, needed: u64) -> PacError {
        PacError::Truncated {
            field,
            position,
            needed,
            available: self.len().saturating_sub(position),
        }
    }

    fn read_with<T>(
        &mut self,
        field: &'static str,
        width: u64,
        read: impl FnOnce(&mut Cursor<&'a [u8]>) -> io::Result<T>,
    ) -> Result<T> {
        let position = self.position();
        read(&mut self.cursor).map_err(|_| self.truncated(field, position, width))
    }

    /// Jump to an absolute position.  Landing exactly on the end is allowed;
    /// the next read reports the truncation.
    pub fn seek(&mut self, position: u64, field: &'static str) -> Result<()> {
        if position > self.len() {
            return Err(self.truncated(field, position, 0));
        }
        self.cursor.set_position(position);
        Ok(())
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16> {
        self.read_with(field, 2, |c| c.read_u16::<LittleEndian>())
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32> {
        self.read_with(field, 4, |c| c.read_u32::<LittleEndian>())
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64> {
        self.read_with(field, 8, |c| c.read_u64::<LittleEndian>())
    }

    /// Borrow the next `len` bytes without copying.
    pub fn bytes(&mut self, len: u64, field: &'static str) -> Result<&'a [u8]> {
        let start = self.position();
        if len > self.remaining() {
            return Err(self.truncated(field, start, len));
        }
        let buf: &'a [u8] = *self.cursor.get_ref();
        // Both ends are within `buf`, so they fit in usize.
        let out = &buf[start as usize..(start + len) as usize];
        self.cursor.set_position(start + len);
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N as u64, field)?);
        Ok(out)
    }

    /// u16 length followed by that many bytes.
    pub fn prefixed(&mut self, field: &'static str) -> Result<&'a [u8]> {
        let len = self.u16(field)?;
        self.bytes(u64::from(len), field)
    }
}
