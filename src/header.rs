//! PAC header — the fixed region at offset 0.
//!
//! ```text
//! 0    magic "PACC"
//! 4    format version      u32
//! 8    saver version       u32
//! 12   target label        u16 length + bytes
//! +0   flags               u32
//! +4   reserved            u32 × 2
//! +12  data start          u32   (patched by the writer)
//! +16  table start         u64   (patched by the writer)
//! +24  reserved            u32 × 2
//! ```
//!
//! All integers are little-endian.  Reserved fields are written as zero and
//! ignored on read.

use crate::error::{PacError, Result};
use crate::framing::{FieldReader, FieldWriter, U32Slot, U64Slot};

pub const MAGIC: &[u8; 4] = b"PACC";
pub const FORMAT_VERSION: u32 = 1;

/// Bytes before the target label: magic, two versions, label length.
pub const FIXED_PREFIX_LEN: usize = 14;
/// Bytes after the target label: flags through the trailing reserved pair.
pub const FIXED_SUFFIX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format_version: u32,
    pub saver_version:  u32,
    /// Intended consumer of the archive, e.g. a loader or toolchain name.
    /// Arbitrary bytes; see [`Header::target_str`].
    pub target:         Vec<u8>,
    pub flags:          u32,
    pub data_start:     u32,
    pub table_start:    u64,
}

/// Placeholders left by [`Header::write`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeaderSlots {
    pub data_start:  U32Slot,
    pub table_start: U64Slot,
}

impl Header {
    pub fn new(saver_version: u32, target: impl Into<Vec<u8>>, flags: u32) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            saver_version,
            target: target.into(),
            flags,
            data_start: 0,
            table_start: 0,
        }
    }

    pub fn target_str(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.target)
    }

    /// Write the header with both offsets as zero placeholders.
    pub(crate) fn write(&self, w: &mut FieldWriter) -> Result<HeaderSlots> {
        // Checked before anything is written.
        if self.target.len() > crate::framing::MAX_PREFIXED_LEN {
            return Err(PacError::TooLong { what: "target label", len: self.target.len() });
        }
        w.put_bytes(MAGIC);
        w.put_u32(self.format_version);
        w.put_u32(self.saver_version);
        w.put_prefixed("target label", &self.target)?;
        w.put_u32(self.flags);
        w.put_u32(0);
        w.put_u32(0);
        let data_start = w.reserve_u32();
        let table_start = w.reserve_u64();
        w.put_u32(0);
        w.put_u32(0);
        Ok(HeaderSlots { data_start, table_start })
    }

    /// Parse the header.  The magic is checked before any other field is read.
    pub(crate) fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        let magic: [u8; 4] = r.array("magic")?;
        if &magic != MAGIC {
            return Err(PacError::InvalidMagic { found: magic });
        }
        let format_version = r.u32("format version")?;
        if format_version != FORMAT_VERSION {
            return Err(PacError::UnsupportedVersion(format_version));
        }
        let saver_version = r.u32("saver version")?;
        let target = r.prefixed("target label")?.to_vec();
        let flags = r.u32("flags")?;
        r.u32("reserved")?;
        r.u32("reserved")?;
        let data_start = r.u32("data start")?;
        let table_start = r.u64("table start")?;
        r.u32("reserved")?;
        r.u32("reserved")?;
        Ok(Self {
            format_version,
            saver_version,
            target,
            flags,
            data_start,
            table_start,
        })
    }
}
