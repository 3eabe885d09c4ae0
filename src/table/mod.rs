//! Entry table: one record per stored blob, written after the data region.
//!
//! Record layout (little-endian):
//!
//! ```text
//! path length  u16
//! path         UTF-8, begins with '/'
//! flags        u32   opaque to the format
//! type         u32   opaque to the format
//! hash         16 B  MD5 of the entry's bytes
//! offset       u64   into the data region
//! length       u64
//! ```

use std::ops::Range;

use serde::Serialize;

use crate::error::{PacError, Result};
use crate::framing::{FieldReader, FieldWriter, MAX_PREFIXED_LEN};
use crate::hash::{ContentHash, HASH_LEN};

/// Smallest possible record: an empty path plus the fixed fields.
pub const MIN_RECORD_LEN: u64 = 2 + 4 + 4 + HASH_LEN as u64 + 8 + 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Entry {
    pub path:       String,
    pub flags:      u32,
    pub entry_type: u32,
    pub hash:       ContentHash,
    pub offset:     u64,
    pub length:     u64,
}

impl Entry {
    /// One past the last data-region byte of this entry.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// The entry's byte range within `data`, or `None` if it does not fit.
    pub fn range_in(&self, data: &[u8]) -> Option<Range<usize>> {
        let start = usize::try_from(self.offset).ok()?;
        let end = start.checked_add(usize::try_from(self.length).ok()?)?;
        (end <= data.len()).then_some(start..end)
    }

    pub(crate) fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.put_prefixed("entry path", self.path.as_bytes())?;
        w.put_u32(self.flags);
        w.put_u32(self.entry_type);
        w.put_bytes(self.hash.as_bytes());
        w.put_u64(self.offset);
        w.put_u64(self.length);
        Ok(())
    }

    pub(crate) fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        let path_at = r.position();
        let raw = r.prefixed("entry path")?;
        // Path bytes are decoded, never reinterpreted in place.
        let path = std::str::from_utf8(raw)
            .map_err(|e| PacError::PathNotUtf8 { position: path_at + 2 + e.valid_up_to() as u64 })?
            .to_owned();
        if !path.starts_with('/') {
            return Err(PacError::PathNotRooted(path));
        }
        Ok(Self {
            path,
            flags:      r.u32("entry flags")?,
            entry_type: r.u32("entry type")?,
            hash:       ContentHash(r.array("entry hash")?),
            offset:     r.u64("entry offset")?,
            length:     r.u64("entry length")?,
        })
    }
}

/// Caller-supplied half of an [`Entry`]; the writer fills in the hash,
/// offset and length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub path:       String,
    pub flags:      u32,
    pub entry_type: u32,
}

impl EntryMeta {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), flags: 0, entry_type: 0 }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_type(mut self, entry_type: u32) -> Self {
        self.entry_type = entry_type;
        self
    }

    pub(crate) fn into_entry(self, hash: ContentHash, offset: u64, length: u64) -> Entry {
        Entry {
            path: self.path,
            flags: self.flags,
            entry_type: self.entry_type,
            hash,
            offset,
            length,
        }
    }
}

/// Check that `path` can be stored: rooted and short enough to length-prefix.
pub fn validate_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(PacError::InvalidPath {
            path:   path.to_owned(),
            reason: "must begin with '/'",
        });
    }
    if path.len() > MAX_PREFIXED_LEN {
        return Err(PacError::TooLong { what: "entry path", len: path.len() });
    }
    Ok(())
}
