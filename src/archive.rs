//! Loaded archive — the primary read surface.
//!
//! ```
//! use pacc::{EntryMeta, PacWriter, WriterOptions};
//!
//! let mut w = PacWriter::new(WriterOptions::new().with_saver_version(1000).with_target("hi"));
//! w.begin()?;
//! w.add_entry(EntryMeta::new("/hello.txt"), b"Hello, World!")?;
//! let bytes = w.finalize()?;
//!
//! let archive = pacc::load(&bytes)?;
//! let entry = archive.get_entry_by_path("/hello.txt").expect("present");
//! assert_eq!(archive.entry_data(entry)?, b"Hello, World!");
//! # Ok::<(), pacc::PacError>(())
//! ```

use serde::Serialize;

use crate::error::{PacError, Result};
use crate::header::Header;
use crate::table::Entry;

/// A fully validated archive.  Immutable once loaded; share it across threads
/// by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    header:  Header,
    data:    Vec<u8>,
    entries: Vec<Entry>,
}

/// Summary returned by [`Archive::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveInfo {
    pub format_version: u32,
    pub saver_version:  u32,
    /// Lossy text form of the label; see [`Archive::target`] for the bytes.
    pub target:         String,
    pub flags:          u32,
    pub data_start:     u32,
    pub table_start:    u64,
    pub entry_count:    usize,
    pub data_len:       u64,
}

impl Archive {
    pub(crate) fn from_parts(header: Header, data: Vec<u8>, entries: Vec<Entry>) -> Self {
        Self { header, data, entries }
    }

    // ── Header ───────────────────────────────────────────────────────────────

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn format_version(&self) -> u32 {
        self.header.format_version
    }

    pub fn saver_version(&self) -> u32 {
        self.header.saver_version
    }

    pub fn target(&self) -> &[u8] {
        &self.header.target
    }

    /// The target label as text, if it is valid UTF-8.
    pub fn target_str(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        self.header.target_str()
    }

    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    pub fn info(&self) -> ArchiveInfo {
        ArchiveInfo {
            format_version: self.header.format_version,
            saver_version:  self.header.saver_version,
            target:         String::from_utf8_lossy(&self.header.target).into_owned(),
            flags:          self.header.flags,
            data_start:     self.header.data_start,
            table_start:    self.header.table_start,
            entry_count:    self.entries.len(),
            data_len:       self.data.len() as u64,
        }
    }

    // ── Entries ──────────────────────────────────────────────────────────────

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The whole data region.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Borrow an entry's bytes from the data region.  Fails only for an
    /// entry that did not come from this archive.
    pub fn entry_data(&self, entry: &Entry) -> Result<&[u8]> {
        entry
            .range_in(&self.data)
            .map(|range| &self.data[range])
            .ok_or_else(|| PacError::OutOfBounds {
                path:     entry.path.clone(),
                offset:   entry.offset,
                length:   entry.length,
                data_len: self.data.len() as u64,
            })
    }

    /// First entry whose path equals `path`.
    ///
    /// Linear scan; a path index would go here if archives grow large.
    pub fn get_entry_by_path(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn data_by_path(&self, path: &str) -> Option<&[u8]> {
        let entry = self.get_entry_by_path(path)?;
        self.entry_data(entry).ok()
    }

    /// Entries paired with their bytes, in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&Entry, &[u8])> + '_ {
        self.entries.iter().map(move |e| {
            let bytes = e.range_in(&self.data).map_or(&[][..], |range| &self.data[range]);
            (e, bytes)
        })
    }
}
