//! In-memory archive writer.
//!
//! A [`PacWriter`] owns one session: `begin` writes the header, `add_entry`
//! appends data, `finalize` writes the entry table and hands back the
//! finished buffer.  The two header offsets are written as placeholders and
//! patched once their values are known, so the whole archive is produced in
//! a single forward pass over one `Vec<u8>`.
//!
//! ```text
//! Idle ──begin──▶ Open ──finalize──▶ Finalized
//!                  │ error
//!                  ▼
//!               Aborted          (begin or close restarts from any state)
//! ```

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::error::{PacError, Result};
use crate::framing::FieldWriter;
use crate::hash::ContentHash;
use crate::header::{Header, HeaderSlots};
use crate::table::{validate_path, Entry, EntryMeta};

// ── WriterOptions ────────────────────────────────────────────────────────────

/// Header fields for archives produced by a [`PacWriter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOptions {
    pub saver_version: u32,
    pub target:        Vec<u8>,
    pub flags:         u32,
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_saver_version(mut self, saver_version: u32) -> Self {
        self.saver_version = saver_version;
        self
    }

    pub fn with_target(mut self, target: impl Into<Vec<u8>>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }
}

// ── PacWriter ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Open,
    Finalized,
    Aborted,
}

#[derive(Debug)]
pub struct PacWriter {
    options:    WriterOptions,
    state:      SessionState,
    buf:        FieldWriter,
    slots:      Option<HeaderSlots>,
    data_start: usize,
    entries:    Vec<Entry>,
    paths:      HashSet<String>,
}

impl PacWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self {
            options,
            state:      SessionState::Idle,
            buf:        FieldWriter::new(),
            slots:      None,
            data_start: 0,
            entries:    Vec::new(),
            paths:      HashSet::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Entries added so far in this session, in append order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Bytes appended to the data region so far.
    pub fn data_len(&self) -> u64 {
        match self.state {
            SessionState::Open => (self.buf.len() - self.data_start) as u64,
            _ => self.entries.last().map_or(0, Entry::end),
        }
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.slots = None;
        self.data_start = 0;
        self.entries.clear();
        self.paths.clear();
    }

    fn abort<T>(&mut self, err: PacError) -> Result<T> {
        debug!(error = %err, "writer session aborted");
        self.reset();
        self.state = SessionState::Aborted;
        Err(err)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Idle => Err(PacError::NotBegun),
            SessionState::Finalized => Err(PacError::AlreadyFinalized),
            SessionState::Aborted => Err(PacError::SessionAborted),
        }
    }

    /// Discard any previous session and write the header.
    pub fn begin(&mut self) -> Result<()> {
        self.reset();
        let header = Header::new(
            self.options.saver_version,
            self.options.target.clone(),
            self.options.flags,
        );
        let slots = match header.write(&mut self.buf) {
            Ok(slots) => slots,
            Err(e) => return self.abort(e),
        };

        // The header is at most 46 + 65535 bytes.
        let data_start = self.buf.len();
        self.buf.patch_u32(slots.data_start, data_start as u32);

        self.slots = Some(slots);
        self.data_start = data_start;
        self.state = SessionState::Open;
        debug!(
            saver_version = self.options.saver_version,
            data_start,
            "writer session started"
        );
        Ok(())
    }

    /// Append `data` as a new entry.  The content hash is computed here; the
    /// offset is the end of the previous entry.
    pub fn add_entry(&mut self, meta: EntryMeta, data: &[u8]) -> Result<&Entry> {
        self.ensure_open()?;
        if let Err(e) = validate_path(&meta.path) {
            return self.abort(e);
        }
        if self.paths.contains(&meta.path) {
            return self.abort(PacError::PathAlreadyAdded(meta.path));
        }

        let offset = self.entries.last().map_or(0, Entry::end);
        let length = data.len() as u64;
        let hash = ContentHash::of(data);
        self.buf.put_bytes(data);

        let entry = meta.into_entry(hash, offset, length);
        trace!(path = %entry.path, offset, length, %hash, "entry added");
        self.paths.insert(entry.path.clone());
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Patch the table offset, write the entry table and return the archive.
    /// Terminal: the session only accepts `begin` or `close` afterwards.
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let slots = match self.slots {
            Some(slots) => slots,
            None => return self.abort(PacError::NotBegun),
        };

        let table_start = self.buf.len() as u64;
        self.buf.patch_u64(slots.table_start, table_start);
        self.buf.put_u64(self.entries.len() as u64);
        let written = self.entries.iter().try_for_each(|e| e.write(&mut self.buf));
        if let Err(e) = written {
            return self.abort(e);
        }

        self.state = SessionState::Finalized;
        let bytes = self.buf.take();
        debug!(
            entries = self.entries.len(),
            table_start,
            total = bytes.len(),
            "archive finalized"
        );
        Ok(bytes)
    }

    /// Drop all session state.  Safe to call any number of times.
    pub fn close(&mut self) {
        self.reset();
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::header::FORMAT_VERSION;

    fn open_writer() -> PacWriter {
        let mut w = PacWriter::new(WriterOptions::new().with_saver_version(1000).with_target("hi"));
        w.begin().unwrap();
        w
    }

    #[test]
    fn offsets_follow_append_order() {
        let mut w = open_writer();
        w.add_entry(EntryMeta::new("/a"), b"aaaa").unwrap();
        w.add_entry(EntryMeta::new("/empty"), b"").unwrap();
        let c = w.add_entry(EntryMeta::new("/c"), b"cc").unwrap().clone();
        assert_eq!(c.offset, 4);
        assert_eq!(c.length, 2);

        let offsets: Vec<(u64, u64)> = w.entries().iter().map(|e| (e.offset, e.length)).collect();
        assert_eq!(offsets, vec![(0, 4), (4, 0), (4, 2)]);
        assert_eq!(w.data_len(), 6);
    }

    #[test]
    fn header_offsets_are_patched() {
        let mut w = open_writer();
        w.add_entry(EntryMeta::new("/hello.txt"), b"Hello, World!").unwrap();
        let bytes = w.finalize().unwrap();

        // "hi" label: data starts right after the 48-byte header.
        let data_start = u32::from_le_bytes(bytes[28..32].try_into().unwrap());
        let table_start = u64::from_le_bytes(bytes[32..40].try_into().unwrap());
        assert_eq!(data_start, 48);
        assert_eq!(table_start, 48 + 13);
        assert_eq!(&bytes[48..61], b"Hello, World!");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), FORMAT_VERSION);
        let count = u64::from_le_bytes(bytes[61..69].try_into().unwrap());
        assert_eq!(count, 1);
    }

    #[test]
    fn usage_errors_follow_state() {
        let mut w = PacWriter::new(WriterOptions::default());
        assert!(matches!(w.add_entry(EntryMeta::new("/a"), b"x"), Err(PacError::NotBegun)));
        assert!(matches!(w.finalize(), Err(PacError::NotBegun)));

        w.begin().unwrap();
        w.finalize().unwrap();
        assert_eq!(w.state(), SessionState::Finalized);
        let err = w.add_entry(EntryMeta::new("/late"), b"x").unwrap_err();
        assert!(matches!(err, PacError::AlreadyFinalized));
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(matches!(w.finalize(), Err(PacError::AlreadyFinalized)));
    }

    #[test]
    fn bad_input_aborts_session() {
        let mut w = open_writer();
        w.add_entry(EntryMeta::new("/a"), b"x").unwrap();
        let err = w.add_entry(EntryMeta::new("/a"), b"y").unwrap_err();
        assert!(matches!(err, PacError::PathAlreadyAdded(_)));
        assert_eq!(w.state(), SessionState::Aborted);
        assert!(w.entries().is_empty());
        assert!(matches!(w.finalize(), Err(PacError::SessionAborted)));

        w.begin().unwrap();
        let err = w.add_entry(EntryMeta::new("relative"), b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(w.state(), SessionState::Aborted);
    }

    #[test]
    fn oversized_label_is_rejected() {
        let mut w = PacWriter::new(WriterOptions::new().with_target(vec![b'x'; 65_536]));
        let err = w.begin().unwrap_err();
        assert!(matches!(err, PacError::TooLong { what: "target label", len: 65_536 }));
        assert_eq!(w.state(), SessionState::Aborted);

        let mut w = PacWriter::new(WriterOptions::new().with_target(vec![b'x'; 65_535]));
        w.begin().unwrap();
    }

    #[test]
    fn close_is_idempotent_and_begin_resets() {
        let mut w = open_writer();
        w.add_entry(EntryMeta::new("/a"), b"first session").unwrap();
        w.close();
        w.close();
        assert_eq!(w.state(), SessionState::Idle);
        assert!(w.entries().is_empty());

        w.begin().unwrap();
        w.add_entry(EntryMeta::new("/a"), b"second").unwrap();
        assert_eq!(w.entries()[0].offset, 0);
        assert_eq!(w.data_len(), 6);
    }
}
