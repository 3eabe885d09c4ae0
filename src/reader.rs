//! Archive loader.
//!
//! Parsing runs header → data region → entry table, using the offsets the
//! header declares.  Every entry is bounds-checked against the data region
//! and its MD5 recomputed; any failure rejects the whole buffer.
//!
//! With the `parallel` feature, hashes are verified across entries with
//! Rayon once the table has been read.  The error reported is still the
//! first failing entry in table order, whether that failure is a bad hash or
//! a structural problem further down the table.

use std::collections::HashSet;
use std::ops::Range;

use tracing::{debug, trace, warn};

use crate::archive::Archive;
use crate::error::{PacError, Result};
use crate::framing::FieldReader;
use crate::hash::ContentHash;
use crate::header::Header;
use crate::table::{Entry, MIN_RECORD_LEN};

// ── LoadOptions ──────────────────────────────────────────────────────────────

/// Checks applied by [`load_with`].  Everything is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Recompute and compare every entry's MD5.
    pub verify_hashes:        bool,
    /// Reject a table naming the same path twice.
    pub require_unique_paths: bool,
    /// Require entries to tile the data region in table order.
    pub require_contiguous:   bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            verify_hashes:        true,
            require_unique_paths: true,
            require_contiguous:   true,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the checks every PAC reader performs: magic, version, bounds and
    /// hashes.  Duplicate paths and gaps between entries are accepted.
    pub fn permissive() -> Self {
        Self {
            verify_hashes:        true,
            require_unique_paths: false,
            require_contiguous:   false,
        }
    }

    pub fn with_verify_hashes(mut self, on: bool) -> Self {
        self.verify_hashes = on;
        self
    }

    pub fn with_unique_paths(mut self, on: bool) -> Self {
        self.require_unique_paths = on;
        self
    }

    pub fn with_contiguous(mut self, on: bool) -> Self {
        self.require_contiguous = on;
        self
    }
}

// ── Loading ──────────────────────────────────────────────────────────────────

/// Parse and fully validate an archive.
pub fn load(bytes: &[u8]) -> Result<Archive> {
    load_with(bytes, LoadOptions::default())
}

pub fn load_with(bytes: &[u8], opts: LoadOptions) -> Result<Archive> {
    let mut r = FieldReader::new(bytes);
    let header = Header::read(&mut r)?;

    let header_len = r.position();
    if u64::from(header.data_start) < header_len {
        return Err(PacError::DataStartInsideHeader {
            data_start: header.data_start,
            header_len,
        });
    }
    if header.table_start < u64::from(header.data_start) {
        return Err(PacError::TableBeforeData {
            data_start:  header.data_start,
            table_start: header.table_start,
        });
    }

    r.seek(u64::from(header.data_start), "data region")?;
    let data = r
        .bytes(header.table_start - u64::from(header.data_start), "data region")?
        .to_vec();
    let data_len = data.len() as u64;

    r.seek(header.table_start, "entry count")?;
    let count = r.u64("entry count")?;
    // The count is untrusted; never reserve more than the table could hold.
    let capacity = count.min(r.remaining() / MIN_RECORD_LEN) as usize;
    let mut scanned = Vec::with_capacity(capacity);
    let table = read_table(&mut r, &data, count, opts, &mut scanned);

    // Every entry in `scanned` precedes whatever structural error stopped the
    // table read, so a bad hash among them is the earlier failure.
    #[cfg(feature = "parallel")]
    if opts.verify_hashes {
        verify_all(&scanned, &data)?;
    }
    table?;

    let entries: Vec<Entry> = scanned.into_iter().map(|(entry, _)| entry).collect();
    debug!(
        entries = entries.len(),
        data_len,
        saver_version = header.saver_version,
        "archive loaded"
    );
    Ok(Archive::from_parts(header, data, entries))
}

/// Read `count` records, checking each in table order: bounds, uniqueness,
/// contiguity, then (without `parallel`) its hash.  Entries that pass are
/// pushed along with their range in `data`.
fn read_table(
    r: &mut FieldReader<'_>,
    data: &[u8],
    count: u64,
    opts: LoadOptions,
    out: &mut Vec<(Entry, Range<usize>)>,
) -> Result<()> {
    let data_len = data.len() as u64;
    let mut seen = HashSet::with_capacity(if opts.require_unique_paths { out.capacity() } else { 0 });
    let mut expected_offset = 0u64;

    for _ in 0..count {
        let entry = Entry::read(r)?;
        let range = entry.range_in(data).ok_or_else(|| PacError::OutOfBounds {
            path:   entry.path.clone(),
            offset: entry.offset,
            length: entry.length,
            data_len,
        })?;
        if opts.require_unique_paths && !seen.insert(entry.path.clone()) {
            return Err(PacError::DuplicatePath(entry.path));
        }
        if opts.require_contiguous && entry.offset != expected_offset {
            return Err(PacError::NonContiguous {
                path:     entry.path,
                offset:   entry.offset,
                expected: expected_offset,
            });
        }
        expected_offset = entry.end();

        #[cfg(not(feature = "parallel"))]
        if opts.verify_hashes {
            verify_entry(&entry, &data[range.clone()])?;
        }

        trace!(path = %entry.path, offset = entry.offset, length = entry.length, "entry read");
        out.push((entry, range));
    }

    if opts.require_contiguous && expected_offset != data_len {
        return Err(PacError::UncoveredData { covered: expected_offset, data_len });
    }
    Ok(())
}

fn verify_entry(entry: &Entry, bytes: &[u8]) -> Result<()> {
    let computed = ContentHash::of(bytes);
    if computed != entry.hash {
        warn!(path = %entry.path, stored = %entry.hash, %computed, "content hash mismatch");
        return Err(PacError::HashMismatch {
            path: entry.path.clone(),
            stored: entry.hash,
            computed,
        });
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn verify_all(scanned: &[(Entry, Range<usize>)], data: &[u8]) -> Result<()> {
    use rayon::prelude::*;

    let first_bad = scanned
        .par_iter()
        .position_first(|(entry, range)| !entry.hash.matches(&data[range.clone()]));
    match first_bad {
        Some(i) => {
            let (entry, range) = &scanned[i];
            verify_entry(entry, &data[range.clone()])
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::framing::FieldWriter;
    use crate::header::Header;
    use crate::table::EntryMeta;
    use crate::writer::{PacWriter, WriterOptions};

    fn build(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut w = PacWriter::new(WriterOptions::new().with_saver_version(7).with_target("hi"));
        w.begin().unwrap();
        for (path, data) in entries {
            w.add_entry(EntryMeta::new(*path), data).unwrap();
        }
        w.finalize().unwrap()
    }

    /// Hand-assemble an archive so the table can say things the writer never would.
    fn forge(data: &[u8], entries: &[Entry]) -> Vec<u8> {
        let mut w = FieldWriter::new();
        let slots = Header::new(0, "", 0).write(&mut w).unwrap();
        let data_start = w.len();
        w.patch_u32(slots.data_start, data_start as u32);
        w.put_bytes(data);
        w.patch_u64(slots.table_start, w.len() as u64);
        w.put_u64(entries.len() as u64);
        for e in entries {
            e.write(&mut w).unwrap();
        }
        w.take()
    }

    fn entry(path: &str, data: &[u8], offset: u64) -> Entry {
        EntryMeta::new(path).into_entry(ContentHash::of(data), offset, data.len() as u64)
    }

    #[test]
    fn hello_world_scenario() {
        let bytes = build(&[("/hello.txt", &b"Hello, World!"[..])]);
        let archive = load(&bytes).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.saver_version(), 7);
        assert_eq!(archive.target(), b"hi");
        let e = &archive.entries()[0];
        assert_eq!(e.hash, ContentHash::of(b"Hello, World!"));
        assert_eq!(archive.entry_data(e).unwrap(), b"Hello, World!");
    }

    #[test]
    fn empty_archive_loads() {
        let archive = load(&build(&[])).unwrap();
        assert!(archive.is_empty());
        assert!(archive.data().is_empty());
    }

    #[test]
    fn table_before_data_is_truncation() {
        let mut bytes = build(&[("/a", &b"abc"[..])]);
        // table_start := 0
        bytes[32..40].copy_from_slice(&0u64.to_le_bytes());
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, PacError::TableBeforeData { .. }));
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn table_start_past_end_is_truncation() {
        let mut bytes = build(&[("/a", &b"abc"[..])]);
        bytes[32..40].copy_from_slice(&10_000u64.to_le_bytes());
        assert_eq!(load(&bytes).unwrap_err().kind(), ErrorKind::Truncated);
    }

    #[test]
    fn data_start_inside_header_is_format_error() {
        let mut bytes = build(&[("/a", &b"abc"[..])]);
        // Empty label: data_start field sits at 26..30.
        let mut forged = forge(b"abc", &[entry("/a", b"abc", 0)]);
        forged[26..30].copy_from_slice(&4u32.to_le_bytes());
        let err = load(&forged).unwrap_err();
        assert!(matches!(err, PacError::DataStartInsideHeader { data_start: 4, .. }));

        bytes[28..32].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(load(&bytes).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn out_of_bounds_entry() {
        let bytes = forge(b"abc", &[entry("/a", b"abcd", 0)]);
        let err = load(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
        assert_eq!(err.path(), Some("/a"));
    }

    #[test]
    fn huge_entry_count_fails_without_allocating() {
        let mut bytes = forge(b"", &[]);
        let n = bytes.len();
        bytes[n - 8..].copy_from_slice(&u64::MAX.to_le_bytes());
        assert_eq!(load(&bytes).unwrap_err().kind(), ErrorKind::Truncated);
    }

    #[test]
    fn duplicates_rejected_unless_permissive() {
        let bytes = forge(b"xy", &[entry("/a", b"x", 0), entry("/a", b"y", 1)]);
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, PacError::DuplicatePath(ref p) if p == "/a"));

        let archive = load_with(&bytes, LoadOptions::permissive()).unwrap();
        assert_eq!(archive.len(), 2);
        // Lookup returns the first match.
        assert_eq!(archive.data_by_path("/a"), Some(&b"x"[..]));
    }

    #[test]
    fn gaps_and_overlaps_rejected_unless_permissive() {
        let overlap = forge(b"abc", &[entry("/a", b"ab", 0), entry("/b", b"bc", 1)]);
        let err = load(&overlap).unwrap_err();
        assert!(matches!(err, PacError::NonContiguous { offset: 1, expected: 2, .. }));
        load_with(&overlap, LoadOptions::permissive()).unwrap();

        let uncovered = forge(b"abcdef", &[entry("/a", b"abc", 0)]);
        let err = load(&uncovered).unwrap_err();
        assert!(matches!(err, PacError::UncoveredData { covered: 3, data_len: 6 }));
        assert_eq!(err.kind(), ErrorKind::Format);
        load_with(&uncovered, LoadOptions::new().with_contiguous(false)).unwrap();
    }

    #[test]
    fn hash_check_can_be_skipped() {
        let mut bad = entry("/a", b"abc", 0);
        bad.hash = ContentHash::ZERO;
        let bytes = forge(b"abc", &[bad]);
        let err = load(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(err.path(), Some("/a"));

        let archive = load_with(&bytes, LoadOptions::new().with_verify_hashes(false)).unwrap();
        assert_eq!(archive.data_by_path("/a"), Some(&b"abc"[..]));
    }

    #[test]
    fn first_corrupt_entry_is_reported() {
        let mut b = entry("/b", b"b", 1);
        let mut c = entry("/c", b"c", 2);
        b.hash = ContentHash::ZERO;
        c.hash = ContentHash::ZERO;
        let bytes = forge(b"abc", &[entry("/a", b"a", 0), b, c]);
        assert_eq!(load(&bytes).unwrap_err().path(), Some("/b"));
    }

    #[test]
    fn bad_hash_outranks_later_bounds_error() {
        let mut a = entry("/a", b"abc", 0);
        a.hash = ContentHash::ZERO;
        let b = EntryMeta::new("/b").into_entry(ContentHash::ZERO, 3, 10);
        let err = load(&forge(b"abc", &[a, b])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(err.path(), Some("/a"));
    }

    #[test]
    fn bad_hash_outranks_uncovered_data() {
        let mut a = entry("/a", b"abc", 0);
        a.hash = ContentHash::ZERO;
        let err = load(&forge(b"abcdef", &[a])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(err.path(), Some("/a"));
    }

    #[test]
    fn structural_error_outranks_later_bad_hash() {
        let mut c = entry("/c", b"c", 2);
        c.hash = ContentHash::ZERO;
        let bytes = forge(b"abc", &[entry("/a", b"a", 0), entry("/a", b"b", 1), c]);
        assert!(matches!(load(&bytes).unwrap_err(), PacError::DuplicatePath(ref p) if p == "/a"));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = build(&[("/a", &b"abc"[..])]);
        bytes.extend_from_slice(b"trailer");
        assert_eq!(load(&bytes).unwrap().len(), 1);
    }
}
