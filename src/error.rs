use thiserror::Error;

use crate::hash::ContentHash;

/// Coarse classification of a [`PacError`].
///
/// Callers that only care about *why* a load or a writer session failed match
/// on this instead of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad magic, unsupported format version, or a malformed table.
    Format,
    /// The buffer ends before a field the header or table declares.
    Truncated,
    /// An entry range reaches past the data region.
    Bounds,
    /// An entry's content hash does not match its bytes.
    Integrity,
    /// The API was driven out of order or fed an unencodable value.
    Usage,
}

#[derive(Error, Debug)]
pub enum PacError {
    // ── Format ───────────────────────────────────────────────────────────────
    #[error("Invalid magic number: got {found:02x?}, expected \"PACC\"")]
    InvalidMagic { found: [u8; 4] },
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u32),
    #[error("Data start {data_start} lies inside the {header_len}-byte header")]
    DataStartInsideHeader { data_start: u32, header_len: u64 },
    #[error("Entry path is not valid UTF-8 at byte {position}")]
    PathNotUtf8 { position: u64 },
    #[error("Entry path {0:?} does not begin with '/'")]
    PathNotRooted(String),
    #[error("Duplicate entry path {0:?}")]
    DuplicatePath(String),
    #[error("Entry {path:?} starts at {offset}, expected {expected}")]
    NonContiguous { path: String, offset: u64, expected: u64 },
    #[error("Entries cover {covered} bytes of a {data_len}-byte data region")]
    UncoveredData { covered: u64, data_len: u64 },

    // ── Truncated ────────────────────────────────────────────────────────────
    #[error("Input truncated reading {field} at byte {position} (need {needed} more, {available} left)")]
    Truncated {
        field:     &'static str,
        position:  u64,
        needed:    u64,
        available: u64,
    },
    #[error("Table start {table_start} precedes data start {data_start}")]
    TableBeforeData { data_start: u32, table_start: u64 },

    // ── Bounds ───────────────────────────────────────────────────────────────
    #[error("Entry {path:?} range {offset}+{length} exceeds the {data_len}-byte data region")]
    OutOfBounds {
        path:     String,
        offset:   u64,
        length:   u64,
        data_len: u64,
    },

    // ── Integrity ────────────────────────────────────────────────────────────
    #[error("MD5 mismatch for entry {path:?} (stored {stored}, computed {computed})")]
    HashMismatch {
        path:     String,
        stored:   ContentHash,
        computed: ContentHash,
    },

    // ── Usage ────────────────────────────────────────────────────────────────
    #[error("{what} is {len} bytes; a u16 length prefix holds at most 65535")]
    TooLong { what: &'static str, len: usize },
    #[error("Writer session has not begun")]
    NotBegun,
    #[error("Writer session is already finalized")]
    AlreadyFinalized,
    #[error("Writer session was aborted by an earlier error; call close() or begin()")]
    SessionAborted,
    #[error("Invalid entry path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("Entry path {0:?} was already added in this session")]
    PathAlreadyAdded(String),
}

impl PacError {
    pub fn kind(&self) -> ErrorKind {
        use PacError::*;
        match self {
            InvalidMagic { .. }
            | UnsupportedVersion(_)
            | DataStartInsideHeader { .. }
            | PathNotUtf8 { .. }
            | PathNotRooted(_)
            | DuplicatePath(_)
            | NonContiguous { .. }
            | UncoveredData { .. } => ErrorKind::Format,
            Truncated { .. } | TableBeforeData { .. } => ErrorKind::Truncated,
            OutOfBounds { .. } => ErrorKind::Bounds,
            HashMismatch { .. } => ErrorKind::Integrity,
            TooLong { .. }
            | NotBegun
            | AlreadyFinalized
            | SessionAborted
            | InvalidPath { .. }
            | PathAlreadyAdded(_) => ErrorKind::Usage,
        }
    }

    /// The entry path an integrity, bounds or table error refers to.
    pub fn path(&self) -> Option<&str> {
        match self {
            PacError::HashMismatch { path, .. }
            | PacError::OutOfBounds { path, .. }
            | PacError::NonContiguous { path, .. }
            | PacError::InvalidPath { path, .. }
            | PacError::PathNotRooted(path)
            | PacError::DuplicatePath(path)
            | PacError::PathAlreadyAdded(path) => Some(path.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PacError>;
