//! Reference implementation of the PAC archive container format.
//!
//! A PAC file is a header, a data region holding every entry's bytes back to
//! back, and an entry table with an MD5 per entry.  [`PacWriter`] builds one
//! in memory; [`load`] parses and validates one.  The library only deals in
//! byte buffers; reading and writing files is left to the caller.

pub mod archive;
pub mod error;
pub mod framing;
pub mod hash;
pub mod header;
pub mod reader;
pub mod table;
pub mod writer;

pub use archive::{Archive, ArchiveInfo};
pub use error::{ErrorKind, PacError, Result};
pub use hash::ContentHash;
pub use header::{Header, FORMAT_VERSION, MAGIC};
pub use reader::{load, load_with, LoadOptions};
pub use table::{Entry, EntryMeta};
pub use writer::{PacWriter, SessionState, WriterOptions};
