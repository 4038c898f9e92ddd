//! Index (staging area) conversion from the v2/v3 on-disk format to v5.
//!
//! The v2/v3 format is a flat, SHA-1-sealed list of entries with optional
//! trailing extensions. The proposed v5 format regroups entries by
//! directory, precomputes per-directory aggregates, and protects every
//! record with its own CRC-32 so readers can memory-map the file and
//! validate parts independently.
//!
//! [`SourceIndex::read_from`] parses and verifies a v2/v3 file;
//! [`SourceIndex::write_v5`] emits the converted file.

pub mod dirs;
pub mod entry;
pub mod extensions;
mod lockfile;
mod read;
pub(crate) mod reader;
mod write;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use bstr::BString;
use gidx_hash::ObjectId;

pub use entry::{Header, IndexEntry, StatData};
pub use error::ConvertError;
pub use extensions::{CacheTreeEntry, CacheTreeMap, ResolveUndoEntry, ResolveUndoMap};
pub use write::{serialize_v5, HEADER_SIZE};

mod error {
    use std::path::PathBuf;

    #[derive(Debug, thiserror::Error)]
    pub enum ConvertError {
        #[error("bad index signature: expected DIRC, got {0:?}")]
        BadSignature([u8; 4]),

        #[error("unsupported index version: {0}")]
        UnsupportedVersion(u32),

        #[error("truncated input: wanted {wanted} bytes, {remaining} remaining")]
        TruncatedInput { wanted: usize, remaining: usize },

        #[error("malformed {sig} extension: {reason}")]
        MalformedExtension { sig: String, reason: String },

        #[error("index checksum mismatch")]
        ChecksumMismatch,

        #[error("lock failed: {path}")]
        LockFailed { path: PathBuf },

        #[error(transparent)]
        Io(#[from] std::io::Error),
    }
}

/// Everything one parse of a v2/v3 index produces.
///
/// Entries are split by stage: stage-0 entries form the `active` list,
/// conflicted entries (stage 1–3) are grouped by directory. Stage-1 entries
/// appear in both places so a later conflict resolution does not force a
/// rewrite of the whole index.
#[derive(Debug)]
pub struct SourceIndex {
    /// The v2/v3 header as read from disk.
    pub header: Header,
    /// Stage-0 entries plus the stage-1 copies, in file order.
    pub active: Vec<IndexEntry>,
    /// Conflicted entries keyed by directory.
    pub conflicted: BTreeMap<BString, Vec<IndexEntry>>,
    /// Every directory that holds at least one entry; always contains the
    /// root `""`.
    pub dirs: BTreeSet<BString>,
    /// Cache-tree extension records keyed by full path.
    pub cache_tree: CacheTreeMap,
    /// Resolve-undo extension records grouped by path.
    pub resolve_undo: ResolveUndoMap,
    /// The verified trailing checksum of the input.
    pub checksum: ObjectId,
}

impl SourceIndex {
    /// Read and verify a v2/v3 index file (memory-mapped).
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let file = std::fs::File::open(path.as_ref())?;
        let data = unsafe { memmap2::Mmap::map(&file) }?;
        read::parse_index(&data)
    }

    /// Parse a v2/v3 index from raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self, ConvertError> {
        read::parse_index(data)
    }

    /// Write the v5 rendition of this index (atomic, using a lock file).
    pub fn write_v5(&self, path: impl AsRef<Path>) -> Result<(), ConvertError> {
        write::write_v5(self, path.as_ref())
    }
}
