//! Index entry types: Header, IndexEntry, StatData.

use bstr::{BString, ByteSlice};
use gidx_hash::ObjectId;

/// The 12-byte header of a v2/v3 index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Magic bytes, `DIRC` for a valid file.
    pub signature: [u8; 4],
    /// Index format version (2 or 3).
    pub version: u32,
    /// Number of entries that follow the header.
    pub entry_count: u32,
}

/// File system stat data cached in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

/// A single entry in the index.
///
/// The full path is kept split into its directory component (`""` for the
/// root) and filename, because the v5 layout groups records by directory.
/// Flags are kept raw: the v5 writer re-encodes the bits itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Directory component of the path (`""` for bare names).
    pub dir: BString,
    /// Filename component of the path.
    pub name: BString,
    /// Object name of the blob.
    pub oid: ObjectId,
    /// Raw file mode.
    pub mode: u32,
    /// Raw 16-bit flags; the stage lives in bits 12–13.
    pub flags: u16,
    /// Extended flags, present only in v3 entries.
    pub xtflags: Option<u16>,
    /// Stat data from the file system.
    pub stat: StatData,
}

impl IndexEntry {
    /// The merge stage (0 = not conflicted, 1/2/3 = ancestor/ours/theirs).
    pub fn stage(&self) -> u8 {
        ((self.flags >> 12) & 0x3) as u8
    }

    /// The full path, joining directory and filename.
    pub fn full_path(&self) -> BString {
        join_path(&self.dir, &self.name)
    }
}

/// Join a directory component and a filename.
pub fn join_path(dir: &[u8], name: &[u8]) -> BString {
    if dir.is_empty() {
        return BString::from(name);
    }
    let mut path = BString::from(dir);
    path.push(b'/');
    path.extend_from_slice(name);
    path
}

/// Split a full path into (directory, filename) at the last `/`.
/// Bare names get an empty directory.
pub fn split_path(path: &[u8]) -> (BString, BString) {
    match path.rfind_byte(b'/') {
        Some(pos) => (BString::from(&path[..pos]), BString::from(&path[pos + 1..])),
        None => (BString::default(), BString::from(path)),
    }
}
