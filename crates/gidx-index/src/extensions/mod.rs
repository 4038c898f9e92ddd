//! Optional trailing extensions: cache-tree (TREE) and resolve-undo (REUC).

pub mod resolve_undo;
pub mod tree;

use std::collections::BTreeMap;

use bstr::BString;
use gidx_hash::ObjectId;

/// One cache-tree record.
///
/// The path is the full directory path with a trailing `/` (the root is
/// `"/"`), reconstructed from the relative names stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTreeEntry {
    pub path: BString,
    /// Number of index entries covered by this tree; -1 marks the record
    /// invalid.
    pub entry_count: i32,
    pub subtree_count: u32,
    /// Tree object name; `None` iff `entry_count` is -1.
    pub oid: Option<ObjectId>,
}

/// Cache-tree records keyed by full path, in ascending byte order.
pub type CacheTreeMap = BTreeMap<BString, CacheTreeEntry>;

/// One resolve-undo record: the pre-resolution stages of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveUndoEntry {
    pub path: BString,
    /// File modes for stages 1–3; 0 means the stage was absent.
    pub modes: [u32; 3],
    /// Object names for stages 1–3; `Some` iff the matching mode is
    /// nonzero.
    pub oids: [Option<ObjectId>; 3],
}

/// Resolve-undo records grouped by path (one trailing `/` stripped).
pub type ResolveUndoMap = BTreeMap<BString, Vec<ResolveUndoEntry>>;
