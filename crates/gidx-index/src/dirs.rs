//! Per-directory aggregation for the v5 layout.

use std::collections::BTreeMap;

use bstr::{BStr, BString};
use gidx_hash::ObjectId;

use crate::extensions::CacheTreeMap;

/// The aggregate record written once per directory in the v5 layout.
///
/// Created zero-initialized and filled in incrementally: `nfiles` by the
/// file-record pass, `cr`/`ncr` by the conflict-record pass, and
/// `nentries`/`nsubtrees`/`objname` from the cache-tree extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub flags: u16,
    pub cr: u32,
    pub ncr: u32,
    pub nsubtrees: u32,
    pub nfiles: u32,
    /// Covered entry count from the cache-tree; -1 when the record there
    /// was invalid.
    pub nentries: i32,
    /// Tree object name; all-zero when unknown.
    pub objname: ObjectId,
}

impl Default for DirEntry {
    fn default() -> Self {
        Self {
            flags: 0,
            cr: 0,
            ncr: 0,
            nsubtrees: 0,
            nfiles: 0,
            nentries: 0,
            objname: ObjectId::NULL,
        }
    }
}

/// Directory table: per-path aggregates, iterated in ascending byte order
/// (the root `""` first). Missing directories read as all-zero records.
#[derive(Debug, Default)]
pub struct DirTable {
    entries: BTreeMap<BString, DirEntry>,
}

impl DirTable {
    /// Look up a directory, inserting a zeroed record if absent.
    pub fn entry_mut(&mut self, dir: &BStr) -> &mut DirEntry {
        self.entries.entry(BString::from(dir)).or_default()
    }

    pub fn get(&self, dir: &BStr) -> Option<&DirEntry> {
        self.entries.get(dir)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in ascending path order.
    pub fn iter(&self) -> impl Iterator<Item = (&BString, &DirEntry)> {
        self.entries.iter()
    }

    /// Fold cache-tree records into the table: entry and subtree counts,
    /// and the tree object name where the record was valid.
    pub fn merge_cache_tree(&mut self, cache_tree: &CacheTreeMap) {
        for (path, tree) in cache_tree {
            let key = path.strip_suffix(b"/").unwrap_or(path);
            let entry = self.entry_mut(BStr::new(key));
            entry.nentries = tree.entry_count;
            entry.nsubtrees = tree.subtree_count;
            if let Some(oid) = tree.oid {
                entry.objname = oid;
            }
        }
    }
}
