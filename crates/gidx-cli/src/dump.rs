//! Human-readable dumps of the parsed v2/v3 index.
//!
//! The formats are stable: entries print the way `git ls-files --debug`
//! does, the cache-tree the way `test-dump-cache-tree` does.

use std::io::{self, Write};

use bstr::{BStr, ByteSlice};
use gidx_index::extensions::{CacheTreeMap, ResolveUndoMap};
use gidx_index::{Header, IndexEntry};

pub fn header(out: &mut impl Write, header: &Header) -> io::Result<()> {
    writeln!(out, "Signature: {}", BStr::new(&header.signature))?;
    writeln!(out, "Version: {}", header.version)?;
    writeln!(out, "Number of entries: {}", header.entry_count)
}

pub fn entries(out: &mut impl Write, entries: &[IndexEntry]) -> io::Result<()> {
    for e in entries {
        writeln!(out, "{}", e.full_path().as_bstr())?;
        writeln!(out, "  ctime: {}:{}", e.stat.ctime_secs, e.stat.ctime_nsecs)?;
        writeln!(out, "  mtime: {}:{}", e.stat.mtime_secs, e.stat.mtime_nsecs)?;
        writeln!(out, "  dev: {}\tino: {}", e.stat.dev, e.stat.ino)?;
        writeln!(out, "  uid: {}\tgid: {}", e.stat.uid, e.stat.gid)?;
        writeln!(out, "  size: {}\tflags: {:x}", e.stat.size, e.flags)?;
    }
    Ok(())
}

pub fn cache_tree(out: &mut impl Write, cache_tree: &CacheTreeMap) -> io::Result<()> {
    for entry in cache_tree.values() {
        let name = match &entry.oid {
            Some(oid) => oid.to_hex(),
            None => "invalid".to_string(),
        };
        writeln!(
            out,
            "{} {} ({} entries, {} subtrees)",
            name,
            entry.path.as_bstr(),
            entry.entry_count,
            entry.subtree_count
        )?;
    }
    Ok(())
}

pub fn resolve_undo(out: &mut impl Write, resolve_undo: &ResolveUndoMap) -> io::Result<()> {
    for entries in resolve_undo.values() {
        for e in entries {
            let hex = |i: usize| e.oids[i].map(|oid| oid.to_hex()).unwrap_or_default();
            writeln!(out, "Path: {}", e.path.as_bstr())?;
            writeln!(
                out,
                "Entrymode 1: {} Entrymode 2: {} Entrymode 3: {}",
                e.modes[0], e.modes[1], e.modes[2]
            )?;
            writeln!(
                out,
                "Objectnames 1: {} Objectnames 2: {} Objectnames 3: {}",
                hex(0),
                hex(1),
                hex(2)
            )?;
        }
    }
    Ok(())
}
