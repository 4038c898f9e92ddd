//! v5 index layout engine.
//!
//! The v5 file holds forward offsets whose values are only known after
//! later passes, so the writer builds the whole file in memory, reserving
//! the header-adjacent offset tables and the directory blocks, and patches
//! them in place once the file records (and their offsets) exist. The
//! observable layout is identical to a seek-based writer.

use std::collections::BTreeMap;
use std::path::Path;

use bstr::{BStr, ByteSlice};

use crate::dirs::{DirEntry, DirTable};
use crate::entry::IndexEntry;
use crate::lockfile::LockFile;
use crate::{ConvertError, SourceIndex};

/// On-disk size of the v5 header, its CRC word included. The directory
/// offset table starts here.
pub const HEADER_SIZE: usize = 24;

/// Packed directory block: u16 flags, five u32 counters, u32 entry count,
/// 20-byte object name. The CRC word follows separately.
const DIR_BLOCK_SIZE: usize = 46;

/// Write the v5 rendition of `index` (atomic, using a lock file).
pub(crate) fn write_v5(index: &SourceIndex, path: &Path) -> Result<(), ConvertError> {
    let data = serialize_v5(index);
    let mut lock = LockFile::acquire(path)?;
    lock.write_all(&data)?;
    lock.commit()?;
    Ok(())
}

/// Serialize `index` into the v5 byte layout.
pub fn serialize_v5(index: &SourceIndex) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut table = DirTable::default();

    // File records are grouped by directory; sorting by (dir, name) keeps
    // the output independent of the input's entry order.
    let mut active: Vec<&IndexEntry> = index.active.iter().collect();
    active.sort_by(|a, b| a.dir.cmp(&b.dir).then_with(|| a.name.cmp(&b.name)));

    // Pass 1: header and its CRC.
    buf.extend_from_slice(b"DIRC");
    put_u32(&mut buf, 5);
    put_u32(&mut buf, index.dirs.len() as u32);
    put_u32(&mut buf, active.len() as u32);
    put_u32(&mut buf, 0); // fanout base, reserved
    let header_crc = crc32fast::hash(&buf);
    put_u32(&mut buf, header_crc);

    // Pass 2: directory offset table, patched in pass 6.
    debug_assert_eq!(buf.len(), HEADER_SIZE);
    for _ in &index.dirs {
        put_u32(&mut buf, 0);
    }

    // Pass 3: directory records with zeroed blocks, filled in pass 9.
    let mut dir_offsets = Vec::with_capacity(index.dirs.len());
    let mut dir_blocks: BTreeMap<&BStr, usize> = BTreeMap::new();
    for dir in &index.dirs {
        dir_offsets.push(buf.len() as u32);
        buf.extend_from_slice(&ondisk_dir_path(dir.as_bstr()));
        dir_blocks.insert(dir.as_bstr(), buf.len());
        buf.resize(buf.len() + DIR_BLOCK_SIZE + 4, 0);
        table.entry_mut(dir.as_bstr());
    }

    // Pass 4: file offset table, patched in pass 7.
    let file_table_start = buf.len();
    for _ in &active {
        put_u32(&mut buf, 0);
    }

    // Pass 5: file records.
    let mut file_offsets = Vec::with_capacity(active.len());
    for entry in &active {
        let offset = buf.len() as u32;
        file_offsets.push(offset);
        put_file_record(&mut buf, entry, offset);
        table.entry_mut(entry.dir.as_bstr()).nfiles += 1;
    }

    // Conflict records follow the file data; the directory blocks point
    // back at them through cr/ncr.
    put_conflict_records(&mut buf, index, &mut table);

    // Passes 6 and 7: backpatch both offset tables.
    patch_u32s(&mut buf, HEADER_SIZE, &dir_offsets);
    patch_u32s(&mut buf, file_table_start, &file_offsets);

    // Pass 8: per-directory aggregates from the cache-tree.
    table.merge_cache_tree(&index.cache_tree);

    // Pass 9: fill the directory blocks. Each directory's foffset is where
    // its slice of the file offset table begins.
    let mut foffset = file_table_start as u32;
    for (dir, entry) in table.iter() {
        // Directories known only from the cache-tree have no record.
        let Some(&block_at) = dir_blocks.get(dir.as_bstr()) else {
            continue;
        };
        fill_dir_block(&mut buf, block_at, dir.as_bstr(), entry, foffset);
        foffset += 4 * entry.nfiles;
    }

    buf
}

/// A directory path as stored on disk: the root is a single NUL, any other
/// directory is `path + "/" + NUL`. These bytes also seed the block CRC.
fn ondisk_dir_path(dir: &BStr) -> Vec<u8> {
    let mut out = Vec::with_capacity(dir.len() + 2);
    if !dir.is_empty() {
        out.extend_from_slice(dir);
        out.push(b'/');
    }
    out.push(0);
    out
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn patch_u32s(buf: &mut [u8], start: usize, values: &[u32]) {
    for (i, value) in values.iter().enumerate() {
        let at = start + i * 4;
        buf[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }
}

/// The v5 entry flags: the stage field moves up one bit position while the
/// high "assume valid" bit stays put.
fn widen_flags(flags: u16) -> u16 {
    (flags & 0x8000) | ((flags & 0x3000) << 1)
}

fn put_file_record(buf: &mut Vec<u8>, entry: &IndexEntry, offset: u32) {
    let start = buf.len();
    buf.extend_from_slice(&entry.name);
    buf.push(0);

    let stat_crc = {
        let mut stat = Vec::with_capacity(32);
        for value in [
            offset,
            entry.stat.ctime_secs,
            entry.stat.ctime_nsecs,
            entry.stat.ino,
            entry.stat.size,
            entry.stat.dev,
            entry.stat.uid,
            entry.stat.gid,
        ] {
            stat.extend_from_slice(&value.to_be_bytes());
        }
        crc32fast::hash(&stat)
    };

    buf.extend_from_slice(&widen_flags(entry.flags).to_be_bytes());
    buf.extend_from_slice(&(entry.mode as u16).to_be_bytes());
    put_u32(buf, entry.stat.mtime_secs);
    put_u32(buf, entry.stat.mtime_nsecs);
    put_u32(buf, stat_crc);
    buf.extend_from_slice(entry.oid.as_bytes());

    // The record CRC is seeded with the record's own offset.
    let mut hasher =
        crc32fast::Hasher::new_with_initial(crc32fast::hash(&offset.to_be_bytes()));
    hasher.update(&buf[start..]);
    let crc = hasher.finalize();
    put_u32(buf, crc);
}

/// One record per conflicted pathname: the full path, a reserved byte,
/// the three stage modes (0 = absent), one object name per nonzero mode,
/// and a CRC over the record bytes.
fn put_conflict_records(buf: &mut Vec<u8>, index: &SourceIndex, table: &mut DirTable) {
    for (dir, entries) in &index.conflicted {
        let mut by_name: BTreeMap<&BStr, [Option<&IndexEntry>; 3]> = BTreeMap::new();
        for entry in entries {
            let stage = entry.stage();
            if (1..=3).contains(&stage) {
                by_name.entry(entry.name.as_bstr()).or_insert([None; 3])
                    [usize::from(stage - 1)] = Some(entry);
            }
        }
        if by_name.is_empty() {
            continue;
        }

        let dir_entry = table.entry_mut(dir.as_bstr());
        dir_entry.cr = buf.len() as u32;
        dir_entry.ncr = by_name.len() as u32;

        for (name, stages) in by_name {
            let start = buf.len();
            if !dir.is_empty() {
                buf.extend_from_slice(dir);
                buf.push(b'/');
            }
            buf.extend_from_slice(name);
            buf.push(0);
            buf.push(0); // conflict flags, reserved
            for stage in &stages {
                put_u32(buf, stage.map_or(0, |e| e.mode));
            }
            for stage in stages.iter().flatten() {
                if stage.mode != 0 {
                    buf.extend_from_slice(stage.oid.as_bytes());
                }
            }
            let crc = crc32fast::hash(&buf[start..]);
            put_u32(buf, crc);
        }
    }
}

fn fill_dir_block(buf: &mut [u8], at: usize, dir: &BStr, entry: &DirEntry, foffset: u32) {
    let mut block = Vec::with_capacity(DIR_BLOCK_SIZE);
    block.extend_from_slice(&entry.flags.to_be_bytes());
    for value in [
        foffset,
        entry.cr,
        entry.ncr,
        entry.nsubtrees,
        entry.nfiles,
        entry.nentries as u32,
    ] {
        block.extend_from_slice(&value.to_be_bytes());
    }
    block.extend_from_slice(entry.objname.as_bytes());

    let mut hasher =
        crc32fast::Hasher::new_with_initial(crc32fast::hash(&ondisk_dir_path(dir)));
    hasher.update(&block);
    let crc = hasher.finalize();

    buf[at..at + DIR_BLOCK_SIZE].copy_from_slice(&block);
    buf[at + DIR_BLOCK_SIZE..at + DIR_BLOCK_SIZE + 4].copy_from_slice(&crc.to_be_bytes());
}
