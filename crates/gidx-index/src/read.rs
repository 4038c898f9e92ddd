//! v2/v3 index file parsing.

use std::collections::{BTreeMap, BTreeSet};

use bstr::BString;

use crate::entry::{split_path, Header, IndexEntry, StatData};
use crate::extensions::{resolve_undo, tree, CacheTreeMap, ResolveUndoMap};
use crate::reader::Digester;
use crate::{ConvertError, SourceIndex};

/// Magic bytes at the start of every index file.
const INDEX_SIGNATURE: &[u8; 4] = b"DIRC";

/// Parse a v2/v3 index from raw bytes, verifying the trailing SHA-1.
pub(crate) fn parse_index(data: &[u8]) -> Result<SourceIndex, ConvertError> {
    let mut r = Digester::new(data);

    let header = read_header(&mut r)?;

    let mut active = Vec::with_capacity(header.entry_count as usize);
    let mut conflicted: BTreeMap<BString, Vec<IndexEntry>> = BTreeMap::new();
    let mut dirs = BTreeSet::new();
    dirs.insert(BString::default());

    for _ in 0..header.entry_count {
        let entry = read_entry(&mut r, header.version)?;
        dirs.insert(entry.dir.clone());

        match entry.stage() {
            0 => active.push(entry),
            1 => {
                // Keep the stage-1 entry in the active list too, so that
                // resolving the conflict does not require rewriting the
                // whole index.
                conflicted
                    .entry(entry.dir.clone())
                    .or_default()
                    .push(entry.clone());
                active.push(entry);
            }
            _ => conflicted.entry(entry.dir.clone()).or_default().push(entry),
        }
    }

    let mut cache_tree = CacheTreeMap::new();
    let mut resolve_undo = ResolveUndoMap::new();

    // Peek at the next 4 bytes without digesting them: either an extension
    // signature (absorbed once recognized) or the head of the trailer.
    let mut tag = [0u8; 4];
    tag.copy_from_slice(r.read_raw(4)?);

    let stored = if &tag == tree::SIGNATURE || &tag == resolve_undo::SIGNATURE {
        r.absorb(&tag);
        if &tag == tree::SIGNATURE {
            cache_tree = tree::parse(&mut r)?;
        } else {
            resolve_undo = resolve_undo::parse(&mut r)?;
        }

        tag.copy_from_slice(r.read_raw(4)?);
        if &tag == resolve_undo::SIGNATURE {
            r.absorb(&tag);
            resolve_undo = resolve_undo::parse(&mut r)?;
            // Both peeks matched extensions: the trailer is read whole.
            let mut out = [0u8; 20];
            out.copy_from_slice(r.read_raw(20)?);
            out
        } else {
            trailer_from(tag, r.read_raw(16)?)
        }
    } else {
        trailer_from(tag, r.read_raw(16)?)
    };

    let checksum = r.finish();
    if checksum.as_bytes() != &stored {
        return Err(ConvertError::ChecksumMismatch);
    }

    Ok(SourceIndex {
        header,
        active,
        conflicted,
        dirs,
        cache_tree,
        resolve_undo,
        checksum,
    })
}

fn read_header(r: &mut Digester) -> Result<Header, ConvertError> {
    let mut signature = [0u8; 4];
    signature.copy_from_slice(r.read(4)?);
    if &signature != INDEX_SIGNATURE {
        return Err(ConvertError::BadSignature(signature));
    }

    let version = r.read_u32()?;
    if !(2..=3).contains(&version) {
        return Err(ConvertError::UnsupportedVersion(version));
    }

    let entry_count = r.read_u32()?;

    Ok(Header {
        signature,
        version,
        entry_count,
    })
}

fn read_entry(r: &mut Digester, version: u32) -> Result<IndexEntry, ConvertError> {
    let ctime_secs = r.read_u32()?;
    let ctime_nsecs = r.read_u32()?;
    let mtime_secs = r.read_u32()?;
    let mtime_nsecs = r.read_u32()?;
    let dev = r.read_u32()?;
    let ino = r.read_u32()?;
    let mode = r.read_u32()?;
    let uid = r.read_u32()?;
    let gid = r.read_u32()?;
    let size = r.read_u32()?;
    let oid = r.read_oid()?;
    let flags = r.read_u16()?;
    let xtflags = if version == 3 {
        Some(r.read_u16()?)
    } else {
        None
    };

    let (path, name_bytes) = r.read_until(0)?;
    let (dir, name) = split_path(path);

    r.read(entry_padding(name_bytes, version))?;

    Ok(IndexEntry {
        dir,
        name,
        oid,
        mode,
        flags,
        xtflags,
        stat: StatData {
            ctime_secs,
            ctime_nsecs,
            mtime_secs,
            mtime_nsecs,
            dev,
            ino,
            uid,
            gid,
            size,
        },
    })
}

/// NUL padding after an entry's pathname. `name_bytes` counts the path
/// bytes including the terminating NUL, which is why one byte is taken
/// back off the alignment distance.
fn entry_padding(name_bytes: usize, version: u32) -> usize {
    let fixed = if version == 2 { 5 } else { 1 };
    8 - (name_bytes + fixed) % 8 - 1
}

fn trailer_from(head: [u8; 4], rest: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out[..4].copy_from_slice(&head);
    out[4..].copy_from_slice(rest);
    out
}
