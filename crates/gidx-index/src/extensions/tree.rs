//! Cache-tree extension (TREE).
//!
//! The on-disk block is a depth-first sequence of records holding relative
//! names; full paths are rebuilt with a stack of (name, remaining-subtrees)
//! pairs. Each record covers a directory and, when valid, carries the
//! precomputed tree object name for it.

use bstr::BString;

use crate::extensions::{CacheTreeEntry, CacheTreeMap};
use crate::reader::Digester;
use crate::ConvertError;

/// Extension signature.
pub const SIGNATURE: &[u8; 4] = b"TREE";

fn malformed(reason: impl Into<String>) -> ConvertError {
    ConvertError::MalformedExtension {
        sig: "TREE".into(),
        reason: reason.into(),
    }
}

fn parse_ascii_int<T: std::str::FromStr>(bytes: &[u8], what: &str) -> Result<T, ConvertError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed(format!("invalid {what}: {:?}", BString::from(bytes))))
}

/// Parse a TREE block: a u32 byte length followed by records of the form
/// `path\0 entry_count SP subtree_count LF [20-byte object name]?`.
/// The object name is present iff the entry count is not -1.
pub(crate) fn parse(r: &mut Digester) -> Result<CacheTreeMap, ConvertError> {
    let size = r.read_u32()? as usize;
    let end = r.position() + size;
    let mut map = CacheTreeMap::new();

    // Open ancestors: (name, subtrees still expected below it). The
    // sentinel keeps the root record from popping an empty stack.
    let mut stack: Vec<(BString, i64)> = vec![(BString::default(), 0)];

    while r.position() < end {
        let (name, _) = r.read_until(0)?;

        while stack.last().is_some_and(|&(_, left)| left == 0) {
            stack.pop();
        }

        let mut full = BString::default();
        if stack.len() > 1 {
            for (ancestor, _) in &stack {
                if !ancestor.is_empty() {
                    full.extend_from_slice(ancestor);
                    full.push(b'/');
                }
            }
            if let Some(top) = stack.last_mut() {
                top.1 -= 1;
            }
        }
        full.extend_from_slice(name);
        full.push(b'/');

        let (count_bytes, _) = r.read_until(b' ')?;
        let (subtrees_bytes, _) = r.read_until(b'\n')?;

        let entry_count: i32 = parse_ascii_int(count_bytes, "entry count")?;
        let subtree_count: u32 = parse_ascii_int(subtrees_bytes, "subtree count")?;

        stack.push((BString::from(name), i64::from(subtree_count)));

        let oid = if entry_count != -1 {
            Some(r.read_oid()?)
        } else {
            None
        };

        map.insert(
            full.clone(),
            CacheTreeEntry {
                path: full,
                entry_count,
                subtree_count,
                oid,
            },
        );
    }

    if r.position() != end {
        return Err(malformed(format!(
            "declared {size} bytes, consumed {}",
            size + r.position() - end
        )));
    }

    Ok(map)
}
