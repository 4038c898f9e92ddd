//! Resolve-undo extension (REUC).
//!
//! Records the pre-resolution stages of conflicted paths so a resolution
//! can be undone later. Each record stores three octal mode strings
//! (stages 1–3, `0` = absent) followed by one 20-byte object name per
//! nonzero mode.

use bstr::BString;

use crate::extensions::{ResolveUndoEntry, ResolveUndoMap};
use crate::reader::Digester;
use crate::ConvertError;

/// Extension signature.
pub const SIGNATURE: &[u8; 4] = b"REUC";

fn malformed(reason: impl Into<String>) -> ConvertError {
    ConvertError::MalformedExtension {
        sig: "REUC".into(),
        reason: reason.into(),
    }
}

/// Parse a REUC block: a u32 byte length followed by records of the form
/// `path\0 mode1\0 mode2\0 mode3\0 [20]? [20]? [20]?`.
pub(crate) fn parse(r: &mut Digester) -> Result<ResolveUndoMap, ConvertError> {
    let size = r.read_u32()? as usize;
    let end = r.position() + size;
    let mut map = ResolveUndoMap::new();

    while r.position() < end {
        let (path, _) = r.read_until(0)?;

        let mut modes = [0u32; 3];
        for mode in &mut modes {
            let (bytes, _) = r.read_until(0)?;
            *mode = std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| u32::from_str_radix(s, 8).ok())
                .ok_or_else(|| {
                    malformed(format!("invalid mode: {:?}", BString::from(bytes)))
                })?;
        }

        let mut oids = [None; 3];
        for (slot, &mode) in oids.iter_mut().zip(&modes) {
            if mode != 0 {
                *slot = Some(r.read_oid()?);
            }
        }

        let entry = ResolveUndoEntry {
            path: BString::from(path),
            modes,
            oids,
        };
        let key = BString::from(path.strip_suffix(b"/").unwrap_or(path));
        map.entry(key).or_default().push(entry);
    }

    if r.position() != end {
        return Err(malformed(format!(
            "declared {size} bytes, consumed {}",
            size + r.position() - end
        )));
    }

    Ok(map)
}
