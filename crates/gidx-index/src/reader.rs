//! Byte source with a running digest.
//!
//! The parser must look at the next 4 bytes to decide whether an extension
//! block follows or the trailer has begun, without corrupting the digest.
//! `read` feeds the hasher, `read_raw` does not, and `absorb` folds peeked
//! bytes back in once a peek turns out to be a real extension tag.

use gidx_hash::{Hasher, ObjectId};

use crate::ConvertError;

pub(crate) struct Digester<'a> {
    data: &'a [u8],
    pos: usize,
    hasher: Hasher,
}

impl<'a> Digester<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            hasher: Hasher::new(),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ConvertError> {
        let remaining = self.data.len() - self.pos;
        if remaining < n {
            return Err(ConvertError::TruncatedInput {
                wanted: n,
                remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read `n` bytes and fold them into the digest.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8], ConvertError> {
        let slice = self.take(n)?;
        self.hasher.update(slice);
        Ok(slice)
    }

    /// Read `n` bytes without touching the digest.
    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8], ConvertError> {
        self.take(n)
    }

    /// Fold already-read raw bytes into the digest after the fact.
    pub fn absorb(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Read through the next occurrence of `delim`. Returns the bytes
    /// before the delimiter and the total count consumed, delimiter
    /// included.
    pub fn read_until(&mut self, delim: u8) -> Result<(&'a [u8], usize), ConvertError> {
        let rest = &self.data[self.pos..];
        match rest.iter().position(|&b| b == delim) {
            Some(i) => {
                let slice = self.read(i + 1)?;
                Ok((&slice[..i], i + 1))
            }
            None => Err(ConvertError::TruncatedInput {
                wanted: rest.len() + 1,
                remaining: rest.len(),
            }),
        }
    }

    /// Read a big-endian u32, updating the digest.
    pub fn read_u32(&mut self) -> Result<u32, ConvertError> {
        let b = self.read(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian u16, updating the digest.
    pub fn read_u16(&mut self) -> Result<u16, ConvertError> {
        let b = self.read(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a 20-byte object name, updating the digest.
    pub fn read_oid(&mut self) -> Result<ObjectId, ConvertError> {
        let bytes = self.read(20)?;
        let mut arr = [0u8; 20];
        arr.copy_from_slice(bytes);
        Ok(ObjectId::from(arr))
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Finalize the running digest.
    pub fn finish(self) -> ObjectId {
        self.hasher.finalize()
    }
}
