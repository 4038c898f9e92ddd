//! SHA-1 object names for the gidx index converter.
//!
//! The index formats handled by gidx (v2, v3, and the v5 output) all store
//! object names as raw 20-byte SHA-1 digests, so this crate fixes the
//! algorithm instead of abstracting over it.

mod error;
pub mod hex;
mod oid;
pub mod hasher;

pub use error::HashError;
pub use hasher::Hasher;
pub use oid::ObjectId;
