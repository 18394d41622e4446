use std::fmt;
use std::mem;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Identifier of a stored object.
///
/// Content-addressed objects use the [`ObjId::Hash256`] form produced by
/// hashing their payload. The [`ObjId::Generic`] form carries arbitrary bytes
/// and exists for derived ids, for example the keys of the reference cache.
/// The two forms are distinct values even when their bytes coincide, so a
/// derived id can never collide with a content hash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjId {
    /// A 256-bit content hash.
    Hash256([u8; 32]),
    /// Arbitrary id bytes, never produced by hashing content.
    Generic(Box<[u8]>),
}

/// Error returned when parsing an [`ObjId`] from a hex string fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid object id: {0}")]
pub struct ParseObjIdError(String);

impl ObjId {
    /// Computes the canonical content-hash id for the given payload bytes.
    pub fn hash_of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        ObjId::Hash256(digest.into())
    }

    /// Creates a generic id from raw bytes.
    pub fn generic(bytes: impl Into<Vec<u8>>) -> Self {
        ObjId::Generic(bytes.into().into_boxed_slice())
    }

    /// Parses a canonical id from its 64-character hex representation.
    pub fn from_hex(hex: &str) -> Result<Self, ParseObjIdError> {
        if hex.len() != 64 {
            return Err(ParseObjIdError(format!(
                "expected 64 hex characters, got {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let hi = hex_nibble(chunk[0]).ok_or_else(|| ParseObjIdError(hex.into()))?;
            let lo = hex_nibble(chunk[1]).ok_or_else(|| ParseObjIdError(hex.into()))?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(ObjId::Hash256(bytes))
    }

    /// The raw id bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ObjId::Hash256(bytes) => bytes,
            ObjId::Generic(bytes) => bytes,
        }
    }

    /// Approximate number of bytes this id keeps alive on the heap, including
    /// the inline enum itself. Feeds the cache weigher.
    pub fn heap_size(&self) -> usize {
        let heap = match self {
            ObjId::Hash256(_) => 0,
            ObjId::Generic(bytes) => bytes.len(),
        };
        mem::size_of::<Self>() + heap
    }
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.as_bytes() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjId::Hash256(_) => write!(f, "ObjId({self})"),
            ObjId::Generic(_) => write!(f, "ObjId(generic:{self})"),
        }
    }
}
