//! Byte codec for objects and references.
//!
//! Consumers treat the encoded form as an opaque blob; only this module knows
//! the wire layout.

use thiserror::Error;

use crate::id::ObjId;
use crate::obj::Obj;
use crate::reference::Reference;

/// Errors produced by the codec.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: bincode::Error,
    },
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: bincode::Error,
    },
    #[error("decoded object id {actual} does not match requested id {expected}")]
    IdMismatch { expected: ObjId, actual: ObjId },
}

pub fn serialize_obj(obj: &Obj) -> Result<Vec<u8>, SerializeError> {
    bincode::serialize(obj).map_err(|source| SerializeError::Encode {
        what: "object",
        source,
    })
}

/// Decodes an object previously produced by [`serialize_obj`], validating
/// that it carries the requested id.
pub fn deserialize_obj(id: &ObjId, bytes: &[u8]) -> Result<Obj, SerializeError> {
    let obj: Obj = bincode::deserialize(bytes).map_err(|source| SerializeError::Decode {
        what: "object",
        source,
    })?;
    if obj.id() != id {
        return Err(SerializeError::IdMismatch {
            expected: id.clone(),
            actual: obj.id().clone(),
        });
    }
    Ok(obj)
}

pub fn serialize_reference(reference: &Reference) -> Result<Vec<u8>, SerializeError> {
    bincode::serialize(reference).map_err(|source| SerializeError::Encode {
        what: "reference",
        source,
    })
}

pub fn deserialize_reference(bytes: &[u8]) -> Result<Reference, SerializeError> {
    bincode::deserialize(bytes).map_err(|source| SerializeError::Decode {
        what: "reference",
        source,
    })
}
