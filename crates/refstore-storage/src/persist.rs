//! The persistence interface implemented by every storage backend.

use thiserror::Error;

use crate::id::ObjId;
use crate::obj::{Obj, ObjKind};
use crate::reference::Reference;
use crate::serialize::SerializeError;

/// Per-repository configuration of a [`Persist`] instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    repository_id: String,
}

impl StoreConfig {
    pub fn new(repository_id: impl Into<String>) -> Self {
        StoreConfig {
            repository_id: repository_id.into(),
        }
    }

    /// The logical repository this store instance is bound to. The empty
    /// string is a valid, distinct repository id.
    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }
}

/// Errors surfaced by [`Persist`] operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("object {0} not found")]
    ObjNotFound(ObjId),
    #[error("object {id} has kind {actual:?}, expected {expected:?}")]
    WrongObjKind {
        id: ObjId,
        expected: ObjKind,
        actual: ObjKind,
    },
    #[error("reference {0} not found")]
    RefNotFound(String),
    #[error("reference {0} already exists")]
    RefAlreadyExists(String),
    #[error("reference {0} was changed concurrently")]
    RefConditionFailed(String),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Synchronous persistence interface over one repository.
///
/// Objects are immutable and content-addressed; references are mutable and
/// updated with compare-and-swap semantics against the caller's expected
/// state. Implementations must be safe to share across threads; individual
/// operations may block on the underlying store.
pub trait Persist: Send + Sync {
    fn config(&self) -> &StoreConfig;

    /// Fetches the object with the given id.
    fn fetch_obj(&self, id: &ObjId) -> PersistResult<Obj>;

    /// Fetches the object with the given id, requiring it to be of `kind`.
    fn fetch_typed_obj(&self, id: &ObjId, kind: ObjKind) -> PersistResult<Obj>;

    /// Fetches many objects at once. The result has the same length and order
    /// as `ids`; ids not present in the store yield `None`.
    fn fetch_objs(&self, ids: &[ObjId]) -> PersistResult<Vec<Option<Obj>>>;

    /// Stores the object if no object with its id exists yet. Returns whether
    /// the object was actually written.
    fn store_obj(&self, obj: &Obj) -> PersistResult<bool>;

    /// Stores the object unconditionally.
    fn upsert_obj(&self, obj: &Obj) -> PersistResult<()>;

    fn delete_obj(&self, id: &ObjId) -> PersistResult<()>;

    /// Looks up a reference by name, including references that carry the
    /// deleted marker.
    fn fetch_reference(&self, name: &str) -> PersistResult<Reference>;

    /// Creates the reference. Fails with [`PersistError::RefAlreadyExists`]
    /// when a reference of that name is already present.
    fn add_reference(&self, reference: &Reference) -> PersistResult<Reference>;

    /// Atomically points `reference` at `new_pointer`, expecting the stored
    /// state to equal `reference`. Returns the new state.
    fn update_reference_pointer(
        &self,
        reference: &Reference,
        new_pointer: ObjId,
    ) -> PersistResult<Reference>;

    /// Atomically sets the deleted marker, expecting the stored state to
    /// equal `reference`. Returns the new state.
    fn mark_reference_as_deleted(&self, reference: &Reference) -> PersistResult<Reference>;

    /// Atomically removes the reference, expecting the stored state to equal
    /// `reference`.
    fn purge_reference(&self, reference: &Reference) -> PersistResult<()>;

    /// Removes all objects and references of this repository.
    fn erase_repository(&self) -> PersistResult<()>;
}
