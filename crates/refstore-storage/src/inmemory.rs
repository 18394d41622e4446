//! Heap-backed persistence, used by tests and single-process deployments.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::id::ObjId;
use crate::obj::{Obj, ObjKind};
use crate::persist::{Persist, PersistError, PersistResult, StoreConfig};
use crate::reference::Reference;

/// Process-wide in-memory backend shared by any number of repositories.
#[derive(Default)]
pub struct InMemoryStore {
    objs: RwLock<HashMap<(String, ObjId), Obj>>,
    refs: RwLock<HashMap<(String, String), Reference>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(InMemoryStore::default())
    }

    /// Opens a [`Persist`] facade bound to the given repository.
    pub fn open(self: &Arc<Self>, repository_id: impl Into<String>) -> InMemoryPersist {
        InMemoryPersist {
            store: Arc::clone(self),
            config: StoreConfig::new(repository_id),
        }
    }
}

/// [`Persist`] implementation over an [`InMemoryStore`].
pub struct InMemoryPersist {
    store: Arc<InMemoryStore>,
    config: StoreConfig,
}

impl InMemoryPersist {
    fn obj_key(&self, id: &ObjId) -> (String, ObjId) {
        (self.config.repository_id().to_owned(), id.clone())
    }

    fn ref_key(&self, name: &str) -> (String, String) {
        (self.config.repository_id().to_owned(), name.to_owned())
    }

    /// CAS helper: current stored state must equal `expected`.
    fn expect_current(
        refs: &HashMap<(String, String), Reference>,
        key: &(String, String),
        expected: &Reference,
    ) -> PersistResult<()> {
        match refs.get(key) {
            None => Err(PersistError::RefNotFound(expected.name().to_owned())),
            Some(current) if current == expected => Ok(()),
            Some(_) => Err(PersistError::RefConditionFailed(
                expected.name().to_owned(),
            )),
        }
    }
}

impl Persist for InMemoryPersist {
    fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn fetch_obj(&self, id: &ObjId) -> PersistResult<Obj> {
        self.store
            .objs
            .read()
            .get(&self.obj_key(id))
            .cloned()
            .ok_or_else(|| PersistError::ObjNotFound(id.clone()))
    }

    fn fetch_typed_obj(&self, id: &ObjId, kind: ObjKind) -> PersistResult<Obj> {
        let obj = self.fetch_obj(id)?;
        if obj.kind() != kind {
            return Err(PersistError::WrongObjKind {
                id: id.clone(),
                expected: kind,
                actual: obj.kind(),
            });
        }
        Ok(obj)
    }

    fn fetch_objs(&self, ids: &[ObjId]) -> PersistResult<Vec<Option<Obj>>> {
        let objs = self.store.objs.read();
        Ok(ids
            .iter()
            .map(|id| objs.get(&self.obj_key(id)).cloned())
            .collect())
    }

    fn store_obj(&self, obj: &Obj) -> PersistResult<bool> {
        let mut objs = self.store.objs.write();
        match objs.entry(self.obj_key(obj.id())) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(obj.clone());
                Ok(true)
            }
        }
    }

    fn upsert_obj(&self, obj: &Obj) -> PersistResult<()> {
        self.store
            .objs
            .write()
            .insert(self.obj_key(obj.id()), obj.clone());
        Ok(())
    }

    fn delete_obj(&self, id: &ObjId) -> PersistResult<()> {
        self.store.objs.write().remove(&self.obj_key(id));
        Ok(())
    }

    fn fetch_reference(&self, name: &str) -> PersistResult<Reference> {
        self.store
            .refs
            .read()
            .get(&self.ref_key(name))
            .cloned()
            .ok_or_else(|| PersistError::RefNotFound(name.to_owned()))
    }

    fn add_reference(&self, reference: &Reference) -> PersistResult<Reference> {
        let mut refs = self.store.refs.write();
        match refs.entry(self.ref_key(reference.name())) {
            Entry::Occupied(_) => Err(PersistError::RefAlreadyExists(
                reference.name().to_owned(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(reference.clone());
                Ok(reference.clone())
            }
        }
    }

    fn update_reference_pointer(
        &self,
        reference: &Reference,
        new_pointer: ObjId,
    ) -> PersistResult<Reference> {
        let mut refs = self.store.refs.write();
        let key = self.ref_key(reference.name());
        Self::expect_current(&refs, &key, reference)?;
        let updated = reference.forward_to(new_pointer);
        refs.insert(key, updated.clone());
        Ok(updated)
    }

    fn mark_reference_as_deleted(&self, reference: &Reference) -> PersistResult<Reference> {
        let mut refs = self.store.refs.write();
        let key = self.ref_key(reference.name());
        Self::expect_current(&refs, &key, reference)?;
        let deleted = reference.as_deleted();
        refs.insert(key, deleted.clone());
        Ok(deleted)
    }

    fn purge_reference(&self, reference: &Reference) -> PersistResult<()> {
        let mut refs = self.store.refs.write();
        let key = self.ref_key(reference.name());
        Self::expect_current(&refs, &key, reference)?;
        refs.remove(&key);
        Ok(())
    }

    fn erase_repository(&self) -> PersistResult<()> {
        let repo = self.config.repository_id();
        self.store.objs.write().retain(|(r, _), _| r != repo);
        self.store.refs.write().retain(|(r, _), _| r != repo);
        Ok(())
    }
}
