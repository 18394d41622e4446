//! The caching [`Persist`] facade.

use std::sync::Arc;

use refstore_storage::{
    Obj, ObjId, ObjKind, Persist, PersistError, PersistResult, Reference, StoreConfig,
};

use crate::{CacheBackend, ObjCacheLookup, RefCacheLookup};

/// Wraps a [`Persist`] so that reads are served from the cache and writes
/// keep it coherent. This is the only component that talks to both sides,
/// and thereby the coherence boundary.
///
/// Reads consult the cache outside of any store interaction; on a miss the
/// underlying operation runs and its result, including a definitive "not
/// found", is recorded. Negative cache hits are translated back into the
/// store's own not-found errors, so callers observe identical semantics
/// whether an answer came from the cache or the store. Store errors pass
/// through unchanged and never populate the cache.
pub struct CachingPersist {
    persist: Arc<dyn Persist>,
    cache: Arc<dyn CacheBackend>,
}

impl CachingPersist {
    pub(crate) fn new(persist: Arc<dyn Persist>, cache: Arc<dyn CacheBackend>) -> Self {
        CachingPersist { persist, cache }
    }

    fn repo(&self) -> &str {
        self.persist.config().repository_id()
    }
}

impl Persist for CachingPersist {
    fn config(&self) -> &StoreConfig {
        self.persist.config()
    }

    fn fetch_obj(&self, id: &ObjId) -> PersistResult<Obj> {
        match self.cache.get(self.repo(), id) {
            ObjCacheLookup::Hit(obj) => return Ok(obj),
            ObjCacheLookup::Negative => return Err(PersistError::ObjNotFound(id.clone())),
            ObjCacheLookup::Miss => {}
        }
        // Without an expected kind there is no negative-caching policy to
        // consult, so a not-found outcome is simply passed through.
        let obj = self.persist.fetch_obj(id)?;
        self.cache.put_local(self.repo(), &obj);
        Ok(obj)
    }

    fn fetch_typed_obj(&self, id: &ObjId, kind: ObjKind) -> PersistResult<Obj> {
        match self.cache.get(self.repo(), id) {
            ObjCacheLookup::Hit(obj) => {
                if obj.kind() != kind {
                    return Err(PersistError::WrongObjKind {
                        id: id.clone(),
                        expected: kind,
                        actual: obj.kind(),
                    });
                }
                return Ok(obj);
            }
            ObjCacheLookup::Negative => return Err(PersistError::ObjNotFound(id.clone())),
            ObjCacheLookup::Miss => {}
        }
        match self.persist.fetch_typed_obj(id, kind) {
            Ok(obj) => {
                self.cache.put_local(self.repo(), &obj);
                Ok(obj)
            }
            Err(err @ PersistError::ObjNotFound(_)) => {
                self.cache.put_negative(self.repo(), id, kind);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn fetch_objs(&self, ids: &[ObjId]) -> PersistResult<Vec<Option<Obj>>> {
        let repo = self.repo();
        let mut result: Vec<Option<Obj>> = Vec::with_capacity(ids.len());
        let mut miss_slots = Vec::new();
        let mut miss_ids = Vec::new();
        for (slot, id) in ids.iter().enumerate() {
            match self.cache.get(repo, id) {
                ObjCacheLookup::Hit(obj) => result.push(Some(obj)),
                // A live negative entry is a definitive absence.
                ObjCacheLookup::Negative => result.push(None),
                ObjCacheLookup::Miss => {
                    result.push(None);
                    miss_slots.push(slot);
                    miss_ids.push(id.clone());
                }
            }
        }
        if !miss_ids.is_empty() {
            let fetched = self.persist.fetch_objs(&miss_ids)?;
            for (slot, obj) in miss_slots.into_iter().zip(fetched) {
                if let Some(obj) = obj {
                    self.cache.put_local(repo, &obj);
                    result[slot] = Some(obj);
                }
            }
        }
        Ok(result)
    }

    fn store_obj(&self, obj: &Obj) -> PersistResult<bool> {
        let stored = self.persist.store_obj(obj)?;
        if stored {
            self.cache.put(self.repo(), obj);
        }
        Ok(stored)
    }

    fn upsert_obj(&self, obj: &Obj) -> PersistResult<()> {
        self.persist.upsert_obj(obj)?;
        self.cache.put(self.repo(), obj);
        Ok(())
    }

    fn delete_obj(&self, id: &ObjId) -> PersistResult<()> {
        self.persist.delete_obj(id)?;
        self.cache.remove(self.repo(), id);
        Ok(())
    }

    fn fetch_reference(&self, name: &str) -> PersistResult<Reference> {
        match self.cache.get_reference(self.repo(), name) {
            RefCacheLookup::Hit(reference) => return Ok(reference),
            RefCacheLookup::Negative => return Err(PersistError::RefNotFound(name.to_owned())),
            RefCacheLookup::Miss => {}
        }
        match self.persist.fetch_reference(name) {
            Ok(reference) => {
                self.cache.put_reference_local(self.repo(), &reference);
                Ok(reference)
            }
            Err(err @ PersistError::RefNotFound(_)) => {
                self.cache.put_reference_negative(self.repo(), name);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn add_reference(&self, reference: &Reference) -> PersistResult<Reference> {
        let created = self.persist.add_reference(reference)?;
        self.cache.put_reference(self.repo(), &created);
        Ok(created)
    }

    fn update_reference_pointer(
        &self,
        reference: &Reference,
        new_pointer: ObjId,
    ) -> PersistResult<Reference> {
        match self.persist.update_reference_pointer(reference, new_pointer) {
            Ok(updated) => {
                self.cache.put_reference(self.repo(), &updated);
                Ok(updated)
            }
            Err(err @ PersistError::RefConditionFailed(_)) => {
                // The expected state lost a race, so whatever is cached for
                // this name is stale as well.
                self.cache.remove_reference(self.repo(), reference.name());
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn mark_reference_as_deleted(&self, reference: &Reference) -> PersistResult<Reference> {
        match self.persist.mark_reference_as_deleted(reference) {
            Ok(deleted) => {
                self.cache.put_reference(self.repo(), &deleted);
                Ok(deleted)
            }
            Err(err @ PersistError::RefConditionFailed(_)) => {
                self.cache.remove_reference(self.repo(), reference.name());
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn purge_reference(&self, reference: &Reference) -> PersistResult<()> {
        match self.persist.purge_reference(reference) {
            Ok(()) => {
                self.cache.remove_reference(self.repo(), reference.name());
                Ok(())
            }
            Err(err @ PersistError::RefConditionFailed(_)) => {
                self.cache.remove_reference(self.repo(), reference.name());
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn erase_repository(&self) -> PersistResult<()> {
        self.persist.erase_repository()?;
        self.cache.clear(self.repo());
        Ok(())
    }
}
