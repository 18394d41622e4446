use std::sync::Arc;

use refstore_storage::{Obj, ObjId, ObjKind, Persist, Reference};

use crate::{CacheBackend, ObjCacheLookup, RefCacheLookup};

/// The backend used when caching is disabled. Lookups always miss, writes do
/// nothing, and [`CacheBackend::wrap`] hands the persist back unchanged, so
/// callers are spared a configuration branch.
pub struct NoopCacheBackend;

impl CacheBackend for NoopCacheBackend {
    fn get(&self, _repository_id: &str, _id: &ObjId) -> ObjCacheLookup {
        ObjCacheLookup::Miss
    }

    fn put(&self, _repository_id: &str, _obj: &Obj) {}

    fn put_local(&self, _repository_id: &str, _obj: &Obj) {}

    fn put_negative(&self, _repository_id: &str, _id: &ObjId, _kind: ObjKind) {}

    fn remove(&self, _repository_id: &str, _id: &ObjId) {}

    fn clear(&self, _repository_id: &str) {}

    fn get_reference(&self, _repository_id: &str, _name: &str) -> RefCacheLookup {
        RefCacheLookup::Miss
    }

    fn put_reference(&self, _repository_id: &str, _reference: &Reference) {}

    fn put_reference_local(&self, _repository_id: &str, _reference: &Reference) {}

    fn put_reference_negative(&self, _repository_id: &str, _name: &str) {}

    fn remove_reference(&self, _repository_id: &str, _name: &str) {}

    fn wrap(self: Arc<Self>, persist: Arc<dyn Persist>) -> Arc<dyn Persist> {
        persist
    }
}
