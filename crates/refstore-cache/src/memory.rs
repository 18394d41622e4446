//! The weighted in-memory cache backend.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use moka::notification::RemovalCause;
use moka::sync::Cache;

use refstore_storage::serialize::{
    deserialize_obj, deserialize_reference, serialize_obj, serialize_reference,
};
use refstore_storage::{CacheExpiry, Obj, ObjId, ObjKind, Persist, Reference};

use crate::config::{CacheConfig, ClockNanos};
use crate::persist::CachingPersist;
use crate::{CacheBackend, ObjCacheLookup, RefCacheLookup, CACHE_NAME};

/// Expiry timestamp of entries that never expire.
const EXPIRES_NEVER: u64 = u64::MAX;

/// Estimated per-entry bookkeeping cost of the underlying cache (hash-table
/// node and policy bookkeeping). A tuning value, not a correctness value; it
/// is counted into every entry's weight.
const ENTRY_OVERHEAD: usize = 64;

/// Key of the weighted store: repository id plus object id, nothing else.
/// Expiry deliberately lives in [`CacheValue`], so that replacing an entry
/// with a fresh expiry hits the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    repository_id: String,
    id: ObjId,
}

impl CacheKey {
    fn new(repository_id: &str, id: ObjId) -> Self {
        CacheKey {
            repository_id: repository_id.to_owned(),
            id,
        }
    }
}

/// A cached payload: either the encoded bytes of an object/reference, or the
/// negative marker recording that the backing store lacks the key. The two
/// are told apart by tag alone; byte content is never inspected for this.
#[derive(Debug, Clone)]
enum CachedPayload {
    Present(Bytes),
    Negative,
}

#[derive(Debug, Clone)]
pub(crate) struct CacheValue {
    /// Absolute expiry in nanoseconds on the injected clock, or
    /// [`EXPIRES_NEVER`].
    expires_at_nanos: u64,
    payload: CachedPayload,
}

impl CacheValue {
    fn present(expires_at_nanos: u64, encoded: Vec<u8>) -> Self {
        CacheValue {
            expires_at_nanos,
            payload: CachedPayload::Present(Bytes::from(encoded)),
        }
    }

    fn negative(expires_at_nanos: u64) -> Self {
        CacheValue {
            expires_at_nanos,
            payload: CachedPayload::Negative,
        }
    }

    fn payload_size(&self) -> usize {
        match &self.payload {
            CachedPayload::Present(bytes) => bytes.len(),
            CachedPayload::Negative => 0,
        }
    }
}

/// Estimated bytes an entry keeps alive: both structs, the repository-id
/// string, the id's heap tail, the payload, and the fixed bookkeeping share.
fn weigh(key: &CacheKey, value: &CacheValue) -> u32 {
    let size = mem::size_of::<CacheKey>()
        + key.repository_id.len()
        + key.id.heap_size()
        + mem::size_of::<CacheValue>()
        + value.payload_size()
        + ENTRY_OVERHEAD;
    size.try_into().unwrap_or(u32::MAX)
}

/// Maps the absolute expiry carried in each value onto the remaining lifetime
/// the store works with. Create and update recompute the remaining life from
/// the injected clock; reads keep it (the trait default), so reading never
/// extends an entry's life.
struct ValueExpiry {
    clock: ClockNanos,
}

impl moka::Expiry<CacheKey, CacheValue> for ValueExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        match value.expires_at_nanos {
            EXPIRES_NEVER => None,
            at => Some(Duration::from_nanos(at.saturating_sub((self.clock)()))),
        }
    }

    fn expire_after_update(
        &self,
        key: &CacheKey,
        value: &CacheValue,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.expire_after_create(key, value, updated_at)
    }
}

/// The derived id under which a reference named `name` lives in the object
/// keyspace. Generic ids are structurally distinct from content hashes, so
/// this can never collide with a stored object.
fn ref_obj_id(name: &str) -> ObjId {
    let mut bytes = Vec::with_capacity(2 + name.len());
    bytes.extend_from_slice(b"r:");
    bytes.extend_from_slice(name.as_bytes());
    ObjId::generic(bytes)
}

fn ttl_nanos(ttl: Option<Duration>) -> u64 {
    ttl.map(|d| d.as_nanos().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

/// The weighted, TTL-aware cache backend shared by all repositories of one
/// physical store.
pub struct MemoryCacheBackend {
    config: CacheConfig,
    cache: Cache<CacheKey, CacheValue>,
    reference_ttl_nanos: u64,
    reference_negative_ttl_nanos: u64,
}

impl MemoryCacheBackend {
    pub fn new(config: CacheConfig) -> Self {
        let reference_ttl_nanos = ttl_nanos(config.reference_ttl);
        let reference_negative_ttl_nanos = ttl_nanos(config.reference_negative_ttl);

        let cache = Cache::builder()
            .name(CACHE_NAME)
            .max_capacity(config.capacity_mb * 1024 * 1024)
            .weigher(weigh)
            .expire_after(ValueExpiry {
                clock: Arc::clone(&config.clock_nanos),
            })
            .eviction_listener(|_key, _value, cause| {
                if matches!(cause, RemovalCause::Size | RemovalCause::Expired) {
                    metric!(counter("objcache.eviction") += 1, "cache" => CACHE_NAME);
                }
            })
            .build();

        metric!(gauge("objcache.capacity_mb") = config.capacity_mb, "cache" => CACHE_NAME);

        MemoryCacheBackend {
            config,
            cache,
            reference_ttl_nanos,
            reference_negative_ttl_nanos,
        }
    }

    fn now_nanos(&self) -> u64 {
        (self.config.clock_nanos)()
    }

    fn now_micros(&self) -> u64 {
        self.now_nanos() / 1_000
    }

    /// Looks up a live entry, expiring it against the injected clock. The
    /// store's own expiry runs on its internal timeline; checking here keeps
    /// expiry exact on the clock the rest of the system observes.
    fn lookup(&self, key: &CacheKey) -> Option<CacheValue> {
        let value = self.cache.get(key)?;
        if value.expires_at_nanos != EXPIRES_NEVER && value.expires_at_nanos <= self.now_nanos() {
            self.cache.invalidate(key);
            return None;
        }
        Some(value)
    }

    /// Converts a kind-policy result to the store's nanosecond expiry.
    /// `None` means "do not insert". `Unlimited` passes through without
    /// arithmetic.
    fn expiry_to_nanos(expiry: CacheExpiry) -> Option<u64> {
        match expiry {
            CacheExpiry::NotCached => None,
            CacheExpiry::Unlimited => Some(EXPIRES_NEVER),
            CacheExpiry::At(micros) => Some(micros.saturating_mul(1_000)),
        }
    }

    fn send_obj_invalidation(&self, repository_id: &str, id: &ObjId) {
        if let Some(sender) = &self.config.invalidation {
            sender.evict_obj(repository_id, id);
        }
    }

    fn send_reference_invalidation(&self, repository_id: &str, name: &str) {
        if let Some(sender) = &self.config.invalidation {
            sender.evict_reference(repository_id, name);
        }
    }

    /// Current total weight of live entries in bytes. Eventually consistent;
    /// call [`Self::run_pending_tasks`] first for an exact figure.
    pub fn weighted_size(&self) -> u64 {
        self.cache.weighted_size()
    }

    /// Number of live entries. Eventually consistent, see
    /// [`Self::weighted_size`].
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs the store's deferred housekeeping (weight accounting and
    /// eviction). User operations never wait for this.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn get(&self, repository_id: &str, id: &ObjId) -> ObjCacheLookup {
        metric!(counter("objcache.access") += 1, "cache" => CACHE_NAME);
        let key = CacheKey::new(repository_id, id.clone());
        let Some(value) = self.lookup(&key) else {
            metric!(counter("objcache.miss") += 1, "cache" => CACHE_NAME);
            return ObjCacheLookup::Miss;
        };
        match &value.payload {
            CachedPayload::Negative => {
                metric!(counter("objcache.hit") += 1, "cache" => CACHE_NAME);
                ObjCacheLookup::Negative
            }
            CachedPayload::Present(bytes) => match deserialize_obj(id, bytes) {
                Ok(obj) => {
                    metric!(counter("objcache.hit") += 1, "cache" => CACHE_NAME);
                    ObjCacheLookup::Hit(obj)
                }
                Err(error) => {
                    // A payload that no longer decodes is dropped rather than
                    // served; the next read repopulates it from the store.
                    tracing::error!(%error, id = %id, "dropping undecodable cache entry");
                    self.cache.invalidate(&key);
                    metric!(counter("objcache.miss") += 1, "cache" => CACHE_NAME);
                    ObjCacheLookup::Miss
                }
            },
        }
    }

    fn put(&self, repository_id: &str, obj: &Obj) {
        self.put_local(repository_id, obj);
        self.send_obj_invalidation(repository_id, obj.id());
    }

    fn put_local(&self, repository_id: &str, obj: &Obj) {
        let expiry = obj.kind().positive_expires_at(obj, self.now_micros());
        let Some(expires_at_nanos) = Self::expiry_to_nanos(expiry) else {
            return;
        };
        let encoded = match serialize_obj(obj) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::error!(%error, id = %obj.id(), "failed to encode object for caching");
                return;
            }
        };
        if let Some(limit) = self.config.max_obj_size {
            if encoded.len() > limit {
                tracing::debug!(
                    id = %obj.id(),
                    size = encoded.len(),
                    limit,
                    "object exceeds the cached-object size limit"
                );
                return;
            }
        }
        self.cache.insert(
            CacheKey::new(repository_id, obj.id().clone()),
            CacheValue::present(expires_at_nanos, encoded),
        );
    }

    fn put_negative(&self, repository_id: &str, id: &ObjId, kind: ObjKind) {
        match Self::expiry_to_nanos(kind.negative_expires_at(self.now_micros())) {
            None => self.remove(repository_id, id),
            Some(expires_at_nanos) => {
                self.cache.insert(
                    CacheKey::new(repository_id, id.clone()),
                    CacheValue::negative(expires_at_nanos),
                );
            }
        }
    }

    fn remove(&self, repository_id: &str, id: &ObjId) {
        self.cache.invalidate(&CacheKey::new(repository_id, id.clone()));
        self.send_obj_invalidation(repository_id, id);
    }

    fn clear(&self, repository_id: &str) {
        for (key, _) in self.cache.iter() {
            if key.repository_id == repository_id {
                self.cache.invalidate(&*key);
            }
        }
    }

    fn get_reference(&self, repository_id: &str, name: &str) -> RefCacheLookup {
        if self.reference_ttl_nanos == 0 {
            return RefCacheLookup::Miss;
        }
        let key = CacheKey::new(repository_id, ref_obj_id(name));
        let Some(value) = self.lookup(&key) else {
            return RefCacheLookup::Miss;
        };
        match &value.payload {
            CachedPayload::Negative => RefCacheLookup::Negative,
            CachedPayload::Present(bytes) => match deserialize_reference(bytes) {
                Ok(reference) => RefCacheLookup::Hit(reference),
                Err(error) => {
                    tracing::error!(%error, name, "dropping undecodable reference cache entry");
                    self.cache.invalidate(&key);
                    RefCacheLookup::Miss
                }
            },
        }
    }

    fn put_reference(&self, repository_id: &str, reference: &Reference) {
        self.put_reference_local(repository_id, reference);
        self.send_reference_invalidation(repository_id, reference.name());
    }

    fn put_reference_local(&self, repository_id: &str, reference: &Reference) {
        if self.reference_ttl_nanos == 0 {
            return;
        }
        let encoded = match serialize_reference(reference) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::error!(%error, name = reference.name(), "failed to encode reference for caching");
                return;
            }
        };
        let expires_at_nanos = self.now_nanos().saturating_add(self.reference_ttl_nanos);
        self.cache.insert(
            CacheKey::new(repository_id, ref_obj_id(reference.name())),
            CacheValue::present(expires_at_nanos, encoded),
        );
    }

    fn put_reference_negative(&self, repository_id: &str, name: &str) {
        if self.reference_negative_ttl_nanos == 0 {
            return;
        }
        let expires_at_nanos = self
            .now_nanos()
            .saturating_add(self.reference_negative_ttl_nanos);
        self.cache.insert(
            CacheKey::new(repository_id, ref_obj_id(name)),
            CacheValue::negative(expires_at_nanos),
        );
    }

    fn remove_reference(&self, repository_id: &str, name: &str) {
        if self.reference_ttl_nanos != 0 {
            self.cache
                .invalidate(&CacheKey::new(repository_id, ref_obj_id(name)));
        }
        self.send_reference_invalidation(repository_id, name);
    }

    fn wrap(self: Arc<Self>, persist: Arc<dyn Persist>) -> Arc<dyn Persist> {
        Arc::new(CachingPersist::new(persist, self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_identity_is_repository_and_id_only() {
        let id = ObjId::hash_of(b"obj");
        let a = CacheKey::new("r1", id.clone());
        let b = CacheKey::new("r1", id.clone());
        let other_repo = CacheKey::new("r2", id);
        assert_eq!(a, b);
        assert_ne!(a, other_repo);

        // Values with different expiries under the same key occupy one slot;
        // the key itself carries no notion of time.
        let v1 = CacheValue::negative(1);
        let v2 = CacheValue::negative(EXPIRES_NEVER);
        assert_eq!(weigh(&a, &v1), weigh(&b, &v2));
    }

    #[test]
    fn derived_reference_ids_stay_out_of_the_hash_keyspace() {
        let derived = ref_obj_id("main");
        assert_eq!(derived.as_bytes(), b"r:main");
        assert_ne!(derived, ObjId::hash_of(b"r:main"));
    }

    #[test]
    fn weight_tracks_payload_and_key_sizes() {
        let small = CacheValue::present(EXPIRES_NEVER, vec![0; 16]);
        let large = CacheValue::present(EXPIRES_NEVER, vec![0; 4096]);
        let key = CacheKey::new("r1", ObjId::hash_of(b"x"));
        assert!(weigh(&key, &large) > weigh(&key, &small));

        let long_repo = CacheKey::new(&"r".repeat(100), ObjId::hash_of(b"x"));
        assert!(weigh(&long_repo, &small) > weigh(&key, &small));
    }

    #[test]
    fn negative_values_weigh_like_empty_payloads() {
        let key = CacheKey::new("r1", ObjId::hash_of(b"x"));
        let negative = CacheValue::negative(42);
        let empty = CacheValue::present(42, Vec::new());
        assert_eq!(weigh(&key, &negative), weigh(&key, &empty));
    }
}
