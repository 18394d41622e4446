//! # The refstore cache layer
//!
//! This crate is the in-memory cache that sits between repository logic and a
//! [`Persist`] backend. It serves two data shapes: immutable content-addressed
//! objects and mutable named references, for any number of logical
//! repositories sharing one process.
//!
//! ## Architecture
//!
//! The cache consists of the following pieces:
//!
//! - [`MemoryCacheBackend`] holds the single weighted store: a moka cache
//!   bounded by an estimated byte weight per entry, with per-entry absolute
//!   expiry supplied by the object kinds (see
//!   [`ObjKind::positive_expires_at`](refstore_storage::ObjKind)). References
//!   share the store under derived ids and use the two global TTLs from
//!   [`CacheConfig`].
//! - [`CachingPersist`] wraps a [`Persist`] instance so that reads are served
//!   from the cache and writes keep it coherent. It is obtained through
//!   [`CacheBackend::wrap`] and is the only place where the cache and the
//!   backing store meet.
//! - [`NoopCacheBackend`] stands in when caching is administratively
//!   disabled, so callers never branch on a configuration flag.
//!
//! Lookups distinguish three outcomes: a decoded value, a *negative* entry
//! recording that the backing store is known to lack the key, and a plain
//! miss. Negative entries let the adapter answer repeated lookups of absent
//! objects without touching the store; the adapter translates them back into
//! the backend's own not-found errors so callers cannot tell the two apart.
//!
//! A cache is advisory: entries may disappear at any time under weight
//! pressure or expiry, and peers are told about mutations on a best-effort
//! basis only (see [`DistributedCacheInvalidation`]).
//!
//! ## Metrics
//!
//! When a statsd client is installed via [`metrics::install_statsd`], the
//! cache reports, each tagged with `cache`:
//!
//! - `objcache.access`: all lookups.
//! - `objcache.hit`: lookups answered by the cache, including negative hits.
//! - `objcache.miss`: lookups the cache could not answer.
//! - `objcache.eviction`: entries dropped by weight pressure or expiry.
//! - `objcache.capacity_mb`: gauge of the configured capacity.
//!
//! Without a configured client, every metric call is a no-op.

#[macro_use]
pub mod metrics;

pub mod config;

mod invalidation;
mod memory;
mod noop;
mod persist;

use std::sync::Arc;

use refstore_storage::{Obj, ObjId, ObjKind, Persist, Reference};

pub use config::{monotonic_clock, CacheConfig, CacheOptions, ClockNanos};
pub use invalidation::DistributedCacheInvalidation;
pub use memory::MemoryCacheBackend;
pub use noop::NoopCacheBackend;
pub use persist::CachingPersist;

/// Name of the object cache, used to tag its metrics.
pub const CACHE_NAME: &str = "refstore-objects";

/// Outcome of an object lookup in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjCacheLookup {
    /// A live entry was found and decoded.
    Hit(Obj),
    /// A live entry records that the backing store lacks this id.
    Negative,
    /// The cache has no answer.
    Miss,
}

/// Outcome of a reference lookup in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefCacheLookup {
    Hit(Reference),
    Negative,
    Miss,
}

/// The cache primitives backing a caching [`Persist`] facade.
///
/// All operations are scoped by `repository_id`; entries of different
/// repositories never interact, even for identical object ids. One backend is
/// meant to be shared by every repository of a physical store.
pub trait CacheBackend: Send + Sync {
    fn get(&self, repository_id: &str, id: &ObjId) -> ObjCacheLookup;

    /// Adds the object to the local cache and notifies peers that their view
    /// of this id is stale.
    fn put(&self, repository_id: &str, obj: &Obj);

    /// Adds the object to the local cache only. Used when reacting to a peer
    /// invalidation, where notifying peers again would cascade.
    fn put_local(&self, repository_id: &str, obj: &Obj);

    /// Records that the backing store has no object with this id, honoring
    /// the kind's negative-caching policy.
    fn put_negative(&self, repository_id: &str, id: &ObjId, kind: ObjKind);

    fn remove(&self, repository_id: &str, id: &ObjId);

    /// Drops every entry of the given repository, leaving other repositories
    /// untouched.
    fn clear(&self, repository_id: &str);

    fn get_reference(&self, repository_id: &str, name: &str) -> RefCacheLookup;

    /// Adds the reference to the local cache and notifies peers.
    fn put_reference(&self, repository_id: &str, reference: &Reference);

    /// Adds the reference to the local cache only.
    fn put_reference_local(&self, repository_id: &str, reference: &Reference);

    /// Records that the backing store has no reference with this name.
    fn put_reference_negative(&self, repository_id: &str, name: &str);

    fn remove_reference(&self, repository_id: &str, name: &str);

    /// Returns a caching facade over `persist`, bound to that instance's
    /// repository.
    fn wrap(self: Arc<Self>, persist: Arc<dyn Persist>) -> Arc<dyn Persist>;
}

/// Creates the standard weighted in-memory cache backend.
pub fn new_cache_backend(config: CacheConfig) -> Arc<dyn CacheBackend> {
    Arc::new(MemoryCacheBackend::new(config))
}

/// Creates the backend used when caching is disabled: lookups always miss and
/// [`CacheBackend::wrap`] returns the persist unchanged.
pub fn noop_cache_backend() -> Arc<dyn CacheBackend> {
    Arc::new(NoopCacheBackend)
}
