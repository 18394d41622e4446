use refstore_storage::ObjId;

/// Outbound hook telling peer processes that their cached view of a key is
/// stale.
///
/// The transport is external; implementations typically enqueue a one-way
/// message. Delivery is best effort and carries no payload beyond the key: a
/// peer reacts by dropping its local entry, never by cascading further
/// invalidations.
///
/// The cache invokes this hook after the local mutation has become visible
/// and never while holding internal locks.
pub trait DistributedCacheInvalidation: Send + Sync {
    fn evict_obj(&self, repository_id: &str, id: &ObjId);

    fn evict_reference(&self, repository_id: &str, name: &str);
}
