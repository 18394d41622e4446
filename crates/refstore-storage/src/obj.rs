use serde::{Deserialize, Serialize};

use crate::id::ObjId;

/// Time-to-live applied to negative ("known absent") cache entries of the
/// kinds that record them, in microseconds.
pub const NEGATIVE_CACHE_TTL_MICROS: u64 = 10_000_000;

/// Lifetime of a cached [`UniqueIdObj`], counted from the moment it was first
/// seen, in microseconds.
pub const UNIQUE_ID_TTL_MICROS: u64 = 3_600_000_000;

/// Result of a per-kind cache-expiry callback.
///
/// All times at this boundary are absolute microseconds on the store clock.
/// [`CacheExpiry::Unlimited`] and [`CacheExpiry::NotCached`] must pass through
/// any unit conversion untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheExpiry {
    /// Cache until the given absolute time (microseconds).
    At(u64),
    /// Cache and never expire.
    Unlimited,
    /// Do not cache at all.
    NotCached,
}

/// The kind of a stored object.
///
/// Kinds classify objects and are the sole source of object-specific cache
/// policy, via [`ObjKind::positive_expires_at`] and
/// [`ObjKind::negative_expires_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjKind {
    Commit,
    Tag,
    Value,
    Index,
    RefLog,
    UniqueId,
}

impl ObjKind {
    /// Short stable name, used in log and metric tags.
    pub fn name(&self) -> &'static str {
        match self {
            ObjKind::Commit => "commit",
            ObjKind::Tag => "tag",
            ObjKind::Value => "value",
            ObjKind::Index => "index",
            ObjKind::RefLog => "ref-log",
            ObjKind::UniqueId => "unique-id",
        }
    }

    /// When a cached object of this kind expires.
    ///
    /// Stored objects are immutable, so most kinds never expire. Ref-log
    /// entries are written once and read almost never, caching them only
    /// wastes weight. Unique-id markers expire relative to when the marker was
    /// first seen, so the expiry depends on the object itself.
    pub fn positive_expires_at(&self, obj: &Obj, _now_micros: u64) -> CacheExpiry {
        match self {
            ObjKind::RefLog => CacheExpiry::NotCached,
            ObjKind::UniqueId => match obj {
                Obj::UniqueId(u) => {
                    CacheExpiry::At(u.seen_at_micros.saturating_add(UNIQUE_ID_TTL_MICROS))
                }
                _ => CacheExpiry::NotCached,
            },
            _ => CacheExpiry::Unlimited,
        }
    }

    /// When a negative ("known absent") entry for this kind expires.
    ///
    /// Commits, tags and unique-id markers are looked up speculatively before
    /// they exist, so remembering their absence for a short while saves
    /// backend round trips. Values and indexes are only ever fetched by ids
    /// that are known to exist.
    pub fn negative_expires_at(&self, now_micros: u64) -> CacheExpiry {
        match self {
            ObjKind::Commit | ObjKind::Tag | ObjKind::UniqueId => {
                CacheExpiry::At(now_micros.saturating_add(NEGATIVE_CACHE_TTL_MICROS))
            }
            ObjKind::Value | ObjKind::Index | ObjKind::RefLog => CacheExpiry::NotCached,
        }
    }
}

/// A commit: one entry in a repository's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObj {
    pub id: ObjId,
    /// Monotonically increasing commit sequence number on its branch.
    pub seq: u64,
    pub created_at_micros: u64,
    pub parents: Vec<ObjId>,
    /// Points to the [`IndexObj`] describing this commit's content.
    pub index: ObjId,
    pub message: String,
}

/// An annotated tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagObj {
    pub id: ObjId,
    pub message: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// Raw content payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueObj {
    pub id: ObjId,
    pub content_type: String,
    pub payload: Vec<u8>,
}

/// Serialized content index of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexObj {
    pub id: ObjId,
    pub index: Vec<u8>,
}

/// Audit-log entry recording a reference update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefLogObj {
    pub id: ObjId,
    pub ref_name: String,
    pub old_pointer: Option<ObjId>,
    pub new_pointer: ObjId,
    pub acted_at_micros: u64,
}

/// Marker recording that an externally supplied id has been used, to enforce
/// uniqueness within a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIdObj {
    pub id: ObjId,
    pub space: String,
    pub value: Vec<u8>,
    pub seen_at_micros: u64,
}

/// An immutable, content-addressed stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Obj {
    Commit(CommitObj),
    Tag(TagObj),
    Value(ValueObj),
    Index(IndexObj),
    RefLog(RefLogObj),
    UniqueId(UniqueIdObj),
}

impl Obj {
    pub fn id(&self) -> &ObjId {
        match self {
            Obj::Commit(o) => &o.id,
            Obj::Tag(o) => &o.id,
            Obj::Value(o) => &o.id,
            Obj::Index(o) => &o.id,
            Obj::RefLog(o) => &o.id,
            Obj::UniqueId(o) => &o.id,
        }
    }

    pub fn kind(&self) -> ObjKind {
        match self {
            Obj::Commit(_) => ObjKind::Commit,
            Obj::Tag(_) => ObjKind::Tag,
            Obj::Value(_) => ObjKind::Value,
            Obj::Index(_) => ObjKind::Index,
            Obj::RefLog(_) => ObjKind::RefLog,
            Obj::UniqueId(_) => ObjKind::UniqueId,
        }
    }
}
