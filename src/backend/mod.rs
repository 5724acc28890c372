//! Key-value store abstraction.
//!
//! The monitor store only needs a handful of primitives from the
//! underlying store: hashes, sets, per-key expiry and an atomic batch of
//! writes. The [`Backend`] trait captures exactly those, so the store can
//! run against Redis in production and an in-process map in tests.
//!
//! - [`MemoryBackend`]: in-process, always available
//! - [`RedisBackend`]: Redis via the `redis` crate (`redis` feature)

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::StoreError;

/// `ttl` reply for a key that does not exist.
pub const TTL_MISSING: i64 = -2;
/// `ttl` reply for a key without an expiry.
pub const TTL_PERSISTENT: i64 = -1;

/// A write issued as part of an atomic [`Backend::execute`] batch.
///
/// Every command replies with an integer, following Redis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set hash fields, creating the hash if needed. Replies with the
    /// number of fields added.
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// Increment an integer hash field. Replies with the new value.
    HashIncrement {
        key: String,
        field: String,
        by: i64,
    },
    /// Expire a key after `seconds`. Replies 1 if the key exists.
    Expire { key: String, seconds: u64 },
    /// Remove a key's expiry. Replies 1 if an expiry was removed.
    Persist { key: String },
    /// Delete a key. Replies 1 if it existed.
    Delete { key: String },
    /// Add a member to a set. Replies 1 if it was added.
    SetAdd { key: String, member: String },
    /// Remove a member from a set. Replies 1 if it was present.
    SetRemove { key: String, member: String },
}

/// The subset of a key-value store the monitor store is built on.
///
/// Implementations must be safe to share between tasks; every method may be
/// called concurrently.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Whether `key` exists (and has not expired).
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// All fields of the hash at `key`; empty when the key is missing.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Remaining lifetime of `key` in seconds, [`TTL_PERSISTENT`] when it
    /// never expires, [`TTL_MISSING`] when it does not exist.
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;

    /// Members of the set at `key`; empty when the key is missing.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Number of members of the set at `key`.
    async fn set_cardinality(&self, key: &str) -> Result<u64, StoreError>;

    /// Apply all commands atomically and return one reply per command.
    async fn execute(&self, commands: &[Command]) -> Result<Vec<i64>, StoreError>;
}
