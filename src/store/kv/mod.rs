//! Key-value clients that back the durable tracker store.

pub mod http;
pub mod memory;
pub mod sqlite;

pub use http::HttpKeyValue;
pub use memory::InMemoryKeyValue;
pub use sqlite::SqliteKeyValue;

use async_trait::async_trait;
use std::time::Duration;

use super::traits::StoreError;

/// Minimal byte-oriented key-value client.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Value stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value. With a `ttl`
    /// the record expires after that long.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Live keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    fn name(&self) -> &str;
}

/// Whole seconds a record with `ttl` stays live, rounded up so that a
/// sub-second expiry does not lapse on write.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
