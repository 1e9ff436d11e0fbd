//! In-process key-value client.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::KeyValueBackend;
use crate::store::traits::StoreError;

struct Record {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Record {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Stand-in for a networked key-value server that keeps everything in this
/// process. Honors record expiry the same way the durable clients do.
#[derive(Default)]
pub struct InMemoryKeyValue {
    records: Mutex<HashMap<String, Record>>,
}

impl InMemoryKeyValue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueBackend for InMemoryKeyValue {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        let mut records = self.records.lock();
        match records.get(key) {
            Some(record) if record.is_live(now) => Ok(Some(record.value.clone())),
            Some(_) => {
                records.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let record = Record {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.records.lock().insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.lock().remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        let records = self.records.lock();
        let mut keys: Vec<String> = records
            .iter()
            .filter(|(key, record)| key.starts_with(prefix) && record.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &str {
        "in_memory_kv"
    }
}
