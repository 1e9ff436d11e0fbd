//! Durable tracker store over a key-value client.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::kv::KeyValueBackend;
use super::traits::{StoreError, TrackerStore};
use crate::domain::Domain;
use crate::tracker::{Dialogue, Tracker};

pub const DEFAULT_KEY_PREFIX: &str = "tracker:";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Stores each session's dialogue as JSON under `"{key_prefix}{sender_id}"`.
///
/// Every backend call is bounded by `timeout`; a call that does not finish in
/// time fails with [`StoreError::Timeout`].
pub struct KeyValueTrackerStore<B: KeyValueBackend> {
    backend: B,
    domain: Arc<Domain>,
    key_prefix: String,
    timeout: Duration,
    record_exp: Option<Duration>,
}

impl<B: KeyValueBackend> KeyValueTrackerStore<B> {
    pub fn new(backend: B, domain: Arc<Domain>) -> Self {
        Self {
            backend,
            domain,
            key_prefix: DEFAULT_KEY_PREFIX.into(),
            timeout: DEFAULT_TIMEOUT,
            record_exp: None,
        }
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Expire stored records this long after their last save.
    #[must_use]
    pub fn with_record_expiry(mut self, record_exp: Option<Duration>) -> Self {
        self.record_exp = record_exp;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn key(&self, sender_id: &str) -> String {
        format!("{}{sender_id}", self.key_prefix)
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Tracker store call timed out"
                );
                Err(StoreError::Timeout {
                    backend: self.backend.name().to_string(),
                    operation,
                    after: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl<B: KeyValueBackend> TrackerStore for KeyValueTrackerStore<B> {
    fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    async fn save(&self, tracker: &Tracker) -> Result<(), StoreError> {
        let bytes = tracker.as_dialogue().to_json_bytes()?;
        let key = self.key(tracker.sender_id());
        self.bounded("save", self.backend.set(&key, bytes, self.record_exp))
            .await?;
        tracing::debug!(
            backend = self.backend.name(),
            sender_id = tracker.sender_id(),
            events = tracker.events().len(),
            "Saved tracker"
        );
        Ok(())
    }

    async fn retrieve(&self, sender_id: &str) -> Result<Option<Tracker>, StoreError> {
        let key = self.key(sender_id);
        let Some(bytes) = self.bounded("retrieve", self.backend.get(&key)).await? else {
            tracing::debug!(backend = self.backend.name(), sender_id, "No stored tracker");
            return Ok(None);
        };
        let mut dialogue = Dialogue::from_json_slice(&bytes)?;
        if dialogue.name != sender_id {
            tracing::warn!(
                backend = self.backend.name(),
                sender_id,
                stored_name = %dialogue.name,
                "Stored dialogue name differs from its key, using the key"
            );
            dialogue.name = sender_id.to_string();
        }
        let tracker = Tracker::from_dialogue(dialogue, Arc::clone(&self.domain))?;
        tracing::debug!(
            backend = self.backend.name(),
            sender_id,
            events = tracker.events().len(),
            "Retrieved tracker"
        );
        Ok(Some(tracker))
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let keys = self
            .bounded("keys", self.backend.keys(&self.key_prefix))
            .await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.key_prefix).map(str::to_string))
            .collect())
    }

    fn name(&self) -> &str {
        self.backend.name()
    }
}
