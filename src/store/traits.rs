//! Tracker store traits and errors.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Domain;
use crate::tracker::{Tracker, TrackerError};

/// Failures surfaced by tracker stores. A missing session is not an error;
/// `retrieve` reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{backend} store unavailable: {message}")]
    Unavailable { backend: String, message: String },
    #[error("{backend} store timed out after {after:?} during {operation}")]
    Timeout {
        backend: String,
        operation: &'static str,
        after: Duration,
    },
    #[error("stored dialogue could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("stored dialogue does not fit the domain: {0}")]
    Tracker(#[from] TrackerError),
}

impl StoreError {
    pub fn unavailable(backend: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            message: message.to_string(),
        }
    }
}

/// Persistent storage for session trackers, keyed by sender id.
///
/// Implementations serve concurrent calls for different ids. Writes to the
/// same id are last-write-wins; callers keep a single writer per session.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Domain every tracker from this store is bound to.
    fn domain(&self) -> &Arc<Domain>;

    /// Persist the full log of `tracker`, replacing whatever was stored for
    /// its sender id.
    async fn save(&self, tracker: &Tracker) -> Result<(), StoreError>;

    /// Load the tracker for `sender_id`, or `None` if nothing is stored.
    async fn retrieve(&self, sender_id: &str) -> Result<Option<Tracker>, StoreError>;

    /// Sender ids with a stored tracker.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Load the tracker for `sender_id`, creating and saving a fresh one
    /// (a single listen action) if none exists.
    async fn get_or_create(&self, sender_id: &str) -> Result<Tracker, StoreError> {
        if let Some(tracker) = self.retrieve(sender_id).await? {
            return Ok(tracker);
        }
        let tracker = Tracker::new(sender_id, Arc::clone(self.domain()));
        self.save(&tracker).await?;
        tracing::debug!(store = self.name(), sender_id, "created new tracker");
        Ok(tracker)
    }

    /// The name of this store implementation.
    fn name(&self) -> &str;
}
