//! In-memory tracker store implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{StoreError, TrackerStore};
use crate::domain::Domain;
use crate::tracker::{Dialogue, Tracker};

/// A process-local tracker store backed by a mutex-protected hash map of
/// dialogues. Trackers are rebuilt from the stored log on every retrieve, so
/// callers never share mutable state through the store.
pub struct InMemoryTrackerStore {
    domain: Arc<Domain>,
    dialogues: Mutex<HashMap<String, Dialogue>>,
}

impl InMemoryTrackerStore {
    pub fn new(domain: Arc<Domain>) -> Self {
        Self {
            domain,
            dialogues: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TrackerStore for InMemoryTrackerStore {
    fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    async fn save(&self, tracker: &Tracker) -> Result<(), StoreError> {
        let dialogue = tracker.as_dialogue();
        let mut dialogues = self.dialogues.lock();
        dialogues.insert(dialogue.name.clone(), dialogue);
        Ok(())
    }

    async fn retrieve(&self, sender_id: &str) -> Result<Option<Tracker>, StoreError> {
        let dialogue = match self.dialogues.lock().get(sender_id) {
            Some(dialogue) => dialogue.clone(),
            None => return Ok(None),
        };
        Ok(Some(Tracker::from_dialogue(dialogue, Arc::clone(&self.domain))?))
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let dialogues = self.dialogues.lock();
        let mut keys: Vec<String> = dialogues.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn get_or_create(&self, sender_id: &str) -> Result<Tracker, StoreError> {
        let dialogue = {
            let mut dialogues = self.dialogues.lock();
            dialogues
                .entry(sender_id.to_string())
                .or_insert_with(|| {
                    tracing::debug!(store = "in_memory", sender_id, "created new tracker");
                    Tracker::new(sender_id, Arc::clone(&self.domain)).as_dialogue()
                })
                .clone()
        };
        Ok(Tracker::from_dialogue(dialogue, Arc::clone(&self.domain))?)
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
