//! Current-state records for dumping and restoring trackers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Tracker, TrackerError, DEFAULT_SENDER_ID};
use crate::domain::Domain;
use crate::events::{Event, UserMessage};

/// Which events, if any, to attach to a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventVerbosity {
    None,
    /// Only the events that survive reverts and restarts.
    Applied,
    /// The full log, revert markers included.
    All,
}

/// Serializable view of a tracker's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    #[serde(default = "default_sender_id")]
    pub sender_id: String,
    #[serde(default)]
    pub slots: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub latest_message: Option<UserMessage>,
    #[serde(default)]
    pub latest_event_time: Option<f64>,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub latest_action_name: Option<String>,
    #[serde(default)]
    pub followup_action: Option<String>,
    #[serde(default)]
    pub events: Option<Vec<Event>>,
}

fn default_sender_id() -> String {
    DEFAULT_SENDER_ID.into()
}

impl TrackerSnapshot {
    /// Rebuild the tracker this snapshot was taken from. Requires the event
    /// list to be attached.
    pub fn into_tracker(self, domain: Arc<Domain>) -> Result<Tracker, TrackerError> {
        let events = self.events.ok_or(TrackerError::MissingEvents)?;
        Tracker::from_events(self.sender_id, events, domain)
    }
}

/// Restore a tracker from a JSON dump, decoding every event record strictly.
/// One bad record fails the whole restore.
///
/// Accepts snapshots (`sender_id`) as well as persisted dialogues (`name`).
pub fn restore(dump: &serde_json::Value, domain: Arc<Domain>) -> Result<Tracker, TrackerError> {
    let sender_id = dump
        .get("sender_id")
        .or_else(|| dump.get("name"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or(DEFAULT_SENDER_ID)
        .to_string();
    let records = dump
        .get("events")
        .and_then(serde_json::Value::as_array)
        .ok_or(TrackerError::MissingEvents)?;
    Tracker::from_records(sender_id, records.iter().cloned(), domain)
}
