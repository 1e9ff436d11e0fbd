//! Session tracker: owns one conversation's event log and the state derived
//! from it.

pub mod dialogue;
pub mod history;
pub mod snapshot;

pub use dialogue::Dialogue;
pub use history::{applied_events, PriorStates};
pub use snapshot::{restore, EventVerbosity, TrackerSnapshot};

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::domain::{Domain, SchemaViolation};
use crate::events::{Event, EventKind, UserMessage};
use crate::narrative::{MarkdownStoryCodec, NarrativeCodec};
use crate::state::DialogueState;

/// Session id used when a dump does not name one.
pub const DEFAULT_SENDER_ID: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("event rejected: {0}")]
    Schema(#[from] SchemaViolation),
    #[error("malformed event record at index {index}: {source}")]
    MalformedRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot has no event list to rebuild from")]
    MissingEvents,
}

/// Event log plus materialized state for a single session.
///
/// The state always equals the fold of [`Tracker::live_events`]; reverts are
/// appended to the log like any other event and resolved by replay.
#[derive(Debug, Clone)]
pub struct Tracker {
    sender_id: String,
    domain: Arc<Domain>,
    events: Vec<Event>,
    state: DialogueState,
}

impl PartialEq for Tracker {
    fn eq(&self, other: &Self) -> bool {
        self.sender_id == other.sender_id
            && self.events == other.events
            && self.state == other.state
    }
}

impl Tracker {
    /// A fresh session: the log holds a single listen action.
    pub fn new(sender_id: impl Into<String>, domain: Arc<Domain>) -> Self {
        let mut tracker = Self::empty(sender_id, domain);
        tracker.push_unchecked(Event::action_listen());
        tracker
    }

    /// A tracker with an empty log.
    pub fn empty(sender_id: impl Into<String>, domain: Arc<Domain>) -> Self {
        let state = DialogueState::initial(&domain);
        Self {
            sender_id: sender_id.into(),
            domain,
            events: Vec::new(),
            state,
        }
    }

    /// Rebuild from a full log. Every event is checked against the domain
    /// before anything is folded.
    pub fn from_events(
        sender_id: impl Into<String>,
        events: Vec<Event>,
        domain: Arc<Domain>,
    ) -> Result<Self, TrackerError> {
        for event in &events {
            domain.check_event(event)?;
        }
        let mut tracker = Self::empty(sender_id, domain);
        tracker.events = events;
        tracker.replay();
        Ok(tracker)
    }

    pub fn from_dialogue(dialogue: Dialogue, domain: Arc<Domain>) -> Result<Self, TrackerError> {
        Self::from_events(dialogue.name, dialogue.events, domain)
    }

    /// Decode raw JSON event records and rebuild. Fails on the first record
    /// that does not decode.
    pub fn from_records<I>(
        sender_id: impl Into<String>,
        records: I,
        domain: Arc<Domain>,
    ) -> Result<Self, TrackerError>
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        let events = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                Event::from_record(record)
                    .map_err(|source| TrackerError::MalformedRecord { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_events(sender_id, events, domain)
    }

    /// Replace this tracker's log with `dialogue`'s. On error the tracker is
    /// left as it was.
    pub fn recreate_from_dialogue(&mut self, dialogue: Dialogue) -> Result<(), TrackerError> {
        let rebuilt = Self::from_dialogue(dialogue, Arc::clone(&self.domain))?;
        *self = rebuilt;
        Ok(())
    }

    /// Append `event` and fold it into the state.
    ///
    /// Events that violate the domain schema are rejected and leave both the
    /// log and the state untouched.
    pub fn update(&mut self, event: Event) -> Result<(), TrackerError> {
        if let Err(violation) = self.domain.check_event(&event) {
            tracing::warn!(
                sender_id = %self.sender_id,
                event = event.type_name(),
                error = %violation,
                "Rejected event"
            );
            return Err(violation.into());
        }
        self.push_unchecked(event);
        Ok(())
    }

    fn push_unchecked(&mut self, event: Event) {
        let needs_replay = matches!(
            event.kind,
            EventKind::ActionReverted | EventKind::UserUtteranceReverted
        );
        if !needs_replay {
            self.state.apply(&event, &self.domain);
        }
        self.events.push(event);
        if needs_replay {
            self.replay();
        }
    }

    fn replay(&mut self) {
        self.state = DialogueState::replay(&self.domain, applied_events(&self.events));
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    /// The full, append-only log.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events still in effect after resolving reverts and restarts.
    pub fn live_events(&self) -> Vec<&Event> {
        applied_events(&self.events)
    }

    pub fn state(&self) -> &DialogueState {
        &self.state
    }

    pub fn latest_message(&self) -> Option<&UserMessage> {
        self.state.latest_message.as_ref()
    }

    pub fn latest_action_name(&self) -> Option<&str> {
        self.state.latest_action_name.as_deref()
    }

    pub fn followup_action(&self) -> Option<&str> {
        self.state.followup_action.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn current_topic(&self) -> &str {
        &self.state.topic
    }

    pub fn get_slot(&self, name: &str) -> Option<&serde_json::Value> {
        self.state.get_slot(name)
    }

    pub fn latest_event_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.timestamp)
    }

    /// Values of every `entity` extracted from the latest user message.
    pub fn get_latest_entity_values<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = &'a serde_json::Value> + 'a {
        self.latest_message()
            .into_iter()
            .flat_map(|m| m.entities().iter())
            .filter(move |e| e.entity == entity)
            .map(|e| &e.value)
    }

    /// States at every decision point: one per live action (taken just before
    /// it) plus the current state. Each call starts a new pass over the log.
    pub fn generate_all_prior_states(&self) -> PriorStates<'_> {
        PriorStates::new(&self.domain, self.live_events())
    }

    /// A new tracker holding only the events stamped at or before `cutoff`.
    pub fn travel_back_in_time(&self, cutoff: f64) -> Tracker {
        let mut past = Self::empty(self.sender_id.clone(), Arc::clone(&self.domain));
        past.events = self
            .events
            .iter()
            .filter(|e| e.timestamp <= cutoff)
            .cloned()
            .collect();
        past.replay();
        past
    }

    pub fn as_dialogue(&self) -> Dialogue {
        Dialogue::new(self.sender_id.clone(), self.events.clone())
    }

    pub fn current_state(&self, verbosity: EventVerbosity) -> TrackerSnapshot {
        let events = match verbosity {
            EventVerbosity::None => None,
            EventVerbosity::Applied => Some(self.live_events().into_iter().cloned().collect()),
            EventVerbosity::All => Some(self.events.clone()),
        };
        TrackerSnapshot {
            sender_id: self.sender_id.clone(),
            slots: self.state.slots.clone(),
            latest_message: self.state.latest_message.clone(),
            latest_event_time: self.latest_event_time(),
            paused: self.state.paused,
            latest_action_name: self.state.latest_action_name.clone(),
            followup_action: self.state.followup_action.clone(),
            events,
        }
    }

    /// Render the live events as a story block.
    pub fn export_stories(&self) -> String {
        let live = Dialogue::new(
            self.sender_id.clone(),
            self.live_events().into_iter().cloned().collect(),
        );
        MarkdownStoryCodec.export(&live)
    }

    /// Append the story rendering to `path`, creating the file if needed.
    pub fn export_stories_to_file(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", self.export_stories())
    }
}
