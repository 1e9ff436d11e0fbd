//! Materialized conversation state and the per-event reducer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::Domain;
use crate::events::{Event, EventKind, UserMessage, ACTION_LISTEN_NAME};

/// The view of a conversation obtained by folding its live events in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueState {
    pub slots: BTreeMap<String, serde_json::Value>,
    pub topic: String,
    pub latest_message: Option<UserMessage>,
    pub latest_action_name: Option<String>,
    pub paused: bool,
    pub followup_action: Option<String>,
}

impl DialogueState {
    /// State before any event: domain slot defaults and the default topic.
    pub fn initial(domain: &Domain) -> Self {
        Self {
            slots: domain.initial_slot_values(),
            topic: domain.default_topic.clone(),
            latest_message: None,
            latest_action_name: None,
            paused: false,
            followup_action: None,
        }
    }

    /// Fold `events` from the initial state.
    pub fn replay<'a, I>(domain: &Domain, events: I) -> Self
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut state = Self::initial(domain);
        for event in events {
            state.apply(event, domain);
        }
        state
    }

    /// Apply a single non-revert event.
    ///
    /// Revert markers need the surrounding history and are resolved by the
    /// tracker before folding; here they leave the state untouched.
    pub fn apply(&mut self, event: &Event, domain: &Domain) {
        match &event.kind {
            EventKind::UserUttered { text, parse_data } => {
                self.latest_message = Some(UserMessage {
                    text: text.clone(),
                    parse_data: parse_data.clone(),
                });
            }
            EventKind::BotUttered { .. } => {}
            EventKind::ActionExecuted { name, .. } => {
                self.latest_action_name = Some(name.clone());
                self.followup_action = None;
            }
            EventKind::SlotSet { name, value } => {
                self.slots.insert(name.clone(), value.clone());
            }
            EventKind::TopicSet { topic } => {
                self.topic = topic.clone();
            }
            EventKind::AllSlotsReset => {
                self.slots = domain.initial_slot_values();
            }
            EventKind::Restarted => {
                *self = Self::initial(domain);
                self.followup_action = Some(ACTION_LISTEN_NAME.to_string());
            }
            EventKind::FollowupAction { name } => {
                self.followup_action = Some(name.clone());
            }
            EventKind::ConversationPaused => self.paused = true,
            EventKind::ConversationResumed => self.paused = false,
            EventKind::ActionReverted | EventKind::UserUtteranceReverted => {}
        }
    }

    pub fn get_slot(&self, name: &str) -> Option<&serde_json::Value> {
        self.slots.get(name)
    }

    pub fn latest_intent(&self) -> Option<&str> {
        self.latest_message.as_ref().and_then(|m| m.intent_name())
    }
}
