//! Event model: every fact that can happen in a conversation session.
//!
//! Events are immutable, timestamped values. On the wire each event is a flat
//! JSON record keyed by the `event` discriminant:
//!
//! ```json
//! {"event": "action", "timestamp": 1517821726.211042, "name": "action_listen"}
//! ```

pub mod message;

pub use message::{Entity, Intent, ParseData, UserMessage};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Reserved name of the action that hands the turn back to the user.
pub const ACTION_LISTEN_NAME: &str = "action_listen";

/// Seconds since the UNIX epoch with microsecond resolution.
pub fn now_timestamp() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// A single timestamped fact in a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: f64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Closed set of event variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum EventKind {
    /// The user sent a message.
    #[serde(rename = "user")]
    UserUttered {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        parse_data: ParseData,
    },
    /// The bot sent a message. Has no effect on the materialized state.
    #[serde(rename = "bot")]
    BotUttered {
        #[serde(default)]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// An action was run by the agent.
    #[serde(rename = "action")]
    ActionExecuted {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
    #[serde(rename = "slot")]
    SlotSet {
        name: String,
        value: serde_json::Value,
    },
    #[serde(rename = "topic")]
    TopicSet { topic: String },
    #[serde(rename = "reset_slots")]
    AllSlotsReset,
    /// Resets the conversation and forces the listen action next.
    #[serde(rename = "restart")]
    Restarted,
    /// Forces the named action to be run next.
    #[serde(rename = "followup")]
    FollowupAction { name: String },
    #[serde(rename = "pause")]
    ConversationPaused,
    #[serde(rename = "resume")]
    ConversationResumed,
    /// Cancels the most recent `ActionExecuted`.
    #[serde(rename = "undo")]
    ActionReverted,
    /// Cancels the most recent full user turn.
    #[serde(rename = "rewind")]
    UserUtteranceReverted,
}

impl EventKind {
    /// Wire discriminant of this variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UserUttered { .. } => "user",
            Self::BotUttered { .. } => "bot",
            Self::ActionExecuted { .. } => "action",
            Self::SlotSet { .. } => "slot",
            Self::TopicSet { .. } => "topic",
            Self::AllSlotsReset => "reset_slots",
            Self::Restarted => "restart",
            Self::FollowupAction { .. } => "followup",
            Self::ConversationPaused => "pause",
            Self::ConversationResumed => "resume",
            Self::ActionReverted => "undo",
            Self::UserUtteranceReverted => "rewind",
        }
    }
}

impl Event {
    /// Stamp `kind` with the current time.
    pub fn new(kind: EventKind) -> Self {
        Self::at(now_timestamp(), kind)
    }

    pub fn at(timestamp: f64, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }

    pub fn user_uttered(
        text: impl Into<String>,
        intent: Option<Intent>,
        entities: Vec<Entity>,
    ) -> Self {
        Self::new(EventKind::UserUttered {
            text: Some(text.into()),
            parse_data: ParseData::new(intent, entities),
        })
    }

    pub fn bot_uttered(text: impl Into<String>) -> Self {
        Self::new(EventKind::BotUttered {
            text: Some(text.into()),
            data: None,
        })
    }

    pub fn action_executed(name: impl Into<String>) -> Self {
        Self::new(EventKind::ActionExecuted {
            name: name.into(),
            policy: None,
            confidence: None,
        })
    }

    pub fn action_listen() -> Self {
        Self::action_executed(ACTION_LISTEN_NAME)
    }

    pub fn slot_set(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(EventKind::SlotSet {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn topic_set(topic: impl Into<String>) -> Self {
        Self::new(EventKind::TopicSet {
            topic: topic.into(),
        })
    }

    pub fn followup(name: impl Into<String>) -> Self {
        Self::new(EventKind::FollowupAction { name: name.into() })
    }

    pub fn restarted() -> Self {
        Self::new(EventKind::Restarted)
    }

    pub fn action_reverted() -> Self {
        Self::new(EventKind::ActionReverted)
    }

    pub fn user_utterance_reverted() -> Self {
        Self::new(EventKind::UserUtteranceReverted)
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Name of the executed action, if this is an `action` event.
    pub fn action_name(&self) -> Option<&str> {
        match &self.kind {
            EventKind::ActionExecuted { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self.kind, EventKind::ActionExecuted { .. })
    }

    pub fn is_listen(&self) -> bool {
        self.action_name() == Some(ACTION_LISTEN_NAME)
    }

    pub fn is_user_uttered(&self) -> bool {
        matches!(self.kind, EventKind::UserUttered { .. })
    }

    /// Decode a single persisted record.
    pub fn from_record(record: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(record)
    }

    pub fn to_record(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_record_shape() {
        let event = Event::at(1_517_821_726.211_042, EventKind::ActionExecuted {
            name: ACTION_LISTEN_NAME.into(),
            policy: None,
            confidence: None,
        });
        let record = event.to_record().unwrap();
        assert_eq!(
            record,
            json!({"event": "action", "timestamp": 1_517_821_726.211_042, "name": "action_listen"})
        );
    }

    #[test]
    fn unit_variants_decode_from_bare_tag() {
        let event = Event::from_record(json!({"event": "restart", "timestamp": 3.5})).unwrap();
        assert_eq!(event.kind, EventKind::Restarted);
        assert!((event.timestamp - 3.5).abs() < f64::EPSILON);

        let undo = Event::from_record(json!({"event": "undo", "timestamp": 1.0})).unwrap();
        assert_eq!(undo.type_name(), "undo");
    }

    #[test]
    fn user_record_carries_parse_data() {
        let record = json!({
            "event": "user",
            "timestamp": 10.25,
            "text": "/greet",
            "parse_data": {
                "intent": {"name": "greet", "confidence": 0.75},
                "entities": [{"entity": "name", "value": "holger", "start": 0, "end": 6}]
            }
        });
        let event = Event::from_record(record).unwrap();
        match &event.kind {
            EventKind::UserUttered { text, parse_data } => {
                assert_eq!(text.as_deref(), Some("/greet"));
                assert_eq!(parse_data.intent_name(), Some("greet"));
                assert_eq!(parse_data.entities[0].value, json!("holger"));
                assert_eq!(parse_data.entities[0].end, Some(6));
            }
            other => panic!("expected user event, got {other:?}"),
        }
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        let err = Event::from_record(json!({"event": "teleport", "timestamp": 1.0}));
        assert!(err.is_err());
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        assert!(Event::from_record(json!({"event": "action", "timestamp": 1.0})).is_err());
        assert!(Event::from_record(json!({"event": "action", "name": "x"})).is_err());
        assert!(Event::from_record(json!({"event": "slot", "timestamp": 1.0, "name": "a"})).is_err());
        assert!(Event::from_record(json!({"timestamp": 1.0, "name": "x"})).is_err());
    }

    #[test]
    fn timestamp_survives_text_round_trip_bit_exact() {
        for ts in [1_517_821_726.211_042_f64, 0.1 + 0.2, 1e-7, 1_700_000_000.123_456_7] {
            let event = Event::at(ts, EventKind::ConversationPaused);
            let text = serde_json::to_string(&event).unwrap();
            let back: Event = serde_json::from_str(&text).unwrap();
            assert_eq!(back.timestamp.to_bits(), ts.to_bits());
        }
    }

    #[test]
    fn listen_detection() {
        assert!(Event::action_listen().is_listen());
        assert!(Event::action_listen().is_action());
        assert!(!Event::action_executed("utter_greet").is_listen());
        assert!(!Event::restarted().is_action());
        assert_eq!(Event::slot_set("a", 1).action_name(), None);
    }

    #[test]
    fn now_timestamp_is_recent() {
        assert!(now_timestamp() > 1_500_000_000.0);
    }
}
