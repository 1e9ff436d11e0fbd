//! Structured user message payloads carried by `user` events.

use serde::{Deserialize, Serialize};

/// Intent classification attached to a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl Intent {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// An entity extracted from the raw user text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
}

impl Entity {
    pub fn new(entity: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
            start: None,
            end: None,
            extractor: None,
        }
    }
}

/// Output of the (external) language understanding step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseData {
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intent_ranking: Vec<Intent>,
}

impl ParseData {
    pub fn new(intent: Option<Intent>, entities: Vec<Entity>) -> Self {
        let intent_ranking = intent.iter().cloned().collect();
        Self {
            intent,
            entities,
            intent_ranking,
        }
    }

    pub fn intent_name(&self) -> Option<&str> {
        self.intent.as_ref().map(|i| i.name.as_str())
    }
}

/// The latest user message as exposed by the materialized state and the
/// snapshot record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub text: Option<String>,
    #[serde(flatten)]
    pub parse_data: ParseData,
}

impl UserMessage {
    pub fn intent_name(&self) -> Option<&str> {
        self.parse_data.intent_name()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.parse_data.entities
    }
}
