//! Domain schema consumed by trackers: slot definitions, topic vocabulary and
//! the action inventory. Loading a domain is the caller's job; this module
//! only defines the contract and the event checks trackers run against it.

pub mod slots;

pub use slots::{SlotDefinition, SlotKind};

use anyhow::{bail, Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::events::{Event, EventKind, ACTION_LISTEN_NAME};

/// Topic used when a domain does not name one.
pub const DEFAULT_TOPIC: &str = "default";

/// An event that references something the domain does not define.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("unknown slot '{slot}'")]
    UnknownSlot { slot: String },
    #[error("slot '{slot}' expects a {expected} value, got {value}")]
    InvalidSlotValue {
        slot: String,
        expected: &'static str,
        value: serde_json::Value,
    },
    #[error("unknown topic '{topic}'")]
    UnknownTopic { topic: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Domain {
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
    /// Known topics. The default topic is always accepted, listed or not.
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_topic")]
    pub default_topic: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

fn default_topic() -> String {
    DEFAULT_TOPIC.into()
}

impl Default for Domain {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            topics: Vec::new(),
            default_topic: default_topic(),
            actions: vec![ACTION_LISTEN_NAME.into()],
        }
    }
}

impl Domain {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let domain: Domain = toml::from_str(contents).context("Failed to parse domain")?;
        domain.validate()?;
        Ok(domain)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read domain file: {}", path.display()))?;
        let domain = Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid domain file: {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            slots = domain.slots.len(),
            topics = domain.topics.len(),
            "Domain loaded"
        );
        Ok(domain)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_topic.trim().is_empty() {
            bail!("default_topic must not be empty");
        }
        let mut seen = HashSet::new();
        for slot in &self.slots {
            if slot.name.trim().is_empty() {
                bail!("slot names must not be empty");
            }
            if !seen.insert(slot.name.as_str()) {
                bail!("duplicate slot '{}'", slot.name);
            }
            if !slot.kind.accepts(&slot.initial_value) {
                bail!(
                    "initial value of slot '{}' is not a valid {} value",
                    slot.name,
                    slot.kind.type_name()
                );
            }
        }
        Ok(())
    }

    pub fn slot(&self, name: &str) -> Option<&SlotDefinition> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn is_known_topic(&self, topic: &str) -> bool {
        topic == self.default_topic || self.topics.iter().any(|t| t == topic)
    }

    /// Slot map every conversation starts from.
    pub fn initial_slot_values(&self) -> BTreeMap<String, serde_json::Value> {
        self.slots
            .iter()
            .map(|s| (s.name.clone(), s.initial_value.clone()))
            .collect()
    }

    /// Reject events that reference undefined slots or topics, or carry a
    /// slot value of the wrong type.
    pub fn check_event(&self, event: &Event) -> Result<(), SchemaViolation> {
        match &event.kind {
            EventKind::SlotSet { name, value } => {
                let slot = self.slot(name).ok_or_else(|| SchemaViolation::UnknownSlot {
                    slot: name.clone(),
                })?;
                if !slot.kind.accepts(value) {
                    return Err(SchemaViolation::InvalidSlotValue {
                        slot: name.clone(),
                        expected: slot.kind.type_name(),
                        value: value.clone(),
                    });
                }
                Ok(())
            }
            EventKind::TopicSet { topic } if !self.is_known_topic(topic) => {
                Err(SchemaViolation::UnknownTopic {
                    topic: topic.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}
