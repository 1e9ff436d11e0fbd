//! Markdown story codec.
//!
//! ```text
//! ## <name>
//! * greet{"name": "holger"}
//!     - utter_greet
//!     - slot{"name": "holger"}
//!     - topic{"topic": "weather"}
//!     - followup{"name": "utter_ask"}
//!     - restart
//! ```
//!
//! A listen action right before a user turn is implied and left out. A user
//! turn that has no listen in front of it is preceded by a `no_listen` line
//! instead. Actions whose names collide with a step keyword are written as
//! `action{"name": "<name>"}`.

use regex::Regex;
use serde_json::{Map, Value};
use std::fmt::Write;
use std::sync::LazyLock;

use super::{NarrativeCodec, NarrativeError};
use crate::events::{Entity, Event, EventKind, Intent, ParseData, ACTION_LISTEN_NAME};
use crate::tracker::Dialogue;

const USER_PREFIX: &str = "* ";
const ACTION_PREFIX: &str = "    - ";
const NO_LISTEN: &str = "no_listen";

/// Step names with a meaning of their own. Actions named like one of these
/// are written in the `action{"name": ...}` form.
const STEP_KEYWORDS: &[&str] = &[
    "slot",
    "topic",
    "followup",
    "reset_slots",
    "restart",
    "pause",
    "resume",
    "undo",
    "rewind",
    "action",
    NO_LISTEN,
];

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s*(?P<name>.*)$").expect("valid header regex"));
static USER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\s*(?P<intent>[^\s{]*)\s*(?P<args>\{.*\})?\s*$").expect("valid user regex")
});
static STEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-\s*(?P<name>[^\s{]+)\s*(?P<args>\{.*\})?\s*$").expect("valid step regex")
});

/// Story codec for the markdown-like story format.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownStoryCodec;

impl MarkdownStoryCodec {
    /// The story line for a single event, or `None` for events stories do
    /// not carry (bot utterances).
    pub fn story_line(event: &Event) -> Option<String> {
        let step = |body: String| Some(format!("{ACTION_PREFIX}{body}"));
        match &event.kind {
            EventKind::UserUttered { parse_data, .. } => {
                Some(format!("{USER_PREFIX}{}", user_body(parse_data)))
            }
            EventKind::BotUttered { .. } => None,
            EventKind::ActionExecuted { name, .. } => step(action_body(name)),
            EventKind::SlotSet { name, value } => {
                step(format!("slot{}", single_entry(name, value.clone())))
            }
            EventKind::TopicSet { topic } => {
                step(format!("topic{}", single_entry("topic", Value::from(topic.as_str()))))
            }
            EventKind::FollowupAction { name } => {
                step(format!("followup{}", single_entry("name", Value::from(name.as_str()))))
            }
            EventKind::AllSlotsReset
            | EventKind::Restarted
            | EventKind::ConversationPaused
            | EventKind::ConversationResumed
            | EventKind::ActionReverted
            | EventKind::UserUtteranceReverted => step(event.type_name().to_string()),
        }
    }
}

fn action_body(name: &str) -> String {
    let plain = !name.is_empty()
        && !STEP_KEYWORDS.contains(&name)
        && !name.contains(|c: char| c.is_whitespace() || c == '{');
    if plain {
        name.to_string()
    } else {
        format!("action{}", single_entry("name", Value::from(name)))
    }
}

fn user_body(parse_data: &ParseData) -> String {
    let intent = parse_data.intent_name().unwrap_or_default();
    if parse_data.entities.is_empty() {
        return intent.to_string();
    }
    let entities: Map<String, Value> = parse_data
        .entities
        .iter()
        .map(|e| (e.entity.clone(), e.value.clone()))
        .collect();
    format!("{intent}{}", Value::Object(entities))
}

fn single_entry(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn parse_args(line: usize, raw: Option<&str>) -> Result<Map<String, Value>, NarrativeError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(NarrativeError::InvalidArguments {
            line,
            message: "arguments must be a JSON object".into(),
        }),
        Err(source) => Err(NarrativeError::InvalidJson { line, source }),
    }
}

fn string_arg(
    line: usize,
    args: &Map<String, Value>,
    key: &str,
) -> Result<String, NarrativeError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| NarrativeError::InvalidArguments {
            line,
            message: format!("expected a string '{key}' argument"),
        })
}

fn parse_user(line: usize, intent: &str, raw_args: Option<&str>) -> Result<Event, NarrativeError> {
    let args = parse_args(line, raw_args)?;
    if intent.is_empty() && args.is_empty() {
        return Ok(Event::new(EventKind::UserUttered {
            text: None,
            parse_data: ParseData::default(),
        }));
    }
    let entities = args
        .iter()
        .map(|(name, value)| Entity::new(name.clone(), value.clone()))
        .collect();
    let text = format!("/{intent}{}", raw_args.unwrap_or_default());
    let intent = (!intent.is_empty()).then(|| Intent::new(intent, 1.0));
    Ok(Event::user_uttered(text, intent, entities))
}

fn parse_step(
    line: usize,
    name: &str,
    raw_args: Option<&str>,
) -> Result<Vec<Event>, NarrativeError> {
    let args = parse_args(line, raw_args)?;
    let unit = |kind: EventKind| -> Result<Vec<Event>, NarrativeError> {
        if args.is_empty() {
            Ok(vec![Event::new(kind)])
        } else {
            Err(NarrativeError::InvalidArguments {
                line,
                message: format!("'{name}' takes no arguments"),
            })
        }
    };
    match name {
        "slot" => {
            if args.is_empty() {
                return Err(NarrativeError::InvalidArguments {
                    line,
                    message: "slot line needs at least one key".into(),
                });
            }
            Ok(args
                .iter()
                .map(|(key, value)| Event::slot_set(key.clone(), value.clone()))
                .collect())
        }
        "topic" => Ok(vec![Event::topic_set(string_arg(line, &args, "topic")?)]),
        "followup" => Ok(vec![Event::followup(string_arg(line, &args, "name")?)]),
        "reset_slots" => unit(EventKind::AllSlotsReset),
        "restart" => unit(EventKind::Restarted),
        "pause" => unit(EventKind::ConversationPaused),
        "resume" => unit(EventKind::ConversationResumed),
        "undo" => unit(EventKind::ActionReverted),
        "rewind" => unit(EventKind::UserUtteranceReverted),
        "action" => Ok(vec![Event::action_executed(string_arg(line, &args, "name")?)]),
        action => {
            if args.is_empty() {
                Ok(vec![Event::action_executed(action)])
            } else {
                Err(NarrativeError::InvalidArguments {
                    line,
                    message: format!("action '{action}' takes no arguments"),
                })
            }
        }
    }
}

impl NarrativeCodec for MarkdownStoryCodec {
    fn export(&self, dialogue: &Dialogue) -> String {
        let mut out = format!("## {}\n", dialogue.name);
        // whether the parser will see a listen as the last event so far
        let mut after_listen = false;
        let mut events = dialogue.events.iter().peekable();
        while let Some(event) = events.next() {
            // a listen right before a user turn is implied by the turn itself
            if event.is_listen() && events.peek().is_some_and(|next| next.is_user_uttered()) {
                after_listen = true;
                continue;
            }
            if event.is_user_uttered() && !after_listen {
                let _ = writeln!(out, "{ACTION_PREFIX}{NO_LISTEN}");
            }
            if let Some(line) = Self::story_line(event) {
                let _ = writeln!(out, "{line}");
                after_listen = event.is_listen();
            }
        }
        out
    }

    fn parse(&self, text: &str) -> Result<Vec<Dialogue>, NarrativeError> {
        let mut stories: Vec<Dialogue> = Vec::new();
        let mut skip_listen = false;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with("<!--") {
                continue;
            }

            if let Some(caps) = HEADER_RE.captures(trimmed) {
                let name = caps.name("name").map_or("", |m| m.as_str()).trim();
                stories.push(Dialogue::new(name, Vec::new()));
                skip_listen = false;
                continue;
            }

            let story = stories
                .last_mut()
                .ok_or(NarrativeError::MissingHeader { line })?;

            if let Some(caps) = USER_RE.captures(trimmed) {
                let intent = caps.name("intent").map_or("", |m| m.as_str());
                let args = caps.name("args").map(|m| m.as_str());
                let event = parse_user(line, intent, args)?;
                if !skip_listen && !story.events.last().is_some_and(Event::is_listen) {
                    story.events.push(Event::action_executed(ACTION_LISTEN_NAME));
                }
                skip_listen = false;
                story.events.push(event);
            } else if let Some(caps) = STEP_RE.captures(trimmed) {
                let name = caps.name("name").map_or("", |m| m.as_str());
                let args = caps.name("args").map(|m| m.as_str());
                if skip_listen {
                    return Err(NarrativeError::InvalidArguments {
                        line,
                        message: format!("'{NO_LISTEN}' must be followed by a user turn"),
                    });
                }
                if name == NO_LISTEN {
                    if args.is_some() {
                        return Err(NarrativeError::InvalidArguments {
                            line,
                            message: format!("'{NO_LISTEN}' takes no arguments"),
                        });
                    }
                    skip_listen = true;
                    continue;
                }
                story.events.extend(parse_step(line, name, args)?);
            } else {
                return Err(NarrativeError::InvalidLine {
                    line,
                    content: trimmed.to_string(),
                });
            }
        }

        tracing::debug!(stories = stories.len(), "Parsed story file");
        Ok(stories)
    }

    fn name(&self) -> &str {
        "markdown"
    }
}
