//! Narrative (story) rendering of dialogues.
//!
//! Stories are the human-authored form of a conversation: one line per live
//! event, user turns as `* intent{entities}` and everything else as
//! `    - action` lines. The rendering drops timestamps and confidences, so a
//! round trip preserves the story-visible state rather than the exact log.

pub mod markdown;

pub use markdown::MarkdownStoryCodec;

use crate::state::DialogueState;
use crate::tracker::Dialogue;

#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("line {line}: event before the first '## <name>' header")]
    MissingHeader { line: usize },
    #[error("line {line}: unrecognized story line '{content}'")]
    InvalidLine { line: usize, content: String },
    #[error("line {line}: invalid JSON arguments: {source}")]
    InvalidJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: {message}")]
    InvalidArguments { line: usize, message: String },
}

/// Converts dialogues to and from a textual story format.
pub trait NarrativeCodec: Send + Sync {
    /// Render one story block for `dialogue`.
    fn export(&self, dialogue: &Dialogue) -> String;

    /// Parse every story block in `text`.
    fn parse(&self, text: &str) -> Result<Vec<Dialogue>, NarrativeError>;

    fn name(&self) -> &str;
}

/// Whether two states agree on everything a story line can carry: slots,
/// topic, latest intent and entities, latest action, pause flag and forced
/// action. Message text, confidences and entity order are not compared.
pub fn equivalent_states(a: &DialogueState, b: &DialogueState) -> bool {
    fn entities(state: &DialogueState) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = state
            .latest_message
            .iter()
            .flat_map(|m| m.entities())
            .map(|e| (e.entity.clone(), e.value.to_string()))
            .collect();
        pairs.sort();
        pairs
    }

    a.slots == b.slots
        && a.topic == b.topic
        && a.latest_intent() == b.latest_intent()
        && entities(a) == entities(b)
        && a.latest_action_name == b.latest_action_name
        && a.paused == b.paused
        && a.followup_action == b.followup_action
}
