//! Revert resolution and decision-point history.

use crate::domain::Domain;
use crate::events::{Event, EventKind};
use crate::state::DialogueState;

/// Resolve reverts and restarts over the full log, returning the events that
/// still shape the visible state, in order.
///
/// Revert markers never appear in the result. A restart drops everything
/// before it but stays in the result so folding it resets the state.
pub fn applied_events(events: &[Event]) -> Vec<&Event> {
    let mut applied: Vec<&Event> = Vec::with_capacity(events.len());
    for event in events {
        match &event.kind {
            EventKind::Restarted => {
                applied.clear();
                applied.push(event);
            }
            EventKind::ActionReverted => undo_last_action(&mut applied),
            EventKind::UserUtteranceReverted => rewind_last_turn(&mut applied),
            _ => applied.push(event),
        }
    }
    applied
}

/// Pop events up to and including the most recent action. Empties the list
/// when there is no action left to cancel.
fn undo_last_action(applied: &mut Vec<&Event>) {
    while let Some(event) = applied.pop() {
        if event.is_action() {
            break;
        }
    }
}

/// Drop the last user message, the listen action that preceded it and
/// everything after. Without such a pair the conversation rewinds to the start.
fn rewind_last_turn(applied: &mut Vec<&Event>) {
    let cut = applied
        .iter()
        .rposition(|e| e.is_user_uttered())
        .and_then(|user_idx| applied[..user_idx].iter().rposition(|e| e.is_listen()))
        .unwrap_or(0);
    applied.truncate(cut);
}

/// Lazy sequence of states at every decision point: the state right before
/// each applied action, then the state after the last applied event.
pub struct PriorStates<'a> {
    domain: &'a Domain,
    events: std::vec::IntoIter<&'a Event>,
    state: DialogueState,
    finished: bool,
}

impl<'a> PriorStates<'a> {
    pub(crate) fn new(domain: &'a Domain, applied: Vec<&'a Event>) -> Self {
        Self {
            domain,
            events: applied.into_iter(),
            state: DialogueState::initial(domain),
            finished: false,
        }
    }
}

impl Iterator for PriorStates<'_> {
    type Item = DialogueState;

    fn next(&mut self) -> Option<DialogueState> {
        if self.finished {
            return None;
        }
        for event in self.events.by_ref() {
            if event.is_action() {
                let before = self.state.clone();
                self.state.apply(event, self.domain);
                return Some(before);
            }
            self.state.apply(event, self.domain);
        }
        self.finished = true;
        Some(self.state.clone())
    }
}

impl std::iter::FusedIterator for PriorStates<'_> {}
