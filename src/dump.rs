//! Reading tracker dumps and rendering them for the command line.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::domain::Domain;
use crate::tracker::{restore, EventVerbosity, Tracker};

/// Load a tracker from a JSON dump file: a snapshot taken with events, or a
/// persisted dialogue.
pub fn read_dump(path: &Path, domain: Arc<Domain>) -> Result<Tracker> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dump: {}", path.display()))?;
    parse_dump(&contents, domain).with_context(|| format!("Invalid dump: {}", path.display()))
}

pub fn parse_dump(contents: &str, domain: Arc<Domain>) -> Result<Tracker> {
    let value: serde_json::Value = serde_json::from_str(contents).context("Dump is not JSON")?;
    Ok(restore(&value, domain)?)
}

/// Pretty JSON snapshot of `tracker` with the requested events attached.
pub fn render_snapshot(tracker: &Tracker, verbosity: EventVerbosity) -> Result<String> {
    serde_json::to_string_pretty(&tracker.current_state(verbosity))
        .context("Failed to serialize tracker snapshot")
}

/// One compact JSON line per decision-point state.
pub fn prior_state_lines(tracker: &Tracker) -> Result<Vec<String>> {
    tracker
        .generate_all_prior_states()
        .map(|state| serde_json::to_string(&state).context("Failed to serialize state"))
        .collect()
}

/// Human-readable summary of a tracker's log and current state.
pub fn summarize(tracker: &Tracker) -> String {
    let mut out = String::new();
    let live = tracker.live_events();
    let actions = live.iter().filter(|e| e.is_action()).count();

    let _ = writeln!(out, "Sender:        {}", tracker.sender_id());
    let _ = writeln!(
        out,
        "Events:        {} logged, {} live, {} live actions",
        tracker.events().len(),
        live.len(),
        actions
    );
    let _ = writeln!(
        out,
        "Latest action: {}",
        tracker.latest_action_name().unwrap_or("(none)")
    );
    let _ = writeln!(
        out,
        "Latest intent: {}",
        tracker
            .latest_message()
            .and_then(|m| m.intent_name())
            .unwrap_or("(none)")
    );
    let _ = writeln!(out, "Topic:         {}", tracker.current_topic());
    let _ = writeln!(out, "Paused:        {}", tracker.is_paused());
    let _ = writeln!(
        out,
        "Followup:      {}",
        tracker.followup_action().unwrap_or("(none)")
    );
    if let Some(time) = tracker.latest_event_time() {
        let _ = writeln!(out, "Last event at: {time}");
    }

    let slots = &tracker.state().slots;
    if slots.is_empty() {
        let _ = writeln!(out, "Slots:         (none)");
    } else {
        let _ = writeln!(out, "Slots:");
        for (name, value) in slots {
            let _ = writeln!(out, "  {name:<12} {value}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tests::test_domain;
    use crate::events::{Event, Intent};
    use tempfile::TempDir;

    fn sample_tracker() -> Tracker {
        let mut tracker = Tracker::new("alice", Arc::new(test_domain()));
        tracker
            .update(Event::user_uttered(
                "hello",
                Some(Intent::new("greet", 0.9)),
                Vec::new(),
            ))
            .unwrap();
        tracker.update(Event::slot_set("name", "Alice")).unwrap();
        tracker.update(Event::action_executed("utter_greet")).unwrap();
        tracker
    }

    #[test]
    fn snapshot_dump_round_trips_through_file() {
        let tracker = sample_tracker();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("alice.json");
        std::fs::write(&path, render_snapshot(&tracker, EventVerbosity::All).unwrap()).unwrap();

        let loaded = read_dump(&path, Arc::new(test_domain())).unwrap();
        assert_eq!(loaded, tracker);
    }

    #[test]
    fn dialogue_dump_is_accepted() {
        let tracker = sample_tracker();
        let bytes = tracker.as_dialogue().to_json_bytes().unwrap();
        let loaded =
            parse_dump(std::str::from_utf8(&bytes).unwrap(), Arc::new(test_domain())).unwrap();
        assert_eq!(loaded.sender_id(), "alice");
        assert_eq!(loaded, tracker);
    }

    #[test]
    fn snapshot_without_events_is_rejected() {
        let tracker = sample_tracker();
        let dump = render_snapshot(&tracker, EventVerbosity::None).unwrap();
        assert!(parse_dump(&dump, Arc::new(test_domain())).is_err());
    }

    #[test]
    fn missing_dump_file_names_the_path() {
        let err = read_dump(Path::new("/nonexistent/dump.json"), Arc::new(test_domain()))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dump.json"));
    }

    #[test]
    fn prior_state_lines_cover_every_decision_point() {
        let tracker = sample_tracker();
        let lines = prior_state_lines(&tracker).unwrap();
        assert_eq!(lines.len(), 3);
        let last: serde_json::Value = serde_json::from_str(&lines[2]).unwrap();
        assert_eq!(last["latest_action_name"], "utter_greet");
        assert_eq!(last["slots"]["name"], "Alice");
    }

    #[test]
    fn summary_lists_state() {
        let summary = summarize(&sample_tracker());
        assert!(summary.contains("Sender:        alice"));
        assert!(summary.contains("4 logged, 4 live, 2 live actions"));
        assert!(summary.contains("Latest intent: greet"));
        assert!(summary.contains("\"Alice\""));
    }
}
