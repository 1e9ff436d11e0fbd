#![no_main]
use dialogue_tracker::{Dialogue, Domain, Event, Tracker};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Ok(event) = Event::from_record(record) {
            let _ = event.to_record();
        }
    }
    if let Ok(dialogue) = Dialogue::from_json_slice(data) {
        // Replay must never panic, whatever mix of reverts and restarts it holds.
        if let Ok(tracker) = Tracker::from_dialogue(dialogue, Arc::new(Domain::default())) {
            let _ = tracker.generate_all_prior_states().count();
        }
    }
});
