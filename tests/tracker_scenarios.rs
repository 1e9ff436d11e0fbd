//! End-to-end conversation scenarios: revert handling, decision-point
//! history and persistence of reverted trackers.

use std::sync::Arc;

use dialogue_tracker::events::{Entity, Intent, ACTION_LISTEN_NAME};
use dialogue_tracker::store::{InMemoryKeyValue, KeyValueTrackerStore};
use dialogue_tracker::{Domain, Event, EventVerbosity, Tracker, TrackerStore};

fn domain() -> Arc<Domain> {
    Arc::new(
        Domain::from_toml_str(
            r#"
            topics = ["weather", "smalltalk"]
            actions = ["action_listen", "my_action", "utter_greet", "utter_goodbye"]

            [[slots]]
            name = "location"
            type = "text"

            [[slots]]
            name = "mood"
            type = "categorical"
            values = ["happy", "sad"]
            "#,
        )
        .unwrap(),
    )
}

fn user(intent: &str) -> Event {
    Event::user_uttered(
        format!("/{intent}"),
        Some(Intent::new(intent, 1.0)),
        Vec::new(),
    )
}

#[test]
fn action_revert_collapses_one_decision_point() {
    let mut tracker = Tracker::empty("s1", domain());
    for event in [
        Event::action_listen(),
        user("greet"),
        Event::action_executed("my_action"),
        Event::action_listen(),
    ] {
        tracker.update(event).unwrap();
    }
    assert_eq!(tracker.generate_all_prior_states().count(), 4);

    tracker.update(Event::action_reverted()).unwrap();
    assert_eq!(tracker.latest_action_name(), Some("my_action"));
    assert_eq!(tracker.generate_all_prior_states().count(), 3);
}

#[test]
fn utterance_revert_restores_first_turn() {
    let mut tracker = Tracker::empty("s2", domain());
    for event in [
        Event::action_listen(),
        user("greet"),
        Event::action_executed("utter_greet"),
        Event::action_listen(),
        user("goodbye"),
        Event::action_executed("utter_goodbye"),
        Event::action_listen(),
    ] {
        tracker.update(event).unwrap();
    }
    assert_eq!(tracker.generate_all_prior_states().count(), 6);

    tracker.update(Event::user_utterance_reverted()).unwrap();
    assert_eq!(tracker.latest_action_name(), Some("utter_greet"));
    assert_eq!(tracker.latest_message().unwrap().intent_name(), Some("greet"));
    assert_eq!(tracker.generate_all_prior_states().count(), 3);
    assert_eq!(tracker.events().len(), 8);
}

#[test]
fn restart_resets_to_domain_defaults() {
    let mut tracker = Tracker::new("s3", domain());
    tracker.update(user("greet")).unwrap();
    tracker.update(Event::slot_set("location", "Paris")).unwrap();
    tracker.update(Event::topic_set("weather")).unwrap();
    tracker.update(Event::action_executed("utter_greet")).unwrap();

    tracker.update(Event::restarted()).unwrap();

    assert_eq!(tracker.get_slot("location"), Some(&serde_json::Value::Null));
    assert_eq!(tracker.current_topic(), "default");
    assert!(tracker.latest_message().is_none());
    assert_eq!(tracker.followup_action(), Some(ACTION_LISTEN_NAME));
    assert_eq!(tracker.generate_all_prior_states().count(), 1);
}

#[test]
fn replay_is_deterministic() {
    let mut tracker = Tracker::new("s4", domain());
    tracker
        .update(Event::user_uttered(
            "I feel great in Rome",
            Some(Intent::new("inform", 0.71)),
            vec![Entity::new("location", "Rome"), Entity::new("mood", "happy")],
        ))
        .unwrap();
    tracker.update(Event::slot_set("mood", "Happy")).unwrap();
    tracker.update(Event::action_executed("my_action")).unwrap();
    tracker.update(Event::action_reverted()).unwrap();

    let first = Tracker::from_events("s4", tracker.events().to_vec(), domain()).unwrap();
    let second = Tracker::from_events("s4", tracker.events().to_vec(), domain()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, tracker);
}

#[test]
fn invalid_event_leaves_tracker_untouched() {
    let mut tracker = Tracker::new("s5", domain());
    let before = tracker.clone();

    assert!(tracker.update(Event::slot_set("mood", "angry")).is_err());
    assert!(tracker.update(Event::slot_set("shoe_size", 42)).is_err());
    assert!(tracker.update(Event::topic_set("politics")).is_err());
    assert_eq!(tracker, before);
}

#[test]
fn time_travel_leaves_source_untouched() {
    let mut tracker = Tracker::empty("s6", domain());
    tracker
        .update(Event::at(1.0, Event::action_listen().kind))
        .unwrap();
    tracker.update(Event::at(2.0, user("greet").kind)).unwrap();
    tracker
        .update(Event::at(3.0, Event::slot_set("location", "Oslo").kind))
        .unwrap();

    let past = tracker.travel_back_in_time(2.0);
    assert_eq!(past.events().len(), 2);
    assert_eq!(past.get_slot("location"), Some(&serde_json::Value::Null));
    assert_eq!(tracker.events().len(), 3);
    assert_eq!(tracker.get_slot("location"), Some(&serde_json::json!("Oslo")));
}

#[test]
fn snapshot_records_rebuild_identical_tracker() {
    let mut tracker = Tracker::new("s7", domain());
    tracker.update(user("greet")).unwrap();
    tracker.update(Event::action_executed("utter_greet")).unwrap();
    tracker.update(Event::user_utterance_reverted()).unwrap();

    let snapshot = tracker.current_state(EventVerbosity::All);
    let records: Vec<serde_json::Value> = snapshot
        .events
        .unwrap()
        .iter()
        .map(|e| e.to_record().unwrap())
        .collect();
    let rebuilt = Tracker::from_records("s7", records, domain()).unwrap();
    assert_eq!(rebuilt, tracker);
}

#[tokio::test]
async fn reverted_tracker_persists_and_reloads() {
    let store = KeyValueTrackerStore::new(InMemoryKeyValue::new(), domain());
    let mut tracker = store.get_or_create("s8").await.unwrap();
    for event in [
        user("greet"),
        Event::action_executed("utter_greet"),
        Event::action_listen(),
        user("goodbye"),
        Event::action_executed("utter_goodbye"),
        Event::user_utterance_reverted(),
    ] {
        tracker.update(event).unwrap();
    }
    store.save(&tracker).await.unwrap();

    let reloaded = store.retrieve("s8").await.unwrap().unwrap();
    assert_eq!(reloaded, tracker);
    assert_eq!(reloaded.latest_action_name(), Some("utter_greet"));
    assert_eq!(
        reloaded.generate_all_prior_states().count(),
        tracker.generate_all_prior_states().count()
    );
}
