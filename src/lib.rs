#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::doc_markdown,
    clippy::float_cmp,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_map_or,
    clippy::unused_self
)]

use clap::Subcommand;
use std::path::PathBuf;

pub mod config;
pub mod domain;
pub mod dump;
pub mod events;
pub mod narrative;
pub mod state;
pub mod store;
pub mod tracker;

pub use config::Config;
pub use domain::{Domain, SchemaViolation};
pub use events::{Event, EventKind};
pub use state::DialogueState;
pub use store::{create_tracker_store, StoreError, TrackerStore};
pub use tracker::{Dialogue, EventVerbosity, Tracker, TrackerError};

/// Tracker store subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum StoreCommands {
    /// Print the stored tracker for a sender as a JSON snapshot
    Get {
        /// Sender (conversation) id
        sender_id: String,
        /// Which events to include in the snapshot
        #[arg(long, value_enum, default_value = "all")]
        events: EventVerbosity,
    },
    /// Write a tracker dump into the configured store
    #[command(long_about = "\
Write a tracker dump into the configured store.

The dump is a JSON snapshot taken with events (as printed by \
'store get') or a persisted dialogue ({\"name\": ..., \"events\": [...]}). \
Whatever was stored for the same sender is replaced.

Examples:
  dialogue-tracker store save alice.json")]
    Save {
        /// Path to the JSON dump
        dump: PathBuf,
    },
    /// List sender ids with a stored tracker
    List,
}
