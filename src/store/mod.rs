pub mod in_memory;
pub mod key_value;
pub mod kv;
pub mod traits;

pub use in_memory::InMemoryTrackerStore;
pub use key_value::KeyValueTrackerStore;
pub use kv::{HttpKeyValue, InMemoryKeyValue, KeyValueBackend, SqliteKeyValue};
pub use traits::{StoreError, TrackerStore};

use crate::config::TrackerStoreConfig;
use crate::domain::Domain;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Normalized tracker store backend name.
pub fn effective_store_backend_name(backend: &str) -> String {
    backend.trim().to_ascii_lowercase()
}

/// Factory: create the configured tracker store, bound to `domain`.
pub fn create_tracker_store(
    config: &TrackerStoreConfig,
    domain: Arc<Domain>,
) -> anyhow::Result<Box<dyn TrackerStore>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let record_exp = config.record_exp_secs.map(Duration::from_secs);
    let backend = effective_store_backend_name(&config.backend);

    let store: Box<dyn TrackerStore> = match backend.as_str() {
        "memory" | "in_memory" => Box::new(InMemoryTrackerStore::new(domain)),
        "sqlite" => {
            let path = PathBuf::from(shellexpand::tilde(&config.sqlite_path).as_ref());
            Box::new(
                KeyValueTrackerStore::new(SqliteKeyValue::open(&path)?, domain)
                    .with_key_prefix(config.key_prefix.clone())
                    .with_timeout(timeout)
                    .with_record_expiry(record_exp),
            )
        }
        "http" => {
            let url = config
                .url
                .as_deref()
                .filter(|url| !url.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("tracker_store.url is required for the http backend"))?;
            Box::new(
                KeyValueTrackerStore::new(HttpKeyValue::new(url, timeout), domain)
                    .with_key_prefix(config.key_prefix.clone())
                    .with_timeout(timeout)
                    .with_record_expiry(record_exp),
            )
        }
        other => anyhow::bail!("Unknown tracker store backend '{other}'"),
    };

    tracing::info!(backend = store.name(), "Tracker store ready");
    Ok(store)
}

// ── CLI handler ──

/// Handle `dialogue-tracker store <subcommand>` CLI commands.
pub async fn handle_store_command(
    command: crate::StoreCommands,
    config: &crate::config::Config,
) -> anyhow::Result<()> {
    let domain = Arc::new(config.load_domain()?);
    let store = create_tracker_store(&config.tracker_store, Arc::clone(&domain))?;

    match command {
        crate::StoreCommands::Get { sender_id, events } => {
            let Some(tracker) = store.retrieve(&sender_id).await? else {
                anyhow::bail!("No tracker stored for '{sender_id}' in the {} store", store.name());
            };
            println!("{}", crate::dump::render_snapshot(&tracker, events)?);
            Ok(())
        }
        crate::StoreCommands::Save { dump } => {
            let tracker = crate::dump::read_dump(&dump, domain)?;
            store.save(&tracker).await?;
            println!(
                "Saved tracker '{}' ({} events) to the {} store",
                tracker.sender_id(),
                tracker.events().len(),
                store.name()
            );
            Ok(())
        }
        crate::StoreCommands::List => {
            let keys = store.keys().await?;
            if keys.is_empty() {
                println!("No trackers stored.");
            } else {
                for key in keys {
                    println!("{key}");
                }
            }
            Ok(())
        }
    }
}
