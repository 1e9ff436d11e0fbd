use anyhow::{Context, Result};
use directories::UserDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::domain::Domain;
use crate::store::effective_store_backend_name;

const CONFIG_DIR_ENV: &str = "DIALOGUE_TRACKER_CONFIG_DIR";
const SUPPORTED_STORE_BACKENDS: &[&str] = &["memory", "in_memory", "sqlite", "http"];

// ── Top-level config ──────────────────────────────────────────────

/// Top-level configuration, loaded from `config.toml`.
///
/// Resolution order: `--config-dir` flag → `DIALOGUE_TRACKER_CONFIG_DIR` env →
/// `~/.dialogue-tracker/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Domain schema file (TOML). `~` is expanded. Overridden by `DIALOGUE_TRACKER_DOMAIN`.
    /// When unset, trackers are bound to an empty domain.
    #[serde(default)]
    pub domain_path: Option<String>,

    /// Tracker persistence backend (`[tracker_store]`).
    #[serde(default)]
    pub tracker_store: TrackerStoreConfig,
}

// ── Tracker store ─────────────────────────────────────────────────

/// Tracker store configuration (`[tracker_store]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TrackerStoreConfig {
    /// `"memory"`, `"sqlite"` or `"http"`. Default: `"memory"`.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Base URL of the key-value service, required for the `http` backend.
    #[serde(default)]
    pub url: Option<String>,
    /// Prefix prepended to every sender id to form the record key. Default: `"tracker:"`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Upper bound for a single backend call, in seconds. Default: `5`.
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
    /// Expire stored trackers this many seconds after their last save. Unset keeps them forever.
    #[serde(default)]
    pub record_exp_secs: Option<u64>,
    /// Database file for the `sqlite` backend. `~` is expanded.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

fn default_store_backend() -> String {
    "memory".into()
}

fn default_key_prefix() -> String {
    crate::store::key_value::DEFAULT_KEY_PREFIX.into()
}

fn default_store_timeout_secs() -> u64 {
    crate::store::key_value::DEFAULT_TIMEOUT.as_secs()
}

fn default_sqlite_path() -> String {
    "~/.dialogue-tracker/trackers.db".into()
}

impl Default for TrackerStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: None,
            key_prefix: default_key_prefix(),
            timeout_secs: default_store_timeout_secs(),
            record_exp_secs: None,
            sqlite_path: default_sqlite_path(),
        }
    }
}

impl TrackerStoreConfig {
    pub fn validate(&self) -> Result<()> {
        let backend = effective_store_backend_name(&self.backend);
        if !SUPPORTED_STORE_BACKENDS.contains(&backend.as_str()) {
            anyhow::bail!(
                "tracker_store.backend '{}' is not supported (expected memory, sqlite or http)",
                self.backend
            );
        }
        if backend == "http"
            && self
                .url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            anyhow::bail!("tracker_store.url must not be empty for the http backend");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("tracker_store.timeout_secs must be greater than 0");
        }
        if backend == "sqlite" && self.sqlite_path.trim().is_empty() {
            anyhow::bail!("tracker_store.sqlite_path must not be empty for the sqlite backend");
        }
        Ok(())
    }
}

// ── Loading ───────────────────────────────────────────────────────

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".dialogue-tracker"))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ConfigResolutionSource {
    Flag,
    EnvConfigDir,
    DefaultConfigDir,
}

impl ConfigResolutionSource {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "--config-dir",
            Self::EnvConfigDir => CONFIG_DIR_ENV,
            Self::DefaultConfigDir => "default",
        }
    }
}

fn resolve_config_dir(explicit: Option<&Path>) -> Result<(PathBuf, ConfigResolutionSource)> {
    if let Some(dir) = explicit {
        return Ok((dir.to_path_buf(), ConfigResolutionSource::Flag));
    }
    if let Ok(custom_config_dir) = std::env::var(CONFIG_DIR_ENV) {
        let custom_config_dir = custom_config_dir.trim();
        if !custom_config_dir.is_empty() {
            return Ok((
                PathBuf::from(custom_config_dir),
                ConfigResolutionSource::EnvConfigDir,
            ));
        }
    }
    Ok((default_config_dir()?, ConfigResolutionSource::DefaultConfigDir))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Config {
    /// Load `config.toml` from the resolved config directory, writing a
    /// default one first if it does not exist.
    pub async fn load_or_init(config_dir: Option<&Path>) -> Result<Self> {
        let (config_dir, resolution_source) = resolve_config_dir(config_dir)?;
        let config_path = config_dir.join("config.toml");

        fs::create_dir_all(&config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            let mut config = Config::default();
            config.config_path = config_path;
            config.save().await?;
            config
        } else {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            source = resolution_source.as_str(),
            backend = %config.tracker_store.backend,
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.domain_path {
            if path.trim().is_empty() {
                anyhow::bail!("domain_path must not be empty when set");
            }
        }
        self.tracker_store.validate()
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Some(backend) = env_value("DIALOGUE_TRACKER_STORE") {
            self.tracker_store.backend = backend;
        }

        if let Some(url) = env_value("DIALOGUE_TRACKER_STORE_URL") {
            self.tracker_store.url = Some(url);
        }

        if let Some(raw) = env_value("DIALOGUE_TRACKER_STORE_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => self.tracker_store.timeout_secs = secs,
                _ => tracing::warn!(
                    value = %raw,
                    "Ignoring invalid DIALOGUE_TRACKER_STORE_TIMEOUT_SECS"
                ),
            }
        }

        if let Some(domain) = env_value("DIALOGUE_TRACKER_DOMAIN") {
            self.domain_path = Some(domain);
        }
    }

    /// Load the configured domain, or an empty one when no path is set.
    pub fn load_domain(&self) -> Result<Domain> {
        match &self.domain_path {
            Some(path) => {
                let expanded = shellexpand::tilde(path);
                Domain::load(Path::new(expanded.as_ref()))
            }
            None => {
                tracing::debug!("No domain_path configured; using an empty domain");
                Ok(Domain::default())
            }
        }
    }

    /// Write the config atomically: temp file, fsync, rename over the old one.
    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
