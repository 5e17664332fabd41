use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub bigchat: BigChatConfig,
    #[serde(default)]
    pub ourapi: OurApiConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BigChatConfig {
    #[serde(default = "default_bigchat_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OurApiConfig {
    #[serde(default = "default_ourapi_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// How far before startup the first poll window reaches
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Look up the conversation before creating a chat on START
    #[serde(default)]
    pub skip_duplicate_start: bool,
}

impl Default for BigChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_bigchat_url(),
        }
    }
}

impl Default for OurApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ourapi_url(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            lookback_secs: default_lookback_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            skip_duplicate_start: false,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn lookback(&self) -> Result<chrono::Duration> {
        i64::try_from(self.lookback_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .with_context(|| format!("sync.lookback_secs is out of range: {}", self.lookback_secs))
    }

    /// Start of the first poll window: `now` minus the lookback.
    pub fn initial_checkpoint(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_sub_signed(self.lookback()?).with_context(|| {
            format!(
                "sync.lookback_secs reaches before the earliest timestamp: {}",
                self.lookback_secs
            )
        })
    }
}

fn default_bigchat_url() -> String {
    "http://localhost:8267".to_string()
}

fn default_ourapi_url() -> String {
    "http://localhost:8266".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_lookback_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", name, value))
}

impl Config {
    /// Load the config file if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            info!("No config file at {}, using defaults", path.display());
            Config::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BIGCHAT_API_URL") {
            self.bigchat.base_url = url;
        }
        if let Some(url) = lookup("OUR_API_URL") {
            self.ourapi.base_url = url;
        }
        if let Some(v) = lookup("POLL_INTERVAL_SECONDS") {
            self.sync.poll_interval_secs = parse_env("POLL_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = lookup("LOOKBACK_SECONDS") {
            self.sync.lookback_secs = parse_env("LOOKBACK_SECONDS", &v)?;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT_SECONDS") {
            self.sync.request_timeout_secs = parse_env("REQUEST_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = lookup("SKIP_DUPLICATE_START") {
            self.sync.skip_duplicate_start = parse_env("SKIP_DUPLICATE_START", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.poll_interval_secs == 0 {
            anyhow::bail!("sync.poll_interval_secs must be greater than zero");
        }
        if self.sync.request_timeout_secs == 0 {
            anyhow::bail!("sync.request_timeout_secs must be greater than zero");
        }
        self.sync.initial_checkpoint(Utc::now())?;
        Ok(())
    }
}
