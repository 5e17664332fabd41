use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::clock::iso8601;
use crate::config::BigChatConfig;

/// Kind of a BigChat event, taken from its `event_name`.
///
/// Any value other than the four known names, including non-strings,
/// decodes as `Unknown` so it is reported rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<serde_json::Value>")]
pub enum EventKind {
    Start,
    End,
    Message,
    Transfer,
    Unknown(Option<String>),
}

impl From<Option<serde_json::Value>> for EventKind {
    fn from(name: Option<serde_json::Value>) -> Self {
        match name {
            None | Some(serde_json::Value::Null) => EventKind::Unknown(None),
            Some(serde_json::Value::String(name)) => match name.as_str() {
                "START" => EventKind::Start,
                "END" => EventKind::End,
                "MESSAGE" => EventKind::Message,
                "TRANSFER" => EventKind::Transfer,
                _ => EventKind::Unknown(Some(name)),
            },
            Some(other) => EventKind::Unknown(Some(other.to_string())),
        }
    }
}

impl Default for EventKind {
    fn default() -> Self {
        EventKind::Unknown(None)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Start => write!(f, "START"),
            EventKind::End => write!(f, "END"),
            EventKind::Message => write!(f, "MESSAGE"),
            EventKind::Transfer => write!(f, "TRANSFER"),
            EventKind::Unknown(Some(name)) => write!(f, "{}", name),
            EventKind::Unknown(None) => write!(f, "<missing>"),
        }
    }
}

/// `event_at` arrives as unix seconds or as an ISO-8601 string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
#[allow(dead_code)]
pub enum EventTime {
    Unix(i64),
    Iso(DateTime<Utc>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub conversation_id: i64,
    #[serde(default)]
    pub event_name: EventKind,
    #[serde(default)]
    pub event_at: Option<EventTime>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageData {
    /// Passed through to OurAPI as-is, whatever its JSON type
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    /// "agent" or "customer"
    #[serde(default)]
    pub sender: Option<String>,
}

/// Advisor ids are numeric in practice but strings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AdvisorId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for AdvisorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisorId::Number(n) => write!(f, "{}", n),
            AdvisorId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferData {
    #[serde(default)]
    pub new_advisor_id: Option<AdvisorId>,
    #[serde(default)]
    pub old_advisor_id: Option<AdvisorId>,
}

impl Event {
    /// Conversation id as OurAPI stores it in `external_id`
    pub fn external_id(&self) -> String {
        self.conversation_id.to_string()
    }

    pub fn message_data(&self) -> Result<MessageData> {
        self.typed_data()
    }

    pub fn transfer_data(&self) -> Result<TransferData> {
        self.typed_data()
    }

    // Missing or null `data` reads as an empty payload.
    fn typed_data<T>(&self) -> Result<T>
    where
        T: Default + serde::de::DeserializeOwned,
    {
        match &self.data {
            None | Some(serde_json::Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone()).with_context(|| {
                format!(
                    "Invalid {} data for conversation {}",
                    self.event_name, self.conversation_id
                )
            }),
        }
    }
}

/// Body of `GET /events`. Events stay raw so one malformed entry
/// cannot poison the whole batch.
#[derive(Debug, Default, Deserialize)]
pub struct EventBatch {
    #[serde(default)]
    pub events: Option<Vec<serde_json::Value>>,
}

/// Client for the BigChat event feed
pub struct BigChatClient {
    client: reqwest::Client,
    base_url: String,
}

impl BigChatClient {
    pub fn new(config: &BigChatConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build BigChat HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch events that occurred at or after `start_at`.
    pub async fn fetch_events(&self, start_at: DateTime<Utc>) -> Result<EventBatch> {
        let url = format!("{}/events", self.base_url);
        let start_at = iso8601(start_at);

        debug!("Fetching BigChat events since {}", start_at);

        let response = self
            .client
            .get(&url)
            .query(&[("start_at", start_at.as_str())])
            .send()
            .await
            .context("Failed to send request to BigChat")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("BigChat API error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse BigChat events response")
    }
}
