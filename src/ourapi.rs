use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::clock::iso8601;
use crate::config::OurApiConfig;

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct Chat {
    pub chat_id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct Agent {
    pub agent_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateChatRequest<'a> {
    external_id: &'a str,
    started_at: String,
}

#[derive(Debug, Deserialize)]
struct CreateChatResponse {
    chat_id: String,
}

/// Partial chat update. Only one field group is sent per call.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatPatch<'a> {
    Close { ended_at: String },
    Reassign { agent_id: &'a str },
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    chat_id: &'a str,
    text: Option<&'a serde_json::Value>,
    agent_id: Option<&'a str>,
    sent_at: String,
}

/// Client for the OurAPI chat service
pub struct OurApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl OurApiClient {
    pub fn new(config: &OurApiConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OurAPI HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// First chat whose `external_id` matches, if any.
    pub async fn find_chat_by_external_id(&self, external_id: &str) -> Result<Option<Chat>> {
        let url = format!("{}/chats", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("external_id", external_id)])
            .send()
            .await
            .context("Failed to send chat lookup to OurAPI")?;

        let chats: Vec<Chat> = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse chat lookup response")?;

        Ok(chats.into_iter().next())
    }

    /// Agent whose name equals the advisor id, if any.
    pub async fn find_agent_id_for_advisor(&self, advisor_id: &str) -> Result<Option<String>> {
        let url = format!("{}/agents", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("name", advisor_id)])
            .send()
            .await
            .context("Failed to send agent lookup to OurAPI")?;

        let agents: Vec<Agent> = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse agent lookup response")?;

        Ok(agents.into_iter().next().map(|a| a.agent_id))
    }

    /// Create a chat and return its destination-assigned id.
    pub async fn create_chat(
        &self,
        external_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<String> {
        let url = format!("{}/chats", self.base_url);
        let request = CreateChatRequest {
            external_id,
            started_at: iso8601(started_at),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send chat creation to OurAPI")?;

        let created: CreateChatResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse chat creation response")?;

        Ok(created.chat_id)
    }

    pub async fn close_chat(&self, chat_id: &str, ended_at: DateTime<Utc>) -> Result<()> {
        self.patch_chat(
            chat_id,
            &ChatPatch::Close {
                ended_at: iso8601(ended_at),
            },
        )
        .await
    }

    pub async fn reassign_chat(&self, chat_id: &str, agent_id: &str) -> Result<()> {
        self.patch_chat(chat_id, &ChatPatch::Reassign { agent_id }).await
    }

    pub async fn post_message(
        &self,
        chat_id: &str,
        text: Option<&serde_json::Value>,
        agent_id: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        let url = format!("{}/chats/{}/messages", self.base_url, chat_id);
        let request = CreateMessageRequest {
            chat_id,
            text,
            agent_id,
            sent_at: iso8601(sent_at),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send message to OurAPI")?;

        Self::check(response).await?;
        Ok(())
    }

    async fn patch_chat(&self, chat_id: &str, patch: &ChatPatch<'_>) -> Result<()> {
        let url = format!("{}/chats/{}", self.base_url, chat_id);
        debug!("Patching chat {}: {:?}", chat_id, patch);

        let response = self
            .client
            .patch(&url)
            .json(patch)
            .send()
            .await
            .context("Failed to send chat update to OurAPI")?;

        Self::check(response).await?;
        Ok(())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OurAPI error ({}): {}", status, body);
        }
        Ok(response)
    }
}
