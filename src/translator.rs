use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bigchat::Event;
use crate::clock::Clock;
use crate::ourapi::{Chat, OurApiClient};

/// What a handler did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Outcome {
    ChatCreated { chat_id: String },
    ChatClosed { chat_id: String },
    ChatTransferred { chat_id: String, agent_id: String },
    MessagePosted { chat_id: String },
    Skipped(SkipReason),
}

/// Lookups that came back empty. These end the handler early and are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ChatNotFound,
    AgentNotFound,
    ChatAlreadyExists,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ChatNotFound => write!(f, "no chat for conversation"),
            SkipReason::AgentNotFound => write!(f, "no agent for advisor"),
            SkipReason::ChatAlreadyExists => write!(f, "chat already exists"),
        }
    }
}

/// Turns BigChat events into OurAPI calls.
///
/// Each handler is a lookup followed by at most one write. A failing step
/// ends the handler with an error; earlier steps are never rolled back.
pub struct EventTranslator {
    ourapi: OurApiClient,
    clock: Arc<dyn Clock>,
    skip_duplicate_start: bool,
}

impl EventTranslator {
    pub fn new(ourapi: OurApiClient, clock: Arc<dyn Clock>, skip_duplicate_start: bool) -> Self {
        Self {
            ourapi,
            clock,
            skip_duplicate_start,
        }
    }

    /// START: create a chat for the conversation.
    pub async fn start(&self, event: &Event) -> Result<Outcome> {
        let external_id = event.external_id();

        if self.skip_duplicate_start {
            if let Some(chat) = self.ourapi.find_chat_by_external_id(&external_id).await? {
                debug!(
                    "Chat {} already exists for conversation {}",
                    chat.chat_id, event.conversation_id
                );
                return Ok(Outcome::Skipped(SkipReason::ChatAlreadyExists));
            }
        }

        let chat_id = self
            .ourapi
            .create_chat(&external_id, self.clock.now())
            .await
            .context("Failed to create chat")?;

        info!(
            "Created chat {} from conversation {}",
            chat_id, event.conversation_id
        );
        Ok(Outcome::ChatCreated { chat_id })
    }

    /// END: mark the conversation's chat as ended.
    pub async fn end(&self, event: &Event) -> Result<Outcome> {
        let Some(chat) = self.find_chat(event).await? else {
            return Ok(Outcome::Skipped(SkipReason::ChatNotFound));
        };

        self.ourapi
            .close_chat(&chat.chat_id, self.clock.now())
            .await
            .context("Failed to end chat")?;

        info!("Marked chat {} as ended", chat.chat_id);
        Ok(Outcome::ChatClosed {
            chat_id: chat.chat_id,
        })
    }

    /// TRANSFER: reassign the chat to the agent named after the new advisor.
    pub async fn transfer(&self, event: &Event) -> Result<Outcome> {
        let Some(chat) = self.find_chat(event).await? else {
            return Ok(Outcome::Skipped(SkipReason::ChatNotFound));
        };

        let data = event.transfer_data()?;
        debug!(
            "Transfer of conversation {} from advisor {:?} to {:?}",
            event.conversation_id, data.old_advisor_id, data.new_advisor_id
        );
        let Some(advisor_id) = data.new_advisor_id else {
            return Ok(Outcome::Skipped(SkipReason::AgentNotFound));
        };
        let advisor_id = advisor_id.to_string();

        let agent_id = match self.ourapi.find_agent_id_for_advisor(&advisor_id).await {
            Ok(Some(agent_id)) => agent_id,
            Ok(None) => {
                debug!("No agent named {} in OurAPI", advisor_id);
                return Ok(Outcome::Skipped(SkipReason::AgentNotFound));
            }
            Err(e) => {
                warn!("Could not map advisor {} to agent: {:#}", advisor_id, e);
                return Ok(Outcome::Skipped(SkipReason::AgentNotFound));
            }
        };

        self.ourapi
            .reassign_chat(&chat.chat_id, &agent_id)
            .await
            .context("Failed to transfer chat")?;

        info!("Transferred chat {} to agent {}", chat.chat_id, agent_id);
        Ok(Outcome::ChatTransferred {
            chat_id: chat.chat_id,
            agent_id,
        })
    }

    /// MESSAGE: append the message to the chat. Only agent messages carry the
    /// chat's current agent id.
    pub async fn message(&self, event: &Event) -> Result<Outcome> {
        let Some(chat) = self.find_chat(event).await? else {
            return Ok(Outcome::Skipped(SkipReason::ChatNotFound));
        };

        let data = event.message_data()?;
        let agent_id = match data.sender.as_deref() {
            Some("agent") => chat.agent_id.as_deref(),
            _ => None,
        };

        self.ourapi
            .post_message(
                &chat.chat_id,
                data.message.as_ref(),
                agent_id,
                self.clock.now(),
            )
            .await
            .context("Failed to create message")?;

        let text = match &data.message {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        info!("Created message in chat {}: {}", chat.chat_id, text);
        Ok(Outcome::MessagePosted {
            chat_id: chat.chat_id,
        })
    }

    async fn find_chat(&self, event: &Event) -> Result<Option<Chat>> {
        self.ourapi
            .find_chat_by_external_id(&event.external_id())
            .await
            .context("Failed to find chat")
    }
}
