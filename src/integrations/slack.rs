//! Slack Integration Adapter
//!
//! Posts one message per ticket and keeps it current: content is rewritten
//! on every update and the reactions are reset to a single status emoji.

use super::blocks::{render_blocks, Block};
use super::MessageService;
use crate::config::admin_change_url;
use crate::model::{MessageRef, Settings, Ticket, TicketStatus};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-request timeout for reads
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for writes
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Emoji shown on the message for each status
///
/// Exhaustive so that a new status cannot ship without a reaction.
pub fn status_reaction(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Open => "new",
        TicketStatus::InProgress => "hammer_and_wrench",
        TicketStatus::Waiting => "hourglass_flowing_sand",
        TicketStatus::Resolved => "white_check_mark",
        TicketStatus::Closed => "lock",
    }
}

/// Slack Web API client
pub struct SlackAdapter {
    client: Client,
    base_url: String,
    admin_base_url: String,
}

/// Decoded Slack Web API reply
///
/// Every reply carries `ok` and, on failure, an `error` code; the rest of the
/// payload depends on the method.
#[derive(Debug)]
struct SlackReply {
    ok: bool,
    error: Option<String>,
    raw: serde_json::Value,
}

impl SlackReply {
    fn from_value(raw: serde_json::Value) -> Self {
        let ok = raw
            .get("ok")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        let error = raw
            .get("error")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        Self { ok, error, raw }
    }

    fn error_code(&self) -> Option<&str> {
        if self.ok {
            None
        } else {
            Some(self.error.as_deref().unwrap_or("unknown_error"))
        }
    }

    fn into_body<T: DeserializeOwned>(self, method: &str) -> Result<T> {
        if let Some(code) = self.error_code() {
            return Err(crate::TicketSyncError::Integration(format!(
                "Slack API error calling {}: {}",
                method, code
            )));
        }
        Ok(serde_json::from_value(self.raw)?)
    }

    fn into_ack(self, method: &str) -> Result<()> {
        self.into_body::<serde_json::Value>(method).map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageReply {
    ts: String,
    channel: String,
}

#[derive(Debug, Default, Deserialize)]
struct ReactionsReply {
    #[serde(default)]
    message: Option<ReactedMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ReactedMessage {
    #[serde(default)]
    reactions: Vec<Reaction>,
}

#[derive(Debug, Deserialize)]
struct Reaction {
    name: String,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    blocks: &'a [Block],
}

#[derive(Debug, Serialize)]
struct UpdateMessageRequest<'a> {
    channel: &'a str,
    ts: &'a str,
    blocks: &'a [Block],
}

#[derive(Debug, Serialize)]
struct ReactionRequest<'a> {
    channel: &'a str,
    timestamp: &'a str,
    name: &'a str,
}

impl SlackAdapter {
    /// Create a new Slack adapter
    ///
    /// `admin_base_url` is the admin site root used for ticket links.
    pub fn new(base_url: impl Into<String>, admin_base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_base_url: admin_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Admin change-page link for a ticket
    pub fn admin_url(&self, ticket: &Ticket) -> String {
        admin_change_url(&self.admin_base_url, ticket.id)
    }

    /// Blocks for the ticket's current state
    pub fn blocks(&self, ticket: &Ticket) -> Vec<Block> {
        render_blocks(ticket, &self.admin_url(ticket))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Send a request; HTTP failures are errors, Slack-level failures are in the reply
    async fn send(
        &self,
        method: &str,
        request: RequestBuilder,
        settings: &Settings,
    ) -> Result<SlackReply> {
        let response = request.bearer_auth(&settings.slack.token).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(crate::TicketSyncError::Integration(format!(
                "Slack API error calling {}: HTTP {}: {}",
                method, status, error_body
            )));
        }

        let raw: serde_json::Value = response.json().await?;
        Ok(SlackReply::from_value(raw))
    }

    /// Remove every reaction currently on the message, one call each
    ///
    /// Returns how many reactions were removed.
    pub async fn clear_reactions(&self, message: &MessageRef, settings: &Settings) -> Result<usize> {
        let request = self
            .client
            .get(self.method_url("reactions.get"))
            .query(&[
                ("channel", message.channel_id.as_str()),
                ("timestamp", message.ts.as_str()),
            ])
            .timeout(GET_TIMEOUT);

        let reply: ReactionsReply = self
            .send("reactions.get", request, settings)
            .await?
            .into_body("reactions.get")?;
        let reactions = reply.message.unwrap_or_default().reactions;

        debug!(
            channel = %message.channel_id,
            ts = %message.ts,
            count = reactions.len(),
            "Clearing Slack reactions"
        );

        for reaction in &reactions {
            self.remove_reaction(message, settings, &reaction.name)
                .await?;
        }

        Ok(reactions.len())
    }

    async fn remove_reaction(
        &self,
        message: &MessageRef,
        settings: &Settings,
        name: &str,
    ) -> Result<()> {
        let body = ReactionRequest {
            channel: &message.channel_id,
            timestamp: &message.ts,
            name,
        };
        let request = self
            .client
            .post(self.method_url("reactions.remove"))
            .json(&body)
            .timeout(WRITE_TIMEOUT);

        let reply = self.send("reactions.remove", request, settings).await?;
        // Someone else removed it in the meantime
        if reply.error_code() == Some("no_reaction") {
            return Ok(());
        }
        reply.into_ack("reactions.remove")
    }

    /// Add the reaction for the ticket's status
    pub async fn add_status_reaction(
        &self,
        message: &MessageRef,
        settings: &Settings,
        status: TicketStatus,
    ) -> Result<()> {
        let name = status_reaction(status);
        let body = ReactionRequest {
            channel: &message.channel_id,
            timestamp: &message.ts,
            name,
        };
        let request = self
            .client
            .post(self.method_url("reactions.add"))
            .json(&body)
            .timeout(WRITE_TIMEOUT);

        let reply = self.send("reactions.add", request, settings).await?;
        if reply.error_code() == Some("already_reacted") {
            return Ok(());
        }
        reply.into_ack("reactions.add")?;

        debug!(channel = %message.channel_id, ts = %message.ts, reaction = %name, "Added status reaction");
        Ok(())
    }

    /// Overwrite the message content with freshly rendered blocks
    pub async fn replace_content(
        &self,
        ticket: &Ticket,
        message: &MessageRef,
        settings: &Settings,
    ) -> Result<()> {
        let blocks = self.blocks(ticket);
        let body = UpdateMessageRequest {
            channel: &message.channel_id,
            ts: &message.ts,
            blocks: &blocks,
        };
        let request = self
            .client
            .post(self.method_url("chat.update"))
            .json(&body)
            .timeout(WRITE_TIMEOUT);

        self.send("chat.update", request, settings)
            .await?
            .into_ack("chat.update")
    }
}

#[async_trait(?Send)]
impl MessageService for SlackAdapter {
    async fn create_message(&self, ticket: &Ticket, settings: &Settings) -> Result<MessageRef> {
        let blocks = self.blocks(ticket);
        let body = PostMessageRequest {
            channel: &settings.slack.channel_id,
            blocks: &blocks,
        };

        debug!(ticket_id = %ticket.id, channel = %settings.slack.channel_id, "Posting Slack message");

        let request = self
            .client
            .post(self.method_url("chat.postMessage"))
            .json(&body)
            .timeout(WRITE_TIMEOUT);
        let reply: PostMessageReply = self
            .send("chat.postMessage", request, settings)
            .await?
            .into_body("chat.postMessage")?;

        let message = MessageRef {
            ts: reply.ts,
            channel_id: reply.channel,
        };
        info!(ticket_id = %ticket.id, channel = %message.channel_id, ts = %message.ts, "Posted Slack message");

        // Reaction failure does not fail the post; the refresh step reapplies it
        if let Err(e) = self
            .add_status_reaction(&message, settings, ticket.status)
            .await
        {
            warn!(ticket_id = %ticket.id, error = %e, "Failed to add initial status reaction");
        }

        Ok(message)
    }

    async fn update_message(&self, ticket: &Ticket, settings: &Settings) -> Result<()> {
        let message = ticket
            .message
            .as_ref()
            .filter(|m| m.is_addressable())
            .ok_or_else(|| {
                crate::TicketSyncError::Integration(format!(
                    "Ticket {} has no Slack message to update",
                    ticket.id
                ))
            })?;

        // A failed clear skips the add so the reaction set never grows
        let reaction = match self.clear_reactions(message, settings).await {
            Ok(_) => {
                self.add_status_reaction(message, settings, ticket.status)
                    .await
            }
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "Could not clear reactions, status reaction not applied");
                Err(e)
            }
        };

        let content = self.replace_content(ticket, message, settings).await;

        if content.is_ok() && reaction.is_ok() {
            info!(ticket_id = %ticket.id, status = %ticket.status, "Updated Slack message");
        }

        reaction.and(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TicketId;

    #[test]
    fn test_every_status_has_distinct_reaction() {
        let mut names: Vec<&str> = TicketStatus::ALL.iter().map(|s| status_reaction(*s)).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TicketStatus::ALL.len());
        assert_eq!(status_reaction(TicketStatus::Open), "new");
    }

    #[test]
    fn test_reply_parsing() {
        let ok = SlackReply::from_value(serde_json::json!({
            "ok": true, "channel": "C1", "ts": "1.2", "message": {}
        }));
        assert_eq!(ok.error_code(), None);
        let body: PostMessageReply = ok.into_body("chat.postMessage").unwrap();
        assert_eq!(body.ts, "1.2");
        assert_eq!(body.channel, "C1");

        let failed = SlackReply::from_value(serde_json::json!({
            "ok": false, "error": "channel_not_found"
        }));
        assert_eq!(failed.error_code(), Some("channel_not_found"));
        let err = failed.into_body::<PostMessageReply>("chat.postMessage").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Integration error: Slack API error calling chat.postMessage: channel_not_found"
        );
    }

    #[test]
    fn test_reply_without_ok_is_failure() {
        let reply = SlackReply::from_value(serde_json::json!({ "ts": "1.2" }));
        assert_eq!(reply.error_code(), Some("unknown_error"));
    }

    #[test]
    fn test_reactions_reply_without_reactions() {
        let reply = SlackReply::from_value(serde_json::json!({
            "ok": true, "type": "message", "message": { "text": "hi" }
        }));
        let body: ReactionsReply = reply.into_body("reactions.get").unwrap();
        assert!(body.message.unwrap().reactions.is_empty());
    }

    #[test]
    fn test_admin_url() {
        let adapter = SlackAdapter::new("https://slack.com/api/", "https://admin.example.com/").unwrap();
        assert_eq!(adapter.base_url(), "https://slack.com/api");

        let ticket = Ticket {
            id: TicketId::new(5),
            ticket_no: "1".into(),
            draft: false,
            status: TicketStatus::Open,
            module: None,
            title: "t".into(),
            description: None,
            client: None,
            author: None,
            assignee: None,
            joblog: Default::default(),
            created_at: String::new(),
            updated_at: String::new(),
            card: None,
            message: None,
        };
        assert_eq!(
            adapter.admin_url(&ticket),
            "https://admin.example.com/admin/tickets/ticket/5/change/"
        );

        // Same link as the CLI prints for the ticket
        let mut config = crate::config::AppConfig::new();
        config.base_url = "https://admin.example.com/".to_string();
        assert_eq!(adapter.admin_url(&ticket), config.admin_url(ticket.id));
    }

    #[tokio::test]
    async fn test_update_without_message_fails_fast() {
        let adapter = SlackAdapter::new("http://127.0.0.1:1", "http://localhost").unwrap();
        let ticket = Ticket {
            id: TicketId::new(5),
            ticket_no: "1".into(),
            draft: false,
            status: TicketStatus::Open,
            module: None,
            title: "t".into(),
            description: None,
            client: None,
            author: None,
            assignee: None,
            joblog: Default::default(),
            created_at: String::new(),
            updated_at: String::new(),
            card: None,
            message: None,
        };

        let result = adapter.update_message(&ticket, &Settings::default()).await;
        assert!(matches!(result, Err(crate::TicketSyncError::Integration(_))));
    }
}
