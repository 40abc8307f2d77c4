//! Slack Block Kit rendering for ticket messages
//!
//! The same blocks are used when posting and when updating, so a message
//! always looks the same for the same ticket state. Consumers correlate
//! messages by block order and by the `status` block id.

use crate::model::Ticket;
use serde::{Deserialize, Serialize};

/// Block id of the status section
pub const STATUS_BLOCK_ID: &str = "status";

const NOT_AVAILABLE: &str = "N/A";

/// Text object inside a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockText {
    /// `plain_text` or `mrkdwn`
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl BlockText {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: "plain_text".to_string(),
            text: text.into(),
        }
    }

    fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            kind: "mrkdwn".to_string(),
            text: text.into(),
        }
    }
}

/// A header or section block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    pub text: BlockText,
}

impl Block {
    fn header(text: impl Into<String>) -> Self {
        Self {
            kind: "header".to_string(),
            block_id: None,
            text: BlockText::plain(text),
        }
    }

    fn section(text: impl Into<String>) -> Self {
        Self {
            kind: "section".to_string(),
            block_id: None,
            text: BlockText::mrkdwn(text),
        }
    }

    fn with_block_id(mut self, id: &str) -> Self {
        self.block_id = Some(id.to_string());
        self
    }
}

/// Render the message blocks for a ticket
///
/// Order: header, admin link, ticket details, card link, status.
pub fn render_blocks(ticket: &Ticket, admin_url: &str) -> Vec<Block> {
    let client_name = ticket
        .client
        .as_ref()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let client_id = ticket
        .client
        .as_ref()
        .map(|c| c.id.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let module = ticket
        .module
        .as_ref()
        .map(|m| m.as_str())
        .unwrap_or(NOT_AVAILABLE);

    vec![
        Block::header(format!("🪲 Ticket #{}", ticket.ticket_no)),
        Block::section(format!("Admin: {}", admin_url)),
        Block::section(format!(
            "*{}*\nModule: {}\nClient: {}\nClient ID: {} - Ticket ID: {}",
            ticket.title, module, client_name, client_id, ticket.id
        )),
        Block::section(format!("Card: {}", ticket.card_url())),
        Block::section(format!("*Status: {}*", ticket.status.label()))
            .with_block_id(STATUS_BLOCK_ID),
    ]
}
