//! Ticket data structure
//!
//! A support ticket plus the handles of the Trello card and Slack message
//! that mirror it.

use super::{ClientId, Module, TicketId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ticket status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Waiting,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// All statuses, in workflow order
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Waiting,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    /// Stored/CLI value
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Waiting => "waiting",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    /// Human-readable label shown in Slack messages
    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Waiting => "Waiting",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = crate::TicketSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| {
                crate::TicketSyncError::Parse(format!(
                    "Unknown status '{}' (expected one of: {})",
                    s,
                    TicketStatus::ALL.map(|st| st.as_str()).join(", ")
                ))
            })
    }
}

/// Client a ticket was raised for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRef {
    pub id: ClientId,
    pub name: String,
}

/// Handle of the Trello card created for a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRef {
    pub id: String,
    pub url: String,
}

/// Handle of the Slack message posted for a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Slack message timestamp (acts as the message id)
    pub ts: String,
    pub channel_id: String,
}

impl MessageRef {
    /// Both parts are needed to address the message in the Slack API
    pub fn is_addressable(&self) -> bool {
        !self.ts.is_empty() && !self.channel_id.is_empty()
    }
}

/// Last job log captured for the ticket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

impl JobLog {
    pub fn is_empty(&self) -> bool {
        self.log.is_none() && self.message.is_none() && self.stacktrace.is_none()
    }
}

/// A persisted ticket
///
/// `card` and `message` are set once the external resource exists and are
/// never cleared again afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,

    /// Human-facing ticket number (e.g. "64853")
    pub ticket_no: String,

    /// Drafts are never synchronized
    pub draft: bool,

    pub status: TicketStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<Module>,

    pub title: String,

    /// Rich-text (HTML) description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(default, skip_serializing_if = "JobLog::is_empty")]
    pub joblog: JobLog,

    /// Creation timestamp (RFC3339 format)
    pub created_at: String,

    /// Last update timestamp (RFC3339 format)
    pub updated_at: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageRef>,
}

impl Ticket {
    /// True once a Trello card exists for this ticket
    pub fn card_created(&self) -> bool {
        self.card.is_some()
    }

    /// True once a Slack message exists for this ticket
    pub fn message_sent(&self) -> bool {
        self.message.is_some()
    }

    pub fn card_id(&self) -> Option<&str> {
        self.card.as_ref().map(|c| c.id.as_str())
    }

    /// Card URL, empty when no card exists yet
    pub fn card_url(&self) -> &str {
        self.card.as_ref().map(|c| c.url.as_str()).unwrap_or("")
    }

    /// Update the timestamp to now
    pub fn update_timestamp(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Fields needed to insert a ticket; the store assigns the id
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub ticket_no: String,
    pub draft: bool,
    pub status: TicketStatus,
    pub module: Option<Module>,
    pub title: String,
    pub description: Option<String>,
    pub client_id: Option<ClientId>,
    pub author: Option<String>,
    pub assignee: Option<String>,
    pub joblog: JobLog,
}

impl NewTicket {
    /// A draft ticket with just a title
    pub fn draft(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            draft: true,
            ..Default::default()
        }
    }

    pub fn with_ticket_no(mut self, ticket_no: impl Into<String>) -> Self {
        self.ticket_no = ticket_no.into();
        self
    }

    pub fn with_module(mut self, module: impl Into<Module>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }
}
