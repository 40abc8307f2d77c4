//! Credentials for the external services
//!
//! Stored as a single row. When the row is missing, synchronization is off.

use serde::{Deserialize, Serialize};

/// Trello credentials and target list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrelloSettings {
    pub api_key: String,
    pub api_token: String,
    pub board_id: String,
    pub list_id: String,
}

/// Slack bot token and target channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackSettings {
    pub token: String,
    pub channel_id: String,
}

/// The singleton settings record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub trello: TrelloSettings,
    #[serde(default)]
    pub slack: SlackSettings,
}

impl Settings {
    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |s: &str| {
            if s.is_empty() {
                String::new()
            } else {
                let visible: String = s.chars().take(4).collect();
                format!("{}****", visible)
            }
        };

        Self {
            trello: TrelloSettings {
                api_key: mask(&self.trello.api_key),
                api_token: mask(&self.trello.api_token),
                ..self.trello.clone()
            },
            slack: SlackSettings {
                token: mask(&self.slack.token),
                ..self.slack.clone()
            },
        }
    }
}
