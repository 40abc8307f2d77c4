//! Trello Integration Adapter
//!
//! Creates a card per ticket and labels it by module using the Trello REST
//! API. Trello authenticates with `key`/`token` query parameters.

use super::{CardService, LabelOutcome, LabelResolver};
use crate::model::{CardRef, Settings, Ticket};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Per-request timeout for reads
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create/update operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Trello API client
pub struct TrelloAdapter {
    client: Client,
    base_url: String,
}

/// Card as returned by `POST /1/cards`
#[derive(Debug, Clone, Deserialize)]
struct TrelloCard {
    id: String,
    url: String,
}

/// Label defined on a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLabel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Trello sends `null` for colorless labels
    #[serde(default)]
    pub color: Option<String>,
}

impl TrelloAdapter {
    /// Create a new Trello adapter
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Card title: "{title} | Ticket #{id} | Module: {module}"
    pub fn card_name(ticket: &Ticket) -> String {
        let module = ticket.module.as_ref().map(|m| m.as_str()).unwrap_or("N/A");
        format!("{} | Ticket #{} | Module: {}", ticket.title, ticket.id, module)
    }

    fn with_auth(request: RequestBuilder, settings: &Settings) -> RequestBuilder {
        request.header("Accept", "application/json").query(&[
            ("key", settings.trello.api_key.as_str()),
            ("token", settings.trello.api_token.as_str()),
        ])
    }

    /// Fetch every label defined on the configured board
    pub async fn board_labels(&self, settings: &Settings) -> Result<Vec<BoardLabel>> {
        let url = format!(
            "{}/1/boards/{}/labels",
            self.base_url,
            urlencoding::encode(&settings.trello.board_id)
        );

        debug!(board_id = %settings.trello.board_id, "Fetching Trello board labels");

        let request = Self::with_auth(self.client.get(&url), settings);
        let response = request.timeout(GET_TIMEOUT).send().await?;

        match response.status() {
            StatusCode::OK => {
                let labels: Vec<BoardLabel> = response.json().await?;
                info!(count = labels.len(), "Fetched Trello board labels");
                Ok(labels)
            }
            status => Err(api_error("fetching board labels", status, response).await),
        }
    }
}

#[async_trait(?Send)]
impl CardService for TrelloAdapter {
    async fn create_card(&self, ticket: &Ticket, settings: &Settings) -> Result<CardRef> {
        let url = format!("{}/1/cards", self.base_url);
        let name = Self::card_name(ticket);
        let desc = ticket.description.as_deref().unwrap_or("");

        debug!(ticket_id = %ticket.id, list_id = %settings.trello.list_id, "Creating Trello card");

        let request = Self::with_auth(self.client.post(&url), settings).query(&[
            ("idList", settings.trello.list_id.as_str()),
            ("name", name.as_str()),
            ("desc", desc),
        ]);

        let response = request.timeout(WRITE_TIMEOUT).send().await?;

        match response.status() {
            status if status.is_success() => {
                let card: TrelloCard = response.json().await?;
                info!(ticket_id = %ticket.id, card_id = %card.id, "Created Trello card");
                Ok(CardRef {
                    id: card.id,
                    url: card.url,
                })
            }
            StatusCode::UNAUTHORIZED => Err(crate::TicketSyncError::Integration(
                "Trello authentication failed".to_string(),
            )),
            status => Err(api_error("creating card", status, response).await),
        }
    }

    async fn attach_label(
        &self,
        ticket: &Ticket,
        settings: &Settings,
        labels: &dyn LabelResolver,
    ) -> Result<LabelOutcome> {
        let Some(module) = ticket.module.as_ref() else {
            return Ok(LabelOutcome::NoLabel);
        };
        let Some(label) = labels.find(module)? else {
            debug!(ticket_id = %ticket.id, module = %module, "No Trello label for module");
            return Ok(LabelOutcome::NoLabel);
        };
        let Some(card_id) = ticket.card_id() else {
            debug!(ticket_id = %ticket.id, "No Trello card to label yet");
            return Ok(LabelOutcome::NoLabel);
        };

        let url = format!(
            "{}/1/cards/{}/idLabels",
            self.base_url,
            urlencoding::encode(card_id)
        );

        let request = Self::with_auth(self.client.post(&url), settings)
            .query(&[("value", label.trello_label_id.as_str())]);

        let response = request.timeout(WRITE_TIMEOUT).send().await?;

        match response.status() {
            status if status.is_success() => {
                info!(
                    ticket_id = %ticket.id,
                    card_id = %card_id,
                    label = %label.name,
                    "Attached Trello label"
                );
                Ok(LabelOutcome::Attached(label.trello_label_id))
            }
            status => Err(api_error("attaching label", status, response).await),
        }
    }
}

async fn api_error(
    action: &str,
    status: StatusCode,
    response: reqwest::Response,
) -> crate::TicketSyncError {
    let error_body = response.text().await.unwrap_or_default();
    crate::TicketSyncError::Integration(format!(
        "Trello API error {}: HTTP {}: {}",
        action, status, error_body
    ))
}
