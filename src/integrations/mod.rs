//! External Integrations
//!
//! Adapters for the Trello board and the Slack channel that mirror tickets.
//!
//! # Overview
//!
//! The synchronizer talks to the outside world only through the traits in
//! this module:
//!
//! - [`CardService`]: create a card for a ticket and attach its module label
//! - [`MessageService`]: post a message for a ticket and keep its content and
//!   single status reaction current
//! - [`LabelResolver`]: look up the board label cached for a module
//!
//! Every adapter call returns a [`crate::Result`]. Callers decide what a
//! failure means; the adapters never swallow errors themselves.
//!
//! The model is single-threaded: one save awaits its calls in order, so the
//! traits do not require `Send` futures.

pub mod blocks;
pub mod slack;
pub mod trello;

use crate::model::{CardRef, Label, MessageRef, Module, Settings, Ticket};
use crate::Result;
use async_trait::async_trait;

pub use blocks::{render_blocks, Block, BlockText};
pub use slack::{status_reaction, SlackAdapter};
pub use trello::{BoardLabel, TrelloAdapter};

/// Result of attaching a module label to a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    /// Label with this Trello id was attached
    Attached(String),
    /// No label is configured for the ticket's module; nothing was sent
    NoLabel,
}

/// Looks up the board label cached for a module
pub trait LabelResolver {
    /// Exact match on the module value; first match if several exist
    fn find(&self, module: &Module) -> Result<Option<Label>>;
}

/// Card-board service (Trello)
#[async_trait(?Send)]
pub trait CardService {
    /// Create a card for the ticket in the configured list
    async fn create_card(&self, ticket: &Ticket, settings: &Settings) -> Result<CardRef>;

    /// Attach the label configured for the ticket's module to its card
    async fn attach_label(
        &self,
        ticket: &Ticket,
        settings: &Settings,
        labels: &dyn LabelResolver,
    ) -> Result<LabelOutcome>;
}

/// Team-chat service (Slack)
#[async_trait(?Send)]
pub trait MessageService {
    /// Post the ticket message and add its status reaction
    async fn create_message(&self, ticket: &Ticket, settings: &Settings) -> Result<MessageRef>;

    /// Reset reactions to the single status reaction and rewrite the content
    async fn update_message(&self, ticket: &Ticket, settings: &Settings) -> Result<()>;
}
