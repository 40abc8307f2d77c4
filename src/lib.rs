//! ticketsync - Ticket admin with Trello and Slack notifications
//!
//! Every ticket save may create or update a Trello card and a Slack message.
//! Either service can be down; the save still succeeds and the missing pieces
//! are retried on the next save.
//!
//! # Architecture
//!
//! - **model**: Tickets, clients, labels and the settings record
//! - **config**: YAML configuration (database path, URLs)
//! - **storage**: SQLite persistence
//! - **integrations**: Trello and Slack adapters, Slack block rendering
//! - **sync**: Decision table, synchronizer and the save entry point

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod storage;

// Components
pub mod integrations;
pub mod sync;

// Re-exports
pub use error::{Result, TicketSyncError};
