//! Configuration system
//!
//! Loads ~/.config/ticketsync/config.yaml with:
//! - the SQLite database path
//! - the admin base URL used for links in Slack messages
//! - API base URLs for Trello and Slack
//!
//! Service credentials are not part of this file; they live in the
//! `Settings` record in the database.

mod app_config;

pub use app_config::{admin_change_url, AppConfig, ServiceUrls};
