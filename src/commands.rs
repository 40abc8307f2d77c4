//! CLI command definitions
//!
//! All CLI structs and subcommand enums are defined here.

use clap::{Args, Parser, Subcommand};

/// ticketsync - Ticket admin with Trello and Slack notifications
#[derive(Parser, Debug)]
#[command(name = "ticketsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (default: ~/.config/ticketsync/config.yaml)
    #[arg(short, long, global = true, env = "TICKETSYNC_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default configuration and create the database
    Init {
        /// Add a sample client and draft ticket
        #[arg(long)]
        seed: bool,
    },

    /// Manage Trello and Slack credentials
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Manage clients
    #[command(subcommand)]
    Client(ClientCommands),

    /// Create, edit and publish tickets
    #[command(subcommand)]
    Ticket(TicketCommands),

    /// Manage cached Trello board labels
    #[command(subcommand)]
    Labels(LabelCommands),
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show current settings (secrets redacted)
    Show,

    /// Set one or more settings fields
    Set(SettingsArgs),

    /// Remove the settings record, disabling synchronization
    Clear,
}

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    #[arg(long)]
    pub trello_api_key: Option<String>,

    #[arg(long)]
    pub trello_api_token: Option<String>,

    #[arg(long)]
    pub trello_board_id: Option<String>,

    /// List new cards are created in
    #[arg(long)]
    pub trello_list_id: Option<String>,

    #[arg(long)]
    pub slack_token: Option<String>,

    /// Channel new messages are posted to
    #[arg(long)]
    pub slack_channel_id: Option<String>,
}

impl SettingsArgs {
    pub fn is_empty(&self) -> bool {
        self.trello_api_key.is_none()
            && self.trello_api_token.is_none()
            && self.trello_board_id.is_none()
            && self.trello_list_id.is_none()
            && self.slack_token.is_none()
            && self.slack_channel_id.is_none()
    }
}

#[derive(Subcommand, Debug)]
pub enum ClientCommands {
    /// Add a client
    Add {
        /// Client name
        name: String,
    },

    /// List clients
    List,
}

#[derive(Subcommand, Debug)]
pub enum TicketCommands {
    /// Create a ticket (draft unless --publish)
    Create {
        #[arg(long)]
        title: String,

        /// External ticket number
        #[arg(long, default_value = "")]
        ticket_no: String,

        #[arg(short, long)]
        module: Option<String>,

        /// Client id
        #[arg(long)]
        client: Option<i64>,

        #[arg(short, long)]
        description: Option<String>,

        /// Status (open, in_progress, waiting, resolved, closed)
        #[arg(short, long)]
        status: Option<String>,

        /// Create as published instead of draft
        #[arg(long)]
        publish: bool,
    },

    /// List tickets
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a ticket with its notification state
    Show {
        /// Ticket id
        id: i64,
    },

    /// Edit fields of a ticket and save it
    Update {
        /// Ticket id
        id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long)]
        module: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        assignee: Option<String>,
    },

    /// Clear the draft flag and save
    Publish {
        /// Ticket id
        id: i64,
    },

    /// Save without changes, retrying pending Trello/Slack steps
    Save {
        /// Ticket id
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum LabelCommands {
    /// Import labels from the configured Trello board
    Sync,

    /// List cached labels
    List,

    /// Assign a label to a module
    Assign {
        /// Trello label id
        label_id: String,

        /// Module name
        module: String,
    },
}
