//! Ticket notification sync
//!
//! Keeps one Trello card and one Slack message per published ticket.
//! [`TicketService`] is the entry point for every save.

mod decision;
mod labels;
mod service;
mod synchronizer;

pub use decision::{card_decision, decide, message_decision, should_refresh, Decision, SkipReason};
pub use labels::{sync_board_labels, LabelSyncSummary};
pub use service::TicketService;
pub use synchronizer::{StepOutcome, SyncOutcome, SyncReport, TicketSynchronizer};
