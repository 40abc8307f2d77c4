//! Core data model
//!
//! Defines Ticket, Label, Settings and the small id/value types they share.

mod ids;
mod label;
mod settings;
mod ticket;

pub use ids::{ClientId, Module, TicketId};
pub use label::Label;
pub use settings::{Settings, SlackSettings, TrelloSettings};
pub use ticket::{CardRef, ClientRef, JobLog, MessageRef, NewTicket, Ticket, TicketStatus};
