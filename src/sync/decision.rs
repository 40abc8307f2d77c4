//! Pure decisions behind each synchronization step
//!
//! | draft | already done | decision            |
//! |-------|--------------|---------------------|
//! | yes   | any          | skip (draft)        |
//! | no    | yes          | skip (already done) |
//! | no    | no           | create              |

use crate::model::Ticket;

/// Why a create step did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Draft,
    AlreadyDone,
    /// No settings record; synchronization is off
    Disabled,
    /// No addressable message to refresh
    NoMessage,
    /// Card creation failed, nothing to label
    NoCard,
}

/// What to do for one external resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create,
    Skip(SkipReason),
}

/// Decide whether an external resource must be created
pub fn decide(draft: bool, already_done: bool) -> Decision {
    match (draft, already_done) {
        (true, _) => Decision::Skip(SkipReason::Draft),
        (false, true) => Decision::Skip(SkipReason::AlreadyDone),
        (false, false) => Decision::Create,
    }
}

/// Card step for the ticket
pub fn card_decision(ticket: &Ticket) -> Decision {
    decide(ticket.draft, ticket.card_created())
}

/// Message step for the ticket
pub fn message_decision(ticket: &Ticket) -> Decision {
    decide(ticket.draft, ticket.message_sent())
}

/// Whether the existing message must be refreshed
///
/// Independent of the draft flag: once a message exists it follows the ticket.
pub fn should_refresh(ticket: &Ticket) -> bool {
    ticket
        .message
        .as_ref()
        .is_some_and(|message| message.is_addressable())
}
