//! Ticket synchronizer
//!
//! Runs the three steps of a save in fixed order:
//!
//! 1. **Card**: create the Trello card (and attach the module label)
//! 2. **Message**: post the Slack message
//! 3. **Refresh**: reset the message's status reaction and rewrite its content
//!
//! Card first, so a freshly created card URL already appears in the message.
//! Failures are recorded in the [`SyncReport`] and logged; the matching
//! ticket fields stay empty so the next save tries again.

use super::decision::{self, Decision, SkipReason};
use crate::config::AppConfig;
use crate::integrations::{
    CardService, LabelOutcome, LabelResolver, MessageService, SlackAdapter, TrelloAdapter,
};
use crate::model::{Settings, Ticket};
use crate::Result;
use std::fmt;
use tracing::{debug, info, warn};

/// Outcome of one synchronization step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Skipped(SkipReason),
    Created,
    Updated,
    /// Label with this Trello id was attached
    Attached(String),
    /// No label configured for the module
    NoLabel,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Skipped(SkipReason::Draft) => write!(f, "skipped (draft)"),
            StepOutcome::Skipped(SkipReason::AlreadyDone) => write!(f, "skipped (already exists)"),
            StepOutcome::Skipped(SkipReason::Disabled) => write!(f, "skipped (no settings)"),
            StepOutcome::Skipped(SkipReason::NoMessage) => write!(f, "skipped (no message)"),
            StepOutcome::Skipped(SkipReason::NoCard) => write!(f, "skipped (no card)"),
            StepOutcome::Created => write!(f, "created"),
            StepOutcome::Updated => write!(f, "updated"),
            StepOutcome::Attached(id) => write!(f, "attached ({})", id),
            StepOutcome::NoLabel => write!(f, "no label for module"),
            StepOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// What happened during one save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub card: StepOutcome,
    pub label: StepOutcome,
    pub message: StepOutcome,
    pub refresh: StepOutcome,
}

impl SyncReport {
    /// Report for a save without settings
    pub fn disabled() -> Self {
        let skipped = StepOutcome::Skipped(SkipReason::Disabled);
        Self {
            card: skipped.clone(),
            label: skipped.clone(),
            message: skipped.clone(),
            refresh: skipped,
        }
    }

    pub fn is_disabled(&self) -> bool {
        *self == Self::disabled()
    }

    /// Failure reasons, in step order
    pub fn errors(&self) -> Vec<&str> {
        [&self.card, &self.label, &self.message, &self.refresh]
            .into_iter()
            .filter_map(|step| match step {
                StepOutcome::Failed(reason) => Some(reason.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    /// Failures the next save will try again
    ///
    /// A failed label is not among them: once the card exists the card step,
    /// and with it labeling, is skipped.
    pub fn retryable_errors(&self) -> Vec<&str> {
        [&self.card, &self.message, &self.refresh]
            .into_iter()
            .filter_map(|step| match step {
                StepOutcome::Failed(reason) => Some(reason.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// The ticket after synchronization, ready to persist
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub ticket: Ticket,
    pub report: SyncReport,
}

/// Orchestrates the card and message services for a ticket save
pub struct TicketSynchronizer<C, M> {
    cards: C,
    messages: M,
}

impl<C: CardService, M: MessageService> TicketSynchronizer<C, M> {
    pub fn new(cards: C, messages: M) -> Self {
        Self { cards, messages }
    }

    pub fn cards(&self) -> &C {
        &self.cards
    }

    pub fn messages(&self) -> &M {
        &self.messages
    }

    /// Bring the external resources in line with the ticket
    ///
    /// Without settings this is a no-op. Never fails: every external error is
    /// captured in the report.
    pub async fn synchronize(
        &self,
        mut ticket: Ticket,
        settings: Option<&Settings>,
        labels: &dyn LabelResolver,
    ) -> SyncOutcome {
        let Some(settings) = settings else {
            debug!(ticket_id = %ticket.id, "No settings configured, skipping synchronization");
            return SyncOutcome {
                ticket,
                report: SyncReport::disabled(),
            };
        };

        let (card, label) = self.sync_card(&mut ticket, settings, labels).await;
        let message = self.sync_message(&mut ticket, settings).await;
        let refresh = self.refresh_message(&ticket, settings).await;

        let report = SyncReport {
            card,
            label,
            message,
            refresh,
        };

        let retryable = report.retryable_errors();
        if !retryable.is_empty() {
            warn!(
                ticket_id = %ticket.id,
                errors = ?retryable,
                "Synchronization incomplete, will retry on next save"
            );
        }
        if let StepOutcome::Failed(reason) = &report.label {
            warn!(
                ticket_id = %ticket.id,
                error = %reason,
                "Trello label not attached; labels are only attached when the card is created"
            );
        }
        if !report.has_errors() {
            debug!(ticket_id = %ticket.id, "Synchronization complete");
        }

        SyncOutcome { ticket, report }
    }

    async fn sync_card(
        &self,
        ticket: &mut Ticket,
        settings: &Settings,
        labels: &dyn LabelResolver,
    ) -> (StepOutcome, StepOutcome) {
        match decision::card_decision(ticket) {
            Decision::Skip(reason) => (StepOutcome::Skipped(reason), StepOutcome::Skipped(reason)),
            Decision::Create => match self.cards.create_card(ticket, settings).await {
                Ok(card) => {
                    ticket.card = Some(card);
                    let label = match self.cards.attach_label(ticket, settings, labels).await {
                        Ok(LabelOutcome::Attached(id)) => StepOutcome::Attached(id),
                        Ok(LabelOutcome::NoLabel) => StepOutcome::NoLabel,
                        Err(e) => {
                            warn!(ticket_id = %ticket.id, error = %e, "Failed to attach Trello label");
                            StepOutcome::Failed(e.to_string())
                        }
                    };
                    (StepOutcome::Created, label)
                }
                Err(e) => {
                    warn!(ticket_id = %ticket.id, error = %e, "Failed to create Trello card");
                    (
                        StepOutcome::Failed(e.to_string()),
                        StepOutcome::Skipped(SkipReason::NoCard),
                    )
                }
            },
        }
    }

    async fn sync_message(&self, ticket: &mut Ticket, settings: &Settings) -> StepOutcome {
        match decision::message_decision(ticket) {
            Decision::Skip(reason) => StepOutcome::Skipped(reason),
            Decision::Create => match self.messages.create_message(ticket, settings).await {
                Ok(message) => {
                    info!(ticket_id = %ticket.id, ts = %message.ts, "Ticket announced in Slack");
                    ticket.message = Some(message);
                    StepOutcome::Created
                }
                Err(e) => {
                    warn!(ticket_id = %ticket.id, error = %e, "Failed to post Slack message");
                    StepOutcome::Failed(e.to_string())
                }
            },
        }
    }

    async fn refresh_message(&self, ticket: &Ticket, settings: &Settings) -> StepOutcome {
        if !decision::should_refresh(ticket) {
            return StepOutcome::Skipped(SkipReason::NoMessage);
        }

        match self.messages.update_message(ticket, settings).await {
            Ok(()) => StepOutcome::Updated,
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "Failed to update Slack message");
                StepOutcome::Failed(e.to_string())
            }
        }
    }
}

impl TicketSynchronizer<TrelloAdapter, SlackAdapter> {
    /// Synchronizer talking to the real services configured in `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let cards = TrelloAdapter::new(&config.services.trello_url)?;
        let messages = SlackAdapter::new(&config.services.slack_url, &config.base_url)?;
        Ok(Self::new(cards, messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CardRef, JobLog, Label, MessageRef, Module, TicketId, TicketStatus};
    use crate::TicketSyncError;
    use async_trait::async_trait;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeCards {
        creates: Cell<usize>,
        labels: RefCell<Vec<String>>,
        fail: Cell<bool>,
        fail_label: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl CardService for FakeCards {
        async fn create_card(&self, ticket: &Ticket, _settings: &Settings) -> Result<CardRef> {
            self.creates.set(self.creates.get() + 1);
            if self.fail.get() {
                return Err(TicketSyncError::Integration("board unavailable".into()));
            }
            Ok(CardRef {
                id: format!("card-{}", ticket.id),
                url: format!("https://trello.com/c/card-{}", ticket.id),
            })
        }

        async fn attach_label(
            &self,
            ticket: &Ticket,
            _settings: &Settings,
            labels: &dyn LabelResolver,
        ) -> Result<LabelOutcome> {
            if self.fail_label.get() {
                return Err(TicketSyncError::Integration("invalid value for idLabels".into()));
            }
            let Some(module) = ticket.module.as_ref() else {
                return Ok(LabelOutcome::NoLabel);
            };
            match labels.find(module)? {
                Some(label) => {
                    self.labels.borrow_mut().push(label.trello_label_id.clone());
                    Ok(LabelOutcome::Attached(label.trello_label_id))
                }
                None => Ok(LabelOutcome::NoLabel),
            }
        }
    }

    #[derive(Default)]
    struct FakeMessages {
        creates: Cell<usize>,
        updates: Cell<usize>,
        /// Card URL seen when the message was posted
        posted_card_url: RefCell<Option<String>>,
        fail: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl MessageService for FakeMessages {
        async fn create_message(&self, ticket: &Ticket, settings: &Settings) -> Result<MessageRef> {
            self.creates.set(self.creates.get() + 1);
            if self.fail.get() {
                return Err(TicketSyncError::Integration("channel_not_found".into()));
            }
            *self.posted_card_url.borrow_mut() = Some(ticket.card_url().to_string());
            Ok(MessageRef {
                ts: "1700000000.000100".into(),
                channel_id: settings.slack.channel_id.clone(),
            })
        }

        async fn update_message(&self, _ticket: &Ticket, _settings: &Settings) -> Result<()> {
            self.updates.set(self.updates.get() + 1);
            Ok(())
        }
    }

    struct Labels(Vec<Label>);

    impl LabelResolver for Labels {
        fn find(&self, module: &Module) -> Result<Option<Label>> {
            Ok(self
                .0
                .iter()
                .find(|l| l.module.as_ref() == Some(module))
                .cloned())
        }
    }

    fn labels() -> Labels {
        Labels(vec![Label {
            id: 1,
            trello_label_id: "lbl-sm".into(),
            name: "Sellermatch".into(),
            color: "green".into(),
            module: Some(Module::from("sellermatch")),
        }])
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.trello.list_id = "list-1".into();
        settings.slack.channel_id = "C123".into();
        settings
    }

    fn ticket(draft: bool) -> Ticket {
        Ticket {
            id: TicketId::new(7),
            ticket_no: "64853".into(),
            draft,
            status: TicketStatus::Open,
            module: Some(Module::from("sellermatch")),
            title: "Payments are not processed.".into(),
            description: None,
            client: None,
            author: None,
            assignee: None,
            joblog: JobLog::default(),
            created_at: String::new(),
            updated_at: String::new(),
            card: None,
            message: None,
        }
    }

    fn synchronizer() -> TicketSynchronizer<FakeCards, FakeMessages> {
        TicketSynchronizer::new(FakeCards::default(), FakeMessages::default())
    }

    #[tokio::test]
    async fn test_without_settings_nothing_happens() {
        let sync = synchronizer();
        let outcome = sync.synchronize(ticket(false), None, &labels()).await;

        assert!(outcome.report.is_disabled());
        assert!(outcome.ticket.card.is_none());
        assert_eq!(sync.cards().creates.get(), 0);
        assert_eq!(sync.messages().creates.get(), 0);
    }

    #[tokio::test]
    async fn test_draft_makes_no_calls() {
        let sync = synchronizer();
        let outcome = sync
            .synchronize(ticket(true), Some(&settings()), &labels())
            .await;

        assert_eq!(outcome.report.card, StepOutcome::Skipped(SkipReason::Draft));
        assert_eq!(outcome.report.message, StepOutcome::Skipped(SkipReason::Draft));
        assert_eq!(outcome.report.refresh, StepOutcome::Skipped(SkipReason::NoMessage));
        assert_eq!(sync.cards().creates.get(), 0);
        assert_eq!(sync.messages().creates.get(), 0);
        assert_eq!(sync.messages().updates.get(), 0);
    }

    #[tokio::test]
    async fn test_publish_creates_card_then_message() {
        let sync = synchronizer();
        let outcome = sync
            .synchronize(ticket(false), Some(&settings()), &labels())
            .await;

        assert_eq!(outcome.report.card, StepOutcome::Created);
        assert_eq!(outcome.report.label, StepOutcome::Attached("lbl-sm".into()));
        assert_eq!(outcome.report.message, StepOutcome::Created);
        // The fresh message is refreshed in the same save
        assert_eq!(outcome.report.refresh, StepOutcome::Updated);
        assert!(!outcome.report.has_errors());

        let ticket = outcome.ticket;
        assert_eq!(ticket.card_id(), Some("card-7"));
        assert_eq!(ticket.message.as_ref().map(|m| m.channel_id.as_str()), Some("C123"));
        assert_eq!(
            sync.messages().posted_card_url.borrow().as_deref(),
            Some("https://trello.com/c/card-7")
        );
    }

    #[tokio::test]
    async fn test_later_saves_do_not_duplicate() {
        let sync = synchronizer();
        let mut t = ticket(false);
        for _ in 0..3 {
            t = sync.synchronize(t, Some(&settings()), &labels()).await.ticket;
        }

        assert_eq!(sync.cards().creates.get(), 1);
        assert_eq!(sync.cards().labels.borrow().len(), 1);
        assert_eq!(sync.messages().creates.get(), 1);
        assert_eq!(sync.messages().updates.get(), 3);
    }

    #[tokio::test]
    async fn test_card_failure_is_retried_on_next_save() {
        let sync = synchronizer();
        sync.cards().fail.set(true);

        let outcome = sync
            .synchronize(ticket(false), Some(&settings()), &labels())
            .await;
        assert!(outcome.report.card.is_failure());
        assert_eq!(outcome.report.label, StepOutcome::Skipped(SkipReason::NoCard));
        assert!(outcome.ticket.card.is_none());
        // Message still goes out, without a card link
        assert_eq!(outcome.report.message, StepOutcome::Created);
        assert_eq!(sync.messages().posted_card_url.borrow().as_deref(), Some(""));

        sync.cards().fail.set(false);
        let outcome = sync
            .synchronize(outcome.ticket, Some(&settings()), &labels())
            .await;
        assert_eq!(outcome.report.card, StepOutcome::Created);
        assert_eq!(outcome.report.message, StepOutcome::Skipped(SkipReason::AlreadyDone));
        assert_eq!(sync.cards().creates.get(), 2);
        assert_eq!(sync.messages().creates.get(), 1);
    }

    #[tokio::test]
    async fn test_message_failure_leaves_message_unset() {
        let sync = synchronizer();
        sync.messages().fail.set(true);

        let outcome = sync
            .synchronize(ticket(false), Some(&settings()), &labels())
            .await;
        assert!(outcome.report.message.is_failure());
        assert_eq!(outcome.report.refresh, StepOutcome::Skipped(SkipReason::NoMessage));
        assert!(outcome.ticket.message.is_none());
        assert!(outcome.ticket.card.is_some());
        assert_eq!(outcome.report.errors(), vec!["Integration error: channel_not_found"]);
    }

    #[tokio::test]
    async fn test_label_failure_is_not_retried() {
        let sync = synchronizer();
        sync.cards().fail_label.set(true);

        let outcome = sync
            .synchronize(ticket(false), Some(&settings()), &labels())
            .await;
        assert_eq!(outcome.report.card, StepOutcome::Created);
        assert!(outcome.report.label.is_failure());
        assert!(outcome.report.has_errors());
        assert!(outcome.report.retryable_errors().is_empty());

        // Card exists now, so the label is not attempted again
        sync.cards().fail_label.set(false);
        let outcome = sync
            .synchronize(outcome.ticket, Some(&settings()), &labels())
            .await;
        assert_eq!(outcome.report.label, StepOutcome::Skipped(SkipReason::AlreadyDone));
        assert!(sync.cards().labels.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_card_and_message_failures_are_retryable() {
        let sync = synchronizer();
        sync.cards().fail.set(true);
        sync.messages().fail.set(true);

        let outcome = sync
            .synchronize(ticket(false), Some(&settings()), &labels())
            .await;
        assert_eq!(
            outcome.report.retryable_errors(),
            vec![
                "Integration error: board unavailable",
                "Integration error: channel_not_found"
            ]
        );
    }

    #[tokio::test]
    async fn test_module_without_label_attaches_nothing() {
        let sync = synchronizer();
        let mut t = ticket(false);
        t.module = Some(Module::from("unmapped"));

        let outcome = sync.synchronize(t, Some(&settings()), &labels()).await;
        assert_eq!(outcome.report.card, StepOutcome::Created);
        assert_eq!(outcome.report.label, StepOutcome::NoLabel);
        assert!(sync.cards().labels.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_existing_message_refreshed_even_as_draft() {
        let sync = synchronizer();
        let mut t = ticket(true);
        t.message = Some(MessageRef {
            ts: "1.1".into(),
            channel_id: "C123".into(),
        });

        let outcome = sync.synchronize(t, Some(&settings()), &labels()).await;
        assert_eq!(outcome.report.refresh, StepOutcome::Updated);
        assert_eq!(sync.messages().creates.get(), 0);
    }

    #[test]
    fn test_step_outcome_display() {
        assert_eq!(StepOutcome::Created.to_string(), "created");
        assert_eq!(
            StepOutcome::Skipped(SkipReason::Draft).to_string(),
            "skipped (draft)"
        );
        assert_eq!(StepOutcome::Failed("boom".into()).to_string(), "failed: boom");
    }
}
