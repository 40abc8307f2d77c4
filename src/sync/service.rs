//! Ticket save orchestration
//!
//! Every write path goes through [`TicketService::save`]: load settings,
//! synchronize, stamp, persist.

use super::synchronizer::{SyncReport, TicketSynchronizer};
use crate::integrations::{CardService, MessageService};
use crate::model::{NewTicket, Ticket, TicketId};
use crate::storage::Store;
use crate::Result;
use tracing::info;

/// Saves tickets and keeps their external resources in sync
pub struct TicketService<'a, C, M> {
    store: &'a Store,
    synchronizer: TicketSynchronizer<C, M>,
}

impl<'a, C: CardService, M: MessageService> TicketService<'a, C, M> {
    pub fn new(store: &'a Store, synchronizer: TicketSynchronizer<C, M>) -> Self {
        Self {
            store,
            synchronizer,
        }
    }

    pub fn synchronizer(&self) -> &TicketSynchronizer<C, M> {
        &self.synchronizer
    }

    /// Synchronize and persist a ticket
    ///
    /// External failures end up in the report; only storage errors fail the save.
    pub async fn save(&self, ticket: Ticket) -> Result<(Ticket, SyncReport)> {
        let settings = self.store.settings()?;
        let outcome = self
            .synchronizer
            .synchronize(ticket, settings.as_ref(), self.store)
            .await;

        let mut ticket = outcome.ticket;
        ticket.update_timestamp();
        self.store.update_ticket(&ticket)?;

        Ok((ticket, outcome.report))
    }

    /// Insert a new ticket and run its first save
    pub async fn create(&self, new: &NewTicket) -> Result<(Ticket, SyncReport)> {
        let ticket = self.store.insert_ticket(new)?;
        info!(ticket_id = %ticket.id, draft = ticket.draft, "Created ticket");
        self.save(ticket).await
    }

    /// Clear the draft flag and save
    pub async fn publish(&self, id: TicketId) -> Result<(Ticket, SyncReport)> {
        let mut ticket = self.store.require_ticket(id)?;
        ticket.draft = false;
        info!(ticket_id = %id, "Publishing ticket");
        self.save(ticket).await
    }

    /// Save a stored ticket unchanged, retrying any pending steps
    pub async fn resave(&self, id: TicketId) -> Result<(Ticket, SyncReport)> {
        let ticket = self.store.require_ticket(id)?;
        self.save(ticket).await
    }

    /// Apply `edit` to a stored ticket and save it
    pub async fn update<F>(&self, id: TicketId, edit: F) -> Result<(Ticket, SyncReport)>
    where
        F: FnOnce(&mut Ticket),
    {
        let mut ticket = self.store.require_ticket(id)?;
        edit(&mut ticket);
        self.save(ticket).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{LabelOutcome, LabelResolver};
    use crate::model::{CardRef, MessageRef, Module, Settings, TicketStatus};
    use crate::sync::{SkipReason, StepOutcome};
    use async_trait::async_trait;
    use std::cell::Cell;

    #[derive(Default)]
    struct Cards {
        calls: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl CardService for Cards {
        async fn create_card(&self, ticket: &Ticket, _settings: &Settings) -> Result<CardRef> {
            self.calls.set(self.calls.get() + 1);
            Ok(CardRef {
                id: format!("c{}", ticket.id),
                url: format!("https://trello.com/c/c{}", ticket.id),
            })
        }

        async fn attach_label(
            &self,
            ticket: &Ticket,
            _settings: &Settings,
            labels: &dyn LabelResolver,
        ) -> Result<LabelOutcome> {
            let label = match ticket.module.as_ref() {
                Some(module) => labels.find(module)?,
                None => None,
            };
            Ok(label.map_or(LabelOutcome::NoLabel, |l| {
                LabelOutcome::Attached(l.trello_label_id)
            }))
        }
    }

    #[derive(Default)]
    struct Messages {
        creates: Cell<usize>,
        updates: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl MessageService for Messages {
        async fn create_message(&self, _ticket: &Ticket, settings: &Settings) -> Result<MessageRef> {
            self.creates.set(self.creates.get() + 1);
            Ok(MessageRef {
                ts: "1.000".into(),
                channel_id: settings.slack.channel_id.clone(),
            })
        }

        async fn update_message(&self, _ticket: &Ticket, _settings: &Settings) -> Result<()> {
            self.updates.set(self.updates.get() + 1);
            Ok(())
        }
    }

    fn store_with_settings() -> Store {
        let store = Store::open_in_memory().unwrap();
        let mut settings = Settings::default();
        settings.trello.list_id = "L1".into();
        settings.slack.channel_id = "C1".into();
        store.put_settings(&settings).unwrap();
        store
    }

    fn service(store: &Store) -> TicketService<'_, Cards, Messages> {
        TicketService::new(
            store,
            TicketSynchronizer::new(Cards::default(), Messages::default()),
        )
    }

    #[tokio::test]
    async fn test_draft_lifecycle() {
        let store = store_with_settings();
        let (_, created) = store
            .get_or_create_label("lbl1", "Sellermatch", "green")
            .unwrap();
        assert!(created);
        store
            .assign_label("lbl1", Some(&Module::from("sellermatch")))
            .unwrap();

        let service = service(&store);
        let (ticket, report) = service
            .create(
                &NewTicket::draft("Payments are not processed.")
                    .with_ticket_no("64853")
                    .with_module("sellermatch"),
            )
            .await
            .unwrap();
        assert_eq!(report.card, StepOutcome::Skipped(SkipReason::Draft));
        assert!(ticket.card.is_none());

        let (ticket, report) = service.publish(ticket.id).await.unwrap();
        assert_eq!(report.card, StepOutcome::Created);
        assert_eq!(report.label, StepOutcome::Attached("lbl1".into()));
        assert_eq!(report.message, StepOutcome::Created);

        // Persisted
        let stored = store.require_ticket(ticket.id).unwrap();
        assert!(stored.card_created());
        assert!(stored.message_sent());
        assert!(!stored.draft);

        let (_, report) = service
            .update(ticket.id, |t| t.status = TicketStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(report.card, StepOutcome::Skipped(SkipReason::AlreadyDone));
        assert_eq!(report.refresh, StepOutcome::Updated);
        assert_eq!(
            store.require_ticket(ticket.id).unwrap().status,
            TicketStatus::InProgress
        );

        let synchronizer = service.synchronizer();
        assert_eq!(synchronizer.cards().calls.get(), 1);
        assert_eq!(synchronizer.messages().creates.get(), 1);
        assert_eq!(synchronizer.messages().updates.get(), 2);
    }

    #[tokio::test]
    async fn test_save_without_settings_only_persists() {
        let store = Store::open_in_memory().unwrap();
        let service = service(&store);

        let (ticket, report) = service
            .create(&NewTicket::draft("No integrations").with_status(TicketStatus::Open))
            .await
            .unwrap();
        let (_, report_after_publish) = service.publish(ticket.id).await.unwrap();

        assert!(report.is_disabled());
        assert!(report_after_publish.is_disabled());
        assert!(!store.require_ticket(ticket.id).unwrap().draft);
        assert_eq!(service.synchronizer().cards().calls.get(), 0);
    }

    #[tokio::test]
    async fn test_publish_missing_ticket() {
        let store = store_with_settings();
        let service = service(&store);
        assert!(service.publish(TicketId::new(404)).await.is_err());
    }
}
