//! Board label import

use crate::integrations::TrelloAdapter;
use crate::model::Settings;
use crate::storage::Store;
use crate::Result;
use tracing::info;

/// Counts from one label import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelSyncSummary {
    pub fetched: usize,
    pub created: usize,
}

/// Import the board's labels into the store
///
/// Labels already known by Trello id are left as they are, including their
/// module assignment.
pub async fn sync_board_labels(
    store: &Store,
    trello: &TrelloAdapter,
    settings: &Settings,
) -> Result<LabelSyncSummary> {
    let board_labels = trello.board_labels(settings).await?;

    let mut summary = LabelSyncSummary {
        fetched: board_labels.len(),
        created: 0,
    };

    for label in &board_labels {
        let color = label.color.as_deref().unwrap_or("");
        let (_, created) = store.get_or_create_label(&label.id, &label.name, color)?;
        if created {
            summary.created += 1;
        }
    }

    info!(
        fetched = summary.fetched,
        created = summary.created,
        "Synchronized Trello board labels"
    );

    Ok(summary)
}
