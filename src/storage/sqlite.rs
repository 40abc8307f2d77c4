//! SQLite store implementation

use crate::integrations::LabelResolver;
use crate::model::{
    CardRef, ClientId, ClientRef, JobLog, Label, MessageRef, Module, NewTicket, Settings,
    SlackSettings, Ticket, TicketId, TicketStatus, TrelloSettings,
};
use crate::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to SQLite database file
    pub path: PathBuf,

    /// Enable WAL mode for better concurrency
    pub wal_mode: bool,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wal_mode: true,
        }
    }
}

/// SQLite persistence for tickets, clients, labels and settings
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

const TICKET_COLUMNS: &str = r#"
    t.id, t.ticket_no, t.draft, t.status, t.module, t.title, t.description,
    t.client_id, c.name, t.author, t.assignee,
    t.last_joblog_log, t.last_joblog_message, t.last_joblog_stacktrace,
    t.created_at, t.updated_at,
    t.card_created, t.card_id, t.card_url,
    t.message_sent, t.message_ts, t.message_channel_id
"#;

impl Store {
    /// Open or create a database
    pub fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %config.path.display(), "Opening ticket database");

        let conn = Connection::open(&config.path)?;

        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        let store = Self {
            conn,
            path: Some(config.path),
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                trello_api_key TEXT NOT NULL DEFAULT '',
                trello_api_token TEXT NOT NULL DEFAULT '',
                trello_board_id TEXT NOT NULL DEFAULT '',
                trello_list_id TEXT NOT NULL DEFAULT '',
                slack_token TEXT NOT NULL DEFAULT '',
                slack_channel_id TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS labels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trello_label_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL DEFAULT '',
                color TEXT NOT NULL DEFAULT '',
                module TEXT
            );

            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_no TEXT NOT NULL DEFAULT '',
                draft INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL,
                module TEXT,
                title TEXT NOT NULL,
                description TEXT,
                client_id INTEGER REFERENCES clients(id) ON DELETE SET NULL,
                author TEXT,
                assignee TEXT,
                last_joblog_log TEXT,
                last_joblog_message TEXT,
                last_joblog_stacktrace TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                card_created INTEGER NOT NULL DEFAULT 0,
                card_id TEXT,
                card_url TEXT,
                message_sent INTEGER NOT NULL DEFAULT 0,
                message_ts TEXT,
                message_channel_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_tickets_ticket_no ON tickets(ticket_no);
            CREATE INDEX IF NOT EXISTS idx_labels_module ON labels(module);
            "#,
        )?;

        Ok(())
    }

    /// Get the database path (None for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ============ Settings ============

    /// Load the settings record, if one has been configured
    pub fn settings(&self) -> Result<Option<Settings>> {
        let settings = self
            .conn
            .query_row(
                r#"
                SELECT trello_api_key, trello_api_token, trello_board_id, trello_list_id,
                       slack_token, slack_channel_id
                FROM settings WHERE id = 1
                "#,
                [],
                |row| {
                    Ok(Settings {
                        trello: TrelloSettings {
                            api_key: row.get(0)?,
                            api_token: row.get(1)?,
                            board_id: row.get(2)?,
                            list_id: row.get(3)?,
                        },
                        slack: SlackSettings {
                            token: row.get(4)?,
                            channel_id: row.get(5)?,
                        },
                    })
                },
            )
            .optional()?;

        Ok(settings)
    }

    /// Create or replace the settings record
    pub fn put_settings(&self, settings: &Settings) -> Result<()> {
        tracing::debug!("Storing settings");

        self.conn.execute(
            r#"
            INSERT INTO settings (
                id, trello_api_key, trello_api_token, trello_board_id, trello_list_id,
                slack_token, slack_channel_id, updated_at
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                trello_api_key = excluded.trello_api_key,
                trello_api_token = excluded.trello_api_token,
                trello_board_id = excluded.trello_board_id,
                trello_list_id = excluded.trello_list_id,
                slack_token = excluded.slack_token,
                slack_channel_id = excluded.slack_channel_id,
                updated_at = excluded.updated_at
            "#,
            params![
                &settings.trello.api_key,
                &settings.trello.api_token,
                &settings.trello.board_id,
                &settings.trello.list_id,
                &settings.slack.token,
                &settings.slack.channel_id,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Remove the settings record, disabling synchronization
    ///
    /// Returns whether a record existed.
    pub fn clear_settings(&self) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM settings", [])?;
        Ok(removed > 0)
    }

    // ============ Clients ============

    pub fn add_client(&self, name: &str) -> Result<ClientRef> {
        self.conn.execute(
            "INSERT INTO clients (name, created_at) VALUES (?, ?)",
            params![name, chrono::Utc::now().to_rfc3339()],
        )?;

        let id = ClientId::new(self.conn.last_insert_rowid());
        tracing::info!(client_id = %id, name = %name, "Created client");

        Ok(ClientRef {
            id,
            name: name.to_string(),
        })
    }

    pub fn client(&self, id: ClientId) -> Result<Option<ClientRef>> {
        let client = self
            .conn
            .query_row(
                "SELECT id, name FROM clients WHERE id = ?",
                [id.get()],
                |row| {
                    Ok(ClientRef {
                        id: ClientId::new(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(client)
    }

    pub fn find_client_by_name(&self, name: &str) -> Result<Option<ClientRef>> {
        let client = self
            .conn
            .query_row(
                "SELECT id, name FROM clients WHERE name = ? ORDER BY id LIMIT 1",
                [name],
                |row| {
                    Ok(ClientRef {
                        id: ClientId::new(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(client)
    }

    /// All clients ordered by name
    pub fn clients(&self) -> Result<Vec<ClientRef>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM clients ORDER BY name, id")?;
        let clients = stmt
            .query_map([], |row| {
                Ok(ClientRef {
                    id: ClientId::new(row.get(0)?),
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(clients)
    }

    // ============ Labels ============

    /// Insert a board label unless one with the same Trello id exists
    ///
    /// Existing rows are left untouched. Returns the row and whether it was created.
    pub fn get_or_create_label(
        &self,
        trello_label_id: &str,
        name: &str,
        color: &str,
    ) -> Result<(Label, bool)> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO labels (trello_label_id, name, color) VALUES (?, ?, ?)",
            params![trello_label_id, name, color],
        )?;

        let label = self.label(trello_label_id)?.ok_or_else(|| {
            crate::TicketSyncError::Storage(format!(
                "Label {} vanished after insert",
                trello_label_id
            ))
        })?;

        Ok((label, inserted > 0))
    }

    pub fn label(&self, trello_label_id: &str) -> Result<Option<Label>> {
        let label = self
            .conn
            .query_row(
                "SELECT id, trello_label_id, name, color, module FROM labels WHERE trello_label_id = ?",
                [trello_label_id],
                row_to_label,
            )
            .optional()?;
        Ok(label)
    }

    pub fn labels(&self) -> Result<Vec<Label>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, trello_label_id, name, color, module FROM labels ORDER BY id")?;
        let labels = stmt
            .query_map([], row_to_label)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(labels)
    }

    /// Assign (or with `None`, unassign) a label to a module
    pub fn assign_label(&self, trello_label_id: &str, module: Option<&Module>) -> Result<Label> {
        let updated = self.conn.execute(
            "UPDATE labels SET module = ? WHERE trello_label_id = ?",
            params![module.map(|m| m.as_str()), trello_label_id],
        )?;

        if updated == 0 {
            return Err(crate::TicketSyncError::NotFound(format!(
                "label {}",
                trello_label_id
            )));
        }

        self.label(trello_label_id)?.ok_or_else(|| {
            crate::TicketSyncError::NotFound(format!("label {}", trello_label_id))
        })
    }

    /// First label assigned to the module (lowest row id)
    pub fn find_label_for_module(&self, module: &Module) -> Result<Option<Label>> {
        let label = self
            .conn
            .query_row(
                r#"
                SELECT id, trello_label_id, name, color, module FROM labels
                WHERE module = ? ORDER BY id LIMIT 1
                "#,
                [module.as_str()],
                row_to_label,
            )
            .optional()?;
        Ok(label)
    }

    // ============ Tickets ============

    /// Insert a new ticket and return it with its assigned id
    pub fn insert_ticket(&self, new: &NewTicket) -> Result<Ticket> {
        let now = chrono::Utc::now().to_rfc3339();

        self.conn.execute(
            r#"
            INSERT INTO tickets (
                ticket_no, draft, status, module, title, description, client_id,
                author, assignee, last_joblog_log, last_joblog_message,
                last_joblog_stacktrace, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                &new.ticket_no,
                new.draft,
                new.status.as_str(),
                new.module.as_ref().map(|m| m.as_str()),
                &new.title,
                new.description.as_deref(),
                new.client_id.map(|c| c.get()),
                new.author.as_deref(),
                new.assignee.as_deref(),
                new.joblog.log.as_deref(),
                new.joblog.message.as_deref(),
                new.joblog.stacktrace.as_deref(),
                &now,
                &now,
            ],
        )?;

        let id = TicketId::new(self.conn.last_insert_rowid());
        tracing::info!(ticket_id = %id, ticket_no = %new.ticket_no, "Inserted ticket");

        self.ticket(id)?
            .ok_or_else(|| crate::TicketSyncError::Storage(format!("Ticket {} vanished", id)))
    }

    pub fn ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets t LEFT JOIN clients c ON c.id = t.client_id WHERE t.id = ?",
            TICKET_COLUMNS
        );
        let ticket = self
            .conn
            .query_row(&sql, [id.get()], row_to_ticket)
            .optional()?;
        Ok(ticket)
    }

    /// Load a ticket or fail with `NotFound`
    pub fn require_ticket(&self, id: TicketId) -> Result<Ticket> {
        self.ticket(id)?
            .ok_or_else(|| crate::TicketSyncError::NotFound(format!("ticket {}", id)))
    }

    pub fn find_ticket_by_no(&self, ticket_no: &str) -> Result<Option<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets t LEFT JOIN clients c ON c.id = t.client_id \
             WHERE t.ticket_no = ? ORDER BY t.id LIMIT 1",
            TICKET_COLUMNS
        );
        let ticket = self
            .conn
            .query_row(&sql, [ticket_no], row_to_ticket)
            .optional()?;
        Ok(ticket)
    }

    /// Tickets, newest first, optionally filtered by status
    pub fn tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>> {
        let base = format!(
            "SELECT {} FROM tickets t LEFT JOIN clients c ON c.id = t.client_id",
            TICKET_COLUMNS
        );

        let tickets = match status {
            Some(status) => {
                let sql = format!("{} WHERE t.status = ? ORDER BY t.created_at DESC, t.id DESC", base);
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([status.as_str()], row_to_ticket)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!("{} ORDER BY t.created_at DESC, t.id DESC", base);
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], row_to_ticket)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(tickets)
    }

    /// Persist every mutable field of a ticket
    pub fn update_ticket(&self, ticket: &Ticket) -> Result<()> {
        let card = ticket.card.as_ref();
        let message = ticket.message.as_ref();

        let updated = self.conn.execute(
            r#"
            UPDATE tickets SET
                ticket_no = ?, draft = ?, status = ?, module = ?, title = ?,
                description = ?, client_id = ?, author = ?, assignee = ?,
                last_joblog_log = ?, last_joblog_message = ?, last_joblog_stacktrace = ?,
                updated_at = ?,
                card_created = ?, card_id = ?, card_url = ?,
                message_sent = ?, message_ts = ?, message_channel_id = ?
            WHERE id = ?
            "#,
            params![
                &ticket.ticket_no,
                ticket.draft,
                ticket.status.as_str(),
                ticket.module.as_ref().map(|m| m.as_str()),
                &ticket.title,
                ticket.description.as_deref(),
                ticket.client.as_ref().map(|c| c.id.get()),
                ticket.author.as_deref(),
                ticket.assignee.as_deref(),
                ticket.joblog.log.as_deref(),
                ticket.joblog.message.as_deref(),
                ticket.joblog.stacktrace.as_deref(),
                &ticket.updated_at,
                card.is_some(),
                card.map(|c| c.id.as_str()),
                card.map(|c| c.url.as_str()),
                message.is_some(),
                message.map(|m| m.ts.as_str()),
                message.map(|m| m.channel_id.as_str()),
                ticket.id.get(),
            ],
        )?;

        if updated == 0 {
            return Err(crate::TicketSyncError::NotFound(format!(
                "ticket {}",
                ticket.id
            )));
        }

        tracing::debug!(ticket_id = %ticket.id, "Ticket persisted");
        Ok(())
    }
}

impl LabelResolver for Store {
    fn find(&self, module: &Module) -> Result<Option<Label>> {
        self.find_label_for_module(module)
    }
}

// Helper functions for row conversions

fn row_to_label(row: &Row<'_>) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get(0)?,
        trello_label_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        module: row.get::<_, Option<String>>(4)?.map(Module::new),
    })
}

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let status_str: String = row.get(3)?;
    let status = status_str.parse::<TicketStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let client = match (row.get::<_, Option<i64>>(7)?, row.get::<_, Option<String>>(8)?) {
        (Some(id), Some(name)) => Some(ClientRef {
            id: ClientId::new(id),
            name,
        }),
        _ => None,
    };

    let card = flagged_pair(row.get(16)?, row.get(17)?, row.get(18)?)
        .map(|(id, url)| CardRef { id, url });
    let message = flagged_pair(row.get(19)?, row.get(20)?, row.get(21)?)
        .map(|(ts, channel_id)| MessageRef { ts, channel_id });

    Ok(Ticket {
        id: TicketId::new(row.get(0)?),
        ticket_no: row.get(1)?,
        draft: row.get(2)?,
        status,
        module: row.get::<_, Option<String>>(4)?.map(Module::new),
        title: row.get(5)?,
        description: row.get(6)?,
        client,
        author: row.get(9)?,
        assignee: row.get(10)?,
        joblog: JobLog {
            log: row.get(11)?,
            message: row.get(12)?,
            stacktrace: row.get(13)?,
        },
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        card,
        message,
    })
}

/// A flag plus its two id columns; rows with the flag but no ids load as absent
fn flagged_pair(
    flag: bool,
    first: Option<String>,
    second: Option<String>,
) -> Option<(String, String)> {
    match (flag, first, second) {
        (true, Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some((a, b)),
        _ => None,
    }
}
