//! Storage layer
//!
//! SQLite persistence for tickets, clients, board labels and the settings
//! record. The store is also the label resolver used when attaching labels
//! to cards.

mod sqlite;

pub use sqlite::{Store, StoreConfig};
