//! Error types for ticketsync
//!
//! Defines one error enum covering storage, configuration and the external
//! services. Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for ticketsync operations
pub type Result<T> = std::result::Result<T, TicketSyncError>;

/// Error type for ticketsync operations
#[derive(Error, Debug)]
pub enum TicketSyncError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage/database errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Parsing errors (status names, API payloads)
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found (ticket, client, label)
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// External service rejected a request (Trello, Slack)
    #[error("Integration error: {0}")]
    Integration(String),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Anyhow errors (for more context)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        let err: TicketSyncError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, TicketSyncError::Json(_)));

        let err: TicketSyncError = anyhow::anyhow!("No access token in response").into();
        assert_eq!(err.to_string(), "No access token in response");
    }

    #[test]
    fn test_display() {
        let err = TicketSyncError::Integration("Slack API error: not_in_channel".into());
        assert_eq!(
            err.to_string(),
            "Integration error: Slack API error: not_in_channel"
        );
    }
}
