//! Logging configuration using tracing
//!
//! Structured logging to stderr with support for the RUST_LOG environment
//! variable. External-service failures are reported here and nowhere else.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber
///
/// Sets up structured logging with:
/// - Filtering via RUST_LOG (defaults to "warn" so failed Trello/Slack calls still show)
/// - Pretty formatted output to stderr
///
/// # Example RUST_LOG values
/// - `RUST_LOG=info` - Show successful external writes
/// - `RUST_LOG=ticketsync=debug` - Request-level detail for the adapters
///
/// # Errors
/// Returns an error if the subscriber has already been initialized
pub fn init() -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .pretty(),
        )
        .try_init()
        .map_err(|e| {
            crate::TicketSyncError::Other(format!("Failed to initialize tracing: {}", e))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        let _ = init();
        assert!(matches!(init(), Err(crate::TicketSyncError::Other(_))));
    }

    #[test]
    fn test_structured_fields() {
        let _ = init();
        tracing::warn!(ticket_id = 7, error = "connection refused", "Card creation failed");
    }
}
