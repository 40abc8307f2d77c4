//! ticketsync configuration file handling
//!
//! Loads and manages the ~/.config/ticketsync/config.yaml file.

use crate::model::TicketId;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Base URLs of the external APIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUrls {
    /// Trello REST API root
    #[serde(default = "default_trello_url")]
    pub trello_url: String,

    /// Slack Web API root
    #[serde(default = "default_slack_url")]
    pub slack_url: String,
}

fn default_trello_url() -> String {
    "https://api.trello.com".to_string()
}

fn default_slack_url() -> String {
    "https://slack.com/api".to_string()
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            trello_url: default_trello_url(),
            slack_url: default_slack_url(),
        }
    }
}

/// ticketsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database
    #[serde(default = "default_database_path")]
    pub database: PathBuf,

    /// Base URL of the admin site, used to build ticket links
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// External API endpoints
    #[serde(default)]
    pub services: ServiceUrls,
}

fn config_dir() -> PathBuf {
    // Always use ~/.config for consistency across platforms (macOS, Linux)
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("ticketsync");
    path
}

fn default_database_path() -> PathBuf {
    config_dir().join("tickets.db")
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            database: default_database_path(),
            base_url: default_base_url(),
            services: ServiceUrls::default(),
        }
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::TicketSyncError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading ticketsync configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;

        tracing::debug!(
            database = %config.database.display(),
            base_url = %config.base_url,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving ticketsync configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/ticketsync/config.yaml)
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }

    /// Check that the URLs are usable
    pub fn validate(&self) -> Result<()> {
        let urls = [
            ("base_url", &self.base_url),
            ("services.trello_url", &self.services.trello_url),
            ("services.slack_url", &self.services.slack_url),
        ];

        for (field, value) in urls {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(crate::TicketSyncError::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    field, value
                )));
            }
        }

        Ok(())
    }

    /// Admin change-page URL for a ticket
    pub fn admin_url(&self, ticket_id: TicketId) -> String {
        admin_change_url(&self.base_url, ticket_id)
    }
}

/// Admin change-page URL for a ticket under `base_url`
pub fn admin_change_url(base_url: &str, ticket_id: TicketId) -> String {
    format!(
        "{}/admin/tickets/ticket/{}/change/",
        base_url.trim_end_matches('/'),
        ticket_id
    )
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TicketId;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::new();
        assert!(config.database.ends_with("ticketsync/tickets.db"));
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.services.trello_url, "https://api.trello.com");
        assert_eq!(config.services.slack_url, "https://slack.com/api");
    }

    #[test]
    fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = AppConfig::new();
        config.base_url = "https://tickets.example.com".to_string();
        config.save(path).unwrap();

        let loaded = AppConfig::load(path).unwrap();
        assert_eq!(loaded.base_url, "https://tickets.example.com");
        assert_eq!(loaded.services, ServiceUrls::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let yaml = "base_url: https://admin.example.com\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.base_url, "https://admin.example.com");
        assert_eq!(config.services.slack_url, "https://slack.com/api");
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/nonexistent/config.yaml");
        assert!(matches!(result, Err(crate::TicketSyncError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = AppConfig::new();
        config.services.trello_url = "api.trello.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_admin_url() {
        let mut config = AppConfig::new();
        config.base_url = "https://admin.example.com/".to_string();
        assert_eq!(
            config.admin_url(TicketId::new(12)),
            "https://admin.example.com/admin/tickets/ticket/12/change/"
        );
    }
}
