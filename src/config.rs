//! Configuration for the migration client

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MigrationError, Result};

/// Migration client configuration
///
/// Loaded from TOML; every field has a default so a file only needs the
/// repository name and write token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Repository name, sent as the `repository` header on write calls
    #[serde(default)]
    pub repository: String,

    /// Write API token
    #[serde(default)]
    pub write_token: String,

    /// API key for the document migration API
    #[serde(default)]
    pub migration_api_key: Option<String>,

    /// Access token for private content API reads
    #[serde(default)]
    pub access_token: Option<String>,

    /// Content (read) API base URL, e.g. `https://my-repo.cdn.example.io/api/v2`
    #[serde(default = "default_content_api_url")]
    pub content_api_url: String,

    /// Asset API base URL
    #[serde(default = "default_asset_api_url")]
    pub asset_api_url: String,

    /// Document migration API base URL
    #[serde(default = "default_migration_api_url")]
    pub migration_api_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after HTTP 429 before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between rate-limited retries when no Retry-After is sent
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Page size for asset listing
    #[serde(default = "default_page_size")]
    pub asset_page_size: u32,

    /// Page size for document listing
    #[serde(default = "default_page_size")]
    pub document_page_size: u32,
}

fn default_content_api_url() -> String {
    "http://localhost:8080/api/v2".to_string()
}

fn default_asset_api_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_migration_api_url() -> String {
    "http://localhost:8082".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_page_size() -> u32 {
    100
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            write_token: String::new(),
            migration_api_key: None,
            access_token: None,
            content_api_url: default_content_api_url(),
            asset_api_url: default_asset_api_url(),
            migration_api_url: default_migration_api_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            asset_page_size: default_page_size(),
            document_page_size: default_page_size(),
        }
    }
}

impl MigrationConfig {
    /// Config for a repository with a write token, other fields defaulted
    pub fn new(repository: impl Into<String>, write_token: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            write_token: write_token.into(),
            ..Default::default()
        }
    }

    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MigrationError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse config from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MigrationError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| MigrationError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content).map_err(|e| {
            MigrationError::Config(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// Check the config is usable against a live repository
    pub fn validate(&self) -> Result<()> {
        if self.repository.trim().is_empty() {
            return Err(MigrationError::Config("repository is required".into()));
        }
        if self.write_token.trim().is_empty() {
            return Err(MigrationError::Config("write_token is required".into()));
        }
        for (name, value) in [
            ("content_api_url", &self.content_api_url),
            ("asset_api_url", &self.asset_api_url),
            ("migration_api_url", &self.migration_api_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| MigrationError::Config(format!("{} is not a valid URL: {}", name, e)))?;
        }
        if self.asset_page_size == 0 || self.document_page_size == 0 {
            return Err(MigrationError::Config("page sizes must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = MigrationConfig::from_toml_str(
            r#"
            repository = "my-repo"
            write_token = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.repository, "my-repo");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.asset_page_size, 100);
        assert!(config.migration_api_key.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_missing_token() {
        let config = MigrationConfig::new("my-repo", "");
        assert!(matches!(config.validate(), Err(MigrationError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = MigrationConfig::new("my-repo", "secret");
        config.asset_api_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migration.toml");

        let mut config = MigrationConfig::new("my-repo", "secret");
        config.max_retries = 7;
        config.save(&path).unwrap();

        let loaded = MigrationConfig::load(&path).unwrap();
        assert_eq!(loaded.repository, "my-repo");
        assert_eq!(loaded.max_retries, 7);
    }
}
