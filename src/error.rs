//! Error types for the migration engine

use thiserror::Error;

/// Migration error
///
/// Everything except [`MigrationError::Validation`] is raised while
/// `migrate()` runs and aborts the whole run. Unresolved references are not
/// errors; they degrade to empty fields in the patched payload.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Asset metadata or staging input rejected at registration time
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Write token rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit retries exhausted
    #[error("Rate limited after {attempts} attempts: {url}")]
    RateLimited { url: String, attempts: u32 },

    /// A registered foreign asset could not be downloaded
    #[error("Could not fetch foreign asset {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    /// Cancellation signal triggered
    #[error("Migration cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl MigrationError {
    /// Whether this error came from the remote side rather than local input
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            MigrationError::Http(_)
                | MigrationError::Server { .. }
                | MigrationError::Unauthorized(_)
                | MigrationError::NotFound(_)
                | MigrationError::RateLimited { .. }
                | MigrationError::AssetFetch { .. }
                | MigrationError::InvalidResponse(_)
        )
    }
}

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;
