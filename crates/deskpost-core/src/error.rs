//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] deskpost_imap::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ticket platform request failed.
    #[error("Ticket API error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ticket platform returned an unusable response.
    #[error("Ticket error: {0}")]
    Ticket(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
