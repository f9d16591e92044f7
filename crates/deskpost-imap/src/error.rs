//! Error types for the IMAP engine.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Connection attempt did not complete within the connect timeout.
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The server's first line was not an `* OK` greeting.
    #[error("Greeting failed: {0}")]
    Greeting(String),

    /// A command's completion line did not arrive within its timeout.
    #[error("Command {tag} timed out after {timeout:?}")]
    Timeout {
        /// Tag of the command that timed out.
        tag: String,
        /// The timeout that expired.
        timeout: Duration,
    },

    /// A command was issued while another was still awaiting completion.
    #[error("Command overlap: {0} is still awaiting its completion line")]
    CommandInFlight(String),

    /// Server completed the command with NO.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server completed the command with BAD.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The connection was closed by the peer or by `close()`.
    #[error("Connection closed")]
    Closed,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
