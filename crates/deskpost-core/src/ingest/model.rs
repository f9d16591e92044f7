//! Ingestion ledger models.

use chrono::{DateTime, Utc};

/// One row of the ingestion ledger.
///
/// Append-only; at most one row per `(mailbox, uid)` ever exists. A null
/// ticket reference records a message that was seen but produced no ticket
/// (recipient filter).
#[derive(Debug, Clone)]
pub struct IngestionLogEntry {
    /// Row id.
    pub id: i64,
    /// Mailbox the message was polled from.
    pub mailbox: String,
    /// IMAP UID within that mailbox.
    pub uid: String,
    /// `Message-Id` header, if present.
    pub message_id: Option<String>,
    /// Extracted sender address, if present.
    pub from_email: Option<String>,
    /// Subject, if present.
    pub subject: Option<String>,
    /// Ticket the message was attached to, if any.
    pub ticket_id: Option<i64>,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

/// A ledger row about to be written.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    /// Mailbox the message was polled from.
    pub mailbox: String,
    /// IMAP UID within that mailbox.
    pub uid: String,
    /// `Message-Id` header, if present.
    pub message_id: Option<String>,
    /// Extracted sender address, if present.
    pub from_email: Option<String>,
    /// Subject, if present.
    pub subject: Option<String>,
    /// Ticket the message was attached to, if any.
    pub ticket_id: Option<i64>,
}
