//! Ticket platform collaborators.
//!
//! Ticket CRUD, workflow rules and user management live in the ticketing
//! platform; the pipeline only ever touches them through [`TicketDirectory`].

mod http;

use serde::{Deserialize, Serialize};

use crate::Result;

pub use http::HttpTicketDirectory;

/// Reference to an externally owned ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRef {
    /// Ticket id.
    pub id: i64,
    /// Human-facing tag, e.g. `TB#00042`.
    pub tag: String,
}

/// Payload for creating a new ticket from an email.
#[derive(Debug, Clone, Serialize)]
pub struct TicketDraft {
    /// Ticket subject.
    pub subject: String,
    /// Structured description block (mailbox, message-id, from, date).
    pub description: String,
    /// Requester user id, when the sender matched a known user.
    pub requester_id: Option<i64>,
}

/// Payload for appending an inbound reply to an existing ticket.
///
/// Appending never triggers outbound email; it records history only.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyEntry {
    /// Structured body block (mailbox, message-id, from, date).
    pub body: String,
    /// Sender address, if one was extracted.
    pub from_email: Option<String>,
}

/// Operations the pipeline consumes from the ticketing platform.
///
/// `find_by_tag` and `find_user_by_email` match exactly but
/// case-insensitively; that contract belongs to the implementor.
pub trait TicketDirectory {
    /// Creates a ticket and returns its reference.
    fn create_ticket(&self, draft: &TicketDraft) -> impl Future<Output = Result<TicketRef>> + Send;

    /// Appends an inbound-reply history entry to a ticket.
    fn append_reply(
        &self,
        ticket_id: i64,
        entry: &ReplyEntry,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Looks a ticket up by its exact tag, case-insensitively.
    fn find_by_tag(&self, tag: &str) -> impl Future<Output = Result<Option<TicketRef>>> + Send;

    /// Looks a user id up by exact, case-insensitive email match.
    fn find_user_by_email(&self, email: &str)
    -> impl Future<Output = Result<Option<i64>>> + Send;
}
