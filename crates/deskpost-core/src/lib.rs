//! # deskpost-core
//!
//! Core ingestion logic for `deskpost`: configuration, the ingestion ledger,
//! ticket-platform collaborators and the mailbox poller.
//!
//! The pipeline per tick: load config → ensure the ledger schema → connect
//! and LOGIN/SELECT/SEARCH UNSEEN → per message FETCH headers, dedup against
//! the ledger, recipient-filter, correlate (subject tag → thread references
//! → new ticket), persist, flag `\Seen` → LOGOUT. The ledger's
//! `UNIQUE(mailbox, uid)` is the at-most-once guarantee.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod ingest;
pub mod poller;
pub mod ticket;

pub use config::{ImapSettings, MailConfig, SmtpSettings};
pub use error::{Error, Result};
pub use ingest::{IngestionLog, IngestionLogEntry, NewLogEntry};
pub use poller::{MailboxPoller, SkipReason, TickOutcome, TickSummary};
pub use ticket::{HttpTicketDirectory, ReplyEntry, TicketDirectory, TicketDraft, TicketRef};
