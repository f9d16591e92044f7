//! # deskpost-imap
//!
//! A minimal, hand-built async IMAP client engine for mailbox ingestion.
//!
//! This is not a general IMAP library: it implements exactly the subset a
//! polling ingester needs (LOGIN, SELECT, SEARCH UNSEEN, header-only FETCH,
//! STORE `\Seen`, LOGOUT) over TCP or TLS, with strict one-command-at-a-time
//! semantics and bounded waits everywhere.
//!
//! ## Layers
//!
//! - [`connection::connect`]: transport connector (TCP/TLS, connect timeout)
//! - [`connection::ImapSession`]: the protocol state machine. Greeting
//!   handshake, sequential tags, tagged completion matching, per-command
//!   timeouts, CRLF framing across arbitrary chunk boundaries
//! - [`parser`]: pure functions extracting SEARCH ids, header summaries and
//!   SELECT counters from a completed command's captured lines
//! - [`command`]: command text builders and the tag sequence
//!
//! ## Quick start
//!
//! ```ignore
//! use std::time::Duration;
//! use deskpost_imap::{ImapSession, SessionConfig, command, parser};
//!
//! let stream = deskpost_imap::connect("imap.example.com", 993, true,
//!     Duration::from_secs(10)).await?;
//! let mut session = ImapSession::connect(stream, SessionConfig::default()).await?;
//!
//! session.run(&command::login("user", "pass")).await?.require_ok()?;
//! session.run(&command::select("INBOX")).await?.require_ok()?;
//!
//! let response = session.run(command::search_unseen()).await?.require_ok()?;
//! let ids = parser::search_ids(&response.lines);
//!
//! session.run(command::logout()).await.ok();
//! session.close().await;
//! ```
//!
//! No pipelining, no IDLE, no MIME: the engine deliberately stops at
//! header-level metadata.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;

pub use command::TagSequence;
pub use connection::{
    CommandResponse, ImapSession, ImapStream, LineStream, SessionConfig, Status, connect,
};
pub use error::{Error, Result};
pub use parser::{HeaderSummary, MailboxCounters};
