//! The IMAP session state machine.
//!
//! `ImapSession` turns a raw byte stream into a request/response protocol
//! machine behind three operations: [`ImapSession::connect`],
//! [`ImapSession::run`] and [`ImapSession::close`]. Internally it moves
//! through `AwaitingGreeting → Ready → InFlight → Ready → … → Closed`,
//! driven only by received lines and expired timers.
//!
//! One command may be outstanding at a time; there is no pipelining. A
//! command that times out leaves its tag behind as *stale*, and a completion
//! line for a stale tag arriving later is dropped rather than redelivered.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace, warn};

use super::framed::LineStream;
use crate::command::TagSequence;
use crate::{Error, Result};

/// Timeouts for one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// How long to wait for the server greeting after connecting.
    pub greeting_timeout: Duration,
    /// How long each command may wait for its completion line.
    pub command_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(15),
        }
    }
}

/// Completion status of a tagged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command succeeded.
    Ok,
    /// Server refused the command.
    No,
    /// Server could not parse the command.
    Bad,
}

/// The outcome of one command: its completion status plus every untagged
/// line received while it was outstanding, in arrival order.
///
/// Lines are stored exactly as received, only the CRLF removed: header
/// parsing depends on original spacing, so nothing is ever trimmed here.
#[derive(Debug)]
pub struct CommandResponse {
    /// Completion status from the tagged line.
    pub status: Status,
    /// Text following the status word on the completion line.
    pub text: String,
    /// Untagged lines accumulated while the command was outstanding.
    pub lines: Vec<String>,
}

impl CommandResponse {
    /// Returns the response if the server said OK, otherwise the NO/BAD
    /// text as a typed error.
    pub fn require_ok(self) -> Result<Self> {
        match self.status {
            Status::Ok => Ok(self),
            Status::No => Err(Error::No(self.text)),
            Status::Bad => Err(Error::Bad(self.text)),
        }
    }
}

enum SessionState {
    Ready,
    InFlight { tag: String },
    Closed,
}

/// An established IMAP session over any duplex byte stream.
pub struct ImapSession<S> {
    lines: LineStream<S>,
    tags: TagSequence,
    state: SessionState,
    /// Tags of timed-out commands whose late completion lines must be
    /// ignored, never redelivered.
    stale_tags: Vec<String>,
    config: SessionConfig,
}

impl<S> ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Establishes a session: buffers and frames incoming bytes until the
    /// greeting line arrives, then transitions to Ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Greeting`] if the first line is not `* OK …`
    /// (case-insensitive), or a timeout error if no greeting arrives within
    /// `config.greeting_timeout`.
    pub async fn connect(stream: S, config: SessionConfig) -> Result<Self> {
        let mut lines = LineStream::new(stream);

        let greeting =
            match tokio::time::timeout(config.greeting_timeout, lines.read_line()).await {
                Ok(line) => line?,
                Err(_) => {
                    return Err(Error::Greeting(format!(
                        "no greeting within {:?}",
                        config.greeting_timeout
                    )));
                }
            };

        if !is_ok_greeting(&greeting) {
            return Err(Error::Greeting(greeting));
        }
        trace!(%greeting, "server greeting accepted");

        Ok(Self {
            lines,
            tags: TagSequence::new(),
            state: SessionState::Ready,
            stale_tags: Vec::new(),
            config,
        })
    }

    /// Runs one command to completion.
    ///
    /// Allocates the next sequential tag, writes `"<tag> <command>\r\n"` and
    /// waits for the matching `<tag> (OK|NO|BAD)` line, accumulating every
    /// other line received in between. NO/BAD completions are returned as a
    /// [`CommandResponse`], not errors; see [`CommandResponse::require_ok`].
    ///
    /// # Errors
    ///
    /// - [`Error::CommandInFlight`] if a command is already outstanding.
    /// - [`Error::Timeout`] if no completion line arrives in time; the
    ///   session stays usable and the tag becomes stale.
    /// - [`Error::Closed`] / [`Error::Io`] on disconnect, after which the
    ///   session is unusable and the caller must reconnect.
    pub async fn run(&mut self, command: &str) -> Result<CommandResponse> {
        match &self.state {
            SessionState::Ready => {}
            SessionState::InFlight { tag } => {
                return Err(Error::CommandInFlight(tag.clone()));
            }
            SessionState::Closed => return Err(Error::Closed),
        }

        let tag = self.tags.next();
        debug!(%tag, command = redact(command), "issuing command");
        if let Err(e) = self.lines.write_line(&format!("{tag} {command}")).await {
            self.state = SessionState::Closed;
            return Err(e);
        }
        self.state = SessionState::InFlight { tag: tag.clone() };

        let timeout = self.config.command_timeout;
        match tokio::time::timeout(timeout, self.await_completion(&tag)).await {
            Ok(Ok(response)) => {
                self.state = SessionState::Ready;
                Ok(response)
            }
            Ok(Err(e)) => {
                // Socket-level failure: the outstanding command fails and
                // the session cannot be reused.
                self.state = SessionState::Closed;
                Err(e)
            }
            Err(_) => {
                warn!(%tag, ?timeout, "command timed out; discarding stale tag");
                self.stale_tags.push(tag.clone());
                self.state = SessionState::Ready;
                Err(Error::Timeout { tag, timeout })
            }
        }
    }

    async fn await_completion(&mut self, tag: &str) -> Result<CommandResponse> {
        let mut accumulated = Vec::new();

        loop {
            let line = self.lines.read_line().await?;

            if let Some((status, text)) = completion_of(&line, tag) {
                return Ok(CommandResponse {
                    status,
                    text,
                    lines: accumulated,
                });
            }

            // Late completion of a command that already timed out: drop it.
            if let Some(stale) = self
                .stale_tags
                .iter()
                .position(|t| completion_of(&line, t).is_some())
            {
                let dropped = self.stale_tags.remove(stale);
                debug!(tag = %dropped, "ignoring late completion for stale tag");
                continue;
            }

            accumulated.push(line);
        }
    }

    /// Closes the session and shuts the stream down.
    ///
    /// Idempotent and infallible: shutdown errors are ignored.
    pub async fn close(&mut self) {
        if matches!(self.state, SessionState::Closed) {
            return;
        }
        self.state = SessionState::Closed;
        self.lines.shutdown().await;
    }
}

/// Tests whether the first server line is an `* OK …` greeting.
fn is_ok_greeting(line: &str) -> bool {
    let t = line.trim();
    let Some(rest) = t.strip_prefix('*') else {
        return false;
    };
    let rest = rest.trim_start();
    rest.get(..2).is_some_and(|word| {
        word.eq_ignore_ascii_case("OK")
            && rest[2..].chars().next().is_none_or(char::is_whitespace)
    })
}

/// Matches `<tag> (OK|NO|BAD) [text]` against a trimmed copy of `line`.
///
/// Trimming happens only here, to test the pattern; stored lines keep their
/// original spacing.
fn completion_of(line: &str, tag: &str) -> Option<(Status, String)> {
    let t = line.trim();
    let rest = t.strip_prefix(tag)?;
    // Tag must be followed by whitespace, not merely be a prefix (A1 vs A11).
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();

    let (word, text) = match rest.split_once(char::is_whitespace) {
        Some((w, t)) => (w, t.trim_start()),
        None => (rest, ""),
    };

    let status = if word.eq_ignore_ascii_case("OK") {
        Status::Ok
    } else if word.eq_ignore_ascii_case("NO") {
        Status::No
    } else if word.eq_ignore_ascii_case("BAD") {
        Status::Bad
    } else {
        return None;
    };

    Some((status, text.to_string()))
}

/// Hides credentials when logging LOGIN commands.
fn redact(command: &str) -> &str {
    if command
        .get(..5)
        .is_some_and(|word| word.eq_ignore_ascii_case("LOGIN"))
    {
        "LOGIN <redacted>"
    } else {
        command
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const GREETING: &[u8] = b"* OK Dovecot ready.\r\n";

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    #[test]
    fn test_is_ok_greeting() {
        assert!(is_ok_greeting("* OK IMAP4rev1 ready"));
        assert!(is_ok_greeting("* ok lower-case server"));
        assert!(is_ok_greeting("* OK"));
        assert!(!is_ok_greeting("* NO try later"));
        assert!(!is_ok_greeting("* BYE shutting down"));
        assert!(!is_ok_greeting("A1 OK not a greeting"));
        assert!(!is_ok_greeting("* OKAY not a status"));
    }

    #[test]
    fn test_completion_matching() {
        assert_eq!(
            completion_of("A1 OK done", "A1"),
            Some((Status::Ok, "done".to_string()))
        );
        assert_eq!(
            completion_of("A1 NO [AUTHENTICATIONFAILED] bad creds", "A1"),
            Some((Status::No, "[AUTHENTICATIONFAILED] bad creds".to_string()))
        );
        assert_eq!(
            completion_of("A1 bad syntax error", "A1"),
            Some((Status::Bad, "syntax error".to_string()))
        );
        // Tag match is exact, not a prefix.
        assert_eq!(completion_of("A11 OK done", "A1"), None);
        // Untagged and continuation lines never complete a command.
        assert_eq!(completion_of("* SEARCH 1 2 3", "A1"), None);
        assert_eq!(completion_of("+ go ahead", "A1"), None);
    }

    #[tokio::test]
    async fn test_connect_accepts_greeting() {
        let mock = Builder::new().read(GREETING).build();
        let session = ImapSession::connect(mock, config()).await;
        assert!(session.is_ok());
    }

    #[tokio::test]
    async fn test_connect_rejects_non_ok_first_line() {
        let mock = Builder::new().read(b"* BYE overloaded\r\n").build();
        let result = ImapSession::connect(mock, config()).await;
        assert!(matches!(result, Err(Error::Greeting(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_timeout() {
        let mock = Builder::new().wait(Duration::from_secs(60)).build();
        let result = ImapSession::connect(mock, config()).await;
        assert!(matches!(result, Err(Error::Greeting(_))));
    }

    #[tokio::test]
    async fn test_run_collects_untagged_lines_untrimmed() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A1 SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 4  8 15\r\n")
            .read(b"A1 OK SEARCH completed\r\n")
            .build();

        let mut session = ImapSession::connect(mock, config()).await.unwrap();
        let response = session.run("SEARCH UNSEEN").await.unwrap();

        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.text, "SEARCH completed");
        // Internal double space survives: lines are never trimmed.
        assert_eq!(response.lines, vec!["* SEARCH 4  8 15".to_string()]);
    }

    #[tokio::test]
    async fn test_sequential_tags_across_commands() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A1 NOOP\r\n")
            .read(b"A1 OK done\r\n")
            .write(b"A2 NOOP\r\n")
            .read(b"A2 OK done\r\n")
            .build();

        let mut session = ImapSession::connect(mock, config()).await.unwrap();
        session.run("NOOP").await.unwrap();
        session.run("NOOP").await.unwrap();
    }

    #[tokio::test]
    async fn test_no_completion_is_typed_error() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A1 LOGIN \"u\" \"p\"\r\n")
            .read(b"A1 NO [AUTHENTICATIONFAILED] nope\r\n")
            .build();

        let mut session = ImapSession::connect(mock, config()).await.unwrap();
        let result = session.run("LOGIN \"u\" \"p\"").await.unwrap().require_ok();
        assert!(matches!(result, Err(Error::No(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_timeout_leaves_session_usable() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A1 SEARCH UNSEEN\r\n")
            // Completion for A1 arrives long after the 15s command timeout.
            .wait(Duration::from_secs(120))
            .read(b"A1 OK way too late\r\n")
            .write(b"A2 NOOP\r\n")
            .read(b"A2 OK done\r\n")
            .build();

        let mut session = ImapSession::connect(mock, config()).await.unwrap();

        let result = session.run("SEARCH UNSEEN").await;
        assert!(matches!(result, Err(Error::Timeout { .. })));

        // The late A1 completion is dropped, not redelivered: the next
        // command completes normally and sees none of A1's lines.
        let response = session.run("NOOP").await.unwrap();
        assert_eq!(response.status, Status::Ok);
        assert!(response.lines.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_fails_outstanding_command() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A1 NOOP\r\n")
            .build();

        let mut session = ImapSession::connect(mock, config()).await.unwrap();
        let result = session.run("NOOP").await;
        assert!(matches!(result, Err(Error::Closed)));

        // Session is unusable afterwards.
        let result = session.run("NOOP").await;
        assert!(matches!(result, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mock = Builder::new().read(GREETING).build();
        let mut session = ImapSession::connect(mock, config()).await.unwrap();
        session.close().await;
        session.close().await;
    }

    #[test]
    fn test_redact_login() {
        assert_eq!(redact("LOGIN \"u\" \"secret\""), "LOGIN <redacted>");
        assert_eq!(redact("SEARCH UNSEEN"), "SEARCH UNSEEN");
    }
}
