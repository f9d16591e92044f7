//! The mailbox poller: scheduled, single-flight ingestion ticks.
//!
//! Each tick drives one IMAP session through LOGIN → SELECT → SEARCH UNSEEN →
//! per-message FETCH/correlate/persist/flag → LOGOUT, then closes the session
//! no matter how the tick went. Ticks never overlap: a timer fire while a
//! tick is still running is a silent no-op.
//!
//! Failure policy: configuration gaps skip the tick; connect/LOGIN/SELECT/
//! SEARCH failures abort it; a failure while processing one message is
//! logged and the tick continues with the next message; the unseen flag and
//! the ledger make re-processing on a later tick safe. The scheduler
//! swallows every tick error, so a bad tick never stops future ticks.
//!
//! The design assumes a single poller instance. The ledger's unique key
//! prevents duplicate rows under races, but two concurrent pollers could
//! still both attempt ticket creation for the same message before either
//! writes its row.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use deskpost_imap::{HeaderSummary, ImapSession, MailboxCounters, SessionConfig, command, parser};

use crate::config::{ImapSettings, MailConfig};
use crate::ingest::{IngestionLog, NewLogEntry};
use crate::ticket::{ReplyEntry, TicketDirectory, TicketDraft};
use crate::{Error, Result};

/// Subject tag patterns that explicitly address a ticket, tried in order;
/// the first one that matches wins.
const TICKET_TAG_PREFIXES: [&str; 2] = ["TB#", "ADX#"];

/// Why a tick was skipped without connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `MAIL_POLL_ENABLED` is off.
    PollingDisabled,
    /// IMAP host, credentials or mailbox are unset.
    MissingImapSettings,
}

/// Counts for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Unseen messages returned by SEARCH.
    pub found: usize,
    /// New tickets created.
    pub created: usize,
    /// Existing tickets that received a reply.
    pub updated: usize,
    /// Messages logged without a ticket (recipient filter).
    pub filtered: usize,
    /// Messages already in the ledger (re-flagged only).
    pub duplicates: usize,
    /// Messages skipped for missing UID (left unseen).
    pub skipped: usize,
    /// Messages whose processing failed (left for a future tick).
    pub failed: usize,
}

/// Result of one scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A tick was already running; this fire was a no-op.
    Busy,
    /// Deliberate no-op: polling disabled or not configured.
    Skipped(SkipReason),
    /// The tick ran; counts within.
    Completed(TickSummary),
}

enum MessageOutcome {
    Created,
    Updated,
    Filtered,
    Duplicate,
    NoUid,
}

impl TickSummary {
    fn apply(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Created => self.created += 1,
            MessageOutcome::Updated => self.updated += 1,
            MessageOutcome::Filtered => self.filtered += 1,
            MessageOutcome::Duplicate => self.duplicates += 1,
            MessageOutcome::NoUid => self.skipped += 1,
        }
    }
}

/// Scheduled mailbox poller and ingestion pipeline.
pub struct MailboxPoller<D> {
    log: IngestionLog,
    tickets: D,
    config_override: Option<MailConfig>,
    running: AtomicBool,
    session_config: SessionConfig,
    connect_timeout: Duration,
}

impl<D> MailboxPoller<D>
where
    D: TicketDirectory + Sync,
{
    /// Creates a poller over the given ledger and ticket directory.
    pub fn new(log: IngestionLog, tickets: D) -> Self {
        Self {
            log,
            tickets,
            config_override: None,
            running: AtomicBool::new(false),
            session_config: SessionConfig::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Uses a fixed configuration instead of re-reading the environment each
    /// tick.
    #[must_use]
    pub fn with_config(mut self, config: MailConfig) -> Self {
        self.config_override = Some(config);
        self
    }

    /// Overrides the session timeouts.
    #[must_use]
    pub const fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Overrides the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Runs the scheduler forever: one tick per interval, errors logged and
    /// swallowed so a bad tick never stops future ones.
    pub async fn run(&self) {
        // tokio::time::interval panics on a zero period.
        let interval = self
            .current_config()
            .poll_interval
            .max(Duration::from_millis(100));
        info!(?interval, "mail ingestion scheduler started");

        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            match self.tick().await {
                Ok(outcome) => debug!(?outcome, "mail ingestion tick done"),
                Err(e) => warn!(error = %e, "mail ingestion tick failed"),
            }
        }
    }

    /// Runs a single ingestion tick.
    ///
    /// # Errors
    ///
    /// Returns connection, protocol or persistence errors from the tick;
    /// configuration gaps are reported as [`TickOutcome::Skipped`], not
    /// errors.
    pub async fn tick(&self) -> Result<TickOutcome> {
        // Cross-tick mutual exclusion; holds under true parallelism.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("previous tick still running; skipping this fire");
            return Ok(TickOutcome::Busy);
        }

        let result = self.tick_inner().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn tick_inner(&self) -> Result<TickOutcome> {
        let config = self.current_config();

        if !config.poll_enabled {
            info!("mail polling disabled; tick skipped");
            return Ok(TickOutcome::Skipped(SkipReason::PollingDisabled));
        }
        let Some(settings) = config.imap_settings() else {
            info!("IMAP credentials or mailbox unset; tick skipped");
            return Ok(TickOutcome::Skipped(SkipReason::MissingImapSettings));
        };

        self.log.initialize().await?;

        info!(mailbox = %settings.mailbox, host = %settings.host, "mail ingestion tick started");

        let stream = deskpost_imap::connect(
            &settings.host,
            settings.port,
            settings.secure,
            self.connect_timeout,
        )
        .await
        .map_err(Error::Imap)?;
        let mut session = ImapSession::connect(stream, self.session_config).await?;

        // Close on every exit path, success or not.
        let result = self
            .process_session(&mut session, &settings, config.ingest_address.as_deref())
            .await;
        session.close().await;

        let summary = result?;
        info!(
            found = summary.found,
            created = summary.created,
            updated = summary.updated,
            filtered = summary.filtered,
            failed = summary.failed,
            "mail ingestion tick finished"
        );
        Ok(TickOutcome::Completed(summary))
    }

    /// Drives one full ingestion pass over an established session.
    ///
    /// Exposed so the pipeline can be exercised against a scripted server;
    /// the caller owns connecting beforehand and closing afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if LOGIN, SELECT or SEARCH fails. Per-message
    /// failures are counted in the summary instead.
    pub async fn process_session<S>(
        &self,
        session: &mut ImapSession<S>,
        settings: &ImapSettings,
        ingest_address: Option<&str>,
    ) -> Result<TickSummary>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session
            .run(&command::login(&settings.user, &settings.pass))
            .await?
            .require_ok()?;
        session
            .run(&command::select(&settings.mailbox))
            .await?
            .require_ok()?;

        let response = session.run(command::search_unseen()).await?.require_ok()?;
        let seqs = parser::search_ids(&response.lines);

        let mut summary = TickSummary {
            found: seqs.len(),
            ..TickSummary::default()
        };

        for seq in &seqs {
            match self
                .handle_message(session, settings, ingest_address, seq)
                .await
            {
                Ok(outcome) => summary.apply(&outcome),
                Err(e) => {
                    // Isolated: the message stays unseen and unlogged, so a
                    // future tick retries it without risking a duplicate.
                    warn!(%seq, error = %e, "message ingestion failed; continuing with next");
                    summary.failed += 1;
                }
            }
        }

        // LOGOUT unconditionally; its failure cannot undo completed work.
        if let Err(e) = session.run(command::logout()).await {
            debug!(error = %e, "LOGOUT failed during session teardown");
        }

        Ok(summary)
    }

    async fn handle_message<S>(
        &self,
        session: &mut ImapSession<S>,
        settings: &ImapSettings,
        ingest_address: Option<&str>,
        seq: &str,
    ) -> Result<MessageOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let response = session
            .run(&command::fetch_headers(seq))
            .await?
            .require_ok()?;
        let summary = parser::header_summary(&response.lines);

        let Some(uid) = summary.uid.clone() else {
            // Without a UID the ledger cannot protect this message; leave it
            // unseen for a future tick rather than risking double ingestion.
            debug!(seq, "fetch returned no UID; message skipped");
            return Ok(MessageOutcome::NoUid);
        };

        // Closes the crash gap where a prior tick processed the message but
        // died before flagging it.
        if self.log.contains(&settings.mailbox, &uid).await? {
            debug!(%uid, "already in the ingestion log; re-flagging only");
            self.mark_seen(session, seq).await?;
            return Ok(MessageOutcome::Duplicate);
        }

        if !addressed_to_us(summary.to.as_deref(), ingest_address) {
            info!(%uid, to = ?summary.to, "not addressed to the ingest address; logged without ticket");
            self.log
                .record(&new_entry(&settings.mailbox, &uid, &summary, None))
                .await?;
            self.mark_seen(session, seq).await?;
            return Ok(MessageOutcome::Filtered);
        }

        let resolved = self.correlate(&summary).await?;
        let block = description_block(&settings.mailbox, &summary);

        let (ticket_id, outcome) = if let Some(id) = resolved {
            self.tickets
                .append_reply(
                    id,
                    &ReplyEntry {
                        body: block,
                        from_email: summary.from_email.clone(),
                    },
                )
                .await?;
            info!(%uid, ticket_id = id, "appended inbound reply to ticket");
            (id, MessageOutcome::Updated)
        } else {
            let requester_id = match summary.from_email.as_deref() {
                Some(email) => self.tickets.find_user_by_email(email).await?,
                None => None,
            };
            let draft = TicketDraft {
                subject: default_subject(summary.subject.as_deref(), &settings.mailbox),
                description: block,
                requester_id,
            };
            let ticket = self.tickets.create_ticket(&draft).await?;
            info!(%uid, ticket = %ticket.tag, "created ticket from email");
            (ticket.id, MessageOutcome::Created)
        };

        self.log
            .record(&new_entry(&settings.mailbox, &uid, &summary, Some(ticket_id)))
            .await?;
        self.mark_seen(session, seq).await?;

        Ok(outcome)
    }

    /// Resolves the target ticket for a message, in precedence order:
    /// explicit subject tag, then thread references against the ledger,
    /// then none (create a new ticket).
    async fn correlate(&self, summary: &HeaderSummary) -> Result<Option<i64>> {
        if let Some(tag) = summary.subject.as_deref().and_then(subject_ticket_tag) {
            if let Some(ticket) = self.tickets.find_by_tag(&tag).await? {
                return Ok(Some(ticket.id));
            }
            debug!(%tag, "subject tag matched no ticket; falling back to thread references");
        }

        let refs =
            parser::message_id_refs(summary.in_reply_to.as_deref(), summary.references.as_deref());
        self.log.find_ticket_by_message_ids(&refs).await
    }

    async fn mark_seen<S>(&self, session: &mut ImapSession<S>, seq: &str) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session
            .run(&command::store_seen(seq))
            .await?
            .require_ok()?;
        Ok(())
    }

    /// Connectivity test: connect, LOGIN, SELECT, report counters, LOGOUT.
    ///
    /// This is the one caller-facing error surface: protocol and connection
    /// failures come back typed instead of being swallowed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when IMAP settings are incomplete, or
    /// the connection/protocol error that broke the check.
    pub async fn check(&self) -> Result<MailboxCounters> {
        let config = self.current_config();
        let settings = config.imap_settings().ok_or_else(|| {
            Error::Config("IMAP credentials or mailbox not configured".to_string())
        })?;

        let stream = deskpost_imap::connect(
            &settings.host,
            settings.port,
            settings.secure,
            self.connect_timeout,
        )
        .await
        .map_err(Error::Imap)?;
        let mut session = ImapSession::connect(stream, self.session_config).await?;

        let result = self.check_session(&mut session, &settings).await;
        session.close().await;
        result
    }

    /// The SELECT-counter path of [`Self::check`] over an established
    /// session.
    ///
    /// # Errors
    ///
    /// Returns the protocol error that broke the check.
    pub async fn check_session<S>(
        &self,
        session: &mut ImapSession<S>,
        settings: &ImapSettings,
    ) -> Result<MailboxCounters>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session
            .run(&command::login(&settings.user, &settings.pass))
            .await?
            .require_ok()?;
        let response = session
            .run(&command::select(&settings.mailbox))
            .await?
            .require_ok()?;
        let counters = parser::select_counters(&response.lines);

        if let Err(e) = session.run(command::logout()).await {
            debug!(error = %e, "LOGOUT failed after connectivity check");
        }
        Ok(counters)
    }

    /// The ledger this poller writes to.
    pub const fn log(&self) -> &IngestionLog {
        &self.log
    }

    fn current_config(&self) -> MailConfig {
        self.config_override
            .clone()
            .unwrap_or_else(MailConfig::from_env)
    }
}

/// Scans a subject for an explicit ticket tag (`TB#<digits>` or
/// `ADX#<digits>`, case-insensitive) and returns it in canonical upper case.
#[must_use]
pub fn subject_ticket_tag(subject: &str) -> Option<String> {
    let upper = subject.to_uppercase();
    for prefix in TICKET_TAG_PREFIXES {
        let mut rest = upper.as_str();
        while let Some(pos) = rest.find(prefix) {
            let after = &rest[pos + prefix.len()..];
            let digits: String = after.chars().take_while(char::is_ascii_digit).collect();
            if !digits.is_empty() {
                return Some(format!("{prefix}{digits}"));
            }
            rest = after;
        }
    }
    None
}

/// Recipient filter: present To header must contain the ingest address
/// (case-insensitive substring). An absent To header, or no configured
/// ingest address, counts as addressed to us.
#[must_use]
pub fn addressed_to_us(to: Option<&str>, ingest_address: Option<&str>) -> bool {
    match (to, ingest_address) {
        (Some(to), Some(address)) => to.to_lowercase().contains(&address.to_lowercase()),
        _ => true,
    }
}

/// Subject for a new ticket; blank subjects fall back to
/// `"Email to <mailbox>"`.
#[must_use]
pub fn default_subject(subject: Option<&str>, mailbox: &str) -> String {
    match subject {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => format!("Email to {mailbox}"),
    }
}

/// Builds the structured description/history block for a message.
#[must_use]
pub fn description_block(mailbox: &str, summary: &HeaderSummary) -> String {
    let mut block = format!("Mailbox: {mailbox}");
    if let Some(id) = &summary.message_id {
        block.push_str(&format!("\nMessage-Id: {id}"));
    }
    if let Some(from) = &summary.from_email {
        block.push_str(&format!("\nFrom: {from}"));
    }
    if let Some(date) = &summary.date {
        block.push_str(&format!("\nDate: {date}"));
    }
    block
}

fn new_entry(
    mailbox: &str,
    uid: &str,
    summary: &HeaderSummary,
    ticket_id: Option<i64>,
) -> NewLogEntry {
    NewLogEntry {
        mailbox: mailbox.to_string(),
        uid: uid.to_string(),
        message_id: summary.message_id.clone(),
        from_email: summary.from_email.clone(),
        subject: summary.subject.clone(),
        ticket_id,
    }
}
