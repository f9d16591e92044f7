//! Environment-sourced mail configuration.
//!
//! Configuration is loaded fresh per operation and treated as an immutable
//! snapshot for the duration of one session; the poller may also be handed a
//! per-call override that bypasses the environment entirely.

use std::time::Duration;

/// Default poll interval when `MAIL_POLL_INTERVAL_MS` is unset.
const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;

/// IMAP account settings, present only when fully configured.
#[derive(Debug, Clone)]
pub struct ImapSettings {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Whether to use implicit TLS.
    pub secure: bool,
    /// Login user.
    pub user: String,
    /// Login password.
    pub pass: String,
    /// Mailbox to poll.
    pub mailbox: String,
}

/// Outbound SMTP settings. Carried for completeness; sending is an external
/// collaborator's job and nothing in the ingestion core uses these.
#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    /// Server hostname.
    pub host: Option<String>,
    /// Server port.
    pub port: u16,
    /// Whether to use implicit TLS.
    pub secure: bool,
    /// Login user.
    pub user: Option<String>,
    /// Login password.
    pub pass: Option<String>,
    /// From address for outbound mail.
    pub from: Option<String>,
}

/// One immutable snapshot of the mail configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Mail provider label (informational).
    pub provider: Option<String>,
    /// IMAP host, if set.
    pub imap_host: Option<String>,
    /// IMAP port.
    pub imap_port: u16,
    /// IMAP implicit TLS.
    pub imap_secure: bool,
    /// IMAP user, if set.
    pub imap_user: Option<String>,
    /// IMAP password, if set.
    pub imap_pass: Option<String>,
    /// Mailbox to poll, if set.
    pub imap_mailbox: Option<String>,
    /// Outbound SMTP settings.
    pub smtp: SmtpSettings,
    /// Whether scheduled polling is enabled.
    pub poll_enabled: bool,
    /// Interval between scheduled ticks.
    pub poll_interval: Duration,
    /// Address the shared mailbox ingests for; used by the recipient filter.
    pub ingest_address: Option<String>,
}

impl MailConfig {
    /// Loads a snapshot from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads a snapshot through an arbitrary variable lookup.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            provider: get("MAIL_PROVIDER"),
            imap_host: get("IMAP_HOST"),
            imap_port: parse_u16(get("IMAP_PORT")).unwrap_or(993),
            imap_secure: parse_bool(get("IMAP_SECURE")).unwrap_or(true),
            imap_user: get("IMAP_USER"),
            imap_pass: get("IMAP_PASS"),
            imap_mailbox: get("IMAP_MAILBOX"),
            smtp: SmtpSettings {
                host: get("SMTP_HOST"),
                port: parse_u16(get("SMTP_PORT")).unwrap_or(587),
                secure: parse_bool(get("SMTP_SECURE")).unwrap_or(false),
                user: get("SMTP_USER"),
                pass: get("SMTP_PASS"),
                from: get("SMTP_FROM"),
            },
            poll_enabled: parse_bool(get("MAIL_POLL_ENABLED")).unwrap_or(false),
            poll_interval: Duration::from_millis(
                parse_u64(get("MAIL_POLL_INTERVAL_MS")).unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            ingest_address: get("MAIL_INGEST_ADDRESS"),
        }
    }

    /// Returns the IMAP settings if host, user, password and mailbox are all
    /// present. `None` means a tick should be skipped, not failed.
    #[must_use]
    pub fn imap_settings(&self) -> Option<ImapSettings> {
        Some(ImapSettings {
            host: self.imap_host.clone()?,
            port: self.imap_port,
            secure: self.imap_secure,
            user: self.imap_user.clone()?,
            pass: self.imap_pass.clone()?,
            mailbox: self.imap_mailbox.clone()?,
        })
    }
}

fn parse_bool(value: Option<String>) -> Option<bool> {
    let value = value?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u16(value: Option<String>) -> Option<u16> {
    value?.trim().parse().ok()
}

fn parse_u64(value: Option<String>) -> Option<u64> {
    value?.trim().parse().ok()
}
