//! Sans-I/O response parsers.
//!
//! Pure functions over the untagged lines captured by a completed command.
//! The session engine never interprets lines; everything the pipeline needs
//! is extracted here, after the fact, from the exact text the server sent.

use crate::command::HEADER_FIELDS;

/// Header-level summary of one fetched message.
///
/// Derived, never persisted. A summary without a UID cannot be correlated
/// and must be skipped by the caller; that is a data gap, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSummary {
    /// Stable per-mailbox message identifier, if the server reported one.
    pub uid: Option<String>,
    /// `Message-Id` header value.
    pub message_id: Option<String>,
    /// `In-Reply-To` header value.
    pub in_reply_to: Option<String>,
    /// `References` header value.
    pub references: Option<String>,
    /// Raw `From` header value.
    pub from_raw: Option<String>,
    /// Bare sender address extracted from `From`, lowercased.
    pub from_email: Option<String>,
    /// Raw `To` header value.
    pub to: Option<String>,
    /// `Subject` header value.
    pub subject: Option<String>,
    /// Raw `Date` header value.
    pub date: Option<String>,
}

/// Counters reported by SELECT, used by the connectivity test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxCounters {
    /// `* <n> EXISTS`
    pub exists: u32,
    /// `* <n> RECENT`
    pub recent: u32,
    /// `* OK [UNSEEN <n>]`
    pub unseen: u32,
}

/// Extracts the sequence-number list from a SEARCH response.
///
/// Locates the line beginning `* SEARCH` (case-insensitive) and returns its
/// whitespace-separated tokens. No such line means no matches: an empty
/// list, not an error.
#[must_use]
pub fn search_ids(lines: &[String]) -> Vec<String> {
    for line in lines {
        let t = line.trim_start();
        let Some(rest) = t.strip_prefix('*') else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(word) = rest.get(..6) else {
            continue;
        };
        if word.eq_ignore_ascii_case("SEARCH")
            && rest[6..].chars().next().is_none_or(char::is_whitespace)
        {
            return rest[6..].split_whitespace().map(str::to_string).collect();
        }
    }
    Vec::new()
}

/// Builds a [`HeaderSummary`] from FETCH response lines.
///
/// The UID is the first `UID <digits>` token pair found in any line. Each
/// header value comes from the first line starting with `<name>:`
/// (case-insensitive), with the remainder trimmed.
#[must_use]
pub fn header_summary(lines: &[String]) -> HeaderSummary {
    let mut summary = HeaderSummary {
        uid: find_uid(lines),
        ..HeaderSummary::default()
    };

    for name in HEADER_FIELDS {
        let Some(value) = find_header(lines, name) else {
            continue;
        };
        match *name {
            "Message-Id" => summary.message_id = Some(value),
            "In-Reply-To" => summary.in_reply_to = Some(value),
            "References" => summary.references = Some(value),
            "From" => summary.from_raw = Some(value),
            "To" => summary.to = Some(value),
            "Subject" => summary.subject = Some(value),
            "Date" => summary.date = Some(value),
            _ => {}
        }
    }

    summary.from_email = summary.from_raw.as_deref().and_then(extract_email);
    summary
}

/// Extracts EXISTS/RECENT/UNSEEN counters from SELECT response lines.
/// Any counter the server did not report defaults to 0.
#[must_use]
pub fn select_counters(lines: &[String]) -> MailboxCounters {
    let mut counters = MailboxCounters::default();

    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() >= 3 && tokens[0] == "*" {
            if let Ok(n) = tokens[1].parse::<u32>() {
                if tokens[2].eq_ignore_ascii_case("EXISTS") {
                    counters.exists = n;
                } else if tokens[2].eq_ignore_ascii_case("RECENT") {
                    counters.recent = n;
                }
            }
        }

        if let Some(n) = bracketed_unseen(line) {
            counters.unseen = n;
        }
    }

    counters
}

/// Collects every angle-bracketed identifier from In-Reply-To + References,
/// in order of appearance. These are the candidates for thread correlation.
#[must_use]
pub fn message_id_refs(in_reply_to: Option<&str>, references: Option<&str>) -> Vec<String> {
    let mut ids = Vec::new();
    for value in [in_reply_to, references].into_iter().flatten() {
        let mut rest = value;
        while let Some(open) = rest.find('<') {
            let Some(close) = rest[open..].find('>') else {
                break;
            };
            ids.push(rest[open..=open + close].to_string());
            rest = &rest[open + close + 1..];
        }
    }
    ids
}

/// Pulls the bare address out of a raw `From` value, lowercased.
///
/// Prefers an angle-bracketed address; otherwise takes the first token that
/// looks like an email address.
#[must_use]
pub fn extract_email(raw: &str) -> Option<String> {
    if let Some(open) = raw.find('<') {
        if let Some(close) = raw[open..].find('>') {
            let inner = raw[open + 1..open + close].trim();
            if !inner.is_empty() {
                return Some(inner.to_lowercase());
            }
        }
    }

    raw.split_whitespace()
        .map(|token| token.trim_matches(|c: char| "\"',;()".contains(c)))
        .find(|token| is_email_shaped(token))
        .map(str::to_lowercase)
}

fn is_email_shaped(token: &str) -> bool {
    let Some((local, domain)) = token.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && !domain.contains('@')
}

fn find_uid(lines: &[String]) -> Option<String> {
    for line in lines {
        let mut tokens = line.split_whitespace().peekable();
        while let Some(token) = tokens.next() {
            let token = token.trim_start_matches('(');
            if token.eq_ignore_ascii_case("UID") {
                if let Some(next) = tokens.peek() {
                    let digits: String =
                        next.chars().take_while(char::is_ascii_digit).collect();
                    if !digits.is_empty() {
                        return Some(digits);
                    }
                }
            }
        }
    }
    None
}

fn find_header(lines: &[String], name: &str) -> Option<String> {
    for line in lines {
        // Byte-indexed by `get` because lossy decoding can leave multi-byte
        // characters anywhere in the line.
        let Some(head) = line.get(..name.len()) else {
            continue;
        };
        if head.eq_ignore_ascii_case(name) && line[name.len()..].starts_with(':') {
            return Some(line[name.len() + 1..].trim().to_string());
        }
    }
    None
}

fn bracketed_unseen(line: &str) -> Option<u32> {
    // ASCII uppercasing keeps byte offsets aligned with `line`.
    let upper = line.to_ascii_uppercase();
    let start = upper.find("[UNSEEN")?;
    let rest = &line[start + 7..];
    let digits: String = rest
        .chars()
        .skip_while(|c| c.is_whitespace())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
