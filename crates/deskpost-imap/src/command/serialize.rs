//! Command text builders for the protocol subset this engine speaks.
//!
//! Builders produce the command text without its tag; the session prepends
//! the tag when it writes the line.

/// Header fields fetched for ingestion. Only header-level metadata is ever
/// requested; message bodies are never downloaded.
pub const HEADER_FIELDS: &[&str] = &[
    "Message-Id",
    "In-Reply-To",
    "References",
    "From",
    "To",
    "Subject",
    "Date",
];

/// Quotes a string literal, escaping backslash and double-quote.
#[must_use]
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// `LOGIN "<user>" "<pass>"`
#[must_use]
pub fn login(user: &str, pass: &str) -> String {
    format!("LOGIN {} {}", quote_string(user), quote_string(pass))
}

/// `SELECT "<mailbox>"`
#[must_use]
pub fn select(mailbox: &str) -> String {
    format!("SELECT {}", quote_string(mailbox))
}

/// `SEARCH UNSEEN`
#[must_use]
pub const fn search_unseen() -> &'static str {
    "SEARCH UNSEEN"
}

/// `FETCH <seq> (UID BODY.PEEK[HEADER.FIELDS (...)])`
///
/// BODY.PEEK keeps the server from setting `\Seen` as a side effect; the
/// flag is only stored once the message has been fully processed.
#[must_use]
pub fn fetch_headers(seq: &str) -> String {
    format!(
        "FETCH {seq} (UID BODY.PEEK[HEADER.FIELDS ({})])",
        HEADER_FIELDS.join(" ").to_uppercase()
    )
}

/// `STORE <seq> +FLAGS (\Seen)`
#[must_use]
pub fn store_seen(seq: &str) -> String {
    format!("STORE {seq} +FLAGS (\\Seen)")
}

/// `LOGOUT`
#[must_use]
pub const fn logout() -> &'static str {
    "LOGOUT"
}
