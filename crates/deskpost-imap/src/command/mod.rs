//! IMAP command builders and tagging.

mod serialize;
mod tag;

pub use serialize::{
    HEADER_FIELDS, fetch_headers, login, logout, quote_string, search_unseen, select, store_seen,
};
pub use tag::TagSequence;
