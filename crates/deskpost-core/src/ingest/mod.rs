//! The ingestion ledger: the durable at-most-once record of processed mail.

mod model;
mod repository;

pub use model::{IngestionLogEntry, NewLogEntry};
pub use repository::IngestionLog;
