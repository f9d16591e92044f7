//! Ingestion ledger storage.
//!
//! The ledger is the idempotency primitive for the whole pipeline: its
//! `UNIQUE(mailbox, uid)` constraint is what guarantees a mailbox message is
//! turned into at most one ticket, and `record` never raises on a conflict.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::model::{IngestionLogEntry, NewLogEntry};
use crate::Result;

/// Repository for the ingestion ledger.
pub struct IngestionLog {
    pool: SqlitePool,
}

impl IngestionLog {
    /// Opens (creating if necessary) the ledger at the given database path
    /// and bootstraps the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation
    /// fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let log = Self { pool };
        log.initialize().await?;
        Ok(log)
    }

    /// Creates an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation
    /// fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let log = Self { pool };
        log.initialize().await?;
        Ok(log)
    }

    /// Initializes the ledger schema. Idempotent; the poller calls this at
    /// the start of every tick and it is a no-op after the first.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mail_ingestion_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mailbox TEXT NOT NULL,
                uid TEXT NOT NULL,
                message_id TEXT,
                from_email TEXT,
                subject TEXT,
                ticket_id INTEGER,
                created_at TEXT NOT NULL,
                UNIQUE(mailbox, uid)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_ingestion_message_id
            ON mail_ingestion_log(message_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Appends a ledger row, ignoring the insert if `(mailbox, uid)` already
    /// exists. Returns whether a row was actually written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails. A uniqueness race is
    /// not an error.
    pub async fn record(&self, entry: &NewLogEntry) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO mail_ingestion_log
                (mailbox, uid, message_id, from_email, subject, ticket_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(mailbox, uid) DO NOTHING
            ",
        )
        .bind(&entry.mailbox)
        .bind(&entry.uid)
        .bind(&entry.message_id)
        .bind(&entry.from_email)
        .bind(&entry.subject)
        .bind(entry.ticket_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns whether `(mailbox, uid)` has already been processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn contains(&self, mailbox: &str, uid: &str) -> Result<bool> {
        let row = sqlx::query(
            r"SELECT 1 FROM mail_ingestion_log WHERE mailbox = ? AND uid = ? LIMIT 1",
        )
        .bind(mailbox)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Finds the ticket of the most recent ledger row whose message id is in
    /// `ids` and whose ticket reference is non-null.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_ticket_by_message_ids(&self, ids: &[String]) -> Result<Option<i64>> {
        if ids.is_empty() {
            return Ok(None);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT ticket_id FROM mail_ingestion_log \
             WHERE ticket_id IS NOT NULL AND message_id IN ({placeholders}) \
             ORDER BY id DESC LIMIT 1"
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.get::<i64, _>("ticket_id")))
    }

    /// Fetches one ledger row, mostly for tests and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, mailbox: &str, uid: &str) -> Result<Option<IngestionLogEntry>> {
        let row = sqlx::query(
            r"
            SELECT id, mailbox, uid, message_id, from_email, subject, ticket_id, created_at
            FROM mail_ingestion_log
            WHERE mailbox = ? AND uid = ?
            ",
        )
        .bind(mailbox)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| IngestionLogEntry {
            id: r.get("id"),
            mailbox: r.get("mailbox"),
            uid: r.get("uid"),
            message_id: r.get("message_id"),
            from_email: r.get("from_email"),
            subject: r.get("subject"),
            ticket_id: r.get("ticket_id"),
            created_at: r
                .get::<String, _>("created_at")
                .parse::<DateTime<Utc>>()
                .unwrap_or_default(),
        }))
    }
}
