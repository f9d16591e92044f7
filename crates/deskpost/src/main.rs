//! deskpost - inbound email ingestion daemon.
//!
//! Polls a shared mailbox over IMAP and turns unseen messages into support
//! tickets (or replies on existing ones). `deskpost run` starts the
//! scheduler; `deskpost check` performs a one-shot IMAP connectivity test.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deskpost_core::{HttpTicketDirectory, IngestionLog, MailboxPoller};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "deskpost=info,deskpost_core=info,deskpost_imap=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "run".to_string());

    let db_path =
        std::env::var("DESKPOST_DB").unwrap_or_else(|_| "deskpost.db".to_string());
    let api_url = std::env::var("TICKET_API_URL").context("TICKET_API_URL must be set")?;
    let api_token = std::env::var("TICKET_API_TOKEN").context("TICKET_API_TOKEN must be set")?;

    let log = IngestionLog::new(&db_path).await?;
    let directory = HttpTicketDirectory::new(api_url, api_token);
    directory.validate()?;
    let poller = MailboxPoller::new(log, directory);

    match mode.as_str() {
        "run" => {
            info!(db = %db_path, "starting deskpost mail ingestion");
            poller.run().await;
            Ok(())
        }
        "check" => {
            let counters = poller.check().await?;
            println!(
                "IMAP OK: {} messages, {} recent, {} unseen",
                counters.exists, counters.recent, counters.unseen
            );
            Ok(())
        }
        other => anyhow::bail!("unknown command {other:?} (expected \"run\" or \"check\")"),
    }
}
