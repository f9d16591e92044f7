//! HTTP implementation of [`TicketDirectory`] over the platform's REST API.

use reqwest::StatusCode;
use serde::Deserialize;

use super::{ReplyEntry, TicketDirectory, TicketDraft, TicketRef};
use crate::{Error, Result};

/// Ticket directory backed by the platform's REST API.
///
/// Authenticates with a bearer token; endpoints are relative to `base_url`.
#[derive(Debug, Clone)]
pub struct HttpTicketDirectory {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
    id: i64,
    tag: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: i64,
}

impl HttpTicketDirectory {
    /// Creates a directory client for the given API base URL and token.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl TicketDirectory for HttpTicketDirectory {
    async fn create_ticket(&self, draft: &TicketDraft) -> Result<TicketRef> {
        let response = self
            .client
            .post(self.url("/api/tickets"))
            .bearer_auth(&self.token)
            .json(draft)
            .send()
            .await?
            .error_for_status()?;

        let ticket: TicketResponse = decode(response).await?;
        Ok(TicketRef {
            id: ticket.id,
            tag: ticket.tag,
        })
    }

    async fn append_reply(&self, ticket_id: i64, entry: &ReplyEntry) -> Result<()> {
        self.client
            .post(self.url(&format!("/api/tickets/{ticket_id}/replies")))
            .bearer_auth(&self.token)
            .json(entry)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn find_by_tag(&self, tag: &str) -> Result<Option<TicketRef>> {
        let response = self
            .client
            .get(self.url("/api/tickets/by-tag"))
            .bearer_auth(&self.token)
            .query(&[("tag", tag)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;

        let ticket: TicketResponse = decode(response).await?;
        Ok(Some(TicketRef {
            id: ticket.id,
            tag: ticket.tag,
        }))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<i64>> {
        let response = self
            .client
            .get(self.url("/api/users/by-email"))
            .bearer_auth(&self.token)
            .query(&[("email", email)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;

        let user: UserResponse = decode(response).await?;
        Ok(Some(user.id))
    }
}

/// Decodes a response body, turning malformed platform output into a ticket
/// error rather than a transport error.
async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::Ticket(format!("unusable platform response: {e}")))
}

impl HttpTicketDirectory {
    /// Validates that the configured base URL parses; construction itself is
    /// infallible so misconfiguration surfaces early instead of per request.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is invalid.
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid ticket API base URL: {e}")))?;
        Ok(())
    }
}
