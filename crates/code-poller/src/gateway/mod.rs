//! Mail provider access.
//!
//! [`MailGateway`] combines a [`TokenProvider`] and a [`MailClient`] into the
//! two operations a poll cycle needs: list the newest candidate messages and
//! fetch the HTML body of one of them.

mod auth;
mod decode;
mod gmail_client;

pub use auth::GoogleTokenProvider;
pub use decode::{decode_transport_text, DecodeError};
pub use gmail_client::{GmailRestClient, MessagePayload, PartBody, RawMessage};

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub const GMAIL_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Upper bound on candidates requested per poll
pub const MAX_CANDIDATES: u32 = 5;

/// Reference to a provider message. Identity is the id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Decoded HTML body of a message, if it has one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    pub html: Option<String>,
}

/// Bearer token for the mail API
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Search expression sent to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub sender: String,
    pub subject: String,
    pub max_results: u32,
}

impl SearchQuery {
    pub fn new(sender: impl Into<String>, subject: impl Into<String>, max_results: u32) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            max_results: max_results.clamp(1, MAX_CANDIDATES),
        }
    }

    /// `from:<sender> subject:(<phrase>)`
    pub fn expression(&self) -> String {
        format!("from:{} subject:({})", self.sender, self.subject)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Gmail is not connected: {0}")]
    NotConnected(String),

    #[error("Gmail rejected the access token")]
    Rejected,

    #[error("Token request failed: {0}")]
    Token(String),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Message not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Gmail API: {status} {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Fetch(String),
}

/// Issues access tokens for the mail API.
///
/// A non-interactive request must never prompt the user; it fails with
/// [`AuthError::NotConnected`] instead.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, interactive: bool) -> Result<AccessToken, AuthError>;
}

/// Raw mail API calls
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Message references matching `query`, most recent first
    async fn list_messages(
        &self,
        token: &AccessToken,
        query: &SearchQuery,
    ) -> Result<Vec<MessageRef>, MailError>;

    /// Full message including its MIME payload tree
    async fn get_message(&self, token: &AccessToken, id: &str) -> Result<RawMessage, MailError>;
}

pub struct MailGateway {
    tokens: Arc<dyn TokenProvider>,
    client: Arc<dyn MailClient>,
    query: SearchQuery,
}

impl MailGateway {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        client: Arc<dyn MailClient>,
        query: SearchQuery,
    ) -> Self {
        Self {
            tokens,
            client,
            query,
        }
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    /// List candidate messages, newest first, capped at the query's result count
    pub async fn list_candidates(&self) -> Result<Vec<MessageRef>, GatewayError> {
        let token = self.tokens.token(false).await?;

        match self.client.list_messages(&token, &self.query).await {
            Ok(mut refs) => {
                refs.truncate(self.query.max_results as usize);
                Ok(refs)
            }
            Err(MailError::Unauthorized) => Err(AuthError::Rejected.into()),
            Err(e) => Err(GatewayError::Fetch(format!("list failed: {}", e))),
        }
    }

    /// Fetch a message and decode its HTML part.
    ///
    /// A message without an HTML part, one that disappeared since it was
    /// listed, or one whose HTML part cannot be decoded yields an empty body.
    pub async fn fetch_body(&self, message: &MessageRef) -> Result<MessageBody, GatewayError> {
        let token = self.tokens.token(false).await?;

        let raw = match self.client.get_message(&token, &message.id).await {
            Ok(raw) => raw,
            Err(MailError::NotFound) => {
                tracing::debug!("Message {} no longer exists", message.id);
                return Ok(MessageBody::default());
            }
            Err(MailError::Unauthorized) => return Err(AuthError::Rejected.into()),
            Err(e) => {
                return Err(GatewayError::Fetch(format!(
                    "fetch of {} failed: {}",
                    message.id, e
                )))
            }
        };

        let Some(data) = raw.payload.as_ref().and_then(|p| p.html_data()) else {
            return Ok(MessageBody::default());
        };

        match decode_transport_text(data) {
            Ok(html) => Ok(MessageBody { html: Some(html) }),
            Err(e) => {
                tracing::warn!("Undecodable HTML part in message {}: {}", message.id, e);
                Ok(MessageBody::default())
            }
        }
    }
}
