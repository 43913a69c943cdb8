//! Gmail REST API client for listing and fetching messages.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::{AccessToken, MailClient, MailError, MessageRef, SearchQuery};

/// Client for the Gmail v1 REST API
pub struct GmailRestClient {
    http: Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

/// Message as returned by `messages.get?format=full`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub payload: Option<MessagePayload>,
}

/// One node of the MIME tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PartBody {
    /// base64url-encoded content
    #[serde(default)]
    pub data: Option<String>,
}

impl MessagePayload {
    /// Single-part payload with encoded `data`
    pub fn single(mime_type: &str, data: &str) -> Self {
        Self {
            mime_type: Some(mime_type.to_string()),
            body: Some(PartBody {
                data: Some(data.to_string()),
            }),
            parts: Vec::new(),
        }
    }

    /// Multipart container holding `parts`
    pub fn multipart(mime_type: &str, parts: Vec<MessagePayload>) -> Self {
        Self {
            mime_type: Some(mime_type.to_string()),
            body: None,
            parts,
        }
    }

    fn is_html(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("text/html"))
    }

    fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// Encoded data of the first `text/html` part, searched depth-first
    pub fn html_data(&self) -> Option<&str> {
        if self.is_html() {
            if let Some(data) = self.data() {
                return Some(data);
            }
        }

        self.parts.iter().find_map(|part| part.html_data())
    }
}

impl GmailRestClient {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, MailError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, MailError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token.secret())
            .query(query)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MailError::NotFound);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(MailError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MailError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl MailClient for GmailRestClient {
    async fn list_messages(
        &self,
        token: &AccessToken,
        query: &SearchQuery,
    ) -> Result<Vec<MessageRef>, MailError> {
        let url = format!("{}/messages", self.api_base);
        let params = [
            ("q", query.expression()),
            ("maxResults", query.max_results.to_string()),
        ];

        let response: ListMessagesResponse = self.get_json(token, &url, &params).await?;
        Ok(response.messages)
    }

    async fn get_message(&self, token: &AccessToken, id: &str) -> Result<RawMessage, MailError> {
        let url = format!("{}/messages/{}", self.api_base, urlencoding::encode(id));
        let params = [("format", "full".to_string())];

        self.get_json(token, &url, &params).await
    }
}
