//! In-page toast sink.
//!
//! The toast is only ever shown in the active tab, and never on browser
//! internal pages.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shared_types::ToastPosition;
use std::sync::Arc;
use std::time::Duration;

use super::{SinkError, SinkOutcome};

const RESTRICTED_SCHEMES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "edge://",
    "about:",
    "devtools://",
    "view-source:",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTab {
    pub id: i64,
    #[serde(default)]
    pub url: Option<String>,
}

/// Access to the browser tab the user is looking at
#[async_trait]
pub trait PageBridge: Send + Sync {
    async fn active_tab(&self) -> Result<Option<ActiveTab>, SinkError>;

    async fn inject_toast(
        &self,
        tab_id: i64,
        code: &str,
        position: ToastPosition,
    ) -> Result<(), SinkError>;
}

pub fn is_restricted_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    RESTRICTED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

pub struct ToastSink {
    bridge: Arc<dyn PageBridge>,
}

impl ToastSink {
    pub fn new(bridge: Arc<dyn PageBridge>) -> Self {
        Self { bridge }
    }

    pub async fn deliver(&self, code: &str, position: ToastPosition) -> SinkOutcome {
        let tab = match self.bridge.active_tab().await {
            Ok(Some(tab)) => tab,
            Ok(None) => return SinkOutcome::Skipped("no active tab".to_string()),
            Err(e) => return SinkOutcome::Failed(e.to_string()),
        };

        match tab.url.as_deref() {
            None => return SinkOutcome::Skipped("active tab has no url".to_string()),
            Some(url) if is_restricted_url(url) => {
                return SinkOutcome::Skipped(format!("restricted page {}", url))
            }
            Some(_) => {}
        }

        match self.bridge.inject_toast(tab.id, code, position).await {
            Ok(()) => SinkOutcome::Delivered,
            Err(e) => SinkOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ToastRequest<'a> {
    code: &'a str,
    position: ToastPosition,
}

/// HTTP client for a companion browser bridge.
///
/// `GET {base}/tabs/active` answers with the active tab (or 204 when there
/// is none); `POST {base}/tabs/{id}/toast` renders the toast.
pub struct HttpPageBridge {
    http: Client,
    base_url: String,
}

impl HttpPageBridge {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Bridge(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PageBridge for HttpPageBridge {
    async fn active_tab(&self) -> Result<Option<ActiveTab>, SinkError> {
        let response = self
            .http
            .get(format!("{}/tabs/active", self.base_url))
            .send()
            .await
            .map_err(|e| SinkError::Bridge(e.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<Option<ActiveTab>>()
                .await
                .map_err(|e| SinkError::Bridge(format!("invalid tab response: {}", e))),
            status => Err(SinkError::Bridge(format!("active tab lookup returned {}", status))),
        }
    }

    async fn inject_toast(
        &self,
        tab_id: i64,
        code: &str,
        position: ToastPosition,
    ) -> Result<(), SinkError> {
        let response = self
            .http
            .post(format!("{}/tabs/{}/toast", self.base_url, tab_id))
            .json(&ToastRequest { code, position })
            .send()
            .await
            .map_err(|e| SinkError::Bridge(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Bridge(format!(
                "toast injection rejected with {}",
                response.status()
            )))
        }
    }
}
