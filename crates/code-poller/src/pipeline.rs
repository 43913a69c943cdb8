//! One poll cycle: list, dedupe against the watermark, extract, record, notify.

use chrono::Utc;
use shared_types::SeenState;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::dispatch::NotificationDispatcher;
use crate::extract::extract_code;
use crate::gateway::{GatewayError, MailGateway};
use crate::state::SeenStateStore;

/// Terminal result of a poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    NoNewMessage,
    NewCodeFound { code: String, message_id: String },
    AuthFailure(String),
    FetchFailure(String),
    StorageFailure(String),
}

impl PollOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PollOutcome::AuthFailure(_)
                | PollOutcome::FetchFailure(_)
                | PollOutcome::StorageFailure(_)
        )
    }

    fn from_gateway(error: GatewayError) -> Self {
        match error {
            GatewayError::Auth(e) => PollOutcome::AuthFailure(e.to_string()),
            GatewayError::Fetch(reason) => PollOutcome::FetchFailure(reason),
        }
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollOutcome::NoNewMessage => f.write_str("no new message"),
            PollOutcome::NewCodeFound { message_id, .. } => {
                write!(f, "new code from message {}", message_id)
            }
            PollOutcome::AuthFailure(reason) => write!(f, "not signed in: {}", reason),
            PollOutcome::FetchFailure(reason) => write!(f, "fetch failed: {}", reason),
            PollOutcome::StorageFailure(reason) => write!(f, "storage failed: {}", reason),
        }
    }
}

pub struct PollPipeline {
    gateway: MailGateway,
    store: Arc<dyn SeenStateStore>,
    dispatcher: NotificationDispatcher,
    cycle: Mutex<()>,
}

impl PollPipeline {
    pub fn new(
        gateway: MailGateway,
        store: Arc<dyn SeenStateStore>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            gateway,
            store,
            dispatcher,
            cycle: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SeenStateStore> {
        &self.store
    }

    /// Run one poll cycle to completion.
    ///
    /// Overlapping calls (timer and manual check) queue behind each other, so
    /// the second one reads the watermark the first one wrote.
    pub async fn run_poll(&self) -> PollOutcome {
        let _cycle = self.cycle.lock().await;

        let watermark = match self.store.read().await {
            Ok(state) => state.last_message_id,
            Err(e) => {
                tracing::error!("Failed to read seen state: {}", e);
                return PollOutcome::StorageFailure(e.to_string());
            }
        };

        let candidates = match self.gateway.list_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                let outcome = PollOutcome::from_gateway(e);
                tracing::warn!("Poll skipped, {}", outcome);
                return outcome;
            }
        };

        tracing::debug!("{} candidate messages", candidates.len());

        // Newest first; everything at or after the watermark was already handled
        for candidate in &candidates {
            if watermark.as_deref() == Some(candidate.id.as_str()) {
                tracing::debug!("Reached watermark {}", candidate.id);
                return PollOutcome::NoNewMessage;
            }

            let body = match self.gateway.fetch_body(candidate).await {
                Ok(body) => body,
                Err(e) => {
                    let outcome = PollOutcome::from_gateway(e);
                    tracing::warn!("Poll skipped, {}", outcome);
                    return outcome;
                }
            };

            let Some(code) = body.html.as_deref().and_then(extract_code) else {
                tracing::debug!("No code in message {}, skipping", candidate.id);
                continue;
            };

            let state = SeenState::surfaced(candidate.id.clone(), code.clone(), Utc::now());
            if let Err(e) = self.store.write(&state).await {
                tracing::error!("Failed to record message {}: {}", candidate.id, e);
                return PollOutcome::StorageFailure(e.to_string());
            }

            tracing::info!("New security code from message {}", candidate.id);
            self.dispatcher.dispatch(&code).await;

            return PollOutcome::NewCodeFound {
                code,
                message_id: candidate.id.clone(),
            };
        }

        PollOutcome::NoNewMessage
    }
}
