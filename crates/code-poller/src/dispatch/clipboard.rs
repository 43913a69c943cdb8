//! Clipboard access for the notification's Copy action and `code-cli last --copy`.

use arboard::Clipboard;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

use super::SinkError;

#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn copy(&self, text: &str) -> Result<(), SinkError>;
}

/// System clipboard through `arboard`.
///
/// The handle is kept for the lifetime of the sink; on X11 the copied text
/// is served by the owning process, so dropping it early loses the contents.
pub struct SystemClipboard {
    clipboard: Arc<Mutex<Option<Clipboard>>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        let clipboard = match Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!("Failed to initialize clipboard: {}", e);
                None
            }
        };
        Self {
            clipboard: Arc::new(Mutex::new(clipboard)),
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClipboardSink for SystemClipboard {
    async fn copy(&self, text: &str) -> Result<(), SinkError> {
        let clipboard = self.clipboard.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), SinkError> {
            let mut guard = clipboard.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.is_none() {
                *guard = Some(
                    Clipboard::new().map_err(|e| SinkError::Clipboard(e.to_string()))?,
                );
            }
            match guard.as_mut() {
                Some(cb) => cb
                    .set_text(text)
                    .map_err(|e| SinkError::Clipboard(e.to_string())),
                None => Err(SinkError::Clipboard("clipboard not available".to_string())),
            }
        })
        .await
        .map_err(|e| SinkError::Clipboard(format!("clipboard task failed: {}", e)))?
    }
}
