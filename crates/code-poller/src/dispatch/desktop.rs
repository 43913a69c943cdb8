//! Desktop notification sink.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

use super::{ClipboardSink, SinkError, SinkOutcome};

pub const NOTIFICATION_TITLE: &str = "Security code";
pub const COPY_ACTION_ID: &str = "copy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

/// Action ids the user clicked on a shown notification. The sender is
/// dropped when the notification closes without an action or the platform
/// does not report actions.
pub type ActionReceiver = oneshot::Receiver<String>;

/// Shows notifications on the user's desktop.
#[async_trait]
pub trait DesktopNotifier: Send + Sync {
    async fn show(&self, notification: &DesktopNotification) -> Result<ActionReceiver, SinkError>;
}

pub struct DesktopSink {
    notifier: Arc<dyn DesktopNotifier>,
    clipboard: Option<Arc<dyn ClipboardSink>>,
}

impl DesktopSink {
    pub fn new(notifier: Arc<dyn DesktopNotifier>) -> Self {
        Self {
            notifier,
            clipboard: None,
        }
    }

    /// Copy the code here when the notification's Copy action is clicked
    pub fn with_clipboard(mut self, clipboard: Arc<dyn ClipboardSink>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    pub fn notification_for(code: &str) -> DesktopNotification {
        DesktopNotification {
            title: NOTIFICATION_TITLE.to_string(),
            body: format!("Your code: {}", code),
            actions: vec![NotificationAction {
                id: COPY_ACTION_ID.to_string(),
                label: "Copy".to_string(),
            }],
        }
    }

    pub async fn deliver(&self, code: &str) -> SinkOutcome {
        match self.notifier.show(&Self::notification_for(code)).await {
            Ok(actions) => {
                if let Some(clipboard) = &self.clipboard {
                    tokio::spawn(copy_on_action(actions, code.to_string(), clipboard.clone()));
                }
                SinkOutcome::Delivered
            }
            Err(e) => SinkOutcome::Failed(e.to_string()),
        }
    }
}

async fn copy_on_action(actions: ActionReceiver, code: String, clipboard: Arc<dyn ClipboardSink>) {
    let Ok(action) = actions.await else {
        return;
    };
    if action != COPY_ACTION_ID {
        tracing::debug!("Notification closed with action {}", action);
        return;
    }

    match clipboard.copy(&code).await {
        Ok(()) => tracing::info!("Copied code to clipboard"),
        Err(e) => tracing::warn!("{}", e),
    }
}

/// Native notifications through `notify-rust`
pub struct SystemNotifier {
    app_name: String,
}

impl SystemNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

#[async_trait]
impl DesktopNotifier for SystemNotifier {
    async fn show(&self, notification: &DesktopNotification) -> Result<ActionReceiver, SinkError> {
        let app_name = self.app_name.clone();
        let notification = notification.clone();
        let (shown_tx, shown_rx) = oneshot::channel();
        let (action_tx, action_rx) = oneshot::channel();

        // The platform backends block on their IPC round trip, and waiting
        // for an action blocks until the notification closes
        std::thread::spawn(move || {
            let mut native = notify_rust::Notification::new();
            native
                .appname(&app_name)
                .summary(&notification.title)
                .body(&notification.body);
            for action in &notification.actions {
                native.action(&action.id, &action.label);
            }

            match native.show() {
                Ok(handle) => {
                    let _ = shown_tx.send(Ok(()));
                    wait_for_action(handle, action_tx);
                }
                Err(e) => {
                    let _ = shown_tx.send(Err(SinkError::Notification(e.to_string())));
                }
            }
        });

        shown_rx
            .await
            .map_err(|_| SinkError::Notification("notification thread exited".to_string()))??;
        Ok(action_rx)
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn wait_for_action(handle: notify_rust::NotificationHandle, reply: oneshot::Sender<String>) {
    handle.wait_for_action(|action| {
        let _ = reply.send(action.to_string());
    });
}

// Other platforms do not report clicked actions back
#[cfg(not(all(unix, not(target_os = "macos"))))]
fn wait_for_action<H>(_handle: H, _reply: oneshot::Sender<String>) {}
