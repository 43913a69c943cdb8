//! Fan-out of a newly found code to the presentation sinks.
//!
//! Each sink is attempted independently. A failing sink is reported and
//! logged but never affects the other sink or the poll outcome.

mod clipboard;
mod desktop;
mod toast;

pub use clipboard::{ClipboardSink, SystemClipboard};
pub use desktop::{
    ActionReceiver, DesktopNotification, DesktopNotifier, DesktopSink, NotificationAction,
    SystemNotifier, COPY_ACTION_ID,
};
pub use toast::{is_restricted_url, ActiveTab, HttpPageBridge, PageBridge, ToastSink};

use shared_types::Options;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Desktop notification failed: {0}")]
    Notification(String),

    #[error("Page bridge failed: {0}")]
    Bridge(String),

    #[error("Clipboard copy failed: {0}")]
    Clipboard(String),
}

/// What happened to one sink during a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Delivered,
    Disabled,
    Skipped(String),
    Failed(String),
}

impl fmt::Display for SinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkOutcome::Delivered => f.write_str("delivered"),
            SinkOutcome::Disabled => f.write_str("disabled"),
            SinkOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            SinkOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub desktop: SinkOutcome,
    pub toast: SinkOutcome,
}

impl DispatchReport {
    fn log(&self) {
        for (sink, outcome) in [("desktop", &self.desktop), ("toast", &self.toast)] {
            match outcome {
                SinkOutcome::Failed(reason) => {
                    tracing::warn!("Sink {} failed: {}", sink, reason)
                }
                other => tracing::debug!("Sink {}: {}", sink, other),
            }
        }
    }
}

/// Sends a code to every enabled sink, reading the options current at
/// dispatch time.
pub struct NotificationDispatcher {
    options: watch::Receiver<Options>,
    desktop: Option<DesktopSink>,
    toast: Option<ToastSink>,
}

impl NotificationDispatcher {
    pub fn new(options: watch::Receiver<Options>) -> Self {
        Self {
            options,
            desktop: None,
            toast: None,
        }
    }

    pub fn with_desktop(self, notifier: Arc<dyn DesktopNotifier>) -> Self {
        self.with_desktop_sink(DesktopSink::new(notifier))
    }

    pub fn with_desktop_sink(mut self, sink: DesktopSink) -> Self {
        self.desktop = Some(sink);
        self
    }

    pub fn with_toast(mut self, bridge: Arc<dyn PageBridge>) -> Self {
        self.toast = Some(ToastSink::new(bridge));
        self
    }

    pub async fn dispatch(&self, code: &str) -> DispatchReport {
        let options = self.options.borrow().clone();

        let desktop = async {
            match (&self.desktop, options.notify_desktop) {
                (_, false) => SinkOutcome::Disabled,
                (None, true) => SinkOutcome::Skipped("no desktop notifier".to_string()),
                (Some(sink), true) => sink.deliver(code).await,
            }
        };

        let toast = async {
            match (&self.toast, options.notify_toast) {
                (_, false) => SinkOutcome::Disabled,
                (None, true) => SinkOutcome::Skipped("no page bridge configured".to_string()),
                (Some(sink), true) => sink.deliver(code, options.toast_position).await,
            }
        };

        let (desktop, toast) = tokio::join!(desktop, toast);
        let report = DispatchReport { desktop, toast };
        report.log();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBridge, RecordingNotifier};
    use shared_types::ToastPosition;

    fn options(desktop: bool, toast: bool) -> Options {
        Options {
            notify_desktop: desktop,
            notify_toast: toast,
            toast_position: ToastPosition::BottomLeft,
            ..Options::default()
        }
    }

    #[tokio::test]
    async fn test_both_sinks_fire() {
        let (_tx, rx) = watch::channel(options(true, true));
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = Arc::new(FakeBridge::on_url("https://example.com/login"));
        let dispatcher = NotificationDispatcher::new(rx)
            .with_desktop(notifier.clone())
            .with_toast(bridge.clone());

        let report = dispatcher.dispatch("ABC-123").await;

        assert_eq!(report.desktop, SinkOutcome::Delivered);
        assert_eq!(report.toast, SinkOutcome::Delivered);
        assert_eq!(notifier.bodies(), vec!["Your code: ABC-123".to_string()]);
        assert_eq!(
            bridge.injected(),
            vec![("ABC-123".to_string(), ToastPosition::BottomLeft)]
        );
    }

    #[tokio::test]
    async fn test_disabled_sinks_are_not_called() {
        let (_tx, rx) = watch::channel(options(false, false));
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = Arc::new(FakeBridge::on_url("https://example.com"));
        let dispatcher = NotificationDispatcher::new(rx)
            .with_desktop(notifier.clone())
            .with_toast(bridge.clone());

        let report = dispatcher.dispatch("X").await;

        assert_eq!(report.desktop, SinkOutcome::Disabled);
        assert_eq!(report.toast, SinkOutcome::Disabled);
        assert!(notifier.bodies().is_empty());
        assert!(bridge.injected().is_empty());
    }

    #[tokio::test]
    async fn test_failing_desktop_does_not_block_toast() {
        let (_tx, rx) = watch::channel(options(true, true));
        let notifier = Arc::new(RecordingNotifier::failing());
        let bridge = Arc::new(FakeBridge::on_url("https://example.com"));
        let dispatcher = NotificationDispatcher::new(rx)
            .with_desktop(notifier)
            .with_toast(bridge.clone());

        let report = dispatcher.dispatch("CODE").await;

        assert!(matches!(report.desktop, SinkOutcome::Failed(_)));
        assert_eq!(report.toast, SinkOutcome::Delivered);
        assert_eq!(bridge.injected().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_toast_does_not_block_desktop() {
        let (_tx, rx) = watch::channel(options(true, true));
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = Arc::new(FakeBridge::on_url("https://example.com").rejecting());
        let dispatcher = NotificationDispatcher::new(rx)
            .with_desktop(notifier.clone())
            .with_toast(bridge);

        let report = dispatcher.dispatch("CODE").await;

        assert_eq!(report.desktop, SinkOutcome::Delivered);
        assert!(matches!(report.toast, SinkOutcome::Failed(_)));
        assert_eq!(notifier.bodies().len(), 1);
    }

    #[tokio::test]
    async fn test_options_are_read_at_dispatch_time() {
        let (tx, rx) = watch::channel(options(true, false));
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = NotificationDispatcher::new(rx).with_desktop(notifier.clone());

        tx.send_replace(options(false, false));
        let report = dispatcher.dispatch("CODE").await;

        assert_eq!(report.desktop, SinkOutcome::Disabled);
        assert!(notifier.bodies().is_empty());
    }

    #[tokio::test]
    async fn test_enabled_toast_without_bridge_is_skipped() {
        let (_tx, rx) = watch::channel(options(false, true));
        let dispatcher = NotificationDispatcher::new(rx);

        let report = dispatcher.dispatch("CODE").await;
        assert!(matches!(report.toast, SinkOutcome::Skipped(_)));
    }
}
