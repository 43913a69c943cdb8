//! In-memory fakes for the capability traits.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use shared_types::{Options, SeenState, ToastPosition};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

use crate::dispatch::{
    ActionReceiver, ActiveTab, ClipboardSink, DesktopNotification, DesktopNotifier,
    NotificationDispatcher, PageBridge, SinkError,
};
use crate::gateway::{
    AccessToken, AuthError, MailClient, MailError, MailGateway, MessagePayload, MessageRef,
    RawMessage, SearchQuery, TokenProvider,
};
use crate::pipeline::PollPipeline;
use crate::state::{MemoryStore, SeenStateStore, StateError};

pub struct FakeTokens {
    connected: bool,
}

impl FakeTokens {
    pub fn connected() -> Self {
        Self { connected: true }
    }

    pub fn disconnected() -> Self {
        Self { connected: false }
    }
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn token(&self, _interactive: bool) -> Result<AccessToken, AuthError> {
        if self.connected {
            Ok(AccessToken::new("test-token"))
        } else {
            Err(AuthError::NotConnected("no token cache".to_string()))
        }
    }
}

/// Multipart message whose HTML part is `html`
pub fn html_message(id: &str, html: &str) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        payload: Some(MessagePayload::multipart(
            "multipart/alternative",
            vec![
                MessagePayload::single("text/plain", &URL_SAFE_NO_PAD.encode("plain text")),
                MessagePayload::single("text/html", &URL_SAFE_NO_PAD.encode(html)),
            ],
        )),
    }
}

/// Mailbox with a fixed newest-first listing
pub struct FakeMail {
    ids: Mutex<Vec<String>>,
    messages: HashMap<String, RawMessage>,
    list_failure: Option<fn() -> MailError>,
    failing_fetches: HashSet<String>,
    list_calls: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl FakeMail {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
            messages: HashMap::new(),
            list_failure: None,
            failing_fetches: HashSet::new(),
            list_calls: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_message(mut self, id: &str, message: RawMessage) -> Self {
        self.messages.insert(id.to_string(), message);
        self
    }

    /// Message carrying `code` in its heading
    pub fn with_code(self, id: &str, code: &str) -> Self {
        let html = format!(
            "<html><body><p>Your security code is:</p><h1>{}</h1></body></html>",
            code
        );
        self.with_message(id, html_message(id, &html))
    }

    /// Message that matches the query but has no code heading
    pub fn without_code(self, id: &str) -> Self {
        self.with_message(id, html_message(id, "<p>Welcome to your account</p>"))
    }

    pub fn failing_list(mut self, error: fn() -> MailError) -> Self {
        self.list_failure = Some(error);
        self
    }

    pub fn failing_fetch(mut self, id: &str) -> Self {
        self.failing_fetches.insert(id.to_string());
        self
    }

    pub fn set_ids(&self, ids: &[&str]) {
        *self.ids.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailClient for FakeMail {
    async fn list_messages(
        &self,
        _token: &AccessToken,
        _query: &SearchQuery,
    ) -> Result<Vec<MessageRef>, MailError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.list_failure {
            return Err(error());
        }
        Ok(self
            .ids
            .lock()
            .unwrap()
            .iter()
            .map(|id| MessageRef::new(id.clone()))
            .collect())
    }

    async fn get_message(&self, _token: &AccessToken, id: &str) -> Result<RawMessage, MailError> {
        self.fetched.lock().unwrap().push(id.to_string());
        if self.failing_fetches.contains(id) {
            return Err(MailError::Status {
                status: 500,
                body: "backend error".to_string(),
            });
        }
        self.messages.get(id).cloned().ok_or(MailError::NotFound)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<DesktopNotification>>,
    pending: Mutex<Vec<oneshot::Sender<String>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn bodies(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.body.clone())
            .collect()
    }

    /// Clicks `action` on the oldest notification still open
    pub fn click(&self, action: &str) {
        let mut pending = self.pending.lock().unwrap();
        assert!(!pending.is_empty(), "no open notification");
        let _ = pending.remove(0).send(action.to_string());
    }

    /// Closes the oldest open notification without reporting an action
    pub fn dismiss(&self) {
        let mut pending = self.pending.lock().unwrap();
        assert!(!pending.is_empty(), "no open notification");
        drop(pending.remove(0));
    }
}

#[async_trait]
impl DesktopNotifier for RecordingNotifier {
    async fn show(&self, notification: &DesktopNotification) -> Result<ActionReceiver, SinkError> {
        if self.fail {
            return Err(SinkError::Notification("no notification daemon".to_string()));
        }
        self.shown.lock().unwrap().push(notification.clone());
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push(tx);
        Ok(rx)
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    copied: Mutex<Vec<String>>,
    unavailable: bool,
}

impl FakeClipboard {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn copied(&self) -> Vec<String> {
        self.copied.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClipboardSink for FakeClipboard {
    async fn copy(&self, text: &str) -> Result<(), SinkError> {
        if self.unavailable {
            return Err(SinkError::Clipboard("clipboard not available".to_string()));
        }
        self.copied.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Lets spawned tasks run to their next await point
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub struct FakeBridge {
    tab: Option<ActiveTab>,
    reject: bool,
    injected: Mutex<Vec<(String, ToastPosition)>>,
}

impl FakeBridge {
    pub fn on_url(url: &str) -> Self {
        Self {
            tab: Some(ActiveTab {
                id: 7,
                url: Some(url.to_string()),
            }),
            reject: false,
            injected: Mutex::new(Vec::new()),
        }
    }

    pub fn without_tab() -> Self {
        Self {
            tab: None,
            reject: false,
            injected: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    pub fn injected(&self) -> Vec<(String, ToastPosition)> {
        self.injected.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageBridge for FakeBridge {
    async fn active_tab(&self) -> Result<Option<ActiveTab>, SinkError> {
        Ok(self.tab.clone())
    }

    async fn inject_toast(
        &self,
        _tab_id: i64,
        code: &str,
        position: ToastPosition,
    ) -> Result<(), SinkError> {
        if self.reject {
            return Err(SinkError::Bridge("cannot access page".to_string()));
        }
        self.injected.lock().unwrap().push((code.to_string(), position));
        Ok(())
    }
}

/// Store whose writes always fail
pub struct ReadOnlyStore {
    inner: MemoryStore,
}

impl ReadOnlyStore {
    pub fn new(state: SeenState) -> Self {
        Self {
            inner: MemoryStore::new(state),
        }
    }
}

#[async_trait]
impl SeenStateStore for ReadOnlyStore {
    async fn read(&self) -> Result<SeenState, StateError> {
        self.inner.read().await
    }

    async fn write(&self, _state: &SeenState) -> Result<(), StateError> {
        Err(StateError::Io {
            path: "seen_state.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

/// Pipeline over fakes with desktop notifications enabled
pub fn pipeline(
    tokens: FakeTokens,
    mail: Arc<FakeMail>,
    store: Arc<dyn SeenStateStore>,
    notifier: Arc<RecordingNotifier>,
) -> PollPipeline {
    let (_tx, rx) = watch::channel(Options::default());
    let gateway = MailGateway::new(
        Arc::new(tokens),
        mail,
        SearchQuery::new("no-reply@example.com", "Security code", 5),
    );
    let dispatcher = NotificationDispatcher::new(rx).with_desktop(notifier);
    PollPipeline::new(gateway, store, dispatcher)
}
