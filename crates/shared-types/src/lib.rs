use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// User Options
// ============================================================================

/// Corner of the page where the in-page toast is rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToastPosition {
    #[default]
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
}

impl ToastPosition {
    pub fn as_str(&self) -> &str {
        match self {
            ToastPosition::TopRight => "topRight",
            ToastPosition::TopLeft => "topLeft",
            ToastPosition::BottomRight => "bottomRight",
            ToastPosition::BottomLeft => "bottomLeft",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "topRight" => Some(ToastPosition::TopRight),
            "topLeft" => Some(ToastPosition::TopLeft),
            "bottomRight" => Some(ToastPosition::BottomRight),
            "bottomLeft" => Some(ToastPosition::BottomLeft),
            _ => None,
        }
    }
}

pub const DEFAULT_POLL_MINUTES: u32 = 1;

/// User-facing options. Read-only to the poller; replaced wholesale on change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u32,
    #[serde(default = "default_true")]
    pub notify_desktop: bool,
    #[serde(default)]
    pub notify_toast: bool,
    #[serde(default)]
    pub toast_position: ToastPosition,
}

fn default_poll_interval_minutes() -> u32 {
    DEFAULT_POLL_MINUTES
}

fn default_true() -> bool {
    true
}

impl Default for Options {
    fn default() -> Self {
        Self {
            poll_interval_minutes: DEFAULT_POLL_MINUTES,
            notify_desktop: true,
            notify_toast: false,
            toast_position: ToastPosition::TopRight,
        }
    }
}

impl Options {
    /// Interval in minutes, never below one
    pub fn effective_interval_minutes(&self) -> u32 {
        self.poll_interval_minutes.max(1)
    }

    /// Copy of these options with the interval clamped to its minimum
    pub fn normalized(mut self) -> Self {
        self.poll_interval_minutes = self.effective_interval_minutes();
        self
    }
}

// ============================================================================
// Seen State
// ============================================================================

/// Durable record of the last surfaced code.
///
/// `last_message_id`, `last_code` and `last_received_at` are always written
/// together by a single whole-record replace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenState {
    #[serde(default)]
    pub last_message_id: Option<String>,
    #[serde(default)]
    pub last_code: Option<String>,
    #[serde(default)]
    pub last_received_at: Option<DateTime<Utc>>,
}

impl SeenState {
    pub fn surfaced(message_id: impl Into<String>, code: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            last_message_id: Some(message_id.into()),
            last_code: Some(code.into()),
            last_received_at: Some(at),
        }
    }

    pub fn view(&self) -> LastCodeView {
        LastCodeView {
            last_code: self.last_code.clone(),
            last_received_at: self.last_received_at,
        }
    }
}

/// The part of the seen state shown to the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCodeView {
    pub last_code: Option<String>,
    pub last_received_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Runtime Messages
// ============================================================================

/// Messages accepted on the runtime message endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuntimeMessage {
    CheckNow,
    GetLastCode,
    ReschedulePoll,
}

/// `{ok: true}` or `{ok: false, error}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Body of `/health`: liveness plus the state of the poll alarm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthView {
    pub status: String,
    pub alarm_armed: bool,
    pub poll_period_minutes: Option<u64>,
}
