//! Typed messages between the shell and its webviews.
//!
//! Outgoing traffic is an [`AppEvent`] with a fixed channel; incoming traffic
//! arrives through the `ipc_send` command and is validated into an
//! [`IncomingMessage`] before anything acts on it.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tauri::{AppHandle, Emitter, EventTarget, Manager, State, UserAttentionType, Webview};
use tauri_plugin_notification::NotificationExt;

use crate::badge::UnreadTotals;
use crate::config::NotificationSettings;
use crate::error::IpcError;
use crate::state::AppState;
use crate::tabs::TabType;
use crate::views::{receive_call, ViewId};

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

pub const UPDATE_AVAILABLE: &str = "update-available";
pub const UPDATE_DOWNLOADED: &str = "update-downloaded";
pub const UPDATE_PROGRESS: &str = "update-progress";
pub const NO_UPDATE_AVAILABLE: &str = "no-update-available";
pub const CANCEL_UPGRADE: &str = "cancel-upgrade";
pub const REQUEST_PERMISSION: &str = "request-permission";
pub const UPDATE_PERMISSION: &str = "update-permission";
pub const UPDATE_MENU: &str = "update-menu";
pub const UPDATE_CONFIG: &str = "update-config";
pub const NOTIFIED: &str = "notified";
pub const NOTIFY_MENTION: &str = "notify-mention";
pub const BROWSER_HISTORY_PUSH: &str = "browser-history-push";
pub const UNREADS_AND_MENTIONS: &str = "unreads-and-mentions";
pub const SESSION_EXPIRED: &str = "session-expired";
pub const UPDATE_MENTIONS: &str = "update-mentions";
pub const SET_ACTIVE_VIEW: &str = "set-active-view";
pub const SWITCH_SERVER: &str = "switch-server";
pub const SWITCH_TAB: &str = "switch-tab";
/// Internal: badge text/count changed, applied to the window and tray.
pub const UPDATE_BADGE: &str = "update-badge";

/// Menu items the main UI handles itself (settings, add server).
pub const MENU_ACTION: &str = "menu-action";

/// Label of the webview hosting the tab bar and settings UI.
pub const MAIN_UI_LABEL: &str = "main-ui";

// ---------------------------------------------------------------------------
// Outgoing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    UpdateAvailable { version: String },
    UpdateDownloaded { version: String },
    UpdateProgress { version: String, downloaded: u64, total: Option<u64> },
    NoUpdateAvailable,
    RequestPermission { request_id: String, url: String, permission: String },
    UpdateMenu,
    UpdateConfig(Value),
    Notified { view: ViewId },
    BrowserHistoryPush { view: ViewId, path: String },
    UpdateMentions { server_id: String, mentions: u32, totals: UnreadTotals },
    UpdateBadge { text: Option<String>, count: i64, totals: UnreadTotals },
    SetActiveView { view: ViewId },
}

impl AppEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            AppEvent::UpdateAvailable { .. } => UPDATE_AVAILABLE,
            AppEvent::UpdateDownloaded { .. } => UPDATE_DOWNLOADED,
            AppEvent::UpdateProgress { .. } => UPDATE_PROGRESS,
            AppEvent::NoUpdateAvailable => NO_UPDATE_AVAILABLE,
            AppEvent::RequestPermission { .. } => REQUEST_PERMISSION,
            AppEvent::UpdateMenu => UPDATE_MENU,
            AppEvent::UpdateConfig(_) => UPDATE_CONFIG,
            AppEvent::Notified { .. } => NOTIFIED,
            AppEvent::BrowserHistoryPush { .. } => BROWSER_HISTORY_PUSH,
            AppEvent::UpdateMentions { .. } => UPDATE_MENTIONS,
            AppEvent::UpdateBadge { .. } => UPDATE_BADGE,
            AppEvent::SetActiveView { .. } => SET_ACTIVE_VIEW,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            AppEvent::UpdateAvailable { version } | AppEvent::UpdateDownloaded { version } => {
                json!({ "version": version })
            }
            AppEvent::UpdateProgress { version, downloaded, total } => {
                json!({ "version": version, "downloaded": downloaded, "total": total })
            }
            AppEvent::NoUpdateAvailable | AppEvent::UpdateMenu => Value::Null,
            AppEvent::RequestPermission { request_id, url, permission } => {
                json!({ "requestId": request_id, "url": url, "permission": permission })
            }
            AppEvent::UpdateConfig(config) => config.clone(),
            AppEvent::Notified { view } | AppEvent::SetActiveView { view } => json!(view),
            AppEvent::BrowserHistoryPush { path, .. } => json!({ "path": path }),
            AppEvent::UpdateMentions { server_id, mentions, totals } => {
                json!({ "serverId": server_id, "mentions": mentions, "totals": totals })
            }
            AppEvent::UpdateBadge { text, count, totals } => {
                json!({ "text": text, "count": count, "totals": totals })
            }
        }
    }

    /// The view a targeted event is delivered to, `None` for broadcasts.
    pub fn target(&self) -> Option<&ViewId> {
        match self {
            AppEvent::BrowserHistoryPush { view, .. } => Some(view),
            _ => None,
        }
    }
}

/// Only the main UI and Rust-side listeners see broadcasts; server views
/// never do.
pub(crate) fn is_shell_target(target: &EventTarget) -> bool {
    match target {
        EventTarget::App => true,
        EventTarget::Webview { label } | EventTarget::WebviewWindow { label } => label == MAIN_UI_LABEL,
        _ => false,
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AppEvent);
    fn emit_to_view(&self, view: &ViewId, event: &AppEvent);

    /// Route `event` to its target view, or broadcast it.
    fn dispatch(&self, event: AppEvent) {
        match event.target() {
            Some(view) => self.emit_to_view(view, &event),
            None => self.emit(&event),
        }
    }
}

pub struct TauriEventSink {
    app: AppHandle,
}

impl TauriEventSink {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl EventSink for TauriEventSink {
    fn emit(&self, event: &AppEvent) {
        if let Err(e) = self
            .app
            .emit_filter(event.channel(), event.payload(), is_shell_target)
        {
            tracing::warn!(channel = event.channel(), "Failed to emit event: {e}");
        }
    }

    /// Server views have no event permissions; their bridge is called directly.
    fn emit_to_view(&self, view: &ViewId, event: &AppEvent) {
        let Some(webview) = self.app.get_webview(&view.label()) else {
            tracing::warn!(channel = event.channel(), view = %view.label(), "No webview for event");
            return;
        };
        if let Err(e) = webview.eval(&receive_call(event.channel(), &event.payload())) {
            tracing::warn!(channel = event.channel(), view = %view.label(), "Failed to deliver event: {e}");
        }
    }
}

/// How hard to ask for the user's attention after a mention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attention {
    Informational,
    Critical,
}

/// Taskbar flash (Windows, Linux) or dock bounce (macOS) for a mention, per
/// the notification settings.
pub fn mention_attention(settings: &NotificationSettings) -> Option<Attention> {
    if cfg!(target_os = "macos") {
        if !settings.bounce_icon {
            return None;
        }
        match settings.bounce_icon_type.as_str() {
            "critical" => Some(Attention::Critical),
            "informational" => Some(Attention::Informational),
            _ => None,
        }
    } else {
        (settings.flash_window != 0).then_some(Attention::Informational)
    }
}

/// Desktop notifications for mentions.
pub trait Notifier: Send + Sync {
    fn show(&self, title: &str, body: &str) -> Result<(), String>;
    fn request_attention(&self, attention: Attention) -> Result<(), String>;
}

pub struct TauriNotifier {
    app: AppHandle,
}

impl TauriNotifier {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Notifier for TauriNotifier {
    fn show(&self, title: &str, body: &str) -> Result<(), String> {
        self.app
            .notification()
            .builder()
            .title(title)
            .body(body)
            .show()
            .map_err(|e| e.to_string())
    }

    fn request_attention(&self, attention: Attention) -> Result<(), String> {
        let Some(window) = self.app.get_window(crate::MAIN_WINDOW) else {
            return Ok(());
        };
        let kind = match attention {
            Attention::Informational => UserAttentionType::Informational,
            Attention::Critical => UserAttentionType::Critical,
        };
        window.request_user_attention(Some(kind)).map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Incoming
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadsPayload {
    pub is_unread: bool,
    #[serde(default)]
    pub mentions: u32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionPayload {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    /// Path inside the server to open when the notification is clicked.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionAnswer {
    pub request_id: String,
    pub granted: bool,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSelection {
    pub server_id: String,
    pub tab: TabType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IncomingMessage {
    UnreadsAndMentions(UnreadsPayload),
    SessionExpired { expired: bool },
    NotifyMention(MentionPayload),
    /// The webapp navigated inside its own router.
    BrowserHistoryPush { path: String },
    CancelUpgrade,
    UpdatePermission(PermissionAnswer),
    SwitchServer { server_id: String },
    SwitchTab(TabSelection),
}

fn payload<T: DeserializeOwned>(channel: &str, value: Value) -> Result<T, IpcError> {
    serde_json::from_value(value).map_err(|source| IpcError::Payload {
        channel: channel.to_string(),
        source,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpiredPayload {
    expired: bool,
}

#[derive(Deserialize)]
struct PathPayload {
    path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerPayload {
    server_id: String,
}

impl IncomingMessage {
    pub fn parse(channel: &str, value: Value) -> Result<Self, IpcError> {
        Ok(match channel {
            UNREADS_AND_MENTIONS => IncomingMessage::UnreadsAndMentions(payload(channel, value)?),
            SESSION_EXPIRED => {
                let p: ExpiredPayload = payload(channel, value)?;
                IncomingMessage::SessionExpired { expired: p.expired }
            }
            NOTIFY_MENTION => IncomingMessage::NotifyMention(payload(channel, value)?),
            BROWSER_HISTORY_PUSH => {
                let p: PathPayload = payload(channel, value)?;
                IncomingMessage::BrowserHistoryPush { path: p.path }
            }
            CANCEL_UPGRADE => IncomingMessage::CancelUpgrade,
            UPDATE_PERMISSION => IncomingMessage::UpdatePermission(payload(channel, value)?),
            SWITCH_SERVER => {
                let p: ServerPayload = payload(channel, value)?;
                IncomingMessage::SwitchServer { server_id: p.server_id }
            }
            SWITCH_TAB => IncomingMessage::SwitchTab(payload(channel, value)?),
            other => return Err(IpcError::UnknownChannel(other.to_string())),
        })
    }

    /// Messages that describe a single server view must come from that view.
    pub fn requires_view_sender(&self) -> bool {
        matches!(
            self,
            IncomingMessage::UnreadsAndMentions(_)
                | IncomingMessage::SessionExpired { .. }
                | IncomingMessage::NotifyMention(_)
                | IncomingMessage::BrowserHistoryPush { .. }
        )
    }
}

/// Who sent a message, derived from the webview label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sender {
    MainUi,
    View(ViewId),
    Unknown(String),
}

impl Sender {
    pub fn from_label(label: &str) -> Self {
        if label == MAIN_UI_LABEL {
            return Sender::MainUi;
        }
        match ViewId::from_label(label) {
            Some(view) => Sender::View(view),
            None => Sender::Unknown(label.to_string()),
        }
    }

    fn label(&self) -> String {
        match self {
            Sender::MainUi => MAIN_UI_LABEL.to_string(),
            Sender::View(view) => view.label(),
            Sender::Unknown(label) => label.clone(),
        }
    }
}

/// Check that `message` may come from `sender`.
pub fn authorize(sender: &Sender, message: &IncomingMessage, channel: &str) -> Result<(), IpcError> {
    let allowed = match sender {
        Sender::View(_) => message.requires_view_sender(),
        Sender::MainUi => !message.requires_view_sender(),
        Sender::Unknown(_) => false,
    };
    if allowed {
        Ok(())
    } else {
        tracing::warn!(sender = %sender.label(), channel, "Rejected IPC message");
        Err(IpcError::WrongSender(channel.to_string()))
    }
}

#[tauri::command]
pub(crate) fn ipc_send(
    webview: Webview,
    state: State<'_, Arc<AppState>>,
    channel: String,
    payload: Value,
) -> Result<(), String> {
    let message = IncomingMessage::parse(&channel, payload).map_err(|e| e.to_string())?;
    let sender = Sender::from_label(webview.label());
    authorize(&sender, &message, &channel).map_err(|e| e.to_string())?;
    state.handle_incoming(&sender, message)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Sink that keeps `(target label, event)` pairs.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) events: Mutex<Vec<(Option<String>, AppEvent)>>,
    }

    impl RecordingSink {
        pub(crate) fn channels(&self) -> Vec<&'static str> {
            self.events.lock().iter().map(|(_, e)| e.channel()).collect()
        }

        pub(crate) fn take(&self) -> Vec<(Option<String>, AppEvent)> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: &AppEvent) {
            self.events.lock().push((None, event.clone()));
        }

        fn emit_to_view(&self, view: &ViewId, event: &AppEvent) {
            self.events.lock().push((Some(view.label()), event.clone()));
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) shown: Mutex<Vec<(String, String)>>,
        pub(crate) attention: Mutex<Vec<Attention>>,
    }

    impl Notifier for RecordingNotifier {
        fn show(&self, title: &str, body: &str) -> Result<(), String> {
            self.shown.lock().push((title.to_string(), body.to_string()));
            Ok(())
        }

        fn request_attention(&self, attention: Attention) -> Result<(), String> {
            self.attention.lock().push(attention);
            Ok(())
        }
    }

    #[test]
    fn parses_known_channels() {
        let msg = IncomingMessage::parse(
            UNREADS_AND_MENTIONS,
            json!({"isUnread": true, "mentions": 3}),
        )
        .unwrap();
        assert_eq!(
            msg,
            IncomingMessage::UnreadsAndMentions(UnreadsPayload { is_unread: true, mentions: 3 })
        );

        let msg = IncomingMessage::parse(SWITCH_TAB, json!({"serverId": "a", "tab": "TAB_PLAYBOOKS"}))
            .unwrap();
        assert_eq!(
            msg,
            IncomingMessage::SwitchTab(TabSelection { server_id: "a".into(), tab: TabType::Playbooks })
        );

        assert_eq!(
            IncomingMessage::parse(CANCEL_UPGRADE, Value::Null).unwrap(),
            IncomingMessage::CancelUpgrade
        );

        let msg = IncomingMessage::parse(BROWSER_HISTORY_PUSH, json!({"path": "/team/boards"})).unwrap();
        assert_eq!(msg, IncomingMessage::BrowserHistoryPush { path: "/team/boards".into() });
        assert!(msg.requires_view_sender());
    }

    #[test]
    fn rejects_unknown_channel_and_bad_payload() {
        assert!(matches!(
            IncomingMessage::parse("open-devtools", Value::Null),
            Err(IpcError::UnknownChannel(_))
        ));
        assert!(matches!(
            IncomingMessage::parse(SESSION_EXPIRED, json!({"expired": "yes"})),
            Err(IpcError::Payload { .. })
        ));
        assert!(matches!(
            IncomingMessage::parse(SWITCH_TAB, json!({"serverId": "a", "tab": "TAB_CALLS"})),
            Err(IpcError::Payload { .. })
        ));
    }

    #[test]
    fn senders_are_checked() {
        let view = Sender::from_label("view-abc-messaging");
        assert_eq!(view, Sender::View(ViewId::new("abc", TabType::Messaging)));
        assert_eq!(Sender::from_label(MAIN_UI_LABEL), Sender::MainUi);

        let unread = IncomingMessage::SessionExpired { expired: true };
        assert!(authorize(&view, &unread, SESSION_EXPIRED).is_ok());
        assert!(authorize(&Sender::MainUi, &unread, SESSION_EXPIRED).is_err());

        let cancel = IncomingMessage::CancelUpgrade;
        assert!(authorize(&Sender::MainUi, &cancel, CANCEL_UPGRADE).is_ok());
        assert!(authorize(&view, &cancel, CANCEL_UPGRADE).is_err());
        assert!(authorize(&Sender::from_label("evil"), &cancel, CANCEL_UPGRADE).is_err());
    }

    #[test]
    fn events_have_fixed_channels_and_targets() {
        let view = ViewId::new("abc", TabType::Messaging);
        let push = AppEvent::BrowserHistoryPush { view: view.clone(), path: "/x".into() };
        assert_eq!(push.channel(), BROWSER_HISTORY_PUSH);
        assert_eq!(push.target(), Some(&view));
        assert_eq!(push.payload(), json!({"path": "/x"}));

        assert_eq!(AppEvent::NoUpdateAvailable.payload(), Value::Null);
        assert_eq!(AppEvent::UpdateMenu.target(), None);

        let sink = RecordingSink::default();
        sink.dispatch(push);
        sink.dispatch(AppEvent::UpdateMenu);
        let events = sink.take();
        assert_eq!(events[0].0.as_deref(), Some("view-abc-messaging"));
        assert_eq!(events[1].0, None);
    }

    #[test]
    fn broadcasts_skip_server_views() {
        assert!(is_shell_target(&EventTarget::App));
        assert!(is_shell_target(&EventTarget::webview(MAIN_UI_LABEL)));
        assert!(!is_shell_target(&EventTarget::webview("view-abc-messaging")));
        assert!(!is_shell_target(&EventTarget::window(crate::MAIN_WINDOW)));
    }

    #[test]
    fn server_views_may_only_invoke_the_bridge_commands() {
        let remote: Value = serde_json::from_str(include_str!("../capabilities/remote.json")).unwrap();
        assert_eq!(remote["webviews"], json!(["view-*"]));
        assert_eq!(
            remote["permissions"],
            json!(["allow-ipc-send", "allow-request-permission"])
        );

        let main: Value = serde_json::from_str(include_str!("../capabilities/default.json")).unwrap();
        let granted: Vec<&str> = main["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(granted.contains(&"allow-ipc-send"));
        assert!(granted.contains(&"allow-get-config"));
    }

    #[test]
    fn attention_follows_notification_settings() {
        let off = NotificationSettings {
            flash_window: 0,
            bounce_icon: false,
            bounce_icon_type: String::new(),
        };
        assert_eq!(mention_attention(&off), None);

        let on = NotificationSettings {
            flash_window: 2,
            bounce_icon: true,
            bounce_icon_type: "critical".into(),
        };
        let expected = if cfg!(target_os = "macos") {
            Attention::Critical
        } else {
            Attention::Informational
        };
        assert_eq!(mention_attention(&on), Some(expected));
    }
}
