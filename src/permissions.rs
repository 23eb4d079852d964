//! Permission prompts that outlive a single IPC call.
//!
//! A request that the trusted-origins store cannot answer is parked here on a
//! oneshot channel until the main UI replies with `update-permission`.

use dashmap::DashMap;
use std::sync::Arc;
use tauri::{State, Webview};
use tokio::sync::oneshot;
use url::Url;

use crate::ipc::Sender;
use crate::state::AppState;

struct PendingRequest {
    url: Url,
    permission: String,
    reply: oneshot::Sender<bool>,
}

/// What the caller should persist after a request is answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub url: Url,
    pub permission: String,
    pub granted: bool,
}

#[derive(Default)]
pub struct PermissionManager {
    pending: DashMap<String, PendingRequest>,
}

impl PermissionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a request and return its id plus the receiver to await.
    pub fn begin(&self, url: Url, permission: &str) -> (String, oneshot::Receiver<bool>) {
        let (reply, rx) = oneshot::channel();
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(request_id = %request_id, url = %url, permission, "Permission request pending");
        self.pending.insert(
            request_id.clone(),
            PendingRequest {
                url,
                permission: permission.to_string(),
                reply,
            },
        );
        (request_id, rx)
    }

    /// Answer a pending request. `None` when the id is unknown (already
    /// answered or never issued).
    pub fn resolve(&self, request_id: &str, granted: bool) -> Option<Resolved> {
        let (_, request) = self.pending.remove(request_id)?;
        // The requester may have gone away; the answer is still worth persisting
        let _ = request.reply.send(granted);
        Some(Resolved {
            url: request.url,
            permission: request.permission,
            granted,
        })
    }

    /// Drop every pending request; their waiters resolve to `false`.
    pub fn cancel_all(&self) {
        self.pending.clear();
    }
}

/// Await an answer. A dropped request counts as denied.
pub async fn wait_for_answer(rx: oneshot::Receiver<bool>) -> bool {
    rx.await.unwrap_or(false)
}

/// Asked by a server view before it answers an HTTP auth challenge.
#[tauri::command]
pub(crate) async fn request_permission(
    webview: Webview,
    state: State<'_, Arc<AppState>>,
    url: String,
    permission: String,
) -> Result<bool, String> {
    if !matches!(Sender::from_label(webview.label()), Sender::View(_)) {
        return Err("permission requests must come from a server view".to_string());
    }
    let url = Url::parse(&url).map_err(|e| format!("invalid URL {url:?}: {e}"))?;
    Ok(state.request_permission(url, permission).await)
}
