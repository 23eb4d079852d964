//! Automatic update checks, renotification and install-on-quit.
//!
//! State machine:
//! `Idle → CheckPending → (NoUpdate | UpdateAvailable) → Downloading → ReadyToInstall`.
//! Two timers drive it: the hourly check and the daily renotify. Arming a timer
//! always aborts the previous one first.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tauri::async_runtime::{self, JoinHandle};
use tauri::{AppHandle, State};
use tauri_plugin_updater::{Update, UpdaterExt};

use crate::config::ConfigStore;
use crate::ipc::{AppEvent, EventSink};
use crate::state::AppState;

/// Renotify interval while an update is pending.
pub const NEXT_NOTIFY: Duration = Duration::from_secs(24 * 60 * 60);
/// Interval between automatic checks.
pub const NEXT_CHECK: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum UpdateStatus {
    Idle,
    CheckPending,
    NoUpdate,
    UpdateAvailable { version: String },
    Downloading { version: String, downloaded: u64, total: Option<u64> },
    ReadyToInstall { version: String },
}

impl UpdateStatus {
    fn version(&self) -> Option<&str> {
        match self {
            UpdateStatus::UpdateAvailable { version }
            | UpdateStatus::Downloading { version, .. }
            | UpdateStatus::ReadyToInstall { version } => Some(version.as_str()),
            _ => None,
        }
    }
}

/// Download progress: `(bytes so far, total if known)`.
pub type ProgressFn = Box<dyn FnMut(u64, Option<u64>) + Send>;

pub trait UpdateBackend: Send + Sync {
    /// Version of the available update, `None` when up to date.
    fn check(&self) -> BoxFuture<'_, anyhow::Result<Option<String>>>;
    /// Download the update found by the last successful check.
    fn download(&self, progress: ProgressFn) -> BoxFuture<'_, anyhow::Result<()>>;
    /// Install the downloaded update. The caller restarts if needed.
    fn install(&self) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// tauri-plugin-updater backend
// ---------------------------------------------------------------------------

pub struct TauriUpdater {
    app: AppHandle,
    pending: Mutex<Option<Update>>,
    downloaded: Mutex<Option<Vec<u8>>>,
}

impl TauriUpdater {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            pending: Mutex::new(None),
            downloaded: Mutex::new(None),
        }
    }
}

impl UpdateBackend for TauriUpdater {
    fn check(&self) -> BoxFuture<'_, anyhow::Result<Option<String>>> {
        Box::pin(async move {
            let update = self.app.updater()?.check().await?;
            let version = update.as_ref().map(|u| u.version.clone());
            *self.pending.lock() = update;
            Ok(version)
        })
    }

    fn download(&self, mut progress: ProgressFn) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let update = self
                .pending
                .lock()
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no update to download"))?;
            let mut downloaded: u64 = 0;
            let bytes = update
                .download(
                    |chunk, total| {
                        downloaded = downloaded.saturating_add(chunk as u64);
                        progress(downloaded, total);
                    },
                    || tracing::info!("Update download finished"),
                )
                .await?;
            *self.downloaded.lock() = Some(bytes);
            Ok(())
        })
    }

    fn install(&self) -> anyhow::Result<()> {
        let update = self
            .pending
            .lock()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no update to install"))?;
        let bytes = self
            .downloaded
            .lock()
            .take()
            .ok_or_else(|| anyhow::anyhow!("update has not been downloaded"))?;
        update.install(bytes)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// UpdateManager
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Timers {
    check: Option<JoinHandle<()>>,
    renotify: Option<JoinHandle<()>>,
    download: Option<JoinHandle<()>>,
}

fn abort(slot: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = slot.take() {
        handle.abort();
    }
}

pub struct UpdateManager {
    backend: Arc<dyn UpdateBackend>,
    events: Arc<dyn EventSink>,
    config: Arc<ConfigStore>,
    enabled: bool,
    check_interval: Duration,
    notify_interval: Duration,
    status: Mutex<UpdateStatus>,
    timers: Mutex<Timers>,
}

impl UpdateManager {
    pub fn new(
        backend: Arc<dyn UpdateBackend>,
        events: Arc<dyn EventSink>,
        config: Arc<ConfigStore>,
        enabled: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            events,
            config,
            enabled,
            check_interval: NEXT_CHECK,
            notify_interval: NEXT_NOTIFY,
            status: Mutex::new(UpdateStatus::Idle),
            timers: Mutex::new(Timers::default()),
        })
    }

    pub fn status(&self) -> UpdateStatus {
        self.status.lock().clone()
    }

    fn set_status(&self, status: UpdateStatus) {
        tracing::debug!(?status, "Update status");
        *self.status.lock() = status;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Kick off the first automatic check when enabled in config.
    pub fn start(self: &Arc<Self>) {
        if !self.enabled {
            tracing::info!("Update checks disabled for this build");
            return;
        }
        if !self.config.read().auto_check_for_updates {
            return;
        }
        let this = Arc::clone(self);
        async_runtime::spawn(async move {
            this.check_for_updates(false).await;
        });
    }

    fn arm_check(self: &Arc<Self>) {
        if !self.config.read().auto_check_for_updates {
            return;
        }
        let this = Arc::clone(self);
        let interval = self.check_interval;
        let handle = async_runtime::spawn(async move {
            tokio::time::sleep(interval).await;
            // Detach before checking so the check does not abort its own task
            this.timers.lock().check.take();
            this.check_for_updates(false).await;
        });
        let mut timers = self.timers.lock();
        abort(&mut timers.check);
        timers.check = Some(handle);
    }

    fn arm_renotify(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let interval = self.notify_interval;
        let handle = async_runtime::spawn(async move {
            tokio::time::sleep(interval).await;
            this.timers.lock().renotify.take();
            this.notify();
        });
        let mut timers = self.timers.lock();
        abort(&mut timers.renotify);
        timers.renotify = Some(handle);
    }

    fn has_pending_notification(&self) -> bool {
        self.timers
            .lock()
            .renotify
            .as_ref()
            .is_some_and(|h| !h.inner().is_finished())
    }

    /// Check for an update. Automatic checks are skipped while a notification
    /// is outstanding or a download is under way.
    pub async fn check_for_updates(self: &Arc<Self>, manually: bool) {
        if !self.enabled {
            tracing::debug!("Skipping update check, updates disabled");
            return;
        }
        {
            let mut timers = self.timers.lock();
            abort(&mut timers.check);
        }
        if matches!(
            self.status(),
            UpdateStatus::Downloading { .. } | UpdateStatus::ReadyToInstall { .. }
        ) {
            if manually {
                self.notify();
            }
            return;
        }
        if self.has_pending_notification() && !manually {
            return;
        }

        self.set_status(UpdateStatus::CheckPending);
        tracing::info!(manually, "Checking for updates");
        match self.backend.check().await {
            Ok(Some(version)) => {
                let skipped = self.config.read().skipped_versions.contains(&version);
                if skipped && !manually {
                    tracing::info!(version = %version, "Update available but skipped by the user");
                    self.set_status(UpdateStatus::NoUpdate);
                    self.arm_check();
                } else {
                    tracing::info!(version = %version, "Update available");
                    self.set_status(UpdateStatus::UpdateAvailable { version });
                    self.notify();
                }
            }
            Ok(None) => {
                tracing::info!("No update available");
                self.set_status(UpdateStatus::NoUpdate);
                self.events.emit(&AppEvent::NoUpdateAvailable);
                self.arm_check();
            }
            Err(e) => {
                tracing::error!("Update check failed: {e:#}");
                self.set_status(UpdateStatus::Idle);
                self.events.emit(&AppEvent::NoUpdateAvailable);
                self.arm_check();
            }
        }
    }

    /// Tell the UI about the pending update and re-arm the renotify timer.
    pub fn notify(self: &Arc<Self>) {
        let event = match self.status() {
            UpdateStatus::UpdateAvailable { version } => AppEvent::UpdateAvailable { version },
            UpdateStatus::ReadyToInstall { version } => AppEvent::UpdateDownloaded { version },
            _ => return,
        };
        self.events.emit(&event);
        self.events.emit(&AppEvent::UpdateMenu);
        self.arm_renotify();
    }

    pub fn remind_later(self: &Arc<Self>) {
        if self.status().version().is_some() {
            self.arm_renotify();
        }
    }

    /// Start downloading the available update in the background.
    pub fn download(self: &Arc<Self>) -> Result<(), String> {
        let UpdateStatus::UpdateAvailable { version } = self.status() else {
            return Err("no update available to download".to_string());
        };
        self.set_status(UpdateStatus::Downloading {
            version: version.clone(),
            downloaded: 0,
            total: None,
        });
        let this = Arc::clone(self);
        let handle = async_runtime::spawn(async move { this.run_download(version).await });
        let mut timers = self.timers.lock();
        abort(&mut timers.renotify);
        abort(&mut timers.download);
        timers.download = Some(handle);
        Ok(())
    }

    pub(crate) async fn run_download(self: Arc<Self>, version: String) {
        let progress_owner = Arc::clone(&self);
        let progress_version = version.clone();
        let progress: ProgressFn = Box::new(move |downloaded, total| {
            progress_owner.set_status(UpdateStatus::Downloading {
                version: progress_version.clone(),
                downloaded,
                total,
            });
            progress_owner.events.emit(&AppEvent::UpdateProgress {
                version: progress_version.clone(),
                downloaded,
                total,
            });
        });
        match self.backend.download(progress).await {
            Ok(()) => {
                tracing::info!(version = %version, "Update downloaded");
                self.set_status(UpdateStatus::ReadyToInstall { version });
            }
            Err(e) => {
                tracing::error!("Update download failed: {e:#}");
                self.set_status(UpdateStatus::UpdateAvailable { version });
            }
        }
        self.timers.lock().download = None;
        self.notify();
    }

    pub fn cancel_download(self: &Arc<Self>) {
        abort(&mut self.timers.lock().download);
        if let UpdateStatus::Downloading { version, .. } = self.status() {
            tracing::info!(version = %version, "Update download cancelled");
            self.set_status(UpdateStatus::UpdateAvailable { version });
            self.events.emit(&AppEvent::UpdateMenu);
            self.arm_renotify();
        }
    }

    /// Install a downloaded update. The caller restarts the app on success.
    pub fn install(&self) -> Result<(), String> {
        if !matches!(self.status(), UpdateStatus::ReadyToInstall { .. }) {
            return Err("no downloaded update to install".to_string());
        }
        self.backend.install().map_err(|e| format!("{e:#}"))
    }

    /// Never notify about the pending version again on automatic checks.
    pub fn skip_version(self: &Arc<Self>) -> Result<(), String> {
        let Some(version) = self.status().version().map(str::to_string) else {
            return Err("no update to skip".to_string());
        };
        {
            let mut timers = self.timers.lock();
            abort(&mut timers.renotify);
            abort(&mut timers.download);
        }
        self.config
            .update(|cfg| {
                if !cfg.skipped_versions.contains(&version) {
                    cfg.skipped_versions.push(version.clone());
                }
            })
            .map_err(|e| e.to_string())?;
        tracing::info!(version = %version, "Skipping update");
        self.set_status(UpdateStatus::Idle);
        self.events.emit(&AppEvent::UpdateMenu);
        self.arm_check();
        Ok(())
    }

    /// Install a downloaded update as the app exits.
    pub fn on_quit(&self) {
        if let UpdateStatus::ReadyToInstall { version } = self.status() {
            tracing::info!(version = %version, "Installing update on quit");
            if let Err(e) = self.backend.install() {
                tracing::error!("Failed to install update on quit: {e:#}");
            }
        }
        self.shutdown();
    }

    pub fn shutdown(&self) {
        let mut timers = self.timers.lock();
        abort(&mut timers.check);
        abort(&mut timers.renotify);
        abort(&mut timers.download);
    }
}

// ---------------------------------------------------------------------------
// Tauri commands
// ---------------------------------------------------------------------------

#[tauri::command]
pub(crate) fn get_update_status(state: State<'_, Arc<AppState>>) -> UpdateStatus {
    state.updater.status()
}

/// Manual check from the menu or settings; always reports the outcome.
#[tauri::command]
pub(crate) async fn check_for_updates(state: State<'_, Arc<AppState>>) -> Result<UpdateStatus, String> {
    let updater = Arc::clone(&state.updater);
    if !updater.is_enabled() {
        return Err("Updates are disabled for this build".to_string());
    }
    updater.check_for_updates(true).await;
    Ok(updater.status())
}

#[tauri::command]
pub(crate) fn download_update(state: State<'_, Arc<AppState>>) -> Result<(), String> {
    state.updater.download()
}

#[tauri::command]
pub(crate) fn cancel_download(state: State<'_, Arc<AppState>>) {
    state.updater.cancel_download();
}

#[tauri::command]
pub(crate) fn remind_later(state: State<'_, Arc<AppState>>) {
    state.updater.remind_later();
}

#[tauri::command]
pub(crate) fn skip_version(state: State<'_, Arc<AppState>>) -> Result<(), String> {
    state.updater.skip_version()
}

#[tauri::command]
pub(crate) fn install_update(app: AppHandle, state: State<'_, Arc<AppState>>) -> Result<(), String> {
    state.updater.install()?;
    state.updater.shutdown();
    tracing::info!("Update installed, restarting");
    app.restart()
}
