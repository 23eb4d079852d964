//! Shared application state.
//!
//! Lock order: config → servers → views → unreads. No lock is held across an
//! `.await`; the config store takes its own lock inside `update`.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use url::Url;

use crate::app_logger::LogHandle;
use crate::badge::{badge_text, linux_badge_count, UnreadState};
use crate::cli::{deeplinking_url, server_url, DEEP_LINK_SCHEME};
use crate::config::{Config, ConfigStore};
use crate::error::IpcError;
use crate::ipc::{mention_attention, AppEvent, EventSink, IncomingMessage, Notifier, PermissionAnswer, Sender};
use crate::permissions::{wait_for_answer, PermissionManager};
use crate::servers::ServerModel;
use crate::tabs::{TabType, TabView};
use crate::trusted_origins::{TrustedOriginsStore, NOTIFICATIONS_PERMISSION};
use crate::updater::{UpdateBackend, UpdateManager};
use crate::views::{ViewHost, ViewId, ViewManager, ViewOptions};

/// Runtime-specific collaborators, swapped for fakes in tests.
pub(crate) struct Services {
    pub view_host: Box<dyn ViewHost>,
    pub events: Arc<dyn EventSink>,
    pub notifier: Arc<dyn Notifier>,
    pub update_backend: Arc<dyn UpdateBackend>,
    pub updates_enabled: bool,
    pub log: Option<LogHandle>,
}

pub struct AppState {
    pub(crate) config: Arc<ConfigStore>,
    pub(crate) trusted_origins: RwLock<TrustedOriginsStore>,
    pub(crate) servers: RwLock<ServerModel>,
    pub(crate) views: Mutex<ViewManager>,
    pub(crate) unreads: Mutex<UnreadState>,
    pub(crate) permissions: PermissionManager,
    pub(crate) updater: Arc<UpdateManager>,
    pub(crate) events: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
    log: Option<LogHandle>,
}

impl AppState {
    pub(crate) fn new(
        config: Arc<ConfigStore>,
        trusted_origins: TrustedOriginsStore,
        services: Services,
    ) -> Arc<Self> {
        let startup = config.read();
        let servers = ServerModel::from_config(&startup.teams);
        let mut views = ViewManager::new(services.view_host);
        views.set_options(ViewOptions::from(&startup));
        let updater = UpdateManager::new(
            services.update_backend,
            Arc::clone(&services.events),
            Arc::clone(&config),
            services.updates_enabled,
        );
        Arc::new(Self {
            config,
            trusted_origins: RwLock::new(trusted_origins),
            servers: RwLock::new(servers),
            views: Mutex::new(views),
            unreads: Mutex::new(UnreadState::default()),
            permissions: PermissionManager::new(),
            updater,
            events: services.events,
            notifier: services.notifier,
            log: services.log,
        })
    }

    fn emit_config(&self, config: &Config) {
        match serde_json::to_value(config) {
            Ok(value) => self.events.emit(&AppEvent::UpdateConfig(value)),
            Err(e) => tracing::error!("Failed to serialize config: {e}"),
        }
    }

    fn announce_active_view(&self) {
        if let Some(view) = self.views.lock().current().cloned() {
            self.events.emit(&AppEvent::SetActiveView { view });
        }
    }

    /// Persist the server model, reconcile native views and tell the UI.
    pub(crate) fn commit_servers(&self) -> Result<(), String> {
        let (teams, active_index) = {
            let servers = self.servers.read();
            let views = self.views.lock();
            let index = views.current_server().and_then(|id| servers.index_of(id));
            (servers.to_config(), index)
        };
        let config = self
            .config
            .update(|cfg| {
                cfg.teams = teams;
                if let Some(index) = active_index {
                    cfg.last_active_team = index;
                }
            })
            .map_err(|e| format!("Failed to save servers: {e}"))?;
        let removed = {
            let servers = self.servers.read();
            self.views.lock().reconcile(&servers)
        };
        if !removed.is_empty() {
            let mut unreads = self.unreads.lock();
            for view in &removed {
                unreads.clear_view(view);
            }
        }
        self.emit_config(&config);
        self.events.emit(&AppEvent::UpdateMenu);
        self.announce_active_view();
        if !removed.is_empty() {
            self.refresh_badge();
        }
        Ok(())
    }

    /// Remove a server, its views, unread state and trusted-origin grants.
    pub(crate) fn remove_server(&self, server_id: &str) -> Result<(), String> {
        let removed = self.servers.write().remove(server_id).map_err(|e| e.to_string())?;
        self.unreads.lock().clear_server(server_id);
        if let Err(e) = self.trusted_origins.write().delete(&removed.url) {
            tracing::warn!(server = %server_id, "Failed to forget trusted origin: {e}");
        }
        self.commit_servers()?;
        self.refresh_badge();
        Ok(())
    }

    /// Remember `view` as the active tab of its server and the server as the
    /// last active one.
    fn record_active(&self, view: &ViewId) {
        let (teams, index) = {
            let mut servers = self.servers.write();
            if let Err(e) = servers.set_last_active(&view.server_id, view.tab) {
                tracing::warn!("{e}");
            }
            (servers.to_config(), servers.index_of(&view.server_id))
        };
        let result = self.config.update(|cfg| {
            cfg.teams = teams;
            if let Some(index) = index {
                cfg.last_active_team = index;
            }
        });
        if let Err(e) = result {
            tracing::warn!("Failed to persist active view: {e}");
        }
        self.events.emit(&AppEvent::SetActiveView { view: view.clone() });
    }

    pub(crate) fn switch_server(&self, server_id: &str) -> Result<(), String> {
        let view = self
            .views
            .lock()
            .switch_server(server_id)
            .map_err(|e| e.to_string())?;
        self.record_active(&view);
        Ok(())
    }

    pub(crate) fn switch_tab(&self, server_id: &str, tab: TabType) -> Result<(), String> {
        let view = self
            .views
            .lock()
            .switch_tab(server_id, tab)
            .map_err(|e| e.to_string())?;
        self.record_active(&view);
        Ok(())
    }

    /// Move `step` servers forward (or back) in display order, wrapping.
    pub(crate) fn cycle_server(&self, step: isize) -> Result<(), String> {
        let target = {
            let servers = self.servers.read();
            let views = self.views.lock();
            let len = servers.len() as isize;
            if len == 0 {
                return Ok(());
            }
            let current = views
                .current_server()
                .and_then(|id| servers.index_of(id))
                .unwrap_or(0) as isize;
            let next = (current + step).rem_euclid(len) as usize;
            servers.ordered()[next].id.clone()
        };
        self.switch_server(&target)
    }

    pub(crate) fn switch_server_at(&self, index: usize) -> Result<(), String> {
        let id = self.servers.read().ordered().get(index).map(|s| s.id.clone());
        match id {
            Some(id) => self.switch_server(&id),
            None => Ok(()),
        }
    }

    /// Create views and show the server that was active when the app last quit.
    pub(crate) fn show_initial(&self) {
        let last_active = self.config.read().last_active_team;
        {
            let servers = self.servers.read();
            self.views.lock().show_initial(&servers, last_active);
        }
        self.announce_active_view();
    }

    /// Route a deep link. `Ok(false)` when no configured server owns it.
    pub(crate) fn handle_deep_link(&self, url: &Url) -> Result<bool, String> {
        let target = {
            let servers = self.servers.read();
            self.views
                .lock()
                .handle_deep_link(&servers, url)
                .map_err(|e| e.to_string())?
        };
        let Some(target) = target else {
            tracing::warn!(url = %url, "No configured server for deep link");
            return Ok(false);
        };
        self.record_active(&target.view);
        self.events.dispatch(AppEvent::BrowserHistoryPush {
            view: target.view,
            path: target.path,
        });
        Ok(true)
    }

    /// Handle URLs from the command line or a second instance. A trailing
    /// deep link is routed on its own; otherwise unknown http(s) servers are
    /// added and routed.
    pub(crate) fn handle_launch_urls(&self, urls: &[String]) {
        if let Some(link) = deeplinking_url(urls, DEEP_LINK_SCHEME) {
            match server_url(link.as_str(), DEEP_LINK_SCHEME) {
                Some(url) => {
                    if let Err(e) = self.handle_deep_link(&url) {
                        tracing::warn!("{e}");
                    }
                }
                None => tracing::warn!(url = %link, "Deep link does not name a server"),
            }
            return;
        }
        for raw in urls {
            let Some(url) = server_url(raw, DEEP_LINK_SCHEME) else {
                tracing::debug!(arg = %raw, "Ignoring launch argument");
                continue;
            };
            if self.servers.read().lookup_by_url(&url).is_none() {
                let name = url.host_str().unwrap_or("Mattermost").to_string();
                let added = self.servers.write().add(&name, url.as_str()).map(|s| s.id.clone());
                match added {
                    Ok(id) => {
                        tracing::info!(server = %id, "Added server from command line");
                        if let Err(e) = self.commit_servers() {
                            tracing::error!("{e}");
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Could not add server from command line: {e}");
                        continue;
                    }
                }
            }
            if let Err(e) = self.handle_deep_link(&url) {
                tracing::warn!("{e}");
            }
        }
    }

    pub(crate) fn reload_current(&self) -> Result<(), String> {
        self.views.lock().reload_current().map_err(|e| e.to_string())
    }

    pub(crate) fn go_history(&self, step: i32) -> Result<(), String> {
        self.views.lock().go_history(step).map_err(|e| e.to_string())
    }

    pub(crate) fn set_modal_open(&self, open: bool) -> Result<(), String> {
        self.views.lock().set_modal_open(open).map_err(|e| e.to_string())
    }

    /// Recompute the badge and broadcast it.
    pub(crate) fn refresh_badge(&self) {
        let show_unread_badge = self.config.read().show_unread_badge;
        let totals = self.unreads.lock().totals();
        self.events.emit(&AppEvent::UpdateBadge {
            text: badge_text(totals, show_unread_badge),
            count: linux_badge_count(totals),
            totals,
        });
    }

    /// Save settings from the UI. Servers are managed by their own commands,
    /// so the stored server list is kept.
    pub(crate) fn save_settings(&self, incoming: Config) -> Result<Config, String> {
        let previous = self.config.read();
        let saved = self
            .config
            .update(|cfg| {
                let teams = std::mem::take(&mut cfg.teams);
                let last_active_team = cfg.last_active_team;
                let skipped = std::mem::take(&mut cfg.skipped_versions);
                *cfg = incoming;
                cfg.teams = teams;
                cfg.last_active_team = last_active_team;
                cfg.skipped_versions = skipped;
            })
            .map_err(|e| format!("Failed to save settings: {e}"))?;

        if saved.log_level != previous.log_level
            && let Some(log) = &self.log
        {
            log.set_level(&saved.log_level)?;
        }
        if saved.show_unread_badge != previous.show_unread_badge {
            self.refresh_badge();
        }
        if saved.auto_check_for_updates && !previous.auto_check_for_updates {
            self.updater.start();
        }
        if saved.use_spell_checker != previous.use_spell_checker {
            self.views.lock().set_options(ViewOptions::from(&saved));
        }
        self.emit_config(&saved);
        Ok(saved)
    }

    /// Ask whether `url` may use `permission`, prompting the user when the
    /// trusted-origins store has no answer.
    pub(crate) async fn request_permission(&self, url: Url, permission: String) -> bool {
        let known = self.trusted_origins.read().check_permission(&url, &permission);
        if let Some(granted) = known {
            return granted;
        }
        let (request_id, rx) = self.permissions.begin(url.clone(), &permission);
        self.events.emit(&AppEvent::RequestPermission {
            request_id,
            url: url.to_string(),
            permission,
        });
        wait_for_answer(rx).await
    }

    fn resolve_permission(&self, answer: PermissionAnswer) -> Result<(), String> {
        let resolved = self
            .permissions
            .resolve(&answer.request_id, answer.granted)
            .ok_or_else(|| format!("No pending permission request {}", answer.request_id))?;
        if answer.remember {
            self.trusted_origins
                .write()
                .record(&resolved.url, &resolved.permission, resolved.granted)
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// Act on a validated message from a webview.
    pub(crate) fn handle_incoming(&self, sender: &Sender, message: IncomingMessage) -> Result<(), String> {
        let view_sender = || match sender {
            Sender::View(view) => Ok(view.clone()),
            _ => Err(IpcError::WrongSender(format!("{message:?}")).to_string()),
        };
        match &message {
            IncomingMessage::UnreadsAndMentions(payload) => {
                let view = view_sender()?;
                let (mentions, totals) = {
                    let mut unreads = self.unreads.lock();
                    unreads.set_mentions(view.clone(), payload.mentions);
                    unreads.set_unreads(view.clone(), payload.is_unread);
                    (unreads.mentions_for_server(&view.server_id), unreads.totals())
                };
                self.events.emit(&AppEvent::UpdateMentions {
                    server_id: view.server_id,
                    mentions,
                    totals,
                });
                self.refresh_badge();
            }
            IncomingMessage::SessionExpired { expired } => {
                let view = view_sender()?;
                self.unreads.lock().set_session_expired(&view.server_id, *expired);
                self.refresh_badge();
            }
            IncomingMessage::NotifyMention(mention) => {
                let view = view_sender()?;
                let server_url = self
                    .servers
                    .read()
                    .get(&view.server_id)
                    .filter(|server| TabView::new(server, view.tab).should_notify())
                    .map(|server| server.url.clone());
                let Some(server_url) = server_url else {
                    tracing::debug!(view = %view.label(), "Ignoring mention from non-notifying view");
                    return Ok(());
                };
                let denied = self
                    .trusted_origins
                    .read()
                    .check_permission(&server_url, NOTIFICATIONS_PERMISSION)
                    == Some(false);
                if denied {
                    tracing::debug!(view = %view.label(), "Notifications denied for server");
                    return Ok(());
                }
                self.notifier.show(&mention.title, &mention.body)?;
                if let Some(attention) = mention_attention(&self.config.read().notifications)
                    && let Err(e) = self.notifier.request_attention(attention)
                {
                    tracing::debug!("Could not request attention: {e}");
                }
                self.events.emit(&AppEvent::Notified { view });
            }
            IncomingMessage::BrowserHistoryPush { path } => {
                let view = view_sender()?;
                let target = {
                    let servers = self.servers.read();
                    self.views
                        .lock()
                        .route_history_push(&servers, &view, path)
                        .map_err(|e| e.to_string())?
                };
                if let Some(target) = target {
                    self.record_active(&target.view);
                    self.events.dispatch(AppEvent::BrowserHistoryPush {
                        view: target.view,
                        path: target.path,
                    });
                }
            }
            IncomingMessage::CancelUpgrade => self.updater.cancel_download(),
            IncomingMessage::UpdatePermission(answer) => self.resolve_permission(answer.clone())?,
            IncomingMessage::SwitchServer { server_id } => self.switch_server(server_id)?,
            IncomingMessage::SwitchTab(selection) => self.switch_tab(&selection.server_id, selection.tab)?,
        }
        Ok(())
    }
}
