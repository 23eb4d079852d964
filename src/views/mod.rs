//! Native views: one child webview per open tab, stacked below the tab bar of
//! the main window. Only one is visible at a time.
//!
//! `ViewManager` owns the bookkeeping; the actual webviews are created through
//! a [`ViewHost`], so the switching logic can be exercised without a window.

mod bridge;
mod host;

pub use bridge::ViewOptions;
pub(crate) use bridge::receive_call;
pub use host::TauriViewHost;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tauri::State;
use url::Url;

use crate::error::ViewError;
use crate::servers::{MattermostServer, ServerModel};
use crate::state::AppState;
use crate::tabs::{TabType, TabView};

/// Height of the tab bar rendered by the main UI webview.
pub const TAB_BAR_HEIGHT: f64 = 40.0;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewId {
    pub server_id: String,
    pub tab: TabType,
}

impl ViewId {
    pub fn new(server_id: impl Into<String>, tab: TabType) -> Self {
        Self {
            server_id: server_id.into(),
            tab,
        }
    }

    /// Webview label, `view-{serverId}-{slug}`.
    pub fn label(&self) -> String {
        format!("view-{}-{}", self.server_id, self.tab.slug())
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let rest = label.strip_prefix("view-")?;
        let (server_id, slug) = rest.rsplit_once('-')?;
        if server_id.is_empty() {
            return None;
        }
        Some(Self::new(server_id, TabType::from_slug(slug)?))
    }
}

impl From<&TabView> for ViewId {
    fn from(view: &TabView) -> Self {
        ViewId::new(view.server_id(), view.tab_type())
    }
}

/// Logical-pixel rectangle inside the main window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// The area left for content in a window of the given inner size.
    pub fn below_tab_bar(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: TAB_BAR_HEIGHT,
            width: width.max(0.0),
            height: (height - TAB_BAR_HEIGHT).max(0.0),
        }
    }
}

/// Host runtime operations the manager needs. Attach/detach may be deferred
/// by the host; the manager only records what it asked for.
pub trait ViewHost: Send {
    /// Create a hidden view loading `url`.
    fn create(&mut self, id: &ViewId, url: &Url, bounds: Bounds, options: &ViewOptions) -> Result<(), ViewError>;
    fn destroy(&mut self, id: &ViewId) -> Result<(), ViewError>;
    fn show(&mut self, id: &ViewId, bounds: Bounds) -> Result<(), ViewError>;
    fn hide(&mut self, id: &ViewId) -> Result<(), ViewError>;
    fn set_bounds(&mut self, id: &ViewId, bounds: Bounds) -> Result<(), ViewError>;
    fn focus(&mut self, id: &ViewId) -> Result<(), ViewError>;
    fn reload(&mut self, id: &ViewId) -> Result<(), ViewError>;
    /// Move `step` entries through the view's session history.
    fn go_history(&mut self, id: &ViewId, step: i32) -> Result<(), ViewError>;
    /// Push changed options into a live view.
    fn apply_options(&mut self, id: &ViewId, options: &ViewOptions) -> Result<(), ViewError>;
}

/// Where a deep link landed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLinkTarget {
    pub view: ViewId,
    /// Path (plus query) relative to the server root, for `browser-history-push`.
    pub path: String,
}

pub struct ViewManager {
    host: Box<dyn ViewHost>,
    /// Created views and the URL each was loaded with.
    views: HashMap<ViewId, Url>,
    /// Tab last shown per server id.
    active_tabs: HashMap<String, TabType>,
    current_server: Option<String>,
    visible: Option<ViewId>,
    bounds: Bounds,
    /// A modal in the main UI needs the content area uncovered.
    modal_open: bool,
    options: ViewOptions,
}

impl ViewManager {
    pub fn new(host: Box<dyn ViewHost>) -> Self {
        Self {
            host,
            views: HashMap::new(),
            active_tabs: HashMap::new(),
            current_server: None,
            visible: None,
            bounds: Bounds::default(),
            modal_open: false,
            options: ViewOptions::default(),
        }
    }

    /// Options for views created from now on; live views are updated in place.
    pub fn set_options(&mut self, options: ViewOptions) {
        if self.options == options {
            return;
        }
        self.options = options;
        let mut ids: Vec<_> = self.views.keys().cloned().collect();
        ids.sort();
        for id in ids {
            if let Err(e) = self.host.apply_options(&id, &self.options) {
                tracing::warn!(view = %id.label(), "Failed to update view options: {e}");
            }
        }
    }

    /// Bring the set of native views in line with the open tabs of `model`.
    /// Returns the views that were destroyed.
    pub fn reconcile(&mut self, model: &ServerModel) -> Vec<ViewId> {
        let desired: HashMap<ViewId, Url> = model
            .ordered()
            .iter()
            .flat_map(MattermostServer::open_views)
            .map(|view| (ViewId::from(&view), view.url()))
            .collect();

        let mut stale: Vec<ViewId> = self
            .views
            .iter()
            .filter(|(id, url)| desired.get(*id) != Some(*url))
            .map(|(id, _)| id.clone())
            .collect();
        stale.sort();
        for id in &stale {
            tracing::debug!(view = %id.label(), "Destroying view");
            if let Err(e) = self.host.destroy(id) {
                tracing::warn!(view = %id.label(), "Failed to destroy view: {e}");
            }
            self.views.remove(id);
            if self.visible.as_ref() == Some(id) {
                self.visible = None;
            }
        }

        let mut created: Vec<_> = desired
            .into_iter()
            .filter(|(id, _)| !self.views.contains_key(id))
            .collect();
        created.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, url) in created {
            tracing::debug!(view = %id.label(), url = %url, "Creating view");
            match self.host.create(&id, &url, self.bounds, &self.options) {
                Ok(()) => {
                    self.views.insert(id, url);
                }
                Err(e) => tracing::error!(view = %id.label(), "Failed to create view: {e}"),
            }
        }

        self.active_tabs.retain(|server_id, _| model.get(server_id).is_some());
        for server in model.ordered() {
            let tab = self
                .active_tabs
                .entry(server.id.clone())
                .or_insert_with(|| server.active_tab());
            if !self.views.contains_key(&ViewId::new(&server.id, *tab)) {
                *tab = TabType::Messaging;
            }
        }

        if self
            .current_server
            .as_deref()
            .is_some_and(|id| model.get(id).is_none())
        {
            self.current_server = None;
        }
        let target = self
            .current_server
            .clone()
            .or_else(|| model.ordered().first().map(|s| s.id.clone()));
        match target {
            Some(server_id) => {
                let wanted = ViewId::new(&server_id, self.active_tab(&server_id));
                if self.visible.as_ref() != Some(&wanted)
                    && let Err(e) = self.show(&wanted)
                {
                    tracing::warn!("Could not restore active view: {e}");
                }
            }
            None => self.current_server = None,
        }
        stale
    }

    fn active_tab(&self, server_id: &str) -> TabType {
        self.active_tabs
            .get(server_id)
            .copied()
            .unwrap_or(TabType::Messaging)
    }

    /// Hide the previous view, show `id` at the current bounds and focus it.
    pub fn show(&mut self, id: &ViewId) -> Result<(), ViewError> {
        if !self.views.contains_key(id) {
            return Err(ViewError::UnknownView(id.label()));
        }
        if self.visible.as_ref() != Some(id) {
            if let Some(previous) = self.visible.take()
                && let Err(e) = self.host.hide(&previous)
            {
                tracing::warn!(view = %previous.label(), "Failed to hide view: {e}");
            }
            if !self.modal_open {
                self.host.show(id, self.bounds)?;
            }
            self.visible = Some(id.clone());
        }
        if !self.modal_open {
            self.host.focus(id)?;
        }
        self.current_server = Some(id.server_id.clone());
        self.active_tabs.insert(id.server_id.clone(), id.tab);
        Ok(())
    }

    /// Show the remembered tab of `server_id`, falling back to messaging.
    pub fn switch_server(&mut self, server_id: &str) -> Result<ViewId, ViewError> {
        let mut id = ViewId::new(server_id, self.active_tab(server_id));
        if !self.views.contains_key(&id) {
            id = ViewId::new(server_id, TabType::Messaging);
        }
        self.show(&id)?;
        Ok(id)
    }

    pub fn switch_tab(&mut self, server_id: &str, tab: TabType) -> Result<ViewId, ViewError> {
        let id = ViewId::new(server_id, tab);
        self.show(&id)?;
        Ok(id)
    }

    /// First view shown at startup: the server at `last_active_team`, or the
    /// first configured one.
    pub fn show_initial(&mut self, model: &ServerModel, last_active_team: usize) -> Option<ViewId> {
        self.reconcile(model);
        let server = model
            .ordered()
            .get(last_active_team)
            .or_else(|| model.ordered().first())?;
        match self.switch_server(&server.id) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(server = %server.id, "Could not show initial view: {e}");
                None
            }
        }
    }

    pub fn resize(&mut self, bounds: Bounds) {
        self.bounds = bounds;
        if let Some(id) = &self.visible
            && let Err(e) = self.host.set_bounds(id, bounds)
        {
            tracing::warn!(view = %id.label(), "Failed to resize view: {e}");
        }
    }

    pub fn current(&self) -> Option<&ViewId> {
        self.visible.as_ref()
    }

    pub fn current_server(&self) -> Option<&str> {
        self.current_server.as_deref()
    }

    pub fn views_for_server(&self, server_id: &str) -> Vec<ViewId> {
        let mut ids: Vec<_> = self
            .views
            .keys()
            .filter(|id| id.server_id == server_id)
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Route `url` to the server and tab that own it and show that view.
    /// `Ok(None)` when no configured server matches.
    pub fn handle_deep_link(
        &mut self,
        model: &ServerModel,
        url: &Url,
    ) -> Result<Option<DeepLinkTarget>, ViewError> {
        let Some(server) = model.lookup_by_url(url) else {
            return Ok(None);
        };
        let view = self.switch_tab(&server.id, owning_tab(server, url))?;
        Ok(Some(DeepLinkTarget {
            view,
            path: relative_path(server, url),
        }))
    }

    /// The webapp in `from` navigated to `path`. When another open tab owns
    /// that path, switch to it and return where the path must be pushed.
    pub fn route_history_push(
        &mut self,
        model: &ServerModel,
        from: &ViewId,
        path: &str,
    ) -> Result<Option<DeepLinkTarget>, ViewError> {
        let Some(server) = model.get(&from.server_id) else {
            return Ok(None);
        };
        let Some(url) = server.url_for_path(path) else {
            return Ok(None);
        };
        let tab = owning_tab(server, &url);
        if tab == from.tab {
            return Ok(None);
        }
        let view = self.switch_tab(&server.id, tab)?;
        Ok(Some(DeepLinkTarget {
            view,
            path: relative_path(server, &url),
        }))
    }

    pub fn reload_current(&mut self) -> Result<(), ViewError> {
        match &self.visible {
            Some(id) => self.host.reload(id),
            None => Ok(()),
        }
    }

    pub fn go_history(&mut self, step: i32) -> Result<(), ViewError> {
        match &self.visible {
            Some(id) => self.host.go_history(id, step),
            None => Ok(()),
        }
    }

    /// Hide the visible view while a modal is open and bring it back after.
    pub fn set_modal_open(&mut self, open: bool) -> Result<(), ViewError> {
        if self.modal_open == open {
            return Ok(());
        }
        self.modal_open = open;
        let Some(id) = self.visible.clone() else {
            return Ok(());
        };
        if open {
            self.host.hide(&id)
        } else {
            self.host.show(&id, self.bounds)?;
            self.host.focus(&id)
        }
    }
}

fn path_within(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

/// The open tab whose URL contains `url`, messaging otherwise.
fn owning_tab(server: &MattermostServer, url: &Url) -> TabType {
    server
        .open_views()
        .iter()
        .filter(|v| v.tab_type() != TabType::Messaging)
        .find(|v| path_within(url.path(), v.url().path()))
        .map(TabView::tab_type)
        .unwrap_or(TabType::Messaging)
}

/// Path (plus query) of `url` relative to the server root.
fn relative_path(server: &MattermostServer, url: &Url) -> String {
    let root = server.url.path().trim_end_matches('/');
    let relative = url.path().strip_prefix(root).unwrap_or(url.path());
    let mut path = if relative.starts_with('/') {
        relative.to_string()
    } else {
        format!("/{relative}")
    };
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    path
}

// ---------------------------------------------------------------------------
// Tauri commands
// ---------------------------------------------------------------------------

#[tauri::command]
pub(crate) fn get_active_view(state: State<'_, Arc<AppState>>) -> Option<ViewId> {
    state.views.lock().current().cloned()
}

/// The main UI calls this around settings and dialogs it draws over the
/// content area.
#[tauri::command]
pub(crate) fn set_modal_open(state: State<'_, Arc<AppState>>, open: bool) -> Result<(), String> {
    state.set_modal_open(open)
}

#[tauri::command]
pub(crate) fn reload_view(state: State<'_, Arc<AppState>>) -> Result<(), String> {
    state.reload_current()
}

#[tauri::command]
pub(crate) fn navigate_history(state: State<'_, Arc<AppState>>, step: i32) -> Result<(), String> {
    state.go_history(step)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum HostCall {
        Create(String, String),
        Destroy(String),
        Show(String),
        Hide(String),
        SetBounds(String, Bounds),
        Focus(String),
        Reload(String),
        History(String, i32),
        Options(String, bool),
    }

    /// Records every host call; shared so tests can inspect after handing the
    /// host to the manager.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingHost {
        pub(crate) calls: Arc<Mutex<Vec<HostCall>>>,
    }

    impl RecordingHost {
        pub(crate) fn take(&self) -> Vec<HostCall> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    impl ViewHost for RecordingHost {
        fn create(
            &mut self,
            id: &ViewId,
            url: &Url,
            _bounds: Bounds,
            _options: &ViewOptions,
        ) -> Result<(), ViewError> {
            self.calls.lock().push(HostCall::Create(id.label(), url.to_string()));
            Ok(())
        }
        fn destroy(&mut self, id: &ViewId) -> Result<(), ViewError> {
            self.calls.lock().push(HostCall::Destroy(id.label()));
            Ok(())
        }
        fn show(&mut self, id: &ViewId, _bounds: Bounds) -> Result<(), ViewError> {
            self.calls.lock().push(HostCall::Show(id.label()));
            Ok(())
        }
        fn hide(&mut self, id: &ViewId) -> Result<(), ViewError> {
            self.calls.lock().push(HostCall::Hide(id.label()));
            Ok(())
        }
        fn set_bounds(&mut self, id: &ViewId, bounds: Bounds) -> Result<(), ViewError> {
            self.calls.lock().push(HostCall::SetBounds(id.label(), bounds));
            Ok(())
        }
        fn focus(&mut self, id: &ViewId) -> Result<(), ViewError> {
            self.calls.lock().push(HostCall::Focus(id.label()));
            Ok(())
        }
        fn reload(&mut self, id: &ViewId) -> Result<(), ViewError> {
            self.calls.lock().push(HostCall::Reload(id.label()));
            Ok(())
        }
        fn go_history(&mut self, id: &ViewId, step: i32) -> Result<(), ViewError> {
            self.calls.lock().push(HostCall::History(id.label(), step));
            Ok(())
        }
        fn apply_options(&mut self, id: &ViewId, options: &ViewOptions) -> Result<(), ViewError> {
            self.calls.lock().push(HostCall::Options(id.label(), options.spellcheck));
            Ok(())
        }
    }

    fn model(urls: &[&str]) -> ServerModel {
        let mut model = ServerModel::default();
        for (i, url) in urls.iter().enumerate() {
            model.add(&format!("s{i}"), url).unwrap();
        }
        model
    }

    fn manager() -> (RecordingHost, ViewManager) {
        let host = RecordingHost::default();
        (host.clone(), ViewManager::new(Box::new(host)))
    }

    #[test]
    fn label_round_trips() {
        let id = ViewId::new("0f8fad5b-d9cb-469f-a165-70867728950e", TabType::Playbooks);
        assert_eq!(id.label(), "view-0f8fad5b-d9cb-469f-a165-70867728950e-playbooks");
        assert_eq!(ViewId::from_label(&id.label()), Some(id));
        assert_eq!(ViewId::from_label("main"), None);
        assert_eq!(ViewId::from_label("view-abc-calls"), None);
    }

    #[test]
    fn bounds_leave_room_for_tab_bar() {
        let b = Bounds::below_tab_bar(800.0, 600.0);
        assert_eq!(b.y, TAB_BAR_HEIGHT);
        assert_eq!(b.height, 600.0 - TAB_BAR_HEIGHT);
        assert_eq!(Bounds::below_tab_bar(10.0, 10.0).height, 0.0);
    }

    #[test]
    fn show_initial_creates_open_tabs_and_shows_active_server() {
        let (host, mut views) = manager();
        let model = model(&["https://a.example.com", "https://b.example.com"]);
        let b = model.ordered()[1].id.clone();

        let shown = views.show_initial(&model, 1).unwrap();
        assert_eq!(shown, ViewId::new(&b, TabType::Messaging));
        assert_eq!(views.current_server(), Some(b.as_str()));

        let calls = host.take();
        let creates = calls.iter().filter(|c| matches!(c, HostCall::Create(..))).count();
        assert_eq!(creates, 2);
        assert!(calls.contains(&HostCall::Show(shown.label())));
        assert!(calls.contains(&HostCall::Focus(shown.label())));
    }

    #[test]
    fn switching_hides_previous_and_remembers_tab() {
        let (host, mut views) = manager();
        let mut model = model(&["https://a.example.com", "https://b.example.com"]);
        let a = model.ordered()[0].id.clone();
        let b = model.ordered()[1].id.clone();
        model.set_tab_open(&a, TabType::Playbooks, true).unwrap();
        views.show_initial(&model, 0);

        let playbooks = views.switch_tab(&a, TabType::Playbooks).unwrap();
        views.switch_server(&b).unwrap();
        host.take();

        let back = views.switch_server(&a).unwrap();
        assert_eq!(back, playbooks);
        assert_eq!(
            host.take(),
            vec![
                HostCall::Hide(ViewId::new(&b, TabType::Messaging).label()),
                HostCall::Show(playbooks.label()),
                HostCall::Focus(playbooks.label()),
            ]
        );
    }

    #[test]
    fn switching_to_unknown_view_is_an_error() {
        let (_host, mut views) = manager();
        let model = model(&["https://a.example.com"]);
        let a = model.ordered()[0].id.clone();
        views.show_initial(&model, 0);
        let err = views.switch_tab(&a, TabType::Focalboard).unwrap_err();
        assert!(matches!(err, ViewError::UnknownView(_)));
        assert_eq!(views.current(), Some(&ViewId::new(&a, TabType::Messaging)));
    }

    #[test]
    fn removing_a_server_destroys_its_views() {
        let (host, mut views) = manager();
        let mut model = model(&["https://a.example.com", "https://b.example.com"]);
        let a = model.ordered()[0].id.clone();
        let b = model.ordered()[1].id.clone();
        model.set_tab_open(&a, TabType::Focalboard, true).unwrap();
        views.show_initial(&model, 0);
        assert_eq!(views.views_for_server(&a).len(), 2);
        host.take();

        model.remove(&a).unwrap();
        let removed = views.reconcile(&model);

        assert_eq!(
            removed,
            vec![ViewId::new(&a, TabType::Messaging), ViewId::new(&a, TabType::Focalboard)]
        );
        assert!(views.views_for_server(&a).is_empty());
        let calls = host.take();
        let destroyed = calls.iter().filter(|c| matches!(c, HostCall::Destroy(_))).count();
        assert_eq!(destroyed, 2);
        // The selection moved to the remaining server
        assert_eq!(views.current(), Some(&ViewId::new(&b, TabType::Messaging)));
    }

    #[test]
    fn closing_active_tab_falls_back_to_messaging() {
        let (_host, mut views) = manager();
        let mut model = model(&["https://a.example.com"]);
        let a = model.ordered()[0].id.clone();
        model.set_tab_open(&a, TabType::Playbooks, true).unwrap();
        views.show_initial(&model, 0);
        views.switch_tab(&a, TabType::Playbooks).unwrap();

        model.set_tab_open(&a, TabType::Playbooks, false).unwrap();
        views.reconcile(&model);
        assert_eq!(views.current(), Some(&ViewId::new(&a, TabType::Messaging)));
    }

    #[test]
    fn editing_server_url_recreates_views() {
        let (host, mut views) = manager();
        let mut model = model(&["https://a.example.com"]);
        let a = model.ordered()[0].id.clone();
        views.show_initial(&model, 0);
        host.take();

        model.edit(&a, "renamed", "https://new.example.com").unwrap();
        views.reconcile(&model);
        let calls = host.take();
        let label = ViewId::new(&a, TabType::Messaging).label();
        assert!(calls.contains(&HostCall::Destroy(label.clone())));
        assert!(calls.contains(&HostCall::Create(label, "https://new.example.com/".into())));
    }

    #[test]
    fn renaming_alone_keeps_views() {
        let (host, mut views) = manager();
        let mut model = model(&["https://a.example.com"]);
        let a = model.ordered()[0].id.clone();
        views.show_initial(&model, 0);
        host.take();

        model.edit(&a, "renamed", "https://a.example.com").unwrap();
        views.reconcile(&model);
        assert!(host.take().iter().all(|c| !matches!(c, HostCall::Destroy(_))));
    }

    #[test]
    fn resize_applies_to_visible_view() {
        let (host, mut views) = manager();
        let model = model(&["https://a.example.com"]);
        let shown = views.show_initial(&model, 0).unwrap();
        host.take();
        let bounds = Bounds::below_tab_bar(1024.0, 768.0);
        views.resize(bounds);
        assert_eq!(host.take(), vec![HostCall::SetBounds(shown.label(), bounds)]);
    }

    #[test]
    fn deep_link_picks_server_and_tab() {
        let (_host, mut views) = manager();
        let mut model = model(&["https://a.example.com", "https://example.com/team"]);
        let a = model.ordered()[0].id.clone();
        let team = model.ordered()[1].id.clone();
        model.set_tab_open(&team, TabType::Playbooks, true).unwrap();
        views.show_initial(&model, 0);

        let url = Url::parse("https://example.com/team/playbooks/runs/42?from=link").unwrap();
        let target = views.handle_deep_link(&model, &url).unwrap().unwrap();
        assert_eq!(target.view, ViewId::new(&team, TabType::Playbooks));
        assert_eq!(target.path, "/playbooks/runs/42?from=link");
        assert_eq!(views.current(), Some(&target.view));

        let url = Url::parse("https://a.example.com/core/pl/abc").unwrap();
        let target = views.handle_deep_link(&model, &url).unwrap().unwrap();
        assert_eq!(target.view, ViewId::new(&a, TabType::Messaging));
        assert_eq!(target.path, "/core/pl/abc");

        let unknown = Url::parse("https://elsewhere.example.com/").unwrap();
        assert_eq!(views.handle_deep_link(&model, &unknown).unwrap(), None);
    }

    #[test]
    fn reload_targets_visible_view() {
        let (host, mut views) = manager();
        views.reload_current().unwrap();
        assert!(host.take().is_empty());

        let model = model(&["https://a.example.com"]);
        let shown = views.show_initial(&model, 0).unwrap();
        host.take();
        views.reload_current().unwrap();
        assert_eq!(host.take(), vec![HostCall::Reload(shown.label())]);
    }

    #[test]
    fn history_targets_visible_view() {
        let (host, mut views) = manager();
        let model = model(&["https://a.example.com"]);
        let shown = views.show_initial(&model, 0).unwrap();
        host.take();
        views.go_history(-1).unwrap();
        assert_eq!(host.take(), vec![HostCall::History(shown.label(), -1)]);
    }

    #[test]
    fn modal_hides_view_until_closed() {
        let (host, mut views) = manager();
        let model = model(&["https://a.example.com", "https://b.example.com"]);
        let a = views.show_initial(&model, 0).unwrap();
        host.take();

        views.set_modal_open(true).unwrap();
        assert_eq!(host.take(), vec![HostCall::Hide(a.label())]);

        // Switching while the modal is up only records the new view
        let b = views.switch_server(&model.ordered()[1].id).unwrap();
        assert_eq!(host.take(), vec![HostCall::Hide(a.label())]);
        assert_eq!(views.current(), Some(&b));

        views.set_modal_open(false).unwrap();
        assert_eq!(
            host.take(),
            vec![HostCall::Show(b.label()), HostCall::Focus(b.label())]
        );
        // Closing twice is a no-op
        views.set_modal_open(false).unwrap();
        assert!(host.take().is_empty());
    }

    #[test]
    fn history_push_switches_to_owning_tab() {
        let (_host, mut views) = manager();
        let mut model = model(&["https://example.com/team"]);
        let a = model.ordered()[0].id.clone();
        model.set_tab_open(&a, TabType::Playbooks, true).unwrap();
        let messaging = views.show_initial(&model, 0).unwrap();

        let target = views
            .route_history_push(&model, &messaging, "/playbooks/runs/7?tab=overview")
            .unwrap()
            .unwrap();
        assert_eq!(target.view, ViewId::new(&a, TabType::Playbooks));
        assert_eq!(target.path, "/playbooks/runs/7?tab=overview");
        assert_eq!(views.current(), Some(&target.view));

        // Staying inside the sending tab needs no routing
        assert_eq!(
            views.route_history_push(&model, &target.view, "/playbooks/runs/8").unwrap(),
            None
        );
        // Closed tabs fall back to messaging
        assert_eq!(
            views
                .route_history_push(&model, &target.view, "/boards/b1")
                .unwrap()
                .map(|t| t.view),
            Some(messaging)
        );
    }

    #[test]
    fn option_changes_reach_live_views() {
        let (host, mut views) = manager();
        let model = model(&["https://a.example.com"]);
        let shown = views.show_initial(&model, 0).unwrap();
        host.take();

        views.set_options(ViewOptions::default());
        assert!(host.take().is_empty());

        views.set_options(ViewOptions {
            spellcheck: false,
            ..ViewOptions::default()
        });
        assert_eq!(host.take(), vec![HostCall::Options(shown.label(), false)]);
    }
}
