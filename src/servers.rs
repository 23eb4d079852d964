//! Configured servers and the tabs each one owns.
//!
//! `ServerModel` is the in-memory, ordered view of the `teams` list in
//! `config.json`. Mutations here are pure; `AppState::commit_servers` writes the
//! result back to the config store and reconciles the native views.

use serde::Serialize;
use std::sync::Arc;
use tauri::State;
use url::Url;

use crate::config::{TabConfig, TeamConfig};
use crate::error::ServerError;
use crate::state::AppState;
use crate::tabs::{default_tabs, get_server_view, TabType, TabView};

/// Replace Windows-style separators that users paste into the server URL field.
pub(crate) fn clean_url(raw: &str) -> String {
    raw.trim().replace('\\', "/")
}

/// Parse a server URL: absolute, http(s), with a host.
pub fn parse_server_url(raw: &str) -> Result<Url, ServerError> {
    let cleaned = clean_url(raw);
    let url = Url::parse(&cleaned).map_err(|e| ServerError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ServerError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ServerError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Path with a guaranteed trailing slash, so `/team` does not match `/teammates`.
fn formatted_path(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MattermostServer {
    pub id: String,
    pub name: String,
    pub url: Url,
    pub order: u32,
    pub tabs: Vec<TabConfig>,
    pub last_active_tab: usize,
}

impl MattermostServer {
    pub fn from_config(team: &TeamConfig) -> Result<Self, ServerError> {
        Ok(Self {
            id: team.id.clone(),
            name: team.name.clone(),
            url: parse_server_url(&team.url)?,
            order: team.order,
            tabs: team.tabs.clone(),
            last_active_tab: team.last_active_tab,
        })
    }

    pub fn to_config(&self) -> TeamConfig {
        TeamConfig {
            id: self.id.clone(),
            name: self.name.clone(),
            url: self.url.to_string(),
            order: self.order,
            tabs: self.tabs.clone(),
            last_active_tab: self.last_active_tab,
        }
    }

    /// Tabs sorted by their `order`, paired with their index in `self.tabs`.
    fn sorted_tabs(&self) -> Vec<(usize, &TabConfig)> {
        let mut tabs: Vec<_> = self.tabs.iter().enumerate().collect();
        tabs.sort_by_key(|(_, t)| t.order);
        tabs
    }

    /// Views for every open tab, in display order. Unknown tab names are
    /// logged and skipped.
    pub fn open_views(&self) -> Vec<TabView> {
        self.sorted_tabs()
            .into_iter()
            .filter(|(_, t)| t.is_open)
            .filter_map(|(_, t)| match get_server_view(self, t) {
                Ok(view) => Some(view),
                Err(e) => {
                    tracing::error!(server = %self.id, "Skipping tab: {e}");
                    None
                }
            })
            .collect()
    }

    pub fn is_tab_open(&self, kind: TabType) -> bool {
        self.tabs
            .iter()
            .any(|t| t.is_open && t.name == kind.as_str())
    }

    /// Absolute URL for a webapp route, `path` being relative to the server
    /// root. `None` when the result would leave the server's origin.
    pub fn url_for_path(&self, path: &str) -> Option<Url> {
        let base = self.url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let url = Url::parse(&format!("{base}/{path}")).ok()?;
        (url.origin() == self.url.origin()).then_some(url)
    }

    /// The tab to show when switching to this server; messaging when the
    /// remembered one is closed or unknown.
    pub fn active_tab(&self) -> TabType {
        self.tabs
            .get(self.last_active_tab)
            .filter(|t| t.is_open)
            .and_then(|t| t.name.parse().ok())
            .unwrap_or(TabType::Messaging)
    }
}

/// Ordered set of configured servers.
#[derive(Clone, Debug, Default)]
pub struct ServerModel {
    servers: Vec<MattermostServer>,
}

impl ServerModel {
    pub fn from_config(teams: &[TeamConfig]) -> Self {
        let mut servers: Vec<_> = teams
            .iter()
            .filter_map(|team| match MattermostServer::from_config(team) {
                Ok(server) => Some(server),
                Err(e) => {
                    tracing::warn!(name = %team.name, "Ignoring server: {e}");
                    None
                }
            })
            .collect();
        servers.sort_by_key(|s| s.order);
        let mut model = Self { servers };
        model.compact_order();
        model
    }

    pub fn to_config(&self) -> Vec<TeamConfig> {
        self.servers.iter().map(MattermostServer::to_config).collect()
    }

    fn compact_order(&mut self) {
        for (index, server) in self.servers.iter_mut().enumerate() {
            server.order = index as u32;
        }
    }

    pub fn ordered(&self) -> &[MattermostServer] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MattermostServer> {
        self.servers.iter().find(|s| s.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.servers.iter().position(|s| s.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut MattermostServer, ServerError> {
        self.servers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ServerError::NotFound(id.to_string()))
    }

    pub fn add(&mut self, name: &str, url: &str) -> Result<&MattermostServer, ServerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServerError::EmptyName);
        }
        let url = parse_server_url(url)?;
        let mut id = uuid::Uuid::new_v4().to_string();
        while self.get(&id).is_some() {
            id = uuid::Uuid::new_v4().to_string();
        }
        tracing::debug!(server = %id, "addServer");
        self.servers.push(MattermostServer {
            id,
            name: name.to_string(),
            url,
            order: self.servers.len() as u32,
            tabs: default_tabs(),
            last_active_tab: 0,
        });
        Ok(&self.servers[self.servers.len() - 1])
    }

    pub fn edit(&mut self, id: &str, name: &str, url: &str) -> Result<&MattermostServer, ServerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServerError::EmptyName);
        }
        let url = parse_server_url(url)?;
        let server = self.get_mut(id)?;
        server.name = name.to_string();
        server.url = url;
        Ok(server)
    }

    /// Remove a server together with its tabs.
    pub fn remove(&mut self, id: &str) -> Result<MattermostServer, ServerError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| ServerError::NotFound(id.to_string()))?;
        let removed = self.servers.remove(index);
        self.compact_order();
        Ok(removed)
    }

    /// Reorder servers to match `ids`, which must name every server exactly once.
    pub fn reorder(&mut self, ids: &[String]) -> Result<(), ServerError> {
        if ids.len() != self.servers.len() {
            return Err(ServerError::BadOrder);
        }
        let mut reordered = Vec::with_capacity(ids.len());
        for id in ids {
            let index = self.index_of(id).ok_or(ServerError::BadOrder)?;
            if reordered.iter().any(|s: &MattermostServer| &s.id == id) {
                return Err(ServerError::BadOrder);
            }
            reordered.push(self.servers[index].clone());
        }
        self.servers = reordered;
        self.compact_order();
        Ok(())
    }

    /// Reassign tab `order` values to follow `order`, which must list every
    /// known tab of the server exactly once. Tabs with unknown names keep
    /// their relative order after the known ones.
    pub fn reorder_tabs(&mut self, id: &str, order: &[TabType]) -> Result<(), ServerError> {
        let server = self.get_mut(id)?;
        let known: Vec<TabType> = server.tabs.iter().filter_map(|t| t.name.parse().ok()).collect();
        if order.len() != known.len() || known.iter().any(|k| !order.contains(k)) {
            return Err(ServerError::BadOrder);
        }

        let mut unknown: Vec<usize> = (0..server.tabs.len())
            .filter(|&i| server.tabs[i].name.parse::<TabType>().is_err())
            .collect();
        unknown.sort_by_key(|&i| server.tabs[i].order);
        for (rank, index) in unknown.into_iter().enumerate() {
            server.tabs[index].order = (order.len() + rank) as u32;
        }
        for tab in server.tabs.iter_mut() {
            if let Some(pos) = order.iter().position(|k| k.as_str() == tab.name) {
                tab.order = pos as u32;
            }
        }
        Ok(())
    }

    pub fn set_tab_open(&mut self, id: &str, kind: TabType, open: bool) -> Result<(), ServerError> {
        if !open && !kind.can_close() {
            return Err(ServerError::TabNotClosable(kind.display_name()));
        }
        let server = self.get_mut(id)?;
        match server.tabs.iter_mut().find(|t| t.name == kind.as_str()) {
            Some(tab) => tab.is_open = open,
            None if open => {
                let order = server.tabs.iter().map(|t| t.order + 1).max().unwrap_or(0);
                server.tabs.push(TabConfig {
                    name: kind.as_str().to_string(),
                    order,
                    is_open: true,
                });
            }
            None => {}
        }
        let closed_active = server
            .tabs
            .get(server.last_active_tab)
            .is_some_and(|t| t.name == kind.as_str());
        if !open && closed_active {
            server.last_active_tab = server
                .tabs
                .iter()
                .position(|t| t.name == TabType::Messaging.as_str())
                .unwrap_or(0);
        }
        Ok(())
    }

    pub fn set_last_active(&mut self, id: &str, kind: TabType) -> Result<(), ServerError> {
        let server = self.get_mut(id)?;
        if let Some(index) = server.tabs.iter().position(|t| t.name == kind.as_str()) {
            server.last_active_tab = index;
        }
        Ok(())
    }

    /// Find the server that owns `url`: same origin, and the URL path sits
    /// under the server's path.
    pub fn lookup_by_url(&self, url: &Url) -> Option<&MattermostServer> {
        let path = formatted_path(url.path());
        self.servers
            .iter()
            .filter(|s| s.url.origin() == url.origin())
            .filter(|s| path.starts_with(&formatted_path(s.url.path())))
            // Prefer the most specific match when servers share an origin
            .max_by_key(|s| s.url.path().len())
    }
}

// ---------------------------------------------------------------------------
// Tauri commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TabSummary {
    pub tab_type: TabType,
    pub display_name: &'static str,
    pub url: String,
    pub order: u32,
    pub is_open: bool,
    pub can_close: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerSummary {
    pub id: String,
    pub name: String,
    pub url: String,
    pub order: u32,
    pub active_tab: TabType,
    pub tabs: Vec<TabSummary>,
}

impl From<&MattermostServer> for ServerSummary {
    fn from(server: &MattermostServer) -> Self {
        let tabs = server
            .sorted_tabs()
            .into_iter()
            .filter_map(|(_, t)| {
                let kind: TabType = t.name.parse().ok()?;
                Some(TabSummary {
                    tab_type: kind,
                    display_name: kind.display_name(),
                    url: TabView::new(server, kind).url().to_string(),
                    order: t.order,
                    is_open: t.is_open,
                    can_close: kind.can_close(),
                })
            })
            .collect();
        Self {
            id: server.id.clone(),
            name: server.name.clone(),
            url: server.url.to_string(),
            order: server.order,
            active_tab: server.active_tab(),
            tabs,
        }
    }
}

#[tauri::command]
pub(crate) fn get_servers(state: State<'_, Arc<AppState>>) -> Vec<ServerSummary> {
    state.servers.read().ordered().iter().map(ServerSummary::from).collect()
}

#[tauri::command]
pub(crate) fn add_server(
    state: State<'_, Arc<AppState>>,
    name: String,
    url: String,
) -> Result<ServerSummary, String> {
    let summary = {
        let mut servers = state.servers.write();
        let server = servers.add(&name, &url).map_err(|e| e.to_string())?;
        ServerSummary::from(server)
    };
    state.commit_servers()?;
    state.switch_server(&summary.id)?;
    Ok(summary)
}

#[tauri::command]
pub(crate) fn edit_server(
    state: State<'_, Arc<AppState>>,
    id: String,
    name: String,
    url: String,
) -> Result<ServerSummary, String> {
    let summary = {
        let mut servers = state.servers.write();
        let server = servers.edit(&id, &name, &url).map_err(|e| e.to_string())?;
        ServerSummary::from(server)
    };
    state.commit_servers()?;
    Ok(summary)
}

#[tauri::command]
pub(crate) fn remove_server(state: State<'_, Arc<AppState>>, id: String) -> Result<(), String> {
    state.remove_server(&id)
}

#[tauri::command]
pub(crate) fn reorder_servers(state: State<'_, Arc<AppState>>, ids: Vec<String>) -> Result<(), String> {
    state.servers.write().reorder(&ids).map_err(|e| e.to_string())?;
    state.commit_servers()
}

#[tauri::command]
pub(crate) fn reorder_tabs(
    state: State<'_, Arc<AppState>>,
    server_id: String,
    tabs: Vec<TabType>,
) -> Result<(), String> {
    state
        .servers
        .write()
        .reorder_tabs(&server_id, &tabs)
        .map_err(|e| e.to_string())?;
    state.commit_servers()
}

#[tauri::command]
pub(crate) fn open_tab(
    state: State<'_, Arc<AppState>>,
    server_id: String,
    tab: TabType,
) -> Result<(), String> {
    state
        .servers
        .write()
        .set_tab_open(&server_id, tab, true)
        .map_err(|e| e.to_string())?;
    state.commit_servers()?;
    state.switch_tab(&server_id, tab)
}

#[tauri::command]
pub(crate) fn close_tab(
    state: State<'_, Arc<AppState>>,
    server_id: String,
    tab: TabType,
) -> Result<(), String> {
    state
        .servers
        .write()
        .set_tab_open(&server_id, tab, false)
        .map_err(|e| e.to_string())?;
    state.commit_servers()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with(urls: &[&str]) -> ServerModel {
        let mut model = ServerModel::default();
        for (i, url) in urls.iter().enumerate() {
            model.add(&format!("server {i}"), url).unwrap();
        }
        model
    }

    #[test]
    fn parse_server_url_requires_http_and_host() {
        assert!(parse_server_url("https://chat.example.com").is_ok());
        assert!(parse_server_url("http://localhost:8065").is_ok());
        assert!(parse_server_url("chat.example.com").is_err());
        assert!(parse_server_url("ftp://chat.example.com").is_err());
        assert!(parse_server_url("file:///etc/passwd").is_err());
        assert_eq!(
            parse_server_url("https:\\\\chat.example.com").unwrap().as_str(),
            "https://chat.example.com/"
        );
    }

    #[test]
    fn add_assigns_unique_ids_and_default_tabs() {
        let model = model_with(&["https://a.example.com", "https://b.example.com"]);
        let servers = model.ordered();
        assert_ne!(servers[0].id, servers[1].id);
        assert_eq!(servers[1].order, 1);
        assert_eq!(servers[0].tabs, default_tabs());
    }

    #[test]
    fn add_rejects_bad_input() {
        let mut model = ServerModel::default();
        assert_eq!(model.add("  ", "https://a.example.com").unwrap_err(), ServerError::EmptyName);
        assert!(matches!(
            model.add("a", "not-a-url").unwrap_err(),
            ServerError::InvalidUrl { .. }
        ));
        assert!(model.is_empty());
    }

    #[test]
    fn remove_compacts_order() {
        let mut model = model_with(&[
            "https://a.example.com",
            "https://b.example.com",
            "https://c.example.com",
        ]);
        let id = model.ordered()[0].id.clone();
        let removed = model.remove(&id).unwrap();
        assert_eq!(removed.url.host_str(), Some("a.example.com"));
        let orders: Vec<_> = model.ordered().iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1]);
        assert!(model.get(&id).is_none());
        assert_eq!(model.remove(&id).unwrap_err(), ServerError::NotFound(id));
    }

    #[test]
    fn reorder_requires_full_permutation() {
        let mut model = model_with(&["https://a.example.com", "https://b.example.com"]);
        let a = model.ordered()[0].id.clone();
        let b = model.ordered()[1].id.clone();

        assert_eq!(model.reorder(&[a.clone()]).unwrap_err(), ServerError::BadOrder);
        assert_eq!(model.reorder(&[a.clone(), a.clone()]).unwrap_err(), ServerError::BadOrder);

        model.reorder(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(model.ordered()[0].id, b);
        assert_eq!(model.ordered()[0].order, 0);
        assert_eq!(model.ordered()[1].id, a);
    }

    #[test]
    fn messaging_tab_cannot_be_closed() {
        let mut model = model_with(&["https://a.example.com"]);
        let id = model.ordered()[0].id.clone();
        let err = model.set_tab_open(&id, TabType::Messaging, false).unwrap_err();
        assert_eq!(err, ServerError::TabNotClosable("Channels"));
    }

    #[test]
    fn opening_and_closing_tabs_changes_views() {
        let mut model = model_with(&["https://a.example.com"]);
        let id = model.ordered()[0].id.clone();
        assert_eq!(model.get(&id).unwrap().open_views().len(), 1);

        model.set_tab_open(&id, TabType::Playbooks, true).unwrap();
        model.set_tab_open(&id, TabType::People, true).unwrap();
        let kinds: Vec<_> = model
            .get(&id)
            .unwrap()
            .open_views()
            .iter()
            .map(TabView::tab_type)
            .collect();
        assert_eq!(kinds, vec![TabType::Messaging, TabType::Playbooks, TabType::People]);

        model.set_last_active(&id, TabType::Playbooks).unwrap();
        assert_eq!(model.get(&id).unwrap().active_tab(), TabType::Playbooks);
        model.set_tab_open(&id, TabType::Playbooks, false).unwrap();
        assert_eq!(model.get(&id).unwrap().active_tab(), TabType::Messaging);
    }

    #[test]
    fn reorder_tabs_reassigns_order() {
        let mut model = model_with(&["https://a.example.com"]);
        let id = model.ordered()[0].id.clone();
        model
            .reorder_tabs(&id, &[TabType::Playbooks, TabType::Messaging, TabType::Focalboard])
            .unwrap();
        let server = model.get(&id).unwrap();
        let playbooks = server.tabs.iter().find(|t| t.name == "TAB_PLAYBOOKS").unwrap();
        assert_eq!(playbooks.order, 0);
        assert_eq!(
            model.reorder_tabs(&id, &[TabType::Messaging]).unwrap_err(),
            ServerError::BadOrder
        );
    }

    #[test]
    fn unknown_tabs_are_kept_through_reorder() {
        let mut tabs = default_tabs();
        tabs.insert(1, TabConfig { name: "TAB_CALLS".into(), order: 1, is_open: true });
        tabs[2].order = 2;
        tabs[3].order = 3;
        let teams = vec![TeamConfig {
            id: "a".into(),
            name: "A".into(),
            url: "https://a.example.com".into(),
            order: 0,
            tabs,
            last_active_tab: 0,
        }];
        let mut model = ServerModel::from_config(&teams);

        let server = model.get("a").unwrap();
        assert_eq!(server.open_views().len(), 1);
        assert_eq!(ServerSummary::from(server).tabs.len(), 3);

        model
            .reorder_tabs("a", &[TabType::Playbooks, TabType::Focalboard, TabType::Messaging])
            .unwrap();
        let tabs = &model.get("a").unwrap().tabs;
        let order_of = |name: &str| tabs.iter().find(|t| t.name == name).unwrap().order;
        assert_eq!(order_of("TAB_PLAYBOOKS"), 0);
        assert_eq!(order_of("TAB_FOCALBOARD"), 1);
        assert_eq!(order_of("TAB_MESSAGING"), 2);
        assert_eq!(order_of("TAB_CALLS"), 3);

        // The unknown tab survives the round trip to config
        assert!(model.to_config()[0].tabs.iter().any(|t| t.name == "TAB_CALLS"));
        assert_eq!(
            model
                .reorder_tabs("a", &[TabType::Playbooks, TabType::Focalboard, TabType::Playbooks])
                .unwrap_err(),
            ServerError::BadOrder
        );
    }

    #[test]
    fn url_for_path_stays_on_the_server() {
        let model = model_with(&["https://example.com/team"]);
        let server = &model.ordered()[0];
        assert_eq!(
            server.url_for_path("/boards/b1?x=1").unwrap().as_str(),
            "https://example.com/team/boards/b1?x=1"
        );
        assert_eq!(server.url_for_path("").unwrap().as_str(), "https://example.com/team/");
        assert!(server.url_for_path("//evil.example.com/").is_some_and(|u| u.host_str() == Some("example.com")));
    }

    #[test]
    fn lookup_by_url_matches_origin_and_path() {
        let model = model_with(&[
            "https://chat.example.com",
            "https://example.com/team",
            "https://example.com/team/sub",
        ]);
        let find = |u: &str| {
            model
                .lookup_by_url(&Url::parse(u).unwrap())
                .map(|s| s.url.to_string())
        };
        assert_eq!(find("https://chat.example.com/town-square"), Some("https://chat.example.com/".into()));
        assert_eq!(find("https://example.com/team/channels/x"), Some("https://example.com/team".into()));
        assert_eq!(find("https://example.com/team/sub/x"), Some("https://example.com/team/sub".into()));
        assert_eq!(find("https://example.com/teammates"), None);
        assert_eq!(find("http://chat.example.com/"), None);
        assert_eq!(find("https://other.example.com/"), None);
    }

    #[test]
    fn config_round_trip_keeps_ids_and_sorts_by_order() {
        let teams = vec![
            TeamConfig {
                id: "b".into(),
                name: "B".into(),
                url: "https://b.example.com".into(),
                order: 1,
                tabs: default_tabs(),
                last_active_tab: 0,
            },
            TeamConfig {
                id: "a".into(),
                name: "A".into(),
                url: "https://a.example.com".into(),
                order: 0,
                tabs: default_tabs(),
                last_active_tab: 0,
            },
        ];
        let model = ServerModel::from_config(&teams);
        let ids: Vec<_> = model.ordered().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let back = model.to_config();
        assert_eq!(back[0].id, "a");
        assert_eq!(back[1].order, 1);
    }
}
