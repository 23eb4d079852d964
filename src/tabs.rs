//! Tab views: the fixed product surfaces every server exposes.
//!
//! A tab is a closed enum dispatched with `match`; the URL of a tab view is
//! computed from the owning server on every call, never cached, so editing a
//! server URL is immediately reflected everywhere.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::config::TabConfig;
use crate::error::TabError;
use crate::servers::MattermostServer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TabType {
    #[serde(rename = "TAB_MESSAGING")]
    Messaging,
    #[serde(rename = "TAB_FOCALBOARD")]
    Focalboard,
    #[serde(rename = "TAB_PLAYBOOKS")]
    Playbooks,
    #[serde(rename = "TAB_PEOPLE")]
    People,
}

impl TabType {
    pub const ALL: [TabType; 4] = [
        TabType::Messaging,
        TabType::Focalboard,
        TabType::Playbooks,
        TabType::People,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TabType::Messaging => "TAB_MESSAGING",
            TabType::Focalboard => "TAB_FOCALBOARD",
            TabType::Playbooks => "TAB_PLAYBOOKS",
            TabType::People => "TAB_PEOPLE",
        }
    }

    /// Path appended to the server root, `None` for the server root itself.
    pub fn path_suffix(self) -> Option<&'static str> {
        match self {
            TabType::Messaging => None,
            TabType::Focalboard => Some("boards"),
            TabType::Playbooks => Some("playbooks"),
            TabType::People => Some("people"),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TabType::Messaging => "Channels",
            TabType::Focalboard => "Boards",
            TabType::Playbooks => "Playbooks",
            TabType::People => "People",
        }
    }

    pub fn can_close(self) -> bool {
        self != TabType::Messaging
    }

    /// Short lowercase form used inside webview labels (labels only allow `[a-zA-Z0-9-/:_]`).
    pub(crate) fn slug(self) -> &'static str {
        match self {
            TabType::Messaging => "messaging",
            TabType::Focalboard => "boards",
            TabType::Playbooks => "playbooks",
            TabType::People => "people",
        }
    }

    pub(crate) fn from_slug(slug: &str) -> Option<Self> {
        TabType::ALL.into_iter().find(|t| t.slug() == slug)
    }
}

impl FromStr for TabType {
    type Err = TabError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        TabType::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| TabError::NotImplemented(name.to_string()))
    }
}

impl fmt::Display for TabType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tab set new servers start with. People is opt-in and not part of it.
pub fn default_tabs() -> Vec<TabConfig> {
    vec![
        TabConfig {
            name: TabType::Messaging.as_str().to_string(),
            order: 0,
            is_open: true,
        },
        TabConfig {
            name: TabType::Focalboard.as_str().to_string(),
            order: 1,
            is_open: false,
        },
        TabConfig {
            name: TabType::Playbooks.as_str().to_string(),
            order: 2,
            is_open: false,
        },
    ]
}

/// A server paired with one of its tabs.
#[derive(Clone, Debug, PartialEq)]
pub struct TabView {
    server_id: String,
    server_url: Url,
    kind: TabType,
}

impl TabView {
    pub fn new(server: &MattermostServer, kind: TabType) -> Self {
        Self {
            server_id: server.id.clone(),
            server_url: server.url.clone(),
            kind,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn tab_type(&self) -> TabType {
        self.kind
    }

    pub fn url(&self) -> Url {
        let Some(suffix) = self.kind.path_suffix() else {
            return self.server_url.clone();
        };
        let mut url = self.server_url.clone();
        let root = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{root}/{suffix}"));
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    pub fn should_notify(&self) -> bool {
        self.kind == TabType::Messaging
    }
}

/// Build the view for `tab` on `server`. Unknown tab names are a configuration
/// error and are reported as not implemented.
pub fn get_server_view(server: &MattermostServer, tab: &TabConfig) -> Result<TabView, TabError> {
    let kind: TabType = tab.name.parse()?;
    Ok(TabView::new(server, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(url: &str) -> MattermostServer {
        MattermostServer {
            id: "srv-1".into(),
            name: "Community".into(),
            url: Url::parse(url).unwrap(),
            order: 0,
            tabs: default_tabs(),
            last_active_tab: 0,
        }
    }

    fn tab(name: &str) -> TabConfig {
        TabConfig {
            name: name.into(),
            order: 0,
            is_open: true,
        }
    }

    #[test]
    fn urls_follow_suffix_table() {
        let srv = server("https://chat.example.com/");
        let cases = [
            ("TAB_MESSAGING", "https://chat.example.com/"),
            ("TAB_FOCALBOARD", "https://chat.example.com/boards"),
            ("TAB_PLAYBOOKS", "https://chat.example.com/playbooks"),
            ("TAB_PEOPLE", "https://chat.example.com/people"),
        ];
        for (name, expected) in cases {
            let view = get_server_view(&srv, &tab(name)).unwrap();
            assert_eq!(view.url().as_str(), expected, "tab {name}");
        }
    }

    #[test]
    fn subpath_servers_keep_their_prefix() {
        let srv = server("https://example.com/mattermost");
        let view = get_server_view(&srv, &tab("TAB_PLAYBOOKS")).unwrap();
        assert_eq!(view.url().as_str(), "https://example.com/mattermost/playbooks");

        let messaging = get_server_view(&srv, &tab("TAB_MESSAGING")).unwrap();
        assert_eq!(messaging.url().as_str(), "https://example.com/mattermost");
    }

    #[test]
    fn unknown_tab_is_not_implemented() {
        let srv = server("https://chat.example.com");
        let err = get_server_view(&srv, &tab("TAB_CALLS")).unwrap_err();
        assert_eq!(err, TabError::NotImplemented("TAB_CALLS".into()));
    }

    #[test]
    fn only_messaging_notifies_and_is_pinned() {
        let srv = server("https://chat.example.com");
        for kind in TabType::ALL {
            let view = TabView::new(&srv, kind);
            assert_eq!(view.should_notify(), kind == TabType::Messaging);
            assert_eq!(kind.can_close(), kind != TabType::Messaging);
        }
    }

    #[test]
    fn url_is_computed_from_current_server() {
        let mut srv = server("https://old.example.com");
        let before = TabView::new(&srv, TabType::Focalboard);
        srv.url = Url::parse("https://new.example.com").unwrap();
        let after = TabView::new(&srv, TabType::Focalboard);
        assert_eq!(before.url().host_str(), Some("old.example.com"));
        assert_eq!(after.url().as_str(), "https://new.example.com/boards");
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&TabType::Focalboard).unwrap();
        assert_eq!(json, "\"TAB_FOCALBOARD\"");
        let parsed: TabType = serde_json::from_str("\"TAB_PEOPLE\"").unwrap();
        assert_eq!(parsed, TabType::People);
    }

    #[test]
    fn default_tabs_open_only_messaging() {
        let tabs = default_tabs();
        assert_eq!(tabs.len(), 3);
        assert!(tabs[0].is_open);
        assert!(tabs.iter().skip(1).all(|t| !t.is_open));
    }
}
