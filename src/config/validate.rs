//! Post-upgrade cleanup of a [`Config`]: repairs what can be repaired and drops
//! what cannot, so a single bad server entry never costs the user the rest.

use std::collections::HashSet;

use super::{Config, TabConfig, CURRENT_CONFIG_VERSION};
use crate::servers::{clean_url, parse_server_url};
use crate::tabs::{default_tabs, TabType};

/// Server ids end up in webview labels, which only allow `[a-zA-Z0-9-/:_]`.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | ':' | '_'))
}

pub(crate) fn normalize(mut config: Config) -> Config {
    config.version = CURRENT_CONFIG_VERSION;

    let mut seen_ids = HashSet::new();
    let teams = std::mem::take(&mut config.teams);
    config.teams = teams
        .into_iter()
        .filter_map(|mut team| {
            team.url = clean_url(&team.url);
            if let Err(e) = parse_server_url(&team.url) {
                tracing::warn!(name = %team.name, "Dropping server from configuration: {e}");
                return None;
            }
            if !is_valid_id(&team.id) || !seen_ids.insert(team.id.clone()) {
                if !team.id.is_empty() {
                    tracing::warn!(id = %team.id, "Replacing unusable server id");
                }
                team.id = uuid::Uuid::new_v4().to_string();
                seen_ids.insert(team.id.clone());
            }
            normalize_tabs(&mut team.tabs);
            if team.last_active_tab >= team.tabs.len() {
                team.last_active_tab = 0;
            }
            Some(team)
        })
        .collect();

    if config.last_active_team >= config.teams.len() {
        config.last_active_team = 0;
    }
    config
}

fn normalize_tabs(tabs: &mut Vec<TabConfig>) {
    if tabs.is_empty() {
        *tabs = default_tabs();
        return;
    }
    let messaging = TabType::Messaging.as_str();
    match tabs.iter_mut().find(|t| t.name == messaging) {
        Some(tab) => tab.is_open = true,
        None => {
            for tab in tabs.iter_mut() {
                tab.order += 1;
            }
            tabs.insert(
                0,
                TabConfig {
                    name: messaging.to_string(),
                    order: 0,
                    is_open: true,
                },
            );
        }
    }
}
