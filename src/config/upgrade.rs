//! Schema upgrades for `config.json`.
//!
//! Each step works on the raw JSON value so fields the current schema no
//! longer knows about do not have to be modelled; the final step deserializes
//! into [`Config`], filling anything missing from its defaults.

use serde_json::{json, Map, Value};

use super::{Config, CURRENT_CONFIG_VERSION};
use crate::error::StoreError;
use crate::tabs::default_tabs;

const PRIMARY_SERVER_NAME: &str = "Primary server";

fn invalid(detail: impl std::fmt::Display) -> StoreError {
    StoreError::Validation(format!(
        "Provided configuration file does not validate, using defaults instead: {detail}"
    ))
}

fn config_version(raw: &Value) -> Result<u32, StoreError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid("expected a JSON object"))?;
    match obj.get("version") {
        None => Ok(0),
        Some(v) => v
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| invalid("version must be a non-negative integer")),
    }
}

fn object_mut(raw: &mut Value) -> Result<&mut Map<String, Value>, StoreError> {
    raw.as_object_mut()
        .ok_or_else(|| invalid("expected a JSON object"))
}

/// `{url}` → `{version: 1, teams: [{name, url}]}`
fn upgrade_v0_to_v1(raw: Value) -> Result<Value, StoreError> {
    let url = raw
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("version 0 config requires a url"))?;
    Ok(json!({
        "version": 1,
        "teams": [{ "name": PRIMARY_SERVER_NAME, "url": url }],
    }))
}

/// Teams gain an explicit `order` matching their list position.
fn upgrade_v1_to_v2(mut raw: Value) -> Result<Value, StoreError> {
    let obj = object_mut(&mut raw)?;
    obj.insert("version".into(), json!(2));
    let teams = obj.entry("teams").or_insert_with(|| json!([]));
    let Some(teams) = teams.as_array_mut() else {
        return Err(invalid("teams must be an array"));
    };
    for (index, team) in teams.iter_mut().enumerate() {
        if let Some(team) = team.as_object_mut() {
            team.insert("order".into(), json!(index));
        }
    }
    Ok(raw)
}

/// Teams gain tabs; the app gains a last-active server.
fn upgrade_v2_to_v3(mut raw: Value) -> Result<Value, StoreError> {
    let tabs = serde_json::to_value(default_tabs()).map_err(StoreError::Serialize)?;
    let obj = object_mut(&mut raw)?;
    obj.insert("version".into(), json!(3));
    obj.entry("lastActiveTeam").or_insert_with(|| json!(0));
    let teams = obj.entry("teams").or_insert_with(|| json!([]));
    let Some(teams) = teams.as_array_mut() else {
        return Err(invalid("teams must be an array"));
    };
    for team in teams.iter_mut() {
        if let Some(team) = team.as_object_mut() {
            team.entry("tabs").or_insert_with(|| tabs.clone());
            team.entry("lastActiveTab").or_insert_with(|| json!(0));
        }
    }
    Ok(raw)
}

/// Walk `raw` up the version chain until it reaches the current schema.
pub(crate) fn upgrade_to_latest(raw: Value) -> Result<Config, StoreError> {
    let mut current = raw;
    loop {
        current = match config_version(&current)? {
            CURRENT_CONFIG_VERSION => {
                return serde_json::from_value(current).map_err(invalid);
            }
            2 => upgrade_v2_to_v3(current)?,
            1 => upgrade_v1_to_v2(current)?,
            0 => upgrade_v0_to_v1(current)?,
            newer => {
                return Err(invalid(format!(
                    "version {newer} is newer than the supported version {CURRENT_CONFIG_VERSION}"
                )));
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_url_becomes_single_team_at_current_version() {
        let cfg = upgrade_to_latest(json!({"url": "https://mattermost.example.com"})).unwrap();
        assert_eq!(cfg.version, CURRENT_CONFIG_VERSION);
        assert_eq!(cfg.teams.len(), 1);
        assert_eq!(cfg.teams[0].url, "https://mattermost.example.com");
        assert_eq!(cfg.teams[0].name, PRIMARY_SERVER_NAME);
        assert_eq!(cfg.teams[0].tabs, default_tabs());
    }

    #[test]
    fn v1_teams_get_order_from_position() {
        let cfg = upgrade_to_latest(json!({
            "version": 1,
            "teams": [
                {"name": "a", "url": "https://a.example.com"},
                {"name": "b", "url": "https://b.example.com"},
            ],
            "showUnreadBadge": false,
            "spellCheckerLocale": "de-DE",
        }))
        .unwrap();
        assert_eq!(cfg.teams[0].order, 0);
        assert_eq!(cfg.teams[1].order, 1);
        assert!(!cfg.show_unread_badge);
        assert_eq!(cfg.spell_checker_locale, "de-DE");
    }

    #[test]
    fn v2_teams_get_default_tabs() {
        let cfg = upgrade_to_latest(json!({
            "version": 2,
            "teams": [{"name": "a", "url": "https://a.example.com", "order": 4}],
        }))
        .unwrap();
        assert_eq!(cfg.teams[0].order, 4);
        assert_eq!(cfg.teams[0].tabs.len(), 3);
        assert!(cfg.teams[0].tabs[0].is_open);
        assert_eq!(cfg.last_active_team, 0);
    }

    #[test]
    fn current_version_passes_through() {
        let cfg = upgrade_to_latest(json!({
            "version": 3,
            "teams": [{
                "id": "x",
                "name": "a",
                "url": "https://a.example.com",
                "order": 0,
                "tabs": [{"name": "TAB_MESSAGING", "order": 0, "isOpen": true}],
                "lastActiveTab": 0,
            }],
        }))
        .unwrap();
        assert_eq!(cfg.teams[0].id, "x");
        assert_eq!(cfg.teams[0].tabs.len(), 1);
    }

    #[test]
    fn newer_version_is_rejected() {
        let err = upgrade_to_latest(json!({"version": 99, "teams": []})).unwrap_err();
        assert!(err.to_string().contains("does not validate"));
    }

    #[test]
    fn v0_without_url_is_rejected() {
        let err = upgrade_to_latest(json!({"something": "else"})).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(upgrade_to_latest(json!([1, 2, 3])).is_err());
    }
}
