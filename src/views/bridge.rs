//! Script injected into every server view. It relays the webapp's
//! `window.postMessage` traffic to `ipc_send` and delivers targeted events
//! back into the page.

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;

const BRIDGE_JS: &str = include_str!("bridge.js");
const OPTIONS_PLACEHOLDER: &str = "__BRIDGE_OPTIONS__";

/// Per-view settings baked into the bridge when a view is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOptions {
    pub spellcheck: bool,
    pub name: String,
    pub version: String,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            spellcheck: true,
            name: "Mattermost".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl From<&Config> for ViewOptions {
    fn from(config: &Config) -> Self {
        Self {
            spellcheck: config.use_spell_checker,
            ..Self::default()
        }
    }
}

pub fn init_script(options: &ViewOptions) -> String {
    let json = serde_json::to_string(options).unwrap_or_else(|_| "{}".to_string());
    BRIDGE_JS.replace(OPTIONS_PLACEHOLDER, &json)
}

/// JavaScript that hands `payload` on `channel` to the bridge of a view.
pub fn receive_call(channel: &str, payload: &Value) -> String {
    format!(
        "window.__mattermostDesktop && window.__mattermostDesktop.receive({}, {});",
        Value::String(channel.to_string()),
        payload
    )
}

pub fn spellcheck_call(enabled: bool) -> String {
    format!("window.__mattermostDesktop && window.__mattermostDesktop.setSpellcheck({enabled});")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_are_embedded() {
        let script = init_script(&ViewOptions {
            spellcheck: false,
            ..ViewOptions::default()
        });
        assert!(!script.contains(OPTIONS_PLACEHOLDER));
        assert!(script.contains(r#""spellcheck":false"#));
        assert!(script.contains("'ipc_send'"));
        assert!(script.contains("'request_permission'"));
    }

    #[test]
    fn bridge_forwards_webapp_messages() {
        let script = init_script(&ViewOptions::default());
        for channel in ["notify-mention", "unreads-and-mentions", "session-expired", "browser-history-push"] {
            assert!(script.contains(&format!("'{channel}'")), "missing {channel}");
        }
    }

    #[test]
    fn receive_call_quotes_its_arguments() {
        let js = receive_call("browser-history-push", &json!({"path": "/x\"); alert(1); ("}));
        assert_eq!(
            js,
            r#"window.__mattermostDesktop && window.__mattermostDesktop.receive("browser-history-push", {"path":"/x\"); alert(1); ("});"#
        );
    }

    #[test]
    fn options_follow_config() {
        let config = Config {
            use_spell_checker: false,
            ..Config::default()
        };
        assert!(!ViewOptions::from(&config).spellcheck);
        assert!(spellcheck_call(true).ends_with("setSpellcheck(true);"));
    }
}
