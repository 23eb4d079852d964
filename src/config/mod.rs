use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StoreError;

mod upgrade;
mod validate;

pub(crate) use upgrade::upgrade_to_latest;
pub(crate) use validate::normalize;

/// Schema version written by this build.
pub const CURRENT_CONFIG_VERSION: u32 = 3;

pub(crate) const CONFIG_FILE: &str = "config.json";
pub(crate) const TRUSTED_ORIGINS_FILE: &str = "trustedOrigins.json";

/// Resolve the data directory, honouring `--dataDir` when given.
///
/// - macOS: `~/Library/Application Support/Mattermost/`
/// - Linux: `~/.config/Mattermost/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/Mattermost/`
///
/// Falls back to `~/.mattermost-desktop/` if the platform dir is unavailable.
pub(crate) fn resolve_data_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    dirs::config_dir()
        .map(|d| d.join("Mattermost"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".mattermost-desktop")
        })
}

/// Read a JSON file. `Ok(None)` when the file does not exist; a syntax error
/// when it exists but is not JSON.
pub(crate) fn read_json_file(path: &Path) -> Result<Option<serde_json::Value>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Syntax {
            path: path.to_path_buf(),
            source,
        })
}

/// Save a JSON file atomically (temp file + rename).
/// Sets 0600 permissions on Unix since the stores hold per-origin grants.
pub(crate) fn save_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    }

    let json = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store.json".to_string());
    let temp = path.with_file_name(format!("{file_name}.tmp.{}", std::process::id()));

    std::fs::write(&temp, &json).map_err(|e| StoreError::io(&temp, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&temp, perms).map_err(|e| StoreError::io(&temp, e))?;
    }

    // Either the old file or the new one exists, never a partial write
    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        StoreError::io(path, e)
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Config schema (version 3)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabConfig {
    pub name: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub is_open: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    /// Assigned on load when missing (pre-v3 files never carried one)
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub tabs: Vec<TabConfig>,
    /// Index into `tabs` of the tab shown when switching to this server
    #[serde(default)]
    pub last_active_tab: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    /// 0 = never, 2 = until focused (Windows taskbar flashing)
    pub flash_window: u8,
    pub bounce_icon: bool,
    /// "informational", "critical" or "" (macOS dock bounce)
    pub bounce_icon_type: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            flash_window: if cfg!(target_os = "linux") { 0 } else { 2 },
            bounce_icon: true,
            bounce_icon_type: "informational".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub version: u32,
    pub teams: Vec<TeamConfig>,
    pub show_tray_icon: bool,
    /// "light", "dark" or "use_system"
    pub tray_icon_theme: String,
    pub minimize_to_tray: bool,
    pub notifications: NotificationSettings,
    pub show_unread_badge: bool,
    pub use_spell_checker: bool,
    pub spell_checker_locale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spell_checker_url: Option<String>,
    pub enable_hardware_acceleration: bool,
    pub autostart: bool,
    pub hide_on_start: bool,
    pub start_in_fullscreen: bool,
    pub dark_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_location: Option<String>,
    /// Index into `teams` of the server shown at startup
    pub last_active_team: usize,
    pub auto_check_for_updates: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_minimize: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_close: Option<bool>,
    /// error | warn | info | verbose | debug | silly
    pub log_level: String,
    pub app_language: String,
    /// Versions the user chose to skip; automatic checks won't notify about them
    pub skipped_versions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            teams: Vec::new(),
            show_tray_icon: true,
            tray_icon_theme: "use_system".to_string(),
            minimize_to_tray: !cfg!(target_os = "linux"),
            notifications: NotificationSettings::default(),
            show_unread_badge: true,
            use_spell_checker: true,
            spell_checker_locale: "en-US".to_string(),
            spell_checker_url: None,
            enable_hardware_acceleration: true,
            autostart: true,
            hide_on_start: false,
            start_in_fullscreen: false,
            dark_mode: false,
            download_location: dirs::download_dir().map(|d| d.to_string_lossy().into_owned()),
            last_active_team: 0,
            auto_check_for_updates: true,
            always_minimize: None,
            always_close: None,
            log_level: "info".to_string(),
            app_language: String::new(),
            skipped_versions: Vec::new(),
        }
    }
}

/// Result of reading `config.json` from disk.
#[derive(Debug)]
pub(crate) struct LoadedConfig {
    pub(crate) config: Config,
    /// True when the file was on an older schema (or missing ids/tabs) and
    /// should be written back.
    pub(crate) needs_save: bool,
}

/// Read, upgrade and normalise a config file. A missing file yields the
/// default config; syntax and validation failures are returned to the caller.
pub(crate) fn load_config_file(path: &Path) -> Result<LoadedConfig, StoreError> {
    let Some(raw) = read_json_file(path)? else {
        return Ok(LoadedConfig {
            config: Config::default(),
            needs_save: false,
        });
    };
    let upgraded = upgrade_to_latest(raw.clone())?;
    let config = normalize(upgraded);
    let needs_save = serde_json::to_value(&config).map_err(StoreError::Serialize)? != raw;
    Ok(LoadedConfig { config, needs_save })
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Owner of `config.json`. Constructed once at startup and shared through
/// `AppState`; every mutation is written to disk before it becomes visible.
pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<Config>,
}

impl ConfigStore {
    /// Load the store. Corrupt or invalid files are logged and replaced with
    /// defaults in memory; the file on disk is left alone until the next write.
    pub fn open(path: PathBuf) -> Self {
        let config = match load_config_file(&path) {
            Ok(LoadedConfig { config, needs_save }) => {
                if needs_save {
                    tracing::info!(path = %path.display(), "Upgraded configuration, saving");
                    if let Err(e) = save_json_file(&path, &config) {
                        tracing::warn!("Could not persist upgraded configuration: {e}");
                    }
                }
                config
            }
            Err(e) => {
                tracing::warn!("Configuration could not be loaded, using defaults instead: {e}");
                Config::default()
            }
        };
        Self {
            path,
            data: RwLock::new(config),
        }
    }

    pub fn read(&self) -> Config {
        self.data.read().clone()
    }

    /// Replace the whole config. The value is normalised, persisted, then cached.
    pub fn write(&self, config: Config) -> Result<Config, StoreError> {
        let config = normalize(config);
        let mut guard = self.data.write();
        save_json_file(&self.path, &config)?;
        *guard = config.clone();
        Ok(config)
    }

    /// Apply `f` to a copy of the current config and persist the result.
    pub fn update<F: FnOnce(&mut Config)>(&self, f: F) -> Result<Config, StoreError> {
        let mut guard = self.data.write();
        let mut next = guard.clone();
        f(&mut next);
        let next = normalize(next);
        save_json_file(&self.path, &next)?;
        *guard = next.clone();
        Ok(next)
    }
}
