//! Per-origin permission grants persisted in `trustedOrigins.json`.
//!
//! File shape: `{"https://chat.example.com": {"canBasicAuth": true}}`.
//! Keys are normalised to the URL origin on load, so `https://host/path` and
//! `https://host` share one entry.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::Url;

use crate::config::{read_json_file, save_json_file};
use crate::error::StoreError;

type Permissions = BTreeMap<String, bool>;
type OriginMap = BTreeMap<String, Permissions>;

/// Granted when the user allows a server's request to show notifications.
pub(crate) const NOTIFICATIONS_PERMISSION: &str = "notifications";

fn invalid(detail: &str) -> StoreError {
    StoreError::Validation(format!(
        "Provided TrustedOrigins file does not validate, using defaults instead. {detail}"
    ))
}

/// Origin key for `url`, or `None` for opaque origins (`data:`, `file:` ...).
fn origin_key(url: &Url) -> Option<String> {
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

fn parse_origin_key(raw: &str) -> Option<String> {
    Url::parse(raw).ok().as_ref().and_then(origin_key)
}

/// Validate the raw JSON shape and normalise the keys.
fn validate(raw: Value) -> Result<OriginMap, StoreError> {
    let Value::Object(entries) = raw else {
        return Err(invalid("expected an object keyed by origin"));
    };
    let mut map = OriginMap::new();
    for (key, value) in entries {
        let Value::Object(perms) = value else {
            return Err(invalid(&format!("value for {key:?} is not an object")));
        };
        let mut parsed = Permissions::new();
        for (name, granted) in perms {
            let Value::Bool(granted) = granted else {
                return Err(invalid(&format!("{key:?}.{name} is not a boolean")));
            };
            parsed.insert(name, granted);
        }
        match parse_origin_key(&key) {
            Some(origin) => map.entry(origin).or_default().extend(parsed),
            None => tracing::debug!(key = %key, "Dropping trusted origin entry that is not a URL"),
        }
    }
    Ok(map)
}

pub struct TrustedOriginsStore {
    path: PathBuf,
    data: OriginMap,
}

impl TrustedOriginsStore {
    /// An empty store bound to `path`; call [`load`](Self::load) to read it.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: OriginMap::new(),
        }
    }

    /// Open and load, falling back to an empty store when the file is unusable.
    pub fn open(path: PathBuf) -> Self {
        let mut store = Self::new(path);
        if let Err(e) = store.load() {
            tracing::warn!("{e}");
        }
        store
    }

    /// Read the file. A missing file is an empty store. On error the in-memory
    /// map is reset to empty and the error returned.
    pub fn load(&mut self) -> Result<(), StoreError> {
        self.data = OriginMap::new();
        let Some(raw) = read_json_file(&self.path)? else {
            return Ok(());
        };
        self.data = validate(raw)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        save_json_file(&self.path, &self.data)
    }

    /// Record an explicit answer for a single permission, keeping the others
    /// for that origin.
    pub fn record(&mut self, url: &Url, permission: &str, granted: bool) -> Result<(), StoreError> {
        let Some(origin) = origin_key(url) else {
            tracing::debug!(url = %url, "Ignoring permission for opaque origin");
            return Ok(());
        };
        self.data
            .entry(origin)
            .or_default()
            .insert(permission.to_string(), granted);
        self.save()
    }

    pub fn delete(&mut self, url: &Url) -> Result<(), StoreError> {
        let Some(origin) = origin_key(url) else {
            return Ok(());
        };
        if self.data.remove(&origin).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Stored answer for `permission` on the origin of `url`. `None` when the
    /// origin or permission is unknown.
    pub fn check_permission(&self, url: &Url, permission: &str) -> Option<bool> {
        if permission.is_empty() {
            tracing::error!("Missing permission name in trusted origins lookup");
            return None;
        }
        let origin = origin_key(url)?;
        self.data.get(&origin)?.get(permission).copied()
    }
}
