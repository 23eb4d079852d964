//! Process-wide tracing setup.
//!
//! The filter sits behind a `reload` layer so a `logLevel` change in settings
//! applies without a restart. `RUST_LOG`, when set, always wins. Webviews
//! forward their console output through `push_log`.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Map a configured level name onto a tracing directive. Accepts the
/// `verbose` and `silly` names older configs carry.
pub(crate) fn level_directive(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "info" => "info",
        "verbose" | "debug" => "debug",
        "silly" | "trace" => "trace",
        _ => "info",
    }
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_directive(level)))
}

/// Handle for changing the active level after startup.
#[derive(Clone)]
pub struct LogHandle {
    reload: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    pub fn set_level(&self, level: &str) -> Result<(), String> {
        self.reload
            .reload(filter_for(level))
            .map_err(|e| format!("Failed to change log level: {e}"))?;
        tracing::info!(level = level_directive(level), "Log level changed");
        Ok(())
    }
}

/// Install the global subscriber. Returns `None` when one is already set
/// (tests, or a host that installed its own).
pub fn init(level: &str) -> Option<LogHandle> {
    let (filter, reload) = reload::Layer::new(filter_for(level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true));

    #[cfg(feature = "tokio-console")]
    let registry = registry.with(console_subscriber::spawn());

    registry.try_init().ok()?;
    Some(LogHandle { reload })
}

/// Forward a webview log line into the process log.
#[tauri::command]
pub(crate) fn push_log(level: String, source: String, message: String) {
    match level_directive(&level) {
        "error" => tracing::error!(target: "renderer", source = %source, "{message}"),
        "warn" => tracing::warn!(target: "renderer", source = %source, "{message}"),
        "info" => tracing::info!(target: "renderer", source = %source, "{message}"),
        "debug" => tracing::debug!(target: "renderer", source = %source, "{message}"),
        _ => tracing::trace!(target: "renderer", source = %source, "{message}"),
    }
}
