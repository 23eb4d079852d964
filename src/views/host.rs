use tauri::webview::WebviewBuilder;
use tauri::{AppHandle, LogicalPosition, LogicalSize, Manager, Webview, WebviewUrl};
use url::Url;

use super::bridge::{init_script, spellcheck_call};
use super::{Bounds, ViewHost, ViewId, ViewOptions};
use crate::error::ViewError;

fn host_err(e: tauri::Error) -> ViewError {
    ViewError::Host(e.to_string())
}

/// Child webviews attached to the main window.
pub struct TauriViewHost {
    app: AppHandle,
    window_label: String,
}

impl TauriViewHost {
    pub fn new(app: AppHandle, window_label: impl Into<String>) -> Self {
        Self {
            app,
            window_label: window_label.into(),
        }
    }

    fn webview(&self, id: &ViewId) -> Result<Webview, ViewError> {
        self.app
            .get_webview(&id.label())
            .ok_or_else(|| ViewError::UnknownView(id.label()))
    }

    fn place(webview: &Webview, bounds: Bounds) -> Result<(), ViewError> {
        webview
            .set_position(LogicalPosition::new(bounds.x, bounds.y))
            .map_err(host_err)?;
        webview
            .set_size(LogicalSize::new(bounds.width, bounds.height))
            .map_err(host_err)
    }
}

impl ViewHost for TauriViewHost {
    fn create(&mut self, id: &ViewId, url: &Url, bounds: Bounds, options: &ViewOptions) -> Result<(), ViewError> {
        let window = self
            .app
            .get_window(&self.window_label)
            .ok_or_else(|| ViewError::Host(format!("window {} not found", self.window_label)))?;

        // Links leaving the server open in the system browser
        let origin = url.origin();
        let builder = WebviewBuilder::new(id.label(), WebviewUrl::External(url.clone()))
            .initialization_script(&init_script(options))
            .on_navigation(move |target| {
                if target.origin() == origin {
                    return true;
                }
                if matches!(target.scheme(), "http" | "https" | "mailto") {
                    tracing::debug!(url = %target, "Opening external link in browser");
                    if let Err(e) = tauri_plugin_opener::open_url(target.as_str(), None::<&str>) {
                        tracing::warn!("Failed to open external link: {e}");
                    }
                }
                false
            });

        let webview = window
            .add_child(
                builder,
                LogicalPosition::new(bounds.x, bounds.y),
                LogicalSize::new(bounds.width, bounds.height),
            )
            .map_err(host_err)?;
        webview.hide().map_err(host_err)
    }

    fn destroy(&mut self, id: &ViewId) -> Result<(), ViewError> {
        match self.app.get_webview(&id.label()) {
            Some(webview) => webview.close().map_err(host_err),
            None => Ok(()),
        }
    }

    fn show(&mut self, id: &ViewId, bounds: Bounds) -> Result<(), ViewError> {
        let webview = self.webview(id)?;
        Self::place(&webview, bounds)?;
        webview.show().map_err(host_err)
    }

    fn hide(&mut self, id: &ViewId) -> Result<(), ViewError> {
        self.webview(id)?.hide().map_err(host_err)
    }

    fn set_bounds(&mut self, id: &ViewId, bounds: Bounds) -> Result<(), ViewError> {
        Self::place(&self.webview(id)?, bounds)
    }

    fn focus(&mut self, id: &ViewId) -> Result<(), ViewError> {
        self.webview(id)?.set_focus().map_err(host_err)
    }

    fn reload(&mut self, id: &ViewId) -> Result<(), ViewError> {
        self.webview(id)?
            .eval("window.location.reload()")
            .map_err(host_err)
    }

    fn go_history(&mut self, id: &ViewId, step: i32) -> Result<(), ViewError> {
        self.webview(id)?
            .eval(&format!("window.history.go({step})"))
            .map_err(host_err)
    }

    fn apply_options(&mut self, id: &ViewId, options: &ViewOptions) -> Result<(), ViewError> {
        self.webview(id)?
            .eval(&spellcheck_call(options.spellcheck))
            .map_err(host_err)
    }
}
