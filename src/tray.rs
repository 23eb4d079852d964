use tauri::menu::{Menu, MenuBuilder, MenuItemBuilder};
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::{AppHandle, Manager, Wry};

use crate::badge::UnreadTotals;
use crate::menu::MenuAction;
use crate::servers::MattermostServer;

pub const TRAY_ID: &str = "main-tray";

pub(crate) fn tooltip_text(totals: UnreadTotals) -> String {
    match (totals.mentions, totals.unreads) {
        (0, false) => "Mattermost".to_string(),
        (0, true) => "Mattermost: unread messages".to_string(),
        (1, _) => "Mattermost: 1 mention".to_string(),
        (n, _) => format!("Mattermost: {n} mentions"),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TrayEntry {
    Item(MenuAction, String),
    Separator,
}

fn tray_entries(servers: &[MattermostServer]) -> Vec<TrayEntry> {
    let mut entries: Vec<TrayEntry> = servers
        .iter()
        .enumerate()
        .map(|(index, server)| TrayEntry::Item(MenuAction::SwitchServer(index), server.name.clone()))
        .collect();
    if !servers.is_empty() {
        entries.push(TrayEntry::Separator);
    }
    entries.push(TrayEntry::Item(MenuAction::Settings, "Settings…".to_string()));
    entries.push(TrayEntry::Separator);
    entries.push(TrayEntry::Item(MenuAction::Quit, "Quit".to_string()));
    entries
}

// Item events are handled by the app-wide menu handler installed at setup.
fn build_tray_menu<M: Manager<Wry>>(
    manager: &M,
    servers: &[MattermostServer],
) -> Result<Menu<Wry>, tauri::Error> {
    let mut menu = MenuBuilder::new(manager);
    for entry in tray_entries(servers) {
        menu = match entry {
            TrayEntry::Item(action, label) => menu.item(&MenuItemBuilder::with_id(action.id(), label).build(manager)?),
            TrayEntry::Separator => menu.separator(),
        };
    }
    menu.build()
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TrayChange {
    Create,
    Remove,
}

pub(crate) fn tray_change(show_tray_icon: bool, present: bool) -> Option<TrayChange> {
    match (show_tray_icon, present) {
        (true, false) => Some(TrayChange::Create),
        (false, true) => Some(TrayChange::Remove),
        _ => None,
    }
}

/// Create or remove the tray icon so it follows the `show_tray_icon` setting.
pub(crate) fn sync_tray(app: &AppHandle, show_tray_icon: bool, servers: &[MattermostServer]) {
    match tray_change(show_tray_icon, app.tray_by_id(TRAY_ID).is_some()) {
        Some(TrayChange::Create) => {
            if let Err(e) = create_tray(app, servers) {
                tracing::warn!("Failed to create tray icon: {e}");
            }
        }
        Some(TrayChange::Remove) => {
            app.remove_tray_by_id(TRAY_ID);
            tracing::debug!("Tray icon removed");
        }
        None => {}
    }
}

/// Show the main window if hidden, hide it otherwise.
pub(crate) fn toggle_main_window(app: &AppHandle) {
    let Some(window) = app.get_window(crate::MAIN_WINDOW) else {
        return;
    };
    if window.is_visible().unwrap_or(false) && window.is_focused().unwrap_or(false) {
        crate::warn_on_window_error("hide", window.hide());
    } else {
        crate::show_main_window(app);
    }
}

fn create_tray(app: &AppHandle, servers: &[MattermostServer]) -> tauri::Result<()> {
    let menu = build_tray_menu(app, servers)?;
    let mut builder = TrayIconBuilder::with_id(TRAY_ID)
        .tooltip(tooltip_text(UnreadTotals::default()))
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                toggle_main_window(tray.app_handle());
            }
        });
    if let Some(icon) = app.default_window_icon() {
        builder = builder.icon(icon.clone());
    }
    builder.build(app)?;
    Ok(())
}

pub(crate) fn refresh_tray_menu(app: &AppHandle, servers: &[MattermostServer]) {
    let Some(tray) = app.tray_by_id(TRAY_ID) else {
        return;
    };
    match build_tray_menu(app, servers) {
        Ok(menu) => {
            if let Err(e) = tray.set_menu(Some(menu)) {
                tracing::warn!("Failed to update tray menu: {e}");
            }
        }
        Err(e) => tracing::warn!("Failed to build tray menu: {e}"),
    }
}

pub(crate) fn set_tray_tooltip(app: &AppHandle, totals: UnreadTotals) {
    if let Some(tray) = app.tray_by_id(TRAY_ID)
        && let Err(e) = tray.set_tooltip(Some(tooltip_text(totals)))
    {
        tracing::warn!("Failed to update tray tooltip: {e}");
    }
}
