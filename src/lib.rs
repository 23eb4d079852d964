pub(crate) mod app_logger;
pub(crate) mod badge;
pub(crate) mod cli;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod ipc;
mod menu;
pub(crate) mod permissions;
pub(crate) mod servers;
pub(crate) mod state;
pub(crate) mod tabs;
mod tray;
pub(crate) mod trusted_origins;
pub(crate) mod updater;
pub(crate) mod views;

use std::sync::Arc;
use tauri::webview::WebviewBuilder;
use tauri::window::WindowBuilder;
use tauri::{
    AppHandle, Emitter, EventTarget, Listener, LogicalPosition, Manager, RunEvent, State, WebviewUrl,
    Window, WindowEvent,
};
use tauri_plugin_deep_link::DeepLinkExt;

use crate::cli::Args;
use crate::config::{Config, ConfigStore, CONFIG_FILE, TRUSTED_ORIGINS_FILE};
use crate::ipc::{
    TauriEventSink, TauriNotifier, MAIN_UI_LABEL, MENU_ACTION, UPDATE_BADGE, UPDATE_CONFIG, UPDATE_MENU,
};
use crate::menu::{MenuAction, UpdateMenuState};
use crate::state::Services;
use crate::trusted_origins::TrustedOriginsStore;
use crate::updater::{TauriUpdater, UpdateStatus};
use crate::views::{Bounds, TauriViewHost};

pub(crate) use state::AppState;

/// Label of the window hosting the tab bar and every server view.
pub const MAIN_WINDOW: &str = "main";

/// Ensure the window has usable dimensions and sits on a visible monitor.
/// Restored window state can be stale after a monitor is unplugged.
fn ensure_window_visible(window: &Window) {
    use tauri::PhysicalPosition;

    const MIN_WIDTH: u32 = 400;
    const MIN_HEIGHT: u32 = 240;

    let size = window.outer_size().unwrap_or_default();
    let pos = window.outer_position().unwrap_or_default();
    let size_invalid = size.width < MIN_WIDTH || size.height < MIN_HEIGHT;

    let half_w = i32::try_from(size.width / 2).unwrap_or(i32::MAX);
    let half_h = i32::try_from(size.height / 2).unwrap_or(i32::MAX);
    let center_x = pos.x.saturating_add(half_w);
    let center_y = pos.y.saturating_add(half_h);
    let on_screen = window
        .available_monitors()
        .unwrap_or_default()
        .iter()
        .any(|m| {
            let mp = m.position();
            let ms = m.size();
            center_x >= mp.x
                && center_x < mp.x + ms.width as i32
                && center_y >= mp.y
                && center_y < mp.y + ms.height as i32
        });

    if size_invalid || !on_screen {
        tracing::warn!(
            width = size.width,
            height = size.height,
            x = pos.x,
            y = pos.y,
            "Invalid window state, resetting to defaults"
        );
        if let Err(e) = window.set_size(tauri::LogicalSize::new(1000.0, 700.0)) {
            tracing::warn!("Failed to reset window size: {e}");
        }
        if let Err(e) = window.set_position(PhysicalPosition::new(100i32, 100i32)) {
            tracing::warn!("Failed to reset window position: {e}");
        }
        if let Err(e) = window.center() {
            tracing::warn!("Failed to center window: {e}");
        }
    }
}

pub(crate) fn warn_on_window_error(action: &str, result: tauri::Result<()>) {
    if let Err(e) = result {
        tracing::warn!("Failed to {action} main window: {e}");
    }
}

pub(crate) fn show_main_window(app: &AppHandle) {
    let Some(window) = app.get_window(MAIN_WINDOW) else {
        return;
    };
    warn_on_window_error("unminimize", window.unminimize());
    warn_on_window_error("show", window.show());
    warn_on_window_error("focus", window.set_focus());
}

fn content_bounds(window: &Window) -> Option<Bounds> {
    let scale = window.scale_factor().ok()?;
    let size = window.inner_size().ok()?.to_logical::<f64>(scale);
    Some(Bounds::below_tab_bar(size.width, size.height))
}

fn create_main_window(app: &AppHandle, args: &Args, config: &Config) -> tauri::Result<Window> {
    let window = WindowBuilder::new(app, MAIN_WINDOW)
        .title("Mattermost")
        .inner_size(1000.0, 700.0)
        .min_inner_size(400.0, 240.0)
        .fullscreen(args.fullscreen || config.start_in_fullscreen)
        .visible(false)
        .build()?;

    let scale = window.scale_factor()?;
    let size = window.inner_size()?.to_logical::<f64>(scale);
    window.add_child(
        WebviewBuilder::new(MAIN_UI_LABEL, WebviewUrl::App("index.html".into())).auto_resize(),
        LogicalPosition::new(0.0, 0.0),
        size,
    )?;
    Ok(window)
}

// ---------------------------------------------------------------------------
// Menus and badge
// ---------------------------------------------------------------------------

fn update_menu_state(state: &AppState) -> UpdateMenuState {
    if !state.updater.is_enabled() {
        return UpdateMenuState::Disabled;
    }
    match state.updater.status() {
        UpdateStatus::ReadyToInstall { .. } => UpdateMenuState::ReadyToInstall,
        _ => UpdateMenuState::Check,
    }
}

fn rebuild_menus(app: &AppHandle) {
    let state = app.state::<Arc<AppState>>();
    let servers = state.servers.read().ordered().to_vec();
    match menu::build_menu(app, &servers, update_menu_state(&state)) {
        Ok(menu) => {
            if let Err(e) = app.set_menu(menu) {
                tracing::warn!("Failed to set app menu: {e}");
            }
        }
        Err(e) => tracing::warn!("Failed to build app menu: {e}"),
    }
    tray::refresh_tray_menu(app, &servers);
}

fn apply_badge(app: &AppHandle) {
    let state = app.state::<Arc<AppState>>();
    let totals = state.unreads.lock().totals();
    tray::set_tray_tooltip(app, totals);

    let Some(window) = app.get_window(MAIN_WINDOW) else {
        return;
    };
    #[cfg(target_os = "macos")]
    let result = window.set_badge_label(badge::badge_text(totals, state.config.read().show_unread_badge));
    #[cfg(not(target_os = "macos"))]
    let result = {
        let count = badge::linux_badge_count(totals);
        window.set_badge_count((count > 0).then_some(count))
    };
    if let Err(e) = result {
        tracing::debug!("Badge not applied: {e}");
    }
}

/// Register or unregister the login item. Debug builds never touch it.
fn apply_autostart(app: &AppHandle, enabled: bool) {
    use tauri_plugin_autostart::ManagerExt;

    if cfg!(debug_assertions) {
        return;
    }
    let launcher = app.autolaunch();
    let result = match (enabled, launcher.is_enabled()) {
        (true, Ok(false)) => launcher.enable(),
        (false, Ok(true)) => launcher.disable(),
        (_, Err(e)) => Err(e),
        _ => Ok(()),
    };
    if let Err(e) = result {
        tracing::warn!(enabled, "Failed to update launch at login: {e}");
    }
}

/// Apply the settings that live outside the webviews.
fn apply_settings(app: &AppHandle) {
    let state = app.state::<Arc<AppState>>();
    let config = state.config.read();
    let servers = state.servers.read().ordered().to_vec();
    tray::sync_tray(app, config.show_tray_icon, &servers);
    apply_autostart(app, config.autostart);
}

/// Run the action behind a custom menu item id, from the app menu or the tray.
pub(crate) fn dispatch_menu_action(app: &AppHandle, id: &str) {
    let Some(action) = MenuAction::parse(id) else {
        tracing::debug!(id, "Unhandled menu item");
        return;
    };
    let state = app.state::<Arc<AppState>>();
    let result = match action {
        MenuAction::Settings | MenuAction::AddServer => {
            show_main_window(app);
            app.emit_to(EventTarget::webview(MAIN_UI_LABEL), MENU_ACTION, action.id())
                .map_err(|e| e.to_string())
        }
        MenuAction::Reload => state.reload_current(),
        MenuAction::Back => state.go_history(-1),
        MenuAction::Forward => state.go_history(1),
        MenuAction::SwitchServer(index) => {
            show_main_window(app);
            state.switch_server_at(index)
        }
        MenuAction::NextServer => state.cycle_server(1),
        MenuAction::PreviousServer => state.cycle_server(-1),
        MenuAction::CheckForUpdates => {
            let updater = Arc::clone(&state.updater);
            tauri::async_runtime::spawn(async move { updater.check_for_updates(true).await });
            Ok(())
        }
        MenuAction::RestartAndUpdate => match state.updater.install() {
            Ok(()) => {
                state.updater.shutdown();
                app.restart()
            }
            Err(e) => Err(e),
        },
        MenuAction::ShowWindow => {
            show_main_window(app);
            Ok(())
        }
        MenuAction::Quit => {
            app.exit(0);
            Ok(())
        }
    };
    if let Err(e) = result {
        tracing::warn!(id, "Menu action failed: {e}");
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

#[tauri::command]
fn get_config(state: State<'_, Arc<AppState>>) -> Config {
    state.config.read()
}

/// Save settings from the settings view. Servers are not touched here.
#[tauri::command]
fn save_config(state: State<'_, Arc<AppState>>, config: Config) -> Result<Config, String> {
    state.save_settings(config)
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("Panic: {info}");
        default_hook(info);
    }));
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let argv: Vec<String> = std::env::args().collect();
    let args = cli::parse_args(&argv);

    let log = app_logger::init("info");
    install_panic_hook();

    let data_dir = config::resolve_data_dir(args.data_dir.as_deref());
    tracing::info!(data_dir = %data_dir.display(), "Starting Mattermost Desktop");

    let config = Arc::new(ConfigStore::open(data_dir.join(CONFIG_FILE)));
    if let Some(log) = &log
        && let Err(e) = log.set_level(&config.read().log_level)
    {
        tracing::warn!("{e}");
    }
    let trusted_origins = TrustedOriginsStore::open(data_dir.join(TRUSTED_ORIGINS_FILE));
    let updates_enabled = !cfg!(debug_assertions) || args.disable_dev_mode;

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, argv, _cwd| {
            show_main_window(app);
            let args = cli::parse_args(&argv);
            if let Some(state) = app.try_state::<Arc<AppState>>() {
                state.handle_launch_urls(&args.urls);
            }
        }))
        .plugin(tauri_plugin_deep_link::init())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_process::init())
        .plugin(tauri_plugin_notification::init())
        .plugin(tauri_plugin_autostart::init(
            tauri_plugin_autostart::MacosLauncher::LaunchAgent,
            None,
        ))
        .plugin(
            tauri_plugin_window_state::Builder::new()
                .with_state_flags(
                    tauri_plugin_window_state::StateFlags::POSITION
                        | tauri_plugin_window_state::StateFlags::SIZE
                        | tauri_plugin_window_state::StateFlags::MAXIMIZED,
                )
                .build(),
        )
        .setup(move |app| {
            #[cfg(desktop)]
            app.handle().plugin(tauri_plugin_updater::Builder::new().build())?;

            let handle = app.handle().clone();
            let startup = config.read();
            let window = create_main_window(&handle, &args, &startup)?;

            let state = AppState::new(
                Arc::clone(&config),
                trusted_origins,
                Services {
                    view_host: Box::new(TauriViewHost::new(handle.clone(), MAIN_WINDOW)),
                    events: Arc::new(TauriEventSink::new(handle.clone())),
                    notifier: Arc::new(TauriNotifier::new(handle.clone())),
                    update_backend: Arc::new(TauriUpdater::new(handle.clone())),
                    updates_enabled,
                    log: log.clone(),
                },
            );
            app.manage(Arc::clone(&state));

            if let Some(bounds) = content_bounds(&window) {
                state.views.lock().resize(bounds);
            }

            let servers = state.servers.read().ordered().to_vec();
            app.set_menu(menu::build_menu(&handle, &servers, update_menu_state(&state))?)?;
            app.on_menu_event(|app, event| dispatch_menu_action(app, event.id().as_ref()));
            apply_settings(&handle);

            let menu_handle = handle.clone();
            app.listen(UPDATE_MENU, move |_| rebuild_menus(&menu_handle));
            let badge_handle = handle.clone();
            app.listen(UPDATE_BADGE, move |_| apply_badge(&badge_handle));
            let settings_handle = handle.clone();
            app.listen(UPDATE_CONFIG, move |_| apply_settings(&settings_handle));

            state.show_initial();
            state.handle_launch_urls(&args.urls);

            #[cfg(any(windows, target_os = "linux"))]
            if let Err(e) = app.deep_link().register(cli::DEEP_LINK_SCHEME) {
                tracing::warn!("Could not register {}:// handler: {e}", cli::DEEP_LINK_SCHEME);
            }
            let link_handle = handle.clone();
            app.deep_link().on_open_url(move |event| {
                let urls: Vec<String> = event.urls().iter().map(|u| u.to_string()).collect();
                show_main_window(&link_handle);
                link_handle.state::<Arc<AppState>>().handle_launch_urls(&urls);
            });

            if !(args.hidden || startup.hide_on_start) {
                window.show()?;
            }
            state.updater.start();
            Ok(())
        })
        .on_window_event(|window, event| {
            if window.label() != MAIN_WINDOW {
                return;
            }
            let Some(state) = window.try_state::<Arc<AppState>>() else {
                return;
            };
            match event {
                WindowEvent::Resized(_) => {
                    if let Some(bounds) = content_bounds(window) {
                        state.views.lock().resize(bounds);
                    }
                }
                WindowEvent::CloseRequested { api, .. } => {
                    let config = state.config.read();
                    let keep_running = cfg!(target_os = "macos")
                        || (config.minimize_to_tray && config.show_tray_icon);
                    if keep_running {
                        api.prevent_close();
                        warn_on_window_error("hide", window.hide());
                    }
                }
                _ => {}
            }
        })
        .invoke_handler(tauri::generate_handler![
            get_config,
            save_config,
            app_logger::push_log,
            ipc::ipc_send,
            permissions::request_permission,
            servers::get_servers,
            servers::add_server,
            servers::edit_server,
            servers::remove_server,
            servers::reorder_servers,
            servers::reorder_tabs,
            servers::open_tab,
            servers::close_tab,
            views::get_active_view,
            views::set_modal_open,
            views::reload_view,
            views::navigate_history,
            updater::get_update_status,
            updater::check_for_updates,
            updater::download_update,
            updater::cancel_download,
            updater::remind_later,
            updater::skip_version,
            updater::install_update,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| match event {
            RunEvent::Ready => {
                if let Some(window) = app_handle.get_window(MAIN_WINDOW) {
                    ensure_window_visible(&window);
                }
            }
            RunEvent::ExitRequested { .. } => {
                if let Some(state) = app_handle.try_state::<Arc<AppState>>() {
                    state.permissions.cancel_all();
                }
            }
            RunEvent::Exit => {
                if let Some(state) = app_handle.try_state::<Arc<AppState>>() {
                    state.updater.on_quit();
                }
            }
            _ => {}
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_window_operations_are_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            warn_on_window_error("show", Ok(()));
            warn_on_window_error("focus", Err(tauri::Error::WindowNotFound));
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("Failed to focus main window"));
        assert!(!output.contains("Failed to show"));
    }
}
