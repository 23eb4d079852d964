use tauri::menu::{Menu, MenuBuilder, MenuItemBuilder, PredefinedMenuItem, SubmenuBuilder};
use tauri::{Manager, Wry};

use crate::servers::MattermostServer;

/// Actions behind the custom menu item ids used by the app menu and the tray.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuAction {
    Settings,
    AddServer,
    Reload,
    Back,
    Forward,
    /// Zero-based position in the ordered server list
    SwitchServer(usize),
    NextServer,
    PreviousServer,
    CheckForUpdates,
    RestartAndUpdate,
    ShowWindow,
    Quit,
}

impl MenuAction {
    pub fn id(&self) -> String {
        match self {
            MenuAction::Settings => "settings".into(),
            MenuAction::AddServer => "add-server".into(),
            MenuAction::Reload => "reload".into(),
            MenuAction::Back => "history-back".into(),
            MenuAction::Forward => "history-forward".into(),
            MenuAction::SwitchServer(index) => format!("server-{}", index + 1),
            MenuAction::NextServer => "next-server".into(),
            MenuAction::PreviousServer => "prev-server".into(),
            MenuAction::CheckForUpdates => "check-for-updates".into(),
            MenuAction::RestartAndUpdate => "restart-and-update".into(),
            MenuAction::ShowWindow => "show-window".into(),
            MenuAction::Quit => "quit".into(),
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        Some(match id {
            "settings" => MenuAction::Settings,
            "add-server" => MenuAction::AddServer,
            "reload" => MenuAction::Reload,
            "history-back" => MenuAction::Back,
            "history-forward" => MenuAction::Forward,
            "next-server" => MenuAction::NextServer,
            "prev-server" => MenuAction::PreviousServer,
            "check-for-updates" => MenuAction::CheckForUpdates,
            "restart-and-update" => MenuAction::RestartAndUpdate,
            "show-window" => MenuAction::ShowWindow,
            "quit" => MenuAction::Quit,
            other => {
                let n: usize = other.strip_prefix("server-")?.parse().ok()?;
                MenuAction::SwitchServer(n.checked_sub(1)?)
            }
        })
    }
}

/// What the Help menu offers for updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMenuState {
    Disabled,
    Check,
    ReadyToInstall,
}

/// Build the application menu. Rebuilt whenever servers or the update state
/// change (`update-menu`).
pub fn build_menu<M: Manager<Wry>>(
    manager: &M,
    servers: &[MattermostServer],
    update: UpdateMenuState,
) -> Result<Menu<Wry>, tauri::Error> {
    let is_macos = cfg!(target_os = "macos");

    macro_rules! item {
        ($action:expr, $label:expr, $accel:expr) => {
            MenuItemBuilder::with_id($action.id(), $label)
                .accelerator($accel)
                .build(manager)?
        };
        ($action:expr, $label:expr) => {
            MenuItemBuilder::with_id($action.id(), $label).build(manager)?
        };
    }

    // ---------- File ----------
    let mut file = SubmenuBuilder::new(manager, "&File")
        .item(&item!(MenuAction::Settings, "Settings…", "CmdOrCtrl+,"))
        .item(&item!(MenuAction::AddServer, "Sign in to Another Server"));
    if !is_macos {
        file = file.separator().item(&item!(MenuAction::Quit, "Quit", "CmdOrCtrl+Q"));
    }
    let file = file.build()?;

    // ---------- Edit ----------
    let edit = SubmenuBuilder::new(manager, "&Edit")
        .item(&PredefinedMenuItem::undo(manager, None)?)
        .item(&PredefinedMenuItem::redo(manager, None)?)
        .separator()
        .item(&PredefinedMenuItem::cut(manager, None)?)
        .item(&PredefinedMenuItem::copy(manager, None)?)
        .item(&PredefinedMenuItem::paste(manager, None)?)
        .item(&PredefinedMenuItem::select_all(manager, None)?)
        .build()?;

    // ---------- View ----------
    let view = SubmenuBuilder::new(manager, "&View")
        .item(&item!(MenuAction::Reload, "Reload", "CmdOrCtrl+R"))
        .separator()
        .item(&PredefinedMenuItem::fullscreen(manager, None)?)
        .build()?;

    // ---------- History ----------
    let history = SubmenuBuilder::new(manager, "Hi&story")
        .item(&item!(MenuAction::Back, "Back", "CmdOrCtrl+["))
        .item(&item!(MenuAction::Forward, "Forward", "CmdOrCtrl+]"))
        .build()?;

    // ---------- Window ----------
    let mut window = SubmenuBuilder::new(manager, "&Window")
        .item(&PredefinedMenuItem::minimize(manager, None)?)
        .item(&PredefinedMenuItem::close_window(manager, None)?)
        .separator();
    for (index, server) in servers.iter().enumerate() {
        let action = MenuAction::SwitchServer(index);
        window = if index < 9 {
            window.item(&item!(action, &server.name, format!("CmdOrCtrl+{}", index + 1)))
        } else {
            window.item(&item!(action, &server.name))
        };
    }
    if servers.len() > 1 {
        window = window
            .separator()
            .item(&item!(MenuAction::NextServer, "Select Next Server", "Ctrl+Tab"))
            .item(&item!(MenuAction::PreviousServer, "Select Previous Server", "Ctrl+Shift+Tab"));
    }
    let window = window.build()?;

    // ---------- Help ----------
    let mut help = SubmenuBuilder::new(manager, "&Help");
    help = match update {
        UpdateMenuState::Disabled => help,
        UpdateMenuState::Check => help.item(&item!(MenuAction::CheckForUpdates, "Check for Updates")),
        UpdateMenuState::ReadyToInstall => {
            help.item(&item!(MenuAction::RestartAndUpdate, "Restart and Update"))
        }
    };
    let help = help
        .item(&PredefinedMenuItem::about(manager, Some("About Mattermost"), None)?)
        .build()?;

    // ---------- Assemble ----------
    let mut menu = MenuBuilder::new(manager);
    if is_macos {
        let app_menu = SubmenuBuilder::new(manager, "Mattermost")
            .item(&PredefinedMenuItem::about(manager, Some("About Mattermost"), None)?)
            .separator()
            .item(&item!(MenuAction::Settings, "Settings…"))
            .separator()
            .item(&PredefinedMenuItem::services(manager, None)?)
            .separator()
            .item(&PredefinedMenuItem::hide(manager, None)?)
            .item(&PredefinedMenuItem::hide_others(manager, None)?)
            .item(&PredefinedMenuItem::show_all(manager, None)?)
            .separator()
            .item(&item!(MenuAction::Quit, "Quit Mattermost", "CmdOrCtrl+Q"))
            .build()?;
        menu = menu.item(&app_menu);
    }

    menu.item(&file)
        .item(&edit)
        .item(&view)
        .item(&history)
        .item(&window)
        .item(&help)
        .build()
}
