const COMMANDS: &[&str] = &[
    "get_config",
    "save_config",
    "push_log",
    "ipc_send",
    "request_permission",
    "get_servers",
    "add_server",
    "edit_server",
    "remove_server",
    "reorder_servers",
    "reorder_tabs",
    "open_tab",
    "close_tab",
    "get_active_view",
    "set_modal_open",
    "reload_view",
    "navigate_history",
    "get_update_status",
    "check_for_updates",
    "download_update",
    "cancel_download",
    "remind_later",
    "skip_version",
    "install_update",
];

fn main() {
    tauri_build::try_build(
        tauri_build::Attributes::new().app_manifest(tauri_build::AppManifest::new().commands(COMMANDS)),
    )
    .expect("failed to run tauri-build");
}
