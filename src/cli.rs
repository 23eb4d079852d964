//! Command-line arguments and deep-link URL triage.
//!
//! Launchers hand us all kinds of trailing junk after a deep link (Windows
//! appends its own flags, some Linux desktops repeat the URL), so everything
//! after the first URL-looking argument is dropped before clap sees it.

use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use url::Url;

use crate::servers::parse_server_url;

/// Custom URL scheme registered for deep links.
pub const DEEP_LINK_SCHEME: &str = "mattermost";

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "mattermost-desktop")]
#[command(version)]
#[command(about = "Mattermost Desktop")]
pub struct Args {
    /// Directory holding config.json and trustedOrigins.json
    #[arg(long = "dataDir", short = 'd', value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Allow update checks in development builds
    #[arg(long = "disableDevMode", short = 'p')]
    pub disable_dev_mode: bool,

    /// Start with the main window hidden
    #[arg(long)]
    pub hidden: bool,

    /// Start in fullscreen
    #[arg(long)]
    pub fullscreen: bool,

    /// Server URLs or mattermost:// deep links
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,
}

fn looks_like_url(arg: &str, scheme: &str) -> bool {
    arg.starts_with(&format!("{scheme}:"))
        || arg.starts_with("http://")
        || arg.starts_with("https://")
}

/// Keep `argv` up to and including the first deep link or http(s) URL.
pub fn triage_args(argv: &[String], scheme: &str) -> Vec<String> {
    match argv
        .iter()
        .skip(1)
        .position(|arg| looks_like_url(arg, scheme))
    {
        Some(index) => argv[..index + 2].to_vec(),
        None => argv.to_vec(),
    }
}

/// Parse the process arguments. Unknown flags do not abort startup; we fall
/// back to collecting positional URLs.
pub fn parse_args(argv: &[String]) -> Args {
    let argv = triage_args(argv, DEEP_LINK_SCHEME);
    match Args::try_parse_from(&argv) {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            tracing::warn!("Ignoring unrecognised arguments: {}", e.kind());
            Args {
                urls: argv
                    .iter()
                    .skip(1)
                    .filter(|arg| looks_like_url(arg, DEEP_LINK_SCHEME))
                    .cloned()
                    .collect(),
                ..Args::default()
            }
        }
    }
}

/// The deep link in `args`, if the last one uses `scheme` and parses.
pub fn deeplinking_url(args: &[String], scheme: &str) -> Option<Url> {
    let last = args.last()?;
    if !last.starts_with(&format!("{scheme}:")) {
        return None;
    }
    Url::parse(last).ok()
}

/// Map a command-line URL to the server URL it refers to:
/// `mattermost://host/path` becomes `https://host/path`; http(s) is kept.
pub fn server_url(raw: &str, scheme: &str) -> Option<Url> {
    let candidate = match raw.strip_prefix(&format!("{scheme}:")) {
        Some(rest) => format!("https:{rest}"),
        None => raw.to_string(),
    };
    parse_server_url(&candidate).ok()
}
