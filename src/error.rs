//! Error types shared by the stores, the server/tab model and the IPC bridge.
//!
//! Tauri commands flatten these into `String` at the command boundary; inside
//! the crate they stay typed so callers can tell "fall back to defaults" apart
//! from "this is a programming error".

use std::path::PathBuf;

/// Failures while reading or writing one of the JSON stores in the data dir.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not parseable JSON at all.
    #[error("syntax error in {path}: {source}")]
    Syntax {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The file parsed but its shape is wrong. Callers fall back to defaults.
    #[error("{0}")]
    Validation(String),
    #[error("failed to serialize store: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TabError {
    #[error("Not implemented: unknown tab type {0:?}")]
    NotImplemented(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    #[error("invalid server URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("server name must not be empty")]
    EmptyName,
    #[error("no server with id {0}")]
    NotFound(String),
    #[error("the {0} tab cannot be closed")]
    TabNotClosable(&'static str),
    #[error("reorder list does not match the configured entries")]
    BadOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("no view {0}")]
    UnknownView(String),
    #[error("view host failed: {0}")]
    Host(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("unknown channel {0:?}")]
    UnknownChannel(String),
    #[error("invalid payload on {channel}: {source}")]
    Payload {
        channel: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("message on {0} is not accepted from this sender")]
    WrongSender(String),
}
