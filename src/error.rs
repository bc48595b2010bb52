use std::{io, sync::mpsc::SendError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::LibraryEvent;

/// Crate-wide error type.
///
/// Per-entry failures during bulk operations (scans, integrity passes) are
/// collected as diagnostics on the affected entry instead of being raised
/// through this type; see [`crate::library::LibraryHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum LibraryError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("File {0} was not valid XML: {1}")]
    MalformedXml(String, String),
    #[error("Root element '{0}' maps to no known IP-XACT document kind")]
    UnsupportedKind(String),
    #[error("Document in {0} uses an unsupported legacy schema revision ({1})")]
    UnsupportedRevision(String, String),
    #[error("The referenced VLNV was not found in the library: {reference}")]
    Referential { owner: String, reference: String },
    #[error("File system error: {0}")]
    Io(String),
    #[error("VLNV {vlnv} already mapped to {existing}, ignoring {duplicate}")]
    DuplicateVlnv {
        vlnv: String,
        existing: String,
        duplicate: String,
    },
    #[error("VLNV {0} already exists in the library")]
    AlreadyExists(String),
    #[error("Operation rejected: a save transaction is in progress")]
    SaveInProgress,
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("Event channel error: {0}")]
    Channel(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<io::Error> for LibraryError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => LibraryError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => LibraryError::PermissionDenied,
            _ => LibraryError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<toml::de::Error> for LibraryError {
    fn from(src: toml::de::Error) -> LibraryError {
        LibraryError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for LibraryError {
    fn from(src: toml::ser::Error) -> LibraryError {
        LibraryError::Config(format!("Toml serialization error: {src}"))
    }
}

impl From<SendError<LibraryEvent>> for LibraryError {
    fn from(x: SendError<LibraryEvent>) -> Self {
        LibraryError::Channel(format!(
            "Could not transmit library update event {:?}, receiver disconnected",
            x.0
        ))
    }
}

impl From<notify::Error> for LibraryError {
    fn from(notify_error: notify::Error) -> Self {
        use notify::ErrorKind;
        match notify_error.kind {
            ErrorKind::PathNotFound => LibraryError::NotFound(format!(
                "notify-debouncer: path(s) not found: {:?}",
                notify_error.paths
            )),
            ErrorKind::WatchNotFound => LibraryError::NotFound(format!(
                "notify-debouncer: watch not found, paths: {:?}",
                notify_error.paths
            )),
            other => LibraryError::Io(format!(
                "notify-debouncer: {other:?}, paths: {:?}",
                notify_error.paths
            )),
        }
    }
}
