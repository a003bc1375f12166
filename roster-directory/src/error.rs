//! Error types for roster-directory.

use std::path::PathBuf;

use roster_core::MemberId;
use thiserror::Error;

/// All errors a directory client can surface.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("group '{identity}' not found on {server}")]
    GroupNotFound { identity: String, server: String },

    #[error("object '{identity}' not found on {server}")]
    ObjectNotFound { identity: String, server: String },

    #[error("server '{server}' is unreachable")]
    ServerUnreachable { server: String },

    #[error("access denied on {server} for '{username}'")]
    AccessDenied { server: String, username: String },

    #[error("invalid search filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// Partial or total failure of an add/remove; nothing is retried.
    #[error("mutation of group '{group}' failed: {message}")]
    Mutation { group: MemberId, message: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot JSON serialization/deserialization error.
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`DirectoryError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DirectoryError {
    DirectoryError::Io {
        path: path.into(),
        source,
    }
}
