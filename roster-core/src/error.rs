//! Error types for roster-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::CredentialName;

/// All errors that can arise while locating, loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, unreadable file, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.roster/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The configuration file did not exist at the expected path.
    #[error("configuration not found at {path}")]
    NotFound { path: PathBuf },

    /// The file parsed but describes something the engine cannot run.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by a [`CredentialStore`](crate::credentials::CredentialStore).
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential '{name}' not found")]
    NotFound { name: CredentialName },
}
