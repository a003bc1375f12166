//! Roster core library — configuration model, config loading, credentials, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes, source descriptors and target definitions
//! - [`error`] — [`ConfigError`], [`CredentialError`]
//! - [`config`] — locate / load / validate / scaffold the YAML configuration
//! - [`credentials`] — opaque credential handles and the [`CredentialStore`] seam

pub mod config;
pub mod credentials;
pub mod error;
pub mod types;

pub use credentials::{CredentialHandle, CredentialStore, Credentials};
pub use error::{ConfigError, CredentialError};
pub use types::{
    Config, CredentialName, Defaults, MemberId, SearchScope, SourceDescriptor, SourceKind,
    TargetDefinition,
};
