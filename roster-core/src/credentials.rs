//! Credential store — named, opaque credential handles.
//!
//! The reconciliation engine only ever passes a [`CredentialHandle`] through to
//! the directory client; it never looks inside. Handles come from a
//! [`CredentialStore`], which for the CLI is a YAML file:
//!
//! ```yaml
//! credentials:
//!   default:
//!     username: svc-roster@example.com
//!     secret: "..."
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, CredentialError};
use crate::types::CredentialName;

/// Opaque credential material, keyed by the name it was stored under.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHandle {
    name: CredentialName,
    username: String,
    secret: String,
}

impl CredentialHandle {
    pub fn new(
        name: impl Into<CredentialName>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn name(&self) -> &CredentialName {
        &self.name
    }

    /// Bind identity; for directory clients only.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Bind secret; for directory clients only.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHandle")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("secret", &"***REDACTED***")
            .finish()
    }
}

/// Name → handle lookup consulted by the resolver and reconciler.
pub trait CredentialStore {
    fn lookup(&self, name: &CredentialName) -> Result<CredentialHandle, CredentialError>;
}

/// In-memory credential store, optionally loaded from a YAML file.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    entries: BTreeMap<CredentialName, CredentialHandle>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialFile {
    #[serde(default)]
    credentials: BTreeMap<String, CredentialEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialEntry {
    username: String,
    secret: String,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a credential; builder style for tests and callers.
    pub fn with(
        mut self,
        name: impl Into<CredentialName>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.insert(CredentialHandle::new(name, username, secret));
        self
    }

    pub fn insert(&mut self, handle: CredentialHandle) {
        self.entries.insert(handle.name().clone(), handle);
    }

    pub fn names(&self) -> impl Iterator<Item = &CredentialName> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a credential file.
    ///
    /// Returns `ConfigError::NotFound` if absent,
    /// `ConfigError::Parse` (with path + line context) if malformed YAML.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let file: CredentialFile =
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        let mut store = Self::new();
        for (name, entry) in file.credentials {
            store.insert(CredentialHandle::new(name, entry.username, entry.secret));
        }
        Ok(store)
    }
}

impl CredentialStore for Credentials {
    fn lookup(&self, name: &CredentialName) -> Result<CredentialHandle, CredentialError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound { name: name.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lookup_returns_handle_by_name() {
        let store = Credentials::new().with("default", "svc", "pw");
        let handle = store.lookup(&CredentialName::from("default")).expect("lookup");
        assert_eq!(handle.username(), "svc");
        assert_eq!(handle.name(), &CredentialName::from("default"));
    }

    #[test]
    fn lookup_missing_is_not_found() {
        let store = Credentials::new();
        let err = store.lookup(&CredentialName::from("nope")).unwrap_err();
        assert!(matches!(err, CredentialError::NotFound { .. }));
        assert_eq!(err.to_string(), "credential 'nope' not found");
    }

    #[test]
    fn debug_never_prints_secret() {
        let handle = CredentialHandle::new("default", "svc", "hunter2");
        let rendered = format!("{handle:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn load_from_yaml_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("credentials.yaml");
        std::fs::write(
            &path,
            "credentials:\n  default:\n    username: a\n    secret: b\n  sync-svc:\n    username: c\n    secret: d\n",
        )
        .expect("write");
        let store = Credentials::load_at(&path).expect("load");
        assert_eq!(store.len(), 2);
        let names: Vec<_> = store.names().map(|n| n.0.as_str()).collect();
        assert_eq!(names, vec!["default", "sync-svc"]);
        let handle = store.lookup(&CredentialName::from("sync-svc")).expect("lookup");
        assert_eq!((handle.username(), handle.secret()), ("c", "d"));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let err = Credentials::load_at(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
