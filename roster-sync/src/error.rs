//! Error types for roster-sync.

use std::fmt;

use thiserror::Error;

use roster_core::{ConfigError, CredentialError, CredentialName};
use roster_directory::DirectoryError;

use crate::reconciler::TargetPhase;

/// Which rule list a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    Include,
    Exclude,
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSet::Include => write!(f, "include"),
            RuleSet::Exclude => write!(f, "exclude"),
        }
    }
}

/// All errors that can arise from a reconciliation run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad defaults, unresolvable default credential, unknown target selection.
    /// Raised before any target is processed.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("credential '{name}' not found")]
    CredentialNotFound { name: CredentialName },

    #[error("unsupported source kind '{kind}' for '{identity}'")]
    UnsupportedDescriptorKind { kind: String, identity: String },

    #[error("target group '{identity}' not found on {server}")]
    TargetNotFound { identity: String, server: String },

    #[error("directory query failed: {0}")]
    DirectoryQuery(#[source] DirectoryError),

    #[error("directory mutation failed: {0}")]
    DirectoryMutation(#[source] DirectoryError),

    /// Locates a failure at one descriptor of a target's rule lists.
    #[error("{rule}[{index}] {descriptor}: {source}")]
    Descriptor {
        rule: RuleSet,
        index: usize,
        descriptor: String,
        #[source]
        source: Box<SyncError>,
    },

    /// Locates a failure at a target and the phase it was in.
    #[error("target '{target}' failed while {phase}: {source}")]
    Target {
        target: String,
        phase: TargetPhase,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// The underlying error with target/descriptor location stripped.
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::Descriptor { source, .. } | SyncError::Target { source, .. } => {
                source.root()
            }
            other => other,
        }
    }
}

impl From<CredentialError> for SyncError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound { name } => SyncError::CredentialNotFound { name },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn located_error_names_target_descriptor_and_cause() {
        let err = SyncError::Target {
            target: "All-Staff".into(),
            phase: TargetPhase::Resolving,
            source: Box::new(SyncError::Descriptor {
                rule: RuleSet::Include,
                index: 1,
                descriptor: "group 'Engineering'".into(),
                source: Box::new(SyncError::DirectoryQuery(DirectoryError::GroupNotFound {
                    identity: "Engineering".into(),
                    server: "dc01".into(),
                })),
            }),
        };
        assert_eq!(
            err.to_string(),
            "target 'All-Staff' failed while resolving: include[1] group 'Engineering': \
             directory query failed: group 'Engineering' not found on dc01"
        );
        assert!(matches!(err.root(), SyncError::DirectoryQuery(_)));
    }

    #[test]
    fn credential_error_converts() {
        let err: SyncError = CredentialError::NotFound {
            name: CredentialName::from("svc"),
        }
        .into();
        assert!(matches!(err, SyncError::CredentialNotFound { .. }));
    }
}
