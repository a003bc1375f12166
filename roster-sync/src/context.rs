//! Immutable run context: defaults and credential lookup.
//!
//! Built once per run and passed by reference to every resolver and
//! reconciler call. Nothing here changes while targets are processed.

use roster_core::{
    ConfigError, CredentialHandle, CredentialName, CredentialStore, Defaults, SourceDescriptor,
    TargetDefinition,
};
use roster_directory::Endpoint;

use crate::error::SyncError;

/// A server plus the credential handle to use against it.
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub server: String,
    pub credential: CredentialHandle,
}

impl ResolvedEndpoint {
    pub fn as_endpoint(&self) -> Endpoint<'_> {
        Endpoint::new(&self.server, &self.credential)
    }
}

pub struct SyncContext<'a> {
    defaults: &'a Defaults,
    credentials: &'a dyn CredentialStore,
    default_credential: CredentialHandle,
}

impl<'a> SyncContext<'a> {
    /// Resolve the default credential once; failure is a configuration error.
    pub fn new(
        defaults: &'a Defaults,
        credentials: &'a dyn CredentialStore,
    ) -> Result<Self, SyncError> {
        if defaults.server.trim().is_empty() {
            return Err(ConfigError::Invalid("default server must not be empty".into()).into());
        }
        let default_credential = credentials.lookup(&defaults.credential).map_err(|_| {
            ConfigError::Invalid(format!(
                "default credential '{}' is not in the credential store",
                defaults.credential
            ))
        })?;
        Ok(Self {
            defaults,
            credentials,
            default_credential,
        })
    }

    pub fn default_server(&self) -> &str {
        &self.defaults.server
    }

    pub fn default_filter(&self) -> Option<&str> {
        self.defaults.filter.as_deref()
    }

    pub fn lookup(&self, name: &CredentialName) -> Result<CredentialHandle, SyncError> {
        Ok(self.credentials.lookup(name)?)
    }

    /// Endpoint for a target: its own overrides, else the global defaults.
    pub fn target_endpoint(&self, target: &TargetDefinition) -> Result<ResolvedEndpoint, SyncError> {
        let server = target
            .server
            .clone()
            .unwrap_or_else(|| self.defaults.server.clone());
        let credential = match &target.credential {
            Some(name) => self.lookup(name)?,
            None => self.default_credential.clone(),
        };
        Ok(ResolvedEndpoint { server, credential })
    }

    /// Endpoint for a descriptor: its own overrides, else the target's endpoint.
    pub fn descriptor_endpoint(
        &self,
        descriptor: &SourceDescriptor,
        target: &ResolvedEndpoint,
    ) -> Result<ResolvedEndpoint, SyncError> {
        let server = descriptor
            .server
            .clone()
            .unwrap_or_else(|| target.server.clone());
        let credential = match &descriptor.credential {
            Some(name) => self.lookup(name)?,
            None => target.credential.clone(),
        };
        Ok(ResolvedEndpoint { server, credential })
    }
}
