//! The directory client seam.

use roster_core::{CredentialHandle, MemberId, SearchScope};

use crate::error::DirectoryError;

/// Where a directory call goes and who makes it.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub server: &'a str,
    pub credential: &'a CredentialHandle,
}

impl<'a> Endpoint<'a> {
    pub fn new(server: &'a str, credential: &'a CredentialHandle) -> Self {
        Self { server, credential }
    }
}

/// Blocking read/write access to a directory service.
///
/// Every call is independent: implementations must not retry, and errors are
/// returned as soon as they happen.
pub trait DirectoryClient {
    /// Key of the group named by `identity`.
    ///
    /// Fails with [`DirectoryError::GroupNotFound`] when no such group exists.
    fn resolve_group(
        &mut self,
        identity: &str,
        endpoint: &Endpoint<'_>,
    ) -> Result<MemberId, DirectoryError>;

    /// Direct members of a group, or (with `recursive`) every non-group
    /// principal reachable through nested groups.
    fn query_group_members(
        &mut self,
        identity: &str,
        recursive: bool,
        endpoint: &Endpoint<'_>,
    ) -> Result<Vec<MemberId>, DirectoryError>;

    /// Objects under `search_base` within `scope` that match `filter`.
    fn query_objects(
        &mut self,
        search_base: &str,
        scope: SearchScope,
        filter: Option<&str>,
        endpoint: &Endpoint<'_>,
    ) -> Result<Vec<MemberId>, DirectoryError>;

    fn add_members(
        &mut self,
        group: &MemberId,
        members: &[MemberId],
        endpoint: &Endpoint<'_>,
    ) -> Result<(), DirectoryError>;

    fn remove_members(
        &mut self,
        group: &MemberId,
        members: &[MemberId],
        endpoint: &Endpoint<'_>,
    ) -> Result<(), DirectoryError>;
}
