//! In-memory directory service.
//!
//! Holds one object tree per server. Groups are found by id, DN or name
//! (case-insensitive); OU queries walk DNs; recursive membership is a
//! breadth-first expansion with cycle detection. Every call is recorded in
//! [`MemoryDirectory::calls`] so callers can check what was asked, against
//! which server, with which account, and in which order.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use roster_core::{MemberId, SearchScope};

use crate::client::{DirectoryClient, Endpoint};
use crate::error::DirectoryError;
use crate::filter::{Attributes, Filter};

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Structural class of a directory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    #[default]
    User,
    Computer,
    Contact,
    Group,
    OrganizationalUnit,
    Container,
}

impl ObjectClass {
    /// `objectClass` values as Active Directory reports them.
    fn hierarchy(self) -> &'static [&'static str] {
        match self {
            ObjectClass::User => &["top", "person", "organizationalPerson", "user"],
            ObjectClass::Computer => &["top", "person", "organizationalPerson", "user", "computer"],
            ObjectClass::Contact => &["top", "person", "organizationalPerson", "contact"],
            ObjectClass::Group => &["top", "group"],
            ObjectClass::OrganizationalUnit => &["top", "organizationalUnit"],
            ObjectClass::Container => &["top", "container"],
        }
    }
}

/// One entry in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryObject {
    pub id: MemberId,
    pub dn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub class: ObjectClass,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Direct member keys; groups only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberId>,
}

impl DirectoryObject {
    pub fn new(id: impl Into<MemberId>, dn: impl Into<String>, class: ObjectClass) -> Self {
        Self {
            id: id.into(),
            dn: dn.into(),
            name: None,
            class,
            attributes: BTreeMap::new(),
            members: vec![],
        }
    }

    pub fn user(id: impl Into<MemberId>, dn: impl Into<String>) -> Self {
        Self::new(id, dn, ObjectClass::User)
    }

    pub fn group(
        id: impl Into<MemberId>,
        name: impl Into<String>,
        dn: impl Into<String>,
        members: impl IntoIterator<Item = MemberId>,
    ) -> Self {
        let mut object = Self::new(id, dn, ObjectClass::Group).named(name);
        object.members = members.into_iter().collect();
        object
    }

    pub fn organizational_unit(dn: impl Into<String>) -> Self {
        let dn = dn.into();
        Self::new(format!("ou:{}", dn.to_lowercase()), dn, ObjectClass::OrganizationalUnit)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    fn is_group(&self) -> bool {
        self.class == ObjectClass::Group
    }

    /// OUs and containers hold objects; they can never be group members.
    fn is_container(&self) -> bool {
        matches!(
            self.class,
            ObjectClass::OrganizationalUnit | ObjectClass::Container
        )
    }

    fn answers_to(&self, identity: &str) -> bool {
        self.id.as_str() == identity
            || self.dn.eq_ignore_ascii_case(identity)
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(identity))
    }
}

impl Attributes for DirectoryObject {
    fn values(&self, attribute: &str) -> Vec<&str> {
        if attribute.eq_ignore_ascii_case("objectClass") {
            return self.class.hierarchy().to_vec();
        }
        if attribute.eq_ignore_ascii_case("distinguishedName") {
            return vec![self.dn.as_str()];
        }
        if attribute.eq_ignore_ascii_case("objectGUID") {
            return vec![self.id.as_str()];
        }
        if let Some(value) = self
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(attribute))
            .map(|(_, v)| v.as_str())
        {
            return vec![value];
        }
        if attribute.eq_ignore_ascii_case("name") || attribute.eq_ignore_ascii_case("cn") {
            return self.name.as_deref().into_iter().collect();
        }
        vec![]
    }
}

/// Objects held by one server, plus the bind accounts it accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDirectory {
    /// When non-empty, only these usernames may bind.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub objects: Vec<DirectoryObject>,
}

/// Recorded directory call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCall {
    pub server: String,
    pub username: String,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ResolveGroup {
        identity: String,
    },
    QueryGroupMembers {
        identity: String,
        recursive: bool,
    },
    QueryObjects {
        search_base: String,
        scope: SearchScope,
        filter: Option<String>,
    },
    AddMembers {
        group: MemberId,
        members: Vec<MemberId>,
    },
    RemoveMembers {
        group: MemberId,
        members: Vec<MemberId>,
    },
}

impl Operation {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::AddMembers { .. } | Operation::RemoveMembers { .. }
        )
    }
}

/// Which mutation an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MutationKind {
    Add,
    Remove,
}

// ---------------------------------------------------------------------------
// MemoryDirectory
// ---------------------------------------------------------------------------

/// A directory service held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    servers: BTreeMap<String, ServerDirectory>,
    calls: Vec<DirectoryCall>,
    rejected: BTreeSet<(MutationKind, MemberId)>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_servers(servers: BTreeMap<String, ServerDirectory>) -> Self {
        Self {
            servers,
            ..Self::default()
        }
    }

    pub fn servers(&self) -> &BTreeMap<String, ServerDirectory> {
        &self.servers
    }

    /// Add an object to `server`, creating the server on first use.
    pub fn insert(&mut self, server: &str, object: DirectoryObject) {
        self.servers
            .entry(server.to_string())
            .or_default()
            .objects
            .push(object);
    }

    /// Builder form of [`MemoryDirectory::insert`].
    pub fn with(mut self, server: &str, object: DirectoryObject) -> Self {
        self.insert(server, object);
        self
    }

    /// Restrict binds on `server` to the listed usernames.
    pub fn restrict_accounts(&mut self, server: &str, accounts: &[&str]) {
        self.servers.entry(server.to_string()).or_default().accounts =
            accounts.iter().map(|a| a.to_string()).collect();
    }

    /// Make every later `kind` mutation of `group` fail.
    pub fn reject_mutation(&mut self, kind: MutationKind, group: impl Into<MemberId>) {
        self.rejected.insert((kind, group.into()));
    }

    pub fn calls(&self) -> &[DirectoryCall] {
        &self.calls
    }

    pub fn mutations(&self) -> Vec<&DirectoryCall> {
        self.calls
            .iter()
            .filter(|c| c.operation.is_mutation())
            .collect()
    }

    /// Current direct members of a group, by id; `None` if no such group.
    pub fn members_of(&self, server: &str, group: &MemberId) -> Option<BTreeSet<MemberId>> {
        self.servers
            .get(server)?
            .objects
            .iter()
            .find(|o| o.is_group() && &o.id == group)
            .map(|o| o.members.iter().cloned().collect())
    }

    fn record(&mut self, endpoint: &Endpoint<'_>, operation: Operation) {
        tracing::debug!(server = endpoint.server, ?operation, "directory call");
        self.calls.push(DirectoryCall {
            server: endpoint.server.to_string(),
            username: endpoint.credential.username().to_string(),
            operation,
        });
    }

    fn bind(&self, endpoint: &Endpoint<'_>) -> Result<&ServerDirectory, DirectoryError> {
        let server = self
            .servers
            .get(endpoint.server)
            .ok_or_else(|| DirectoryError::ServerUnreachable {
                server: endpoint.server.to_string(),
            })?;
        check_account(server, endpoint)?;
        Ok(server)
    }

    fn bind_mut(&mut self, endpoint: &Endpoint<'_>) -> Result<&mut ServerDirectory, DirectoryError> {
        let server = self
            .servers
            .get_mut(endpoint.server)
            .ok_or_else(|| DirectoryError::ServerUnreachable {
                server: endpoint.server.to_string(),
            })?;
        check_account(server, endpoint)?;
        Ok(server)
    }

    fn check_rejected(&self, kind: MutationKind, group: &MemberId) -> Result<(), DirectoryError> {
        if self.rejected.contains(&(kind, group.clone())) {
            return Err(DirectoryError::Mutation {
                group: group.clone(),
                message: "rejected by directory".to_string(),
            });
        }
        Ok(())
    }
}

fn check_account(server: &ServerDirectory, endpoint: &Endpoint<'_>) -> Result<(), DirectoryError> {
    let username = endpoint.credential.username();
    if !server.accounts.is_empty() && !server.accounts.iter().any(|a| a == username) {
        return Err(DirectoryError::AccessDenied {
            server: endpoint.server.to_string(),
            username: username.to_string(),
        });
    }
    Ok(())
}

fn find_group<'a>(
    server: &'a ServerDirectory,
    identity: &str,
    server_name: &str,
) -> Result<&'a DirectoryObject, DirectoryError> {
    server
        .objects
        .iter()
        .find(|o| o.is_group() && o.answers_to(identity))
        .ok_or_else(|| DirectoryError::GroupNotFound {
            identity: identity.to_string(),
            server: server_name.to_string(),
        })
}

/// Expand nested groups breadth-first; only non-group principals are returned.
///
/// Member keys that do not resolve to a local object (foreign principals) are
/// returned as-is.
fn expand_nested(server: &ServerDirectory, root: &DirectoryObject) -> Vec<MemberId> {
    let mut effective = Vec::new();
    let mut seen_members: HashSet<&MemberId> = HashSet::new();
    let mut visited_groups: HashSet<&MemberId> = HashSet::from([&root.id]);
    let mut queue: VecDeque<&MemberId> = root.members.iter().collect();
    let mut cycles = 0usize;

    while let Some(member) = queue.pop_front() {
        match server.objects.iter().find(|o| &o.id == member) {
            Some(object) if object.is_group() => {
                if !visited_groups.insert(&object.id) {
                    cycles += 1;
                    continue;
                }
                queue.extend(object.members.iter());
            }
            _ => {
                if seen_members.insert(member) {
                    effective.push(member.clone());
                }
            }
        }
    }

    if cycles > 0 {
        tracing::warn!(group = %root.id, cycles, "circular group nesting detected");
    }
    effective
}

/// Parent DN: everything after the first unescaped comma.
fn parent_dn(dn: &str) -> Option<&str> {
    let mut escaped = false;
    for (idx, c) in dn.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return Some(dn[idx + 1..].trim_start()),
            _ => escaped = false,
        }
    }
    None
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => dn.eq_ignore_ascii_case(base),
        SearchScope::OneLevel => parent_dn(dn).is_some_and(|p| p.eq_ignore_ascii_case(base)),
        SearchScope::Subtree => {
            let mut current = Some(dn);
            while let Some(candidate) = current {
                if candidate.eq_ignore_ascii_case(base) {
                    return true;
                }
                current = parent_dn(candidate);
            }
            false
        }
    }
}

impl DirectoryClient for MemoryDirectory {
    fn resolve_group(
        &mut self,
        identity: &str,
        endpoint: &Endpoint<'_>,
    ) -> Result<MemberId, DirectoryError> {
        self.record(
            endpoint,
            Operation::ResolveGroup {
                identity: identity.to_string(),
            },
        );
        let server = self.bind(endpoint)?;
        Ok(find_group(server, identity, endpoint.server)?.id.clone())
    }

    fn query_group_members(
        &mut self,
        identity: &str,
        recursive: bool,
        endpoint: &Endpoint<'_>,
    ) -> Result<Vec<MemberId>, DirectoryError> {
        self.record(
            endpoint,
            Operation::QueryGroupMembers {
                identity: identity.to_string(),
                recursive,
            },
        );
        let server = self.bind(endpoint)?;
        let group = find_group(server, identity, endpoint.server)?;
        if recursive {
            Ok(expand_nested(server, group))
        } else {
            Ok(group.members.clone())
        }
    }

    fn query_objects(
        &mut self,
        search_base: &str,
        scope: SearchScope,
        filter: Option<&str>,
        endpoint: &Endpoint<'_>,
    ) -> Result<Vec<MemberId>, DirectoryError> {
        self.record(
            endpoint,
            Operation::QueryObjects {
                search_base: search_base.to_string(),
                scope,
                filter: filter.map(str::to_string),
            },
        );
        let filter = filter.map(Filter::parse).transpose()?;
        let server = self.bind(endpoint)?;
        if !server
            .objects
            .iter()
            .any(|o| o.dn.eq_ignore_ascii_case(search_base))
        {
            return Err(DirectoryError::ObjectNotFound {
                identity: search_base.to_string(),
                server: endpoint.server.to_string(),
            });
        }

        Ok(server
            .objects
            .iter()
            .filter(|o| in_scope(&o.dn, search_base, scope))
            .filter(|o| filter.as_ref().map_or(true, |f| f.matches(*o)))
            .map(|o| o.id.clone())
            .collect())
    }

    fn add_members(
        &mut self,
        group: &MemberId,
        members: &[MemberId],
        endpoint: &Endpoint<'_>,
    ) -> Result<(), DirectoryError> {
        self.record(
            endpoint,
            Operation::AddMembers {
                group: group.clone(),
                members: members.to_vec(),
            },
        );
        self.check_rejected(MutationKind::Add, group)?;
        let server_name = endpoint.server;
        let server = self.bind_mut(endpoint)?;

        let unknown: Vec<&MemberId> = members
            .iter()
            .filter(|m| !server.objects.iter().any(|o| &o.id == *m))
            .collect();
        if !unknown.is_empty() {
            return Err(DirectoryError::Mutation {
                group: group.clone(),
                message: format!("{} member(s) do not exist: {}", unknown.len(), join(&unknown)),
            });
        }

        let containers: Vec<&MemberId> = members
            .iter()
            .filter(|m| {
                server
                    .objects
                    .iter()
                    .any(|o| &o.id == *m && o.is_container())
            })
            .collect();
        if !containers.is_empty() {
            return Err(DirectoryError::Mutation {
                group: group.clone(),
                message: format!(
                    "{} member(s) are containers, not principals: {}",
                    containers.len(),
                    join(&containers)
                ),
            });
        }

        let target = server
            .objects
            .iter_mut()
            .find(|o| o.is_group() && &o.id == group)
            .ok_or_else(|| DirectoryError::GroupNotFound {
                identity: group.to_string(),
                server: server_name.to_string(),
            })?;
        for member in members {
            if !target.members.contains(member) {
                target.members.push(member.clone());
            }
        }
        Ok(())
    }

    fn remove_members(
        &mut self,
        group: &MemberId,
        members: &[MemberId],
        endpoint: &Endpoint<'_>,
    ) -> Result<(), DirectoryError> {
        self.record(
            endpoint,
            Operation::RemoveMembers {
                group: group.clone(),
                members: members.to_vec(),
            },
        );
        self.check_rejected(MutationKind::Remove, group)?;
        let server_name = endpoint.server;
        let server = self.bind_mut(endpoint)?;
        let target = server
            .objects
            .iter_mut()
            .find(|o| o.is_group() && &o.id == group)
            .ok_or_else(|| DirectoryError::GroupNotFound {
                identity: group.to_string(),
                server: server_name.to_string(),
            })?;

        let absent: Vec<&MemberId> = members
            .iter()
            .filter(|m| !target.members.contains(*m))
            .collect();
        if !absent.is_empty() {
            return Err(DirectoryError::Mutation {
                group: group.clone(),
                message: format!("{} member(s) are not members: {}", absent.len(), join(&absent)),
            });
        }
        target.members.retain(|m| !members.contains(m));
        Ok(())
    }
}

fn join(ids: &[&MemberId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
