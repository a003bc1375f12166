//! Domain types for the roster configuration model.
//!
//! Everything here is built fresh from configuration or directory query results
//! on every run; nothing is persisted by the engine.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable key of a directory principal (GUID, SID, ...).
///
/// Equality, ordering and hashing are defined on the key alone; attributes the
/// directory returned alongside it never take part in set operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name under which a credential is kept in the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialName(pub String);

impl CredentialName {
    /// The distinguished name used when the configuration does not pick one.
    pub fn default_name() -> Self {
        Self::from("default")
    }
}

impl fmt::Display for CredentialName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CredentialName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CredentialName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Search scope of an organizational-unit query.
///
/// Parsed case-insensitively, so `Subtree`, `subtree` and `SUBTREE` all work;
/// `one_level`, `one-level` and `OneLevel` name the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Immediate children of the search base.
    #[default]
    OneLevel,
    /// The search base and every descendant.
    Subtree,
    /// The search base object only.
    Base,
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchScope::OneLevel => write!(f, "one_level"),
            SearchScope::Subtree => write!(f, "subtree"),
            SearchScope::Base => write!(f, "base"),
        }
    }
}

impl FromStr for SearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "onelevel" => Ok(SearchScope::OneLevel),
            "subtree" => Ok(SearchScope::Subtree),
            "base" => Ok(SearchScope::Base),
            _ => Err(format!(
                "unknown scope '{s}', expected one of OneLevel, Subtree, Base"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for SearchScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Kind-specific part of a [`SourceDescriptor`].
///
/// Tags the engine does not know are kept as [`SourceKind::Unsupported`] so the
/// failure lands on the enclosing target instead of the whole configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Group {
        recursive: bool,
    },
    OrganizationalUnit {
        scope: SearchScope,
        filter: Option<String>,
    },
    Unsupported {
        tag: String,
    },
}

impl SourceKind {
    /// Canonical tag, as written in configuration.
    pub fn tag(&self) -> &str {
        match self {
            SourceKind::Group { .. } => "group",
            SourceKind::OrganizationalUnit { .. } => "ou",
            SourceKind::Unsupported { tag } => tag,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One directory-derived source of members.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct SourceDescriptor {
    /// Group name / DN / GUID, or the OU search base.
    pub identity: String,
    /// Overrides the target's server for this source only.
    pub server: Option<String>,
    /// Overrides the target's credential for this source only.
    pub credential: Option<CredentialName>,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    pub fn group(identity: impl Into<String>, recursive: bool) -> Self {
        Self {
            identity: identity.into(),
            server: None,
            credential: None,
            kind: SourceKind::Group { recursive },
        }
    }

    pub fn organizational_unit(
        identity: impl Into<String>,
        scope: SearchScope,
        filter: Option<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            server: None,
            credential: None,
            kind: SourceKind::OrganizationalUnit { scope, filter },
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_credential(mut self, credential: impl Into<CredentialName>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind.tag(), self.identity)
    }
}

/// Wire shape of a descriptor; flattened so YAML stays one mapping per source.
///
/// Kind-specific fields are optional here so a field written for the wrong
/// kind can be rejected instead of silently dropped.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescriptor {
    kind: String,
    identity: String,
    #[serde(default)]
    server: Option<String>,
    #[serde(default)]
    credential: Option<CredentialName>,
    #[serde(default)]
    recursive: Option<bool>,
    #[serde(default)]
    scope: Option<SearchScope>,
    #[serde(default)]
    filter: Option<String>,
}

impl TryFrom<RawDescriptor> for SourceDescriptor {
    type Error = String;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        let kind = match raw.kind.to_ascii_lowercase().as_str() {
            "group" => {
                let stray = [
                    ("scope", raw.scope.is_some()),
                    ("filter", raw.filter.is_some()),
                ];
                if let Some((field, _)) = stray.iter().find(|(_, set)| *set) {
                    return Err(format!(
                        "'{field}' does not apply to group '{}'; only ou sources take it",
                        raw.identity
                    ));
                }
                SourceKind::Group {
                    recursive: raw.recursive.unwrap_or(false),
                }
            }
            "ou" | "organizational_unit" | "organizational-unit" | "organizationalunit" => {
                if raw.recursive == Some(true) {
                    return Err(format!(
                        "'recursive' does not apply to ou '{}'; use scope: subtree",
                        raw.identity
                    ));
                }
                SourceKind::OrganizationalUnit {
                    scope: raw.scope.unwrap_or_default(),
                    filter: raw.filter.filter(|f| !f.trim().is_empty()),
                }
            }
            _ => SourceKind::Unsupported { tag: raw.kind },
        };
        Ok(Self {
            identity: raw.identity,
            server: raw.server,
            credential: raw.credential,
            kind,
        })
    }
}

/// A group whose membership is reconciled, and the rules that compute it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDefinition {
    /// Identity of the group being managed.
    pub group: String,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub credential: Option<CredentialName>,
    #[serde(default)]
    pub include: Vec<SourceDescriptor>,
    #[serde(default)]
    pub exclude: Vec<SourceDescriptor>,
}

impl TargetDefinition {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            server: None,
            credential: None,
            include: vec![],
            exclude: vec![],
        }
    }

    pub fn include(mut self, descriptor: SourceDescriptor) -> Self {
        self.include.push(descriptor);
        self
    }

    pub fn exclude(mut self, descriptor: SourceDescriptor) -> Self {
        self.exclude.push(descriptor);
        self
    }
}

/// Process-wide defaults applied wherever a target or descriptor is silent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub server: String,
    #[serde(default = "CredentialName::default_name")]
    pub credential: CredentialName,
    /// ANDed with every organizational-unit filter.
    #[serde(default)]
    pub filter: Option<String>,
}

impl Defaults {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            credential: CredentialName::default_name(),
            filter: None,
        }
    }
}

/// Root of the roster YAML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub defaults: Defaults,
    #[serde(default)]
    pub targets: Vec<TargetDefinition>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(MemberId::from("S-1-5-21-1").to_string(), "S-1-5-21-1");
        assert_eq!(CredentialName::from("svc").to_string(), "svc");
    }

    #[test]
    fn member_id_equality_is_key_only() {
        let a = MemberId::from("abc");
        let b = MemberId::from(String::from("abc"));
        assert_eq!(a, b);
        assert_ne!(a, MemberId::from("ABC"));
    }

    #[test]
    fn group_descriptor_defaults_to_direct_members() {
        let d: SourceDescriptor =
            serde_yaml::from_str("kind: group\nidentity: Engineering\n").expect("parse");
        assert_eq!(d.kind, SourceKind::Group { recursive: false });
        assert_eq!(d.server, None);
        assert_eq!(d.to_string(), "group 'Engineering'");
    }

    #[test]
    fn ou_descriptor_defaults_to_one_level_without_filter() {
        let d: SourceDescriptor =
            serde_yaml::from_str("kind: OU\nidentity: OU=Staff,DC=corp\nfilter: '  '\n")
                .expect("parse");
        assert_eq!(
            d.kind,
            SourceKind::OrganizationalUnit {
                scope: SearchScope::OneLevel,
                filter: None,
            }
        );
    }

    #[test]
    fn unknown_kind_is_preserved_not_rejected() {
        let d: SourceDescriptor =
            serde_yaml::from_str("kind: dynamic_query\nidentity: x\n").expect("parse");
        assert_eq!(
            d.kind,
            SourceKind::Unsupported {
                tag: "dynamic_query".to_string()
            }
        );
        assert_eq!(d.to_string(), "dynamic_query 'x'");
    }

    #[test]
    fn unknown_descriptor_field_is_a_parse_error() {
        let err = serde_yaml::from_str::<SourceDescriptor>(
            "kind: group\nidentity: x\nrecursiv: true\n",
        );
        assert!(err.is_err());
    }

    #[test]
    fn scope_parses_any_case() {
        for raw in ["OneLevel", "one_level", "one-level", "ONELEVEL"] {
            assert_eq!(raw.parse::<SearchScope>(), Ok(SearchScope::OneLevel), "{raw}");
        }
        assert_eq!("Subtree".parse::<SearchScope>(), Ok(SearchScope::Subtree));
        assert_eq!(" base ".parse::<SearchScope>(), Ok(SearchScope::Base));
        assert!("children".parse::<SearchScope>().is_err());
    }

    #[test]
    fn group_descriptor_rejects_ou_fields() {
        let err = serde_yaml::from_str::<SourceDescriptor>(
            "kind: group\nidentity: Engineering\nfilter: '(title=Manager)'\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("'filter' does not apply"), "got: {err}");

        let err = serde_yaml::from_str::<SourceDescriptor>(
            "kind: group\nidentity: Engineering\nscope: subtree\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("'scope' does not apply"), "got: {err}");
    }

    #[test]
    fn ou_descriptor_rejects_recursive_but_tolerates_false() {
        let err = serde_yaml::from_str::<SourceDescriptor>(
            "kind: ou\nidentity: OU=Staff,DC=corp\nrecursive: true\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("'recursive' does not apply"), "got: {err}");

        let d: SourceDescriptor =
            serde_yaml::from_str("kind: ou\nidentity: OU=Staff,DC=corp\nrecursive: false\n")
                .expect("parse");
        assert!(matches!(d.kind, SourceKind::OrganizationalUnit { .. }));
    }

    #[test]
    fn defaults_credential_falls_back_to_default_name() {
        let d: Defaults = serde_yaml::from_str("server: dc01\n").expect("parse");
        assert_eq!(d.credential, CredentialName::default_name());
        assert!(d.filter.is_none());
    }

    #[test]
    fn scope_display() {
        assert_eq!(SearchScope::OneLevel.to_string(), "one_level");
        assert_eq!(SearchScope::Subtree.to_string(), "subtree");
    }
}
