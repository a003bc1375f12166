//! Source descriptor resolution.
//!
//! Each descriptor becomes a [`MemberSet`] via one directory call. Server and
//! credential cascade from descriptor to target to defaults; OU filters are
//! ANDed with the default filter.

use roster_core::{SourceDescriptor, SourceKind};
use roster_directory::DirectoryClient;

use crate::combine::MemberSet;
use crate::context::{ResolvedEndpoint, SyncContext};
use crate::error::{RuleSet, SyncError};

/// Resolve one descriptor against the directory.
pub fn resolve<D>(
    client: &mut D,
    descriptor: &SourceDescriptor,
    target: &ResolvedEndpoint,
    ctx: &SyncContext<'_>,
) -> Result<MemberSet, SyncError>
where
    D: DirectoryClient + ?Sized,
{
    let resolved = ctx.descriptor_endpoint(descriptor, target)?;
    let endpoint = resolved.as_endpoint();

    let members = match &descriptor.kind {
        SourceKind::Group { recursive } => client
            .query_group_members(&descriptor.identity, *recursive, &endpoint)
            .map_err(SyncError::DirectoryQuery)?,
        SourceKind::OrganizationalUnit { scope, filter } => {
            let filter = compose_filter(ctx.default_filter(), filter.as_deref());
            client
                .query_objects(&descriptor.identity, *scope, filter.as_deref(), &endpoint)
                .map_err(SyncError::DirectoryQuery)?
        }
        SourceKind::Unsupported { tag } => {
            return Err(SyncError::UnsupportedDescriptorKind {
                kind: tag.clone(),
                identity: descriptor.identity.clone(),
            })
        }
    };

    tracing::debug!(
        "{descriptor} on {}: {} member(s)",
        resolved.server,
        members.len()
    );
    Ok(members.into_iter().collect())
}

/// Resolve a rule list in order, one set per descriptor.
///
/// Fails on the first descriptor that fails; the error records its position.
pub fn resolve_each<D>(
    client: &mut D,
    descriptors: &[SourceDescriptor],
    rule: RuleSet,
    target: &ResolvedEndpoint,
    ctx: &SyncContext<'_>,
) -> Result<Vec<MemberSet>, SyncError>
where
    D: DirectoryClient + ?Sized,
{
    descriptors
        .iter()
        .enumerate()
        .map(|(index, descriptor)| {
            resolve(&mut *client, descriptor, target, ctx).map_err(|source| SyncError::Descriptor {
                rule,
                index,
                descriptor: descriptor.to_string(),
                source: Box::new(source),
            })
        })
        .collect()
}

/// `(&(default)(own))` when both are set, else whichever is set.
pub fn compose_filter(default: Option<&str>, own: Option<&str>) -> Option<String> {
    let default = default.map(str::trim).filter(|f| !f.is_empty());
    let own = own.map(str::trim).filter(|f| !f.is_empty());
    match (default, own) {
        (Some(d), Some(o)) => Some(format!("(&{}{})", parenthesize(d), parenthesize(o))),
        (Some(f), None) | (None, Some(f)) => Some(f.to_string()),
        (None, None) => None,
    }
}

fn parenthesize(filter: &str) -> String {
    if filter.starts_with('(') {
        filter.to_string()
    } else {
        format!("({filter})")
    }
}
