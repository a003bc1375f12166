//! Set combinator: union of includes minus union of excludes.

use std::collections::BTreeSet;

use roster_core::MemberId;

use crate::report::Warning;

/// Deduplicated, deterministically ordered set of member keys.
pub type MemberSet = BTreeSet<MemberId>;

/// Output of [`combine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combined {
    /// Union of every include descriptor's members.
    pub candidates: MemberSet,
    /// Union of every exclude descriptor's members.
    pub excluded: MemberSet,
    /// `candidates − excluded`.
    pub computed: MemberSet,
    pub warning: Option<Warning>,
}

/// Union a list of resolved sets.
pub fn union<'a>(sets: impl IntoIterator<Item = &'a MemberSet>) -> MemberSet {
    sets.into_iter().flatten().cloned().collect()
}

/// Combine per-descriptor include and exclude sets.
///
/// Exclusion always wins. With no include descriptors the result is empty,
/// which is valid (it empties the group) but flagged with a [`Warning`].
pub fn combine(include: &[MemberSet], exclude: &[MemberSet]) -> Combined {
    let candidates = union(include);
    let excluded = union(exclude);
    let computed: MemberSet = candidates.difference(&excluded).cloned().collect();

    let warning = match (include.is_empty(), exclude.is_empty()) {
        (true, true) => Some(Warning::NoSourceRules),
        (true, false) => Some(Warning::IncludeRulesEmpty),
        _ => None,
    };

    Combined {
        candidates,
        excluded,
        computed,
        warning,
    }
}
