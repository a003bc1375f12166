//! Membership diff: computed set vs. live group membership.

use serde::Serialize;

use crate::combine::MemberSet;

/// Three disjoint partitions moving `current` to `computed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipDelta {
    /// `computed − current`
    pub to_add: MemberSet,
    /// `current − computed`
    pub to_remove: MemberSet,
    /// `computed ∩ current`
    pub unchanged: MemberSet,
}

impl MembershipDelta {
    /// True when no mutation is needed.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Pure set algebra; independent of input order and idempotent:
/// `diff(S, S)` is `(∅, ∅, S)`.
pub fn diff(computed: &MemberSet, current: &MemberSet) -> MembershipDelta {
    MembershipDelta {
        to_add: computed.difference(current).cloned().collect(),
        to_remove: current.difference(computed).cloned().collect(),
        unchanged: computed.intersection(current).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use roster_core::MemberId;
    use rstest::rstest;

    use super::*;

    fn set(ids: &[&str]) -> MemberSet {
        ids.iter().map(|id| MemberId::from(*id)).collect()
    }

    #[rstest]
    #[case(&["a", "b", "c"], &["a", "b"], &["c"], &[], &["a", "b"])]
    #[case(&["a", "b"], &["a", "b", "c"], &[], &["c"], &["a", "b"])]
    #[case(&[], &["a"], &[], &["a"], &[])]
    #[case(&["a", "new"], &["a", "old"], &["new"], &["old"], &["a"])]
    #[case(&["a"], &[], &["a"], &[], &[])]
    fn partitions(
        #[case] computed: &[&str],
        #[case] current: &[&str],
        #[case] add: &[&str],
        #[case] remove: &[&str],
        #[case] unchanged: &[&str],
    ) {
        let computed = set(computed);
        let current = set(current);
        let delta = diff(&computed, &current);
        assert_eq!(delta.to_add, set(add));
        assert_eq!(delta.to_remove, set(remove));
        assert_eq!(delta.unchanged, set(unchanged));

        assert!(delta.to_add.is_disjoint(&current));
        assert!(delta.to_remove.is_subset(&current));
        let rebuilt: MemberSet = delta.unchanged.union(&delta.to_add).cloned().collect();
        assert_eq!(rebuilt, computed);
    }

    #[test]
    fn identical_sets_are_idempotent() {
        let s = set(&["a", "b"]);
        let delta = diff(&s, &s);
        assert!(delta.is_empty());
        assert_eq!(delta.unchanged, s);
        assert_eq!(diff(&s, &s), delta);
    }
}
