//! Per-target and per-run outcome reporting.

use std::fmt;

use chrono::{DateTime, Utc};
use roster_core::MemberId;

use crate::diff::MembershipDelta;
use crate::error::SyncError;

/// Non-fatal conditions surfaced alongside a target's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Target has neither include nor exclude descriptors; the group is emptied.
    NoSourceRules,
    /// Target has exclude descriptors only; the group is emptied.
    IncludeRulesEmpty,
    /// The target group resolved into its own computed set and was dropped.
    SelfMembershipFiltered { group: MemberId },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NoSourceRules => {
                write!(f, "no include or exclude rules: every current member will be removed")
            }
            Warning::IncludeRulesEmpty => {
                write!(f, "exclude rules without include rules: every current member will be removed")
            }
            Warning::SelfMembershipFiltered { group } => {
                write!(f, "group {group} resolved into its own membership and was skipped")
            }
        }
    }
}

/// Set sizes seen while processing one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetCounts {
    pub candidates: usize,
    pub excluded: usize,
    pub computed: usize,
    pub current: usize,
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Result of a successfully reconciled target.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: String,
    pub server: String,
    pub group_id: MemberId,
    pub counts: TargetCounts,
    pub delta: MembershipDelta,
    /// False for dry runs and for targets that were already in sync.
    pub applied: bool,
    pub warnings: Vec<Warning>,
}

#[derive(Debug)]
pub enum TargetStatus {
    Done(TargetReport),
    Failed(SyncError),
    /// Not attempted because an earlier target aborted the run.
    Skipped,
}

#[derive(Debug)]
pub struct TargetOutcome {
    pub target: String,
    pub status: TargetStatus,
}

/// Everything one run did, in target order.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub outcomes: Vec<TargetOutcome>,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &SyncError)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            TargetStatus::Failed(err) => Some((o.target.as_str(), err)),
            _ => None,
        })
    }

    pub fn first_failure(&self) -> Option<&SyncError> {
        self.failures().next().map(|(_, err)| err)
    }

    pub fn is_success(&self) -> bool {
        self.first_failure().is_none()
    }

    pub fn completed(&self) -> impl Iterator<Item = &TargetReport> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            TargetStatus::Done(report) => Some(report),
            _ => None,
        })
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TargetStatus::Skipped))
            .count()
    }
}
