//! Per-target reconciliation and the run loop.

use std::fmt;

use chrono::Utc;
use roster_core::{MemberId, TargetDefinition};
use roster_directory::{DirectoryClient, DirectoryError};

use crate::combine::{combine, MemberSet};
use crate::context::{ResolvedEndpoint, SyncContext};
use crate::diff::diff;
use crate::error::{RuleSet, SyncError};
use crate::report::{
    RunReport, TargetCounts, TargetOutcome, TargetReport, TargetStatus, Warning,
};
use crate::resolver::resolve_each;

/// Where a target is in `Resolving → Diffing → Applying → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    Resolving,
    Diffing,
    Applying,
    Done,
    Failed,
}

impl fmt::Display for TargetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetPhase::Resolving => "resolving",
            TargetPhase::Diffing => "diffing",
            TargetPhase::Applying => "applying",
            TargetPhase::Done => "done",
            TargetPhase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// What happens to the remaining targets after one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop; later targets are reported as skipped. Nothing is rolled back.
    #[default]
    Abort,
    /// Record the failure and move on to the next target.
    Continue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Compute and report the delta without mutating the directory.
    pub dry_run: bool,
    pub failure_policy: FailurePolicy,
}

/// Drives targets through the directory client one at a time.
pub struct Reconciler<'a, D: DirectoryClient + ?Sized> {
    client: &'a mut D,
    ctx: &'a SyncContext<'a>,
    options: SyncOptions,
}

impl<'a, D: DirectoryClient + ?Sized> Reconciler<'a, D> {
    pub fn new(client: &'a mut D, ctx: &'a SyncContext<'a>, options: SyncOptions) -> Self {
        Self {
            client,
            ctx,
            options,
        }
    }

    /// Process every target in order, honouring the failure policy.
    pub fn run(&mut self, targets: &[TargetDefinition]) -> RunReport {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(targets.len());
        let mut aborted = false;

        for target in targets {
            if aborted {
                tracing::debug!("skipping target '{}' after earlier failure", target.group);
                outcomes.push(TargetOutcome {
                    target: target.group.clone(),
                    status: TargetStatus::Skipped,
                });
                continue;
            }
            let status = match self.reconcile_target(target) {
                Ok(report) => TargetStatus::Done(report),
                Err(err) => {
                    tracing::error!("{err}");
                    aborted = self.options.failure_policy == FailurePolicy::Abort;
                    TargetStatus::Failed(err)
                }
            };
            outcomes.push(TargetOutcome {
                target: target.group.clone(),
                status,
            });
        }

        RunReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: self.options.dry_run,
            outcomes,
        }
    }

    /// Reconcile one target group. Errors carry the target and the phase.
    ///
    /// A removal already applied stays applied if the subsequent add fails.
    pub fn reconcile_target(&mut self, target: &TargetDefinition) -> Result<TargetReport, SyncError> {
        let mut phase = TargetPhase::Resolving;
        self.reconcile_in(target, &mut phase).map_err(|source| {
            tracing::debug!("target '{}': {phase} -> {}", target.group, TargetPhase::Failed);
            SyncError::Target {
                target: target.group.clone(),
                phase,
                source: Box::new(source),
            }
        })
    }

    fn reconcile_in(
        &mut self,
        target: &TargetDefinition,
        phase: &mut TargetPhase,
    ) -> Result<TargetReport, SyncError> {
        let endpoint = self.ctx.target_endpoint(target)?;
        tracing::debug!("target '{}': {phase} on {}", target.group, endpoint.server);

        let group_id = self.resolve_target_group(target, &endpoint)?;
        let include = resolve_each(
            &mut *self.client,
            &target.include,
            RuleSet::Include,
            &endpoint,
            self.ctx,
        )?;
        let exclude = resolve_each(
            &mut *self.client,
            &target.exclude,
            RuleSet::Exclude,
            &endpoint,
            self.ctx,
        )?;

        let combined = combine(&include, &exclude);
        let mut warnings: Vec<Warning> = combined.warning.into_iter().collect();
        let mut computed = combined.computed;
        if computed.remove(&group_id) {
            warnings.push(Warning::SelfMembershipFiltered {
                group: group_id.clone(),
            });
        }
        for warning in &warnings {
            tracing::warn!("target '{}': {warning}", target.group);
        }

        self.advance(target, phase, TargetPhase::Diffing);
        let current: MemberSet = self
            .client
            .query_group_members(group_id.as_str(), false, &endpoint.as_endpoint())
            .map_err(SyncError::DirectoryQuery)?
            .into_iter()
            .collect();
        let delta = diff(&computed, &current);

        let counts = TargetCounts {
            candidates: combined.candidates.len(),
            excluded: combined.excluded.len(),
            computed: computed.len(),
            current: current.len(),
            added: delta.to_add.len(),
            removed: delta.to_remove.len(),
            unchanged: delta.unchanged.len(),
        };

        let mut applied = false;
        if self.options.dry_run {
            tracing::debug!("target '{}': dry run, nothing applied", target.group);
        } else {
            self.advance(target, phase, TargetPhase::Applying);
            applied = self.apply(&group_id, &delta.to_remove, &delta.to_add, &endpoint)?;
        }
        self.advance(target, phase, TargetPhase::Done);

        tracing::info!(
            "{}{}: {} candidate(s), {} excluded, {} computed, +{} -{} ={}",
            if self.options.dry_run { "[dry-run] " } else { "" },
            target.group,
            counts.candidates,
            counts.excluded,
            counts.computed,
            counts.added,
            counts.removed,
            counts.unchanged
        );

        Ok(TargetReport {
            target: target.group.clone(),
            server: endpoint.server,
            group_id,
            counts,
            delta,
            applied,
            warnings,
        })
    }

    fn resolve_target_group(
        &mut self,
        target: &TargetDefinition,
        endpoint: &ResolvedEndpoint,
    ) -> Result<MemberId, SyncError> {
        self.client
            .resolve_group(&target.group, &endpoint.as_endpoint())
            .map_err(|err| match err {
                DirectoryError::GroupNotFound { identity, server } => {
                    SyncError::TargetNotFound { identity, server }
                }
                other => SyncError::DirectoryQuery(other),
            })
    }

    /// Remove first, then add. Returns whether anything was sent.
    fn apply(
        &mut self,
        group: &MemberId,
        to_remove: &MemberSet,
        to_add: &MemberSet,
        endpoint: &ResolvedEndpoint,
    ) -> Result<bool, SyncError> {
        let ep = endpoint.as_endpoint();
        if !to_remove.is_empty() {
            let members: Vec<MemberId> = to_remove.iter().cloned().collect();
            self.client
                .remove_members(group, &members, &ep)
                .map_err(SyncError::DirectoryMutation)?;
        }
        if !to_add.is_empty() {
            let members: Vec<MemberId> = to_add.iter().cloned().collect();
            self.client
                .add_members(group, &members, &ep)
                .map_err(SyncError::DirectoryMutation)?;
        }
        Ok(!to_remove.is_empty() || !to_add.is_empty())
    }

    fn advance(&self, target: &TargetDefinition, phase: &mut TargetPhase, next: TargetPhase) {
        tracing::debug!("target '{}': {phase} -> {next}", target.group);
        *phase = next;
    }
}
