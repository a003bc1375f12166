//! # roster-sync
//!
//! The reconciliation engine.
//!
//! Per target: resolve include/exclude [source descriptors](resolver) into
//! member sets, [combine](combine) them, [diff](diff) against the group's live
//! membership and apply the delta through a
//! [`DirectoryClient`](roster_directory::DirectoryClient), removals first.
//! [`pipeline::run`] is the entrypoint used by the CLI.

pub mod combine;
pub mod context;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod reconciler;
pub mod report;
pub mod resolver;

pub use combine::{combine, Combined, MemberSet};
pub use context::{ResolvedEndpoint, SyncContext};
pub use diff::{diff, MembershipDelta};
pub use error::{RuleSet, SyncError};
pub use pipeline::SyncScope;
pub use reconciler::{FailurePolicy, Reconciler, SyncOptions, TargetPhase};
pub use report::{RunReport, TargetCounts, TargetOutcome, TargetReport, TargetStatus, Warning};
