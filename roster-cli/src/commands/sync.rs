//! `roster sync` — reconcile target groups and write the snapshot back.

use anyhow::{Context, Result};
use clap::Args;

use roster_directory::snapshot;
use roster_sync::{pipeline, FailurePolicy, SyncOptions};

use super::ReconcileArgs;
use crate::output;

/// Arguments for `roster sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub reconcile: ReconcileArgs,

    /// Show what would change without modifying the snapshot.
    #[arg(long)]
    pub dry_run: bool,

    /// Keep processing later targets after one fails.
    #[arg(long)]
    pub continue_on_error: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let args = self.reconcile;
        let (config, credentials) = args.paths.load()?;
        let mut directory = args.load_directory()?;

        let options = SyncOptions {
            dry_run: self.dry_run,
            failure_policy: if self.continue_on_error {
                FailurePolicy::Continue
            } else {
                FailurePolicy::Abort
            },
        };
        let report = pipeline::run(&config, &credentials, &mut directory, args.scope(), options)
            .context("sync failed")?;

        // Applied changes are kept even when a later target fails.
        if !directory.mutations().is_empty() {
            snapshot::save_at(&args.snapshot, &directory).with_context(|| {
                format!("failed to write snapshot {}", args.snapshot.display())
            })?;
            tracing::info!("updated snapshot {}", args.snapshot.display());
        }

        output::print_run(&report, args.json)?;
        super::finish(&report)
    }
}
