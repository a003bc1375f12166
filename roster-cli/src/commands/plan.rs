//! `roster plan` — compute deltas against a snapshot without changing it.

use anyhow::{Context, Result};
use clap::Args;

use roster_sync::{pipeline, SyncOptions};

use super::ReconcileArgs;
use crate::output;

/// Arguments for `roster plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub reconcile: ReconcileArgs,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let args = self.reconcile;
        let (config, credentials) = args.paths.load()?;
        let mut directory = args.load_directory()?;

        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let report = pipeline::run(&config, &credentials, &mut directory, args.scope(), options)
            .context("plan failed")?;

        output::print_run(&report, args.json)?;
        super::finish(&report)
    }
}
