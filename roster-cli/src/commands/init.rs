//! `roster init [--force]`

use anyhow::{Context, Result};
use clap::Args;

use roster_core::config::{self, InitOutcome};

/// Scaffold the configuration and credential files.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite existing files with the example templates.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let outcomes = config::init(self.force).context("failed to scaffold ~/.roster")?;
        for outcome in outcomes {
            match outcome {
                InitOutcome::Created(path) => println!("✓ Wrote {}", path.display()),
                InitOutcome::Kept(path) => {
                    println!("· Kept existing {} (use --force to overwrite)", path.display())
                }
            }
        }
        println!("Edit the credentials file before running `roster sync`.");
        Ok(())
    }
}
