//! Subcommands and the arguments they share.

pub mod check;
pub mod init;
pub mod plan;
pub mod sync;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use roster_core::{config, Config, Credentials};
use roster_directory::{snapshot, MemoryDirectory};
use roster_sync::{RunReport, SyncScope};

/// Where configuration and credentials are read from.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file [default: ~/.roster/config.yaml].
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Credential file [default: ~/.roster/credentials.yaml].
    #[arg(long, value_name = "PATH")]
    pub credentials: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config::config_path().context("could not locate configuration"),
        }
    }

    pub fn credentials_path(&self) -> Result<PathBuf> {
        match &self.credentials {
            Some(path) => Ok(path.clone()),
            None => config::credentials_path().context("could not locate credentials"),
        }
    }

    /// Load and validate both files.
    pub fn load(&self) -> Result<(Config, Credentials)> {
        let config_path = self.config_path()?;
        let config = config::load_at(&config_path)
            .context("failed to load configuration; run `roster init` first")?;
        let credentials_path = self.credentials_path()?;
        let credentials = Credentials::load_at(&credentials_path).with_context(|| {
            format!(
                "failed to load credentials from {}",
                credentials_path.display()
            )
        })?;
        Ok((config, credentials))
    }
}

/// Arguments shared by `plan` and `sync`.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Reconcile only this target group (default: every target).
    pub target: Option<String>,

    /// JSON directory snapshot to read (and, for `sync`, update).
    #[arg(long, value_name = "FILE")]
    pub snapshot: PathBuf,

    #[command(flatten)]
    pub paths: ConfigArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReconcileArgs {
    pub fn scope(&self) -> SyncScope {
        match &self.target {
            Some(name) => SyncScope::Target(name.clone()),
            None => SyncScope::All,
        }
    }

    pub fn load_directory(&self) -> Result<MemoryDirectory> {
        snapshot::load_at(&self.snapshot)
            .with_context(|| format!("failed to load snapshot {}", self.snapshot.display()))
    }
}

/// Turn target failures into a non-zero exit.
pub fn finish(report: &RunReport) -> Result<()> {
    let failures: Vec<_> = report.failures().collect();
    match failures.as_slice() {
        [] => Ok(()),
        [(_, err)] => bail!("{err}"),
        [(_, first), rest @ ..] => bail!("{} targets failed; first: {first}", rest.len() + 1),
    }
}
