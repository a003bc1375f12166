//! Run entrypoint used by `roster plan` and `roster sync`.

use roster_core::{Config, ConfigError, CredentialStore, TargetDefinition};
use roster_directory::DirectoryClient;

use crate::context::SyncContext;
use crate::error::SyncError;
use crate::reconciler::{Reconciler, SyncOptions};
use crate::report::RunReport;

/// Scope for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Every configured target, in configuration order.
    All,
    /// A single target, matched case-insensitively on its group identity.
    Target(String),
}

/// Select the targets a scope covers.
pub fn select<'c>(
    config: &'c Config,
    scope: &SyncScope,
) -> Result<&'c [TargetDefinition], SyncError> {
    match scope {
        SyncScope::All => Ok(&config.targets),
        SyncScope::Target(name) => config
            .targets
            .iter()
            .position(|t| t.group.eq_ignore_ascii_case(name))
            .map(|i| &config.targets[i..=i])
            .ok_or_else(|| {
                ConfigError::Invalid(format!("no target named '{name}' is configured")).into()
            }),
    }
}

/// Run reconciliation for a scope.
///
/// Configuration problems (bad defaults, unknown default credential, unknown
/// target) fail here before any directory call. Per-target failures are
/// reported in the returned [`RunReport`].
pub fn run<D>(
    config: &Config,
    credentials: &dyn CredentialStore,
    client: &mut D,
    scope: SyncScope,
    options: SyncOptions,
) -> Result<RunReport, SyncError>
where
    D: DirectoryClient + ?Sized,
{
    let ctx = SyncContext::new(&config.defaults, credentials)?;
    let targets = select(config, &scope)?;
    tracing::debug!(
        "reconciling {} target(s), default server {}",
        targets.len(),
        ctx.default_server()
    );
    Ok(Reconciler::new(client, &ctx, options).run(targets))
}

#[cfg(test)]
mod tests {
    use roster_core::{Credentials, Defaults, SourceDescriptor};
    use roster_directory::MemoryDirectory;

    use super::*;

    fn config() -> Config {
        Config {
            defaults: Defaults::new("dc01"),
            targets: vec![
                TargetDefinition::new("Staff").include(SourceDescriptor::group("Eng", false)),
                TargetDefinition::new("Managers"),
            ],
        }
    }

    #[test]
    fn select_all_keeps_configuration_order() {
        let config = config();
        let targets = select(&config, &SyncScope::All).expect("select");
        let names: Vec<&str> = targets.iter().map(|t| t.group.as_str()).collect();
        assert_eq!(names, ["Staff", "Managers"]);
    }

    #[test]
    fn select_single_target_ignores_case() {
        let config = config();
        let targets = select(&config, &SyncScope::Target("managers".into())).expect("select");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].group, "Managers");
    }

    #[test]
    fn unknown_target_fails_before_any_directory_call() {
        let config = config();
        let creds = Credentials::new().with("default", "svc", "pw");
        let mut dir = MemoryDirectory::new();
        let err = run(
            &config,
            &creds,
            &mut dir,
            SyncScope::Target("Nobody".into()),
            SyncOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
        assert!(err.to_string().contains("Nobody"));
        assert!(dir.calls().is_empty());
    }

    #[test]
    fn empty_configuration_runs_cleanly() {
        let config = Config {
            defaults: Defaults::new("dc01"),
            targets: Vec::new(),
        };
        let creds = Credentials::new().with("default", "svc", "pw");
        let mut dir = MemoryDirectory::new();
        let report = run(&config, &creds, &mut dir, SyncScope::All, SyncOptions::default())
            .expect("run");
        assert!(report.outcomes.is_empty());
        assert!(report.is_success());
    }
}
