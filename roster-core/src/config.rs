//! Configuration file location, loading, validation and scaffolding.
//!
//! # Storage layout
//!
//! ```text
//! ~/.roster/                (mode 0700)
//!   config.yaml             (targets + defaults — mode 0600)
//!   credentials.yaml        (named credentials — mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function touching the home directory has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::{Config, SourceDescriptor};

const CONFIG_TEMPLATE: &str = r#"# roster configuration
defaults:
  server: dc01.example.com
  credential: default
  filter: "(objectClass=user)"

targets:
  - group: All-Staff
    include:
      - kind: group
        identity: Engineering
        recursive: true
      - kind: ou
        identity: "OU=Sales,DC=example,DC=com"
        scope: subtree
    exclude:
      - kind: group
        identity: Contractors
"#;

const CREDENTIALS_TEMPLATE: &str = r#"# roster credentials — keep this file private (mode 0600)
credentials:
  default:
    username: svc-roster@example.com
    secret: change-me
"#;

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.roster/` — pure, no I/O.
pub fn roster_dir_at(home: &Path) -> PathBuf {
    home.join(".roster")
}

/// `<home>/.roster/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    roster_dir_at(home).join("config.yaml")
}

/// `<home>/.roster/credentials.yaml` — pure, no I/O.
pub fn credentials_path_at(home: &Path) -> PathBuf {
    roster_dir_at(home).join("credentials.yaml")
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

/// `credentials_path_at` convenience wrapper.
pub fn credentials_path() -> Result<PathBuf, ConfigError> {
    Ok(credentials_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 2. Load + validate
// ---------------------------------------------------------------------------

/// Load and validate the configuration file at `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML,
/// `ConfigError::Invalid` if it parses but cannot be run.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let config = parse(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration YAML without validating it.
pub fn parse(contents: &str) -> Result<Config, serde_yaml::Error> {
    serde_yaml::from_str(contents)
}

/// Reject configurations that parse but cannot be reconciled.
///
/// Empty include/exclude lists are allowed here; they are a warning raised by
/// the engine, not a configuration error.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.defaults.server.trim().is_empty() {
        return Err(ConfigError::Invalid("defaults.server must not be empty".into()));
    }
    if config.defaults.credential.0.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "defaults.credential must not be empty".into(),
        ));
    }

    let mut seen = HashSet::new();
    for (index, target) in config.targets.iter().enumerate() {
        let group = target.group.trim();
        if group.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "targets[{index}].group must not be empty"
            )));
        }
        if !seen.insert(group.to_lowercase()) {
            return Err(ConfigError::Invalid(format!(
                "target group '{group}' is defined more than once"
            )));
        }
        check_descriptors(group, "include", &target.include)?;
        check_descriptors(group, "exclude", &target.exclude)?;
    }
    Ok(())
}

fn check_descriptors(
    group: &str,
    rule: &str,
    descriptors: &[SourceDescriptor],
) -> Result<(), ConfigError> {
    for (index, descriptor) in descriptors.iter().enumerate() {
        if descriptor.identity.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "target '{group}': {rule}[{index}].identity must not be empty"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Scaffold
// ---------------------------------------------------------------------------

/// What [`init_at`] did with each file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created(PathBuf),
    Kept(PathBuf),
}

/// Write example `config.yaml` and `credentials.yaml` under `<home>/.roster/`.
///
/// Idempotent: existing files are kept unless `force` is set.
pub fn init_at(home: &Path, force: bool) -> Result<Vec<InitOutcome>, ConfigError> {
    let dir = roster_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }

    let mut outcomes = Vec::new();
    for (path, template) in [
        (config_path_at(home), CONFIG_TEMPLATE),
        (credentials_path_at(home), CREDENTIALS_TEMPLATE),
    ] {
        if path.exists() && !force {
            outcomes.push(InitOutcome::Kept(path));
            continue;
        }
        write_atomic(&path, template)?;
        outcomes.push(InitOutcome::Created(path));
    }
    Ok(outcomes)
}

/// `init_at` convenience wrapper.
pub fn init(force: bool) -> Result<Vec<InitOutcome>, ConfigError> {
    init_at(&home()?, force)
}

/// Write flow: `<file>.tmp` sibling → `chmod 0600` → `rename`.
fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    std::fs::write(&tmp, contents)?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SearchScope, SourceKind};
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn config_path_is_correct() {
        let home = make_home();
        assert!(config_path_at(home.path()).ends_with(".roster/config.yaml"));
        assert!(credentials_path_at(home.path()).ends_with(".roster/credentials.yaml"));
    }

    #[test]
    fn template_parses_and_validates() {
        let config = parse(CONFIG_TEMPLATE).expect("template must parse");
        validate(&config).expect("template must validate");
        assert_eq!(config.targets.len(), 1);
        let target = &config.targets[0];
        assert_eq!(target.include.len(), 2);
        assert_eq!(
            target.include[1].kind,
            SourceKind::OrganizationalUnit {
                scope: SearchScope::Subtree,
                filter: None,
            }
        );
    }

    #[test]
    fn init_creates_private_files_and_is_idempotent() {
        let home = make_home();
        let first = init_at(home.path(), false).expect("init");
        assert!(first.iter().all(|o| matches!(o, InitOutcome::Created(_))));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(config_path_at(home.path()))
                .unwrap()
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(mode, 0o600);
        }

        let second = init_at(home.path(), false).expect("init again");
        assert!(second.iter().all(|o| matches!(o, InitOutcome::Kept(_))));
    }

    #[test]
    fn init_force_overwrites() {
        let home = make_home();
        init_at(home.path(), false).expect("init");
        std::fs::write(config_path_at(home.path()), "garbage").expect("write");
        let outcomes = init_at(home.path(), true).expect("force");
        assert!(outcomes.iter().all(|o| matches!(o, InitOutcome::Created(_))));
        load_at(&config_path_at(home.path())).expect("restored template loads");
    }

    #[test]
    fn duplicate_target_groups_are_rejected() {
        let config = parse(
            "defaults:\n  server: dc01\ntargets:\n  - group: Staff\n  - group: staff\n",
        )
        .expect("parse");
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("more than once"), "got: {err}");
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(ConfigError::HomeNotFound.to_string().contains("home directory"));
    }
}
