//! `roster check` — validate configuration and credentials offline.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use roster_core::{
    Config, CredentialName, CredentialStore, Credentials, SourceDescriptor, SourceKind,
    TargetDefinition,
};
use roster_directory::Filter;
use roster_sync::{RuleSet, Warning};

use super::ConfigArgs;

/// Arguments for `roster check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub paths: ConfigArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let (config, credentials) = self.paths.load()?;
        let config_path = self.paths.config_path()?;
        let issues = inspect(&config, &credentials);

        if self.json {
            print_json(&config_path, &config, &credentials, &issues)?;
        } else {
            print_table(&config_path, &config, &issues);
        }

        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        if errors > 0 {
            bail!("configuration check found {errors} error(s)");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Serialize)]
struct Issue {
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    severity: Severity,
    message: String,
}

impl Issue {
    fn error(target: Option<&str>, message: String) -> Self {
        Self {
            target: target.map(str::to_string),
            severity: Severity::Error,
            message,
        }
    }

    fn warning(target: &str, message: String) -> Self {
        Self {
            target: Some(target.to_string()),
            severity: Severity::Warning,
            message,
        }
    }
}

/// Everything a run would reject before or while resolving, minus the
/// directory itself.
fn inspect(config: &Config, credentials: &Credentials) -> Vec<Issue> {
    let mut issues = Vec::new();

    check_credential(credentials, &config.defaults.credential, None, "defaults", &mut issues);
    if let Some(filter) = &config.defaults.filter {
        check_filter(filter, None, "defaults", &mut issues);
    }

    for target in &config.targets {
        inspect_target(target, credentials, &mut issues);
    }
    issues
}

fn inspect_target(target: &TargetDefinition, credentials: &Credentials, issues: &mut Vec<Issue>) {
    let name = target.group.as_str();
    if let Some(credential) = &target.credential {
        check_credential(credentials, credential, Some(name), "target", issues);
    }

    match (target.include.is_empty(), target.exclude.is_empty()) {
        (true, true) => issues.push(Issue::warning(name, Warning::NoSourceRules.to_string())),
        (true, false) => issues.push(Issue::warning(name, Warning::IncludeRulesEmpty.to_string())),
        _ => {}
    }

    for (rule, descriptors) in [
        (RuleSet::Include, &target.include),
        (RuleSet::Exclude, &target.exclude),
    ] {
        for (index, descriptor) in descriptors.iter().enumerate() {
            let location = format!("{rule}[{index}] {descriptor}");
            inspect_descriptor(descriptor, credentials, name, &location, issues);
        }
    }
}

fn inspect_descriptor(
    descriptor: &SourceDescriptor,
    credentials: &Credentials,
    target: &str,
    location: &str,
    issues: &mut Vec<Issue>,
) {
    if let Some(credential) = &descriptor.credential {
        check_credential(credentials, credential, Some(target), location, issues);
    }
    match &descriptor.kind {
        SourceKind::Group { .. } => {}
        SourceKind::OrganizationalUnit { filter, .. } => {
            if let Some(filter) = filter {
                check_filter(filter, Some(target), location, issues);
            }
        }
        SourceKind::Unsupported { tag } => issues.push(Issue::error(
            Some(target),
            format!("{location}: unsupported source kind '{tag}'"),
        )),
    }
}

fn check_credential(
    credentials: &Credentials,
    name: &CredentialName,
    target: Option<&str>,
    location: &str,
    issues: &mut Vec<Issue>,
) {
    if let Err(err) = credentials.lookup(name) {
        issues.push(Issue::error(target, format!("{location}: {err}")));
    }
}

fn check_filter(filter: &str, target: Option<&str>, location: &str, issues: &mut Vec<Issue>) {
    if let Err(err) = Filter::parse(filter) {
        issues.push(Issue::error(target, format!("{location}: {err}")));
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CheckReportJson<'a> {
    config: String,
    ok: bool,
    credentials: Vec<&'a str>,
    targets: Vec<TargetSummaryJson<'a>>,
    issues: &'a [Issue],
}

#[derive(Serialize)]
struct TargetSummaryJson<'a> {
    group: &'a str,
    server: &'a str,
    include: usize,
    exclude: usize,
}

#[derive(Tabled)]
struct TargetTableRow {
    #[tabled(rename = "target")]
    group: String,
    #[tabled(rename = "server")]
    server: String,
    #[tabled(rename = "include")]
    include: usize,
    #[tabled(rename = "exclude")]
    exclude: usize,
    #[tabled(rename = "issues")]
    issues: usize,
}

fn server_of<'a>(config: &'a Config, target: &'a TargetDefinition) -> &'a str {
    target
        .server
        .as_deref()
        .unwrap_or(config.defaults.server.as_str())
}

fn print_json(
    path: &Path,
    config: &Config,
    credentials: &Credentials,
    issues: &[Issue],
) -> Result<()> {
    let payload = CheckReportJson {
        config: path.display().to_string(),
        ok: issues.iter().all(|i| i.severity != Severity::Error),
        credentials: credentials.names().map(|n| n.0.as_str()).collect(),
        targets: config
            .targets
            .iter()
            .map(|t| TargetSummaryJson {
                group: &t.group,
                server: server_of(config, t),
                include: t.include.len(),
                exclude: t.exclude.len(),
            })
            .collect(),
        issues,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize check JSON")?
    );
    Ok(())
}

fn print_table(path: &Path, config: &Config, issues: &[Issue]) {
    println!(
        "Roster v{} | {} | {} target(s)",
        env!("CARGO_PKG_VERSION"),
        path.display(),
        config.targets.len()
    );

    if !config.targets.is_empty() {
        let rows: Vec<TargetTableRow> = config
            .targets
            .iter()
            .map(|t| TargetTableRow {
                group: t.group.clone(),
                server: server_of(config, t).to_string(),
                include: t.include.len(),
                exclude: t.exclude.len(),
                issues: issues
                    .iter()
                    .filter(|i| i.target.as_deref() == Some(t.group.as_str()))
                    .count(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for issue in issues {
        let marker = match issue.severity {
            Severity::Error => "✗".red().bold(),
            Severity::Warning => "!".yellow().bold(),
        };
        match &issue.target {
            Some(target) => println!("{marker} '{target}' {}", issue.message),
            None => println!("{marker} {}", issue.message),
        }
    }

    if issues.is_empty() {
        println!("✓ Configuration OK");
    }
}
