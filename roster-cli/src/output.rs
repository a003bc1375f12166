//! Rendering of run reports: coloured tables for humans, JSON for scripts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use roster_core::MemberId;
use roster_sync::{MembershipDelta, RunReport, TargetCounts, TargetReport, TargetStatus};

// ---------------------------------------------------------------------------
// JSON payload
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunReportJson<'a> {
    dry_run: bool,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration_ms: i64,
    summary: SummaryJson,
    targets: Vec<TargetJson<'a>>,
}

#[derive(Serialize, Default)]
struct SummaryJson {
    targets: usize,
    done: usize,
    failed: usize,
    skipped: usize,
    added: usize,
    removed: usize,
}

#[derive(Serialize)]
struct TargetJson<'a> {
    target: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<&'a MemberId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<CountsJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delta: Option<&'a MembershipDelta>,
    applied: bool,
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct CountsJson {
    candidates: usize,
    excluded: usize,
    computed: usize,
    current: usize,
    added: usize,
    removed: usize,
    unchanged: usize,
}

impl From<TargetCounts> for CountsJson {
    fn from(c: TargetCounts) -> Self {
        Self {
            candidates: c.candidates,
            excluded: c.excluded,
            computed: c.computed,
            current: c.current,
            added: c.added,
            removed: c.removed,
            unchanged: c.unchanged,
        }
    }
}

#[derive(Tabled)]
struct TargetRow {
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "server")]
    server: String,
    #[tabled(rename = "computed")]
    computed: String,
    #[tabled(rename = "add")]
    added: String,
    #[tabled(rename = "remove")]
    removed: String,
    #[tabled(rename = "unchanged")]
    unchanged: String,
}

pub fn print_run(report: &RunReport, json: bool) -> Result<()> {
    if json {
        print_json(report)
    } else {
        print_table(report);
        Ok(())
    }
}

fn summarize(report: &RunReport) -> SummaryJson {
    let mut summary = SummaryJson {
        targets: report.outcomes.len(),
        ..SummaryJson::default()
    };
    for outcome in &report.outcomes {
        match &outcome.status {
            TargetStatus::Done(r) => {
                summary.done += 1;
                summary.added += r.counts.added;
                summary.removed += r.counts.removed;
            }
            TargetStatus::Failed(_) => summary.failed += 1,
            TargetStatus::Skipped => summary.skipped += 1,
        }
    }
    summary
}

fn print_json(report: &RunReport) -> Result<()> {
    let targets = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.status {
            TargetStatus::Done(r) => TargetJson {
                target: &outcome.target,
                status: "done",
                server: Some(r.server.as_str()),
                group_id: Some(&r.group_id),
                counts: Some(r.counts.into()),
                delta: Some(&r.delta),
                applied: r.applied,
                warnings: r.warnings.iter().map(ToString::to_string).collect(),
                error: None,
            },
            TargetStatus::Failed(err) => TargetJson {
                target: &outcome.target,
                status: "failed",
                server: None,
                group_id: None,
                counts: None,
                delta: None,
                applied: false,
                warnings: Vec::new(),
                error: Some(err.to_string()),
            },
            TargetStatus::Skipped => TargetJson {
                target: &outcome.target,
                status: "skipped",
                server: None,
                group_id: None,
                counts: None,
                delta: None,
                applied: false,
                warnings: Vec::new(),
                error: None,
            },
        })
        .collect();

    let payload = RunReportJson {
        dry_run: report.dry_run,
        started_at: report.started_at,
        finished_at: report.finished_at,
        duration_ms: (report.finished_at - report.started_at).num_milliseconds(),
        summary: summarize(report),
        targets,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize run report JSON")?
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Human output
// ---------------------------------------------------------------------------

fn print_table(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let summary = summarize(report);

    if report.outcomes.is_empty() {
        println!("{prefix}No targets configured.");
        return;
    }

    let rows: Vec<TargetRow> = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.status {
            TargetStatus::Done(r) => TargetRow {
                target: outcome.target.clone(),
                status: status_label(r, report.dry_run).to_string(),
                server: r.server.clone(),
                computed: r.counts.computed.to_string(),
                added: format!("+{}", r.counts.added),
                removed: format!("-{}", r.counts.removed),
                unchanged: r.counts.unchanged.to_string(),
            },
            TargetStatus::Failed(_) => blank_row(&outcome.target, "FAILED"),
            TargetStatus::Skipped => blank_row(&outcome.target, "SKIPPED"),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for r in report.completed() {
        print_changes(r);
    }
    for (target, err) in report.failures() {
        println!("{} '{target}': {err}", "✗".red().bold());
    }

    println!(
        "{prefix}{} target(s): {} done, {} failed, {} skipped; +{} -{}",
        summary.targets,
        summary.done,
        summary.failed,
        summary.skipped,
        summary.added,
        summary.removed
    );
}

fn status_label(report: &TargetReport, dry_run: bool) -> &'static str {
    if report.delta.is_empty() {
        "IN SYNC"
    } else if dry_run {
        "PENDING"
    } else {
        "UPDATED"
    }
}

fn blank_row(target: &str, status: &str) -> TargetRow {
    TargetRow {
        target: target.to_string(),
        status: status.to_string(),
        server: "-".into(),
        computed: "-".into(),
        added: "-".into(),
        removed: "-".into(),
        unchanged: "-".into(),
    }
}

fn print_changes(report: &TargetReport) {
    if report.delta.is_empty() && report.warnings.is_empty() {
        return;
    }
    println!("{}", report.target.bold());
    for warning in &report.warnings {
        println!("  {}  {warning}", "!".yellow().bold());
    }
    for id in &report.delta.to_remove {
        println!("  {}  {id}", "-".red());
    }
    for id in &report.delta.to_add {
        println!("  {}  {id}", "+".green());
    }
}
