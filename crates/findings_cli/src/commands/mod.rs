//! CLI commands.

pub mod capture;
pub mod global;
pub mod maintenance;
pub mod query;
pub mod show;
pub mod stats;
pub mod update;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use console::style;
use findings_core::{default_global_dir, Finding, FindingsStore, GlobalStore, Priority};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    /// Repository root holding `.findings/`.
    pub repo: PathBuf,
    /// Global store directory, if overridden.
    pub global_dir: Option<PathBuf>,
    /// Emit JSON instead of styled text.
    pub json: bool,
}

impl GlobalArgs {
    pub fn open_store(&self) -> Result<FindingsStore> {
        FindingsStore::open(&self.repo).with_context(|| {
            format!("Failed to open findings store in {}", self.repo.display())
        })
    }

    pub fn global_dir(&self) -> Result<PathBuf> {
        match &self.global_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(default_global_dir()?),
        }
    }

    pub fn open_global(&self) -> Result<GlobalStore> {
        let dir = self.global_dir()?;
        GlobalStore::open(&dir)
            .with_context(|| format!("Failed to open global store in {}", dir.display()))
    }
}

/// Name a repository is synced under: its directory name.
pub fn repo_name(root: &Path) -> String {
    let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repo".to_string())
}

/// Parses an optional closed-enumeration flag.
pub fn parse_opt<T>(value: Option<&str>) -> Result<Option<T>>
where
    T: FromStr<Err = findings_core::FindingsError>,
{
    value.map(|v| v.parse::<T>().map_err(Into::into)).transpose()
}

pub fn parse_priority(level: Option<u8>) -> Result<Option<Priority>> {
    Ok(level.map(Priority::from_level).transpose()?)
}

/// Rejects a `--confidence` outside `0.0..=1.0`; NaN fails too.
pub fn parse_confidence(confidence: Option<f64>) -> Result<Option<f64>> {
    match confidence {
        Some(c) if !(0.0..=1.0).contains(&c) => {
            anyhow::bail!("--confidence must be between 0 and 1, got {}", c)
        }
        other => Ok(other),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Renders a stored timestamp in local time, or verbatim if it does not parse.
pub fn local_time(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

pub fn severity_label(severity: findings_core::Severity) -> console::StyledObject<&'static str> {
    use findings_core::Severity;
    let label = severity.as_str();
    match severity {
        Severity::Critical => style(label).red().bold(),
        Severity::High => style(label).red(),
        Severity::Medium => style(label).yellow(),
        Severity::Low => style(label).cyan(),
        Severity::Info => style(label).dim(),
    }
}

/// One line per finding: id, severity, status, title.
pub fn print_finding_list(findings: &[Finding], json: bool) -> Result<()> {
    if json {
        return print_json(findings);
    }

    if findings.is_empty() {
        println!("{}", style("No findings.").dim());
        return Ok(());
    }

    for finding in findings {
        println!(
            "{}  {:<8}  {:<11}  P{}  {}",
            style(&finding.id).cyan(),
            severity_label(finding.severity),
            finding.status.as_str(),
            finding.priority.level(),
            finding.title
        );
    }
    println!();
    println!("{}", style(format!("{} finding(s)", findings.len())).dim());
    Ok(())
}
