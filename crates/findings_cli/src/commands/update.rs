//! Update, resolve and promote commands.

use super::{parse_opt, parse_priority, print_json, GlobalArgs};
use anyhow::{Context, Result};
use console::style;
use findings_core::{Effort, FindingPatch, FindingsStore, Severity, Status};

/// Flags accepted by `findings update`.
#[derive(Debug, Default)]
pub struct UpdateArgs {
    pub status: Option<String>,
    pub severity: Option<String>,
    pub priority: Option<u8>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub blocked_by: Vec<String>,
    pub effort: Option<String>,
    pub set_json: Option<String>,
}

/// Apply field updates to a finding.
pub fn run(args: &GlobalArgs, id: &str, update: UpdateArgs) -> Result<()> {
    // `--set-json` is the base; explicit flags override it.
    let mut patch = match update.set_json.as_deref() {
        Some(raw) => FindingPatch::from_json(raw).context("Invalid --set-json object")?,
        None => FindingPatch::default(),
    };
    if let Some(status) = parse_opt::<Status>(update.status.as_deref())? {
        patch.status = Some(status);
    }
    if let Some(severity) = parse_opt::<Severity>(update.severity.as_deref())? {
        patch.severity = Some(severity);
    }
    if let Some(effort) = parse_opt::<Effort>(update.effort.as_deref())? {
        patch.effort = Some(effort);
    }
    if let Some(priority) = parse_priority(update.priority)? {
        patch.priority = Some(priority);
    }
    if update.title.is_some() {
        patch.title = update.title;
    }
    if update.description.is_some() {
        patch.description = update.description;
    }
    if !update.tags.is_empty() {
        patch.tags = Some(update.tags);
    }
    if !update.blocked_by.is_empty() {
        patch.blocked_by = Some(update.blocked_by);
    }

    let mut store = args.open_store()?;
    let updated = store.update_finding(id, patch)?;
    report(args, &mut store, id, updated, "Updated")
}

/// Mark a finding resolved.
pub fn resolve(args: &GlobalArgs, id: &str, resolution: &str, by: &str) -> Result<()> {
    let mut store = args.open_store()?;
    let updated = store.resolve_finding(id, resolution, by)?;
    report(args, &mut store, id, updated, "Resolved")
}

/// Mark a finding promoted to an external work item.
pub fn promote(args: &GlobalArgs, id: &str, work_item: &str) -> Result<()> {
    let mut store = args.open_store()?;
    let updated = store.promote_to_ado(id, work_item)?;
    report(args, &mut store, id, updated, "Promoted")
}

fn report(
    args: &GlobalArgs,
    store: &mut FindingsStore,
    id: &str,
    updated: bool,
    verb: &str,
) -> Result<()> {
    if !updated {
        anyhow::bail!("Finding {} not found", id);
    }

    let finding = store.get_finding(id)?;
    if args.json {
        return print_json(&finding);
    }

    let version = finding.map(|f| f.version).unwrap_or_default();
    println!(
        "{} {} {} (version {})",
        style("✓").green(),
        verb,
        style(id).cyan(),
        version
    );
    Ok(())
}
