//! Capture command - record a new finding.

use super::{parse_confidence, parse_opt, parse_priority, print_json, repo_name, GlobalArgs};
use anyhow::{Context, Result};
use console::style;
use findings_core::{
    Effort, Evidence, FindingType, FindingsStore, GlobalConfig, NewFinding, Severity, CATEGORIES,
};
use tracing::{debug, warn};

/// Flags accepted by `findings capture`.
#[derive(Debug, Default)]
pub struct CaptureArgs {
    pub title: String,
    pub finding_type: Option<String>,
    pub severity: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub snippet: Option<String>,
    pub function: Option<String>,
    pub tags: Vec<String>,
    pub priority: Option<u8>,
    pub confidence: Option<f64>,
    pub during: Option<String>,
    pub eval: Option<String>,
    pub ado: Option<String>,
    pub blocked_by: Vec<String>,
    pub parent: Option<String>,
    pub effort: Option<String>,
    pub by: Option<String>,
    pub session: Option<String>,
}

/// Record a new finding and print its id.
pub fn run(args: &GlobalArgs, capture: CaptureArgs) -> Result<()> {
    // Validate closed values before touching the store.
    let finding_type = parse_opt::<FindingType>(capture.finding_type.as_deref())?;
    let severity = parse_opt::<Severity>(capture.severity.as_deref())?;
    let effort = parse_opt::<Effort>(capture.effort.as_deref())?;
    let priority = parse_priority(capture.priority)?;
    let confidence = parse_confidence(capture.confidence)?;

    let mut new = NewFinding::new(capture.title).evidence(Evidence {
        file: capture.file,
        line: capture.line,
        snippet: capture.snippet,
        function: capture.function,
    });
    if let Some(finding_type) = finding_type {
        new = new.finding_type(finding_type);
    }
    if let Some(severity) = severity {
        new = new.severity(severity);
    }
    if let Some(priority) = priority {
        new = new.priority(priority);
    }
    if let Some(category) = capture.category {
        if !CATEGORIES.contains(&category.as_str()) {
            debug!(%category, "category is not one of the recommended ones");
        }
        new = new.category(category);
    }
    if let Some(description) = capture.description {
        new = new.description(description);
    }
    if let Some(effort) = effort {
        new.effort = effort;
    }
    if let Some(confidence) = confidence {
        new.confidence = confidence;
    }
    if let Some(by) = capture.by {
        new.discovered_by = by;
    }
    new.tags = capture.tags;
    new.blocked_by = capture.blocked_by;
    new.parent = capture.parent;
    new.discovered_during = capture.during;
    new.eval_result = capture.eval;
    new.ado_work_item = capture.ado;
    new.session_id = capture.session;

    let mut store = args.open_store()?;
    let id = store.create_finding(new).context("Failed to record finding")?;

    if args.json {
        let finding = store.get_finding(&id)?;
        print_json(&finding)?;
    } else {
        println!("{} Captured {}", style("✓").green(), style(&id).cyan());
    }

    auto_push(args, &mut store, &id);
    Ok(())
}

/// Pushes the new finding if `sync.auto_push` is enabled. Never fails the capture.
fn auto_push(args: &GlobalArgs, store: &mut FindingsStore, id: &str) {
    match try_auto_push(args, store, id) {
        Ok(Some(gid)) if !gid.is_empty() && !args.json => {
            println!("{} Pushed to global store as {}", style("→").cyan(), style(gid).cyan());
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "auto-push to global store failed"),
    }
}

fn try_auto_push(args: &GlobalArgs, store: &mut FindingsStore, id: &str) -> Result<Option<String>> {
    let dir = args.global_dir()?;
    if !GlobalConfig::load(&dir)?.sync.auto_push {
        return Ok(None);
    }
    let Some(finding) = store.get_finding(id)? else {
        return Ok(None);
    };

    let root = store.root();
    let path = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let mut global = args.open_global()?;
    let gid = global.sync_finding(&finding, &repo_name(root), &path.display().to_string())?;
    Ok(Some(gid))
}
