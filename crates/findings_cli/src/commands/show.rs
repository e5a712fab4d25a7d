//! Show command - print one finding in full.

use super::{local_time, print_json, severity_label, GlobalArgs};
use anyhow::Result;
use console::style;
use findings_core::Finding;

/// Print every field of a finding.
pub fn run(args: &GlobalArgs, id: &str) -> Result<()> {
    let mut store = args.open_store()?;
    let Some(finding) = store.get_finding(id)? else {
        anyhow::bail!("Finding {} not found", id);
    };

    if args.json {
        return print_json(&finding);
    }
    print_finding(&finding);
    Ok(())
}

fn print_finding(f: &Finding) {
    println!("{} {}", style(&f.id).cyan().bold(), style(&f.title).bold());
    println!();
    println!("  Type:        {}", f.finding_type);
    println!("  Severity:    {}", severity_label(f.severity));
    println!("  Status:      {}", f.status);
    println!("  Priority:    P{}", f.priority.level());
    println!("  Effort:      {}", f.effort);
    println!("  Category:    {}", f.category);
    println!("  Confidence:  {:.2}", f.confidence);
    println!("  Version:     {}", f.version);

    if let Some(evidence) = &f.evidence {
        let mut location = evidence.file.clone().unwrap_or_default();
        if let Some(line) = evidence.line {
            location.push_str(&format!(":{}", line));
        }
        if !location.is_empty() {
            println!("  Location:    {}", style(location).underlined());
        }
        if let Some(function) = &evidence.function {
            println!("  Function:    {}", function);
        }
        if let Some(snippet) = &evidence.snippet {
            println!("  Snippet:");
            for line in snippet.lines() {
                println!("    {}", style(line).dim());
            }
        }
    }

    if !f.description.is_empty() {
        println!();
        for line in f.description.lines() {
            println!("  {}", line);
        }
    }

    println!();
    println!(
        "  Discovered:  {} by {}",
        local_time(&f.discovered_at),
        f.discovered_by
    );
    if let Some(during) = &f.discovered_during {
        println!("  During:      {}", during);
    }
    match (&f.branch, &f.commit) {
        (Some(branch), Some(commit)) => println!("  Git:         {} @ {}", branch, short(commit)),
        (Some(branch), None) => println!("  Git:         {}", branch),
        (None, Some(commit)) => println!("  Git:         {}", short(commit)),
        (None, None) => {}
    }
    println!("  Updated:     {}", local_time(&f.updated_at));

    if !f.tags.is_empty() {
        println!("  Tags:        {}", f.tags.join(", "));
    }
    for (label, ids) in [
        ("Blocked by:", &f.blocked_by),
        ("Blocks:", &f.blocks),
        ("Related:", &f.related_to),
    ] {
        if !ids.is_empty() {
            println!("  {:<12} {}", label, ids.join(", "));
        }
    }
    if let Some(parent) = &f.parent {
        println!("  Parent:      {}", parent);
    }
    if let Some(item) = &f.ado_work_item {
        println!("  Work item:   {}", item);
    }
    if let Some(resolution) = &f.resolution {
        println!(
            "  Resolution:  {} ({}, {})",
            resolution,
            f.resolved_by.as_deref().unwrap_or("unknown"),
            f.resolved_at.as_deref().map(local_time).unwrap_or_default()
        );
    }
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}
