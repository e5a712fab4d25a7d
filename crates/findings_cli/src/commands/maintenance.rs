//! Compact, rebuild and verify commands for the local and global stores.

use super::{print_json, GlobalArgs};
use anyhow::{Context, Result};
use console::style;
use findings_core::{CompactReport, RebuildReport, VerifyReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Which store a maintenance command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    Global,
}

impl Scope {
    fn command(self, name: &str) -> String {
        match self {
            Scope::Local => format!("findings {}", name),
            Scope::Global => format!("findings global {}", name),
        }
    }

    fn compact(self, args: &GlobalArgs, dry_run: bool) -> Result<CompactReport> {
        let report = match self {
            Scope::Local => args.open_store()?.compact(dry_run)?,
            Scope::Global => args.open_global()?.compact(dry_run)?,
        };
        Ok(report)
    }

    fn rebuild(self, args: &GlobalArgs) -> Result<RebuildReport> {
        let report = match self {
            Scope::Local => args.open_store()?.rebuild()?,
            Scope::Global => args.open_global()?.rebuild()?,
        };
        Ok(report)
    }

    fn verify(self, args: &GlobalArgs) -> Result<VerifyReport> {
        let report = match self {
            Scope::Local => args.open_store()?.verify()?,
            Scope::Global => args.open_global()?.verify()?,
        };
        Ok(report)
    }
}

/// Drop superseded snapshots from the log, after confirmation.
pub fn compact(args: &GlobalArgs, scope: Scope, dry_run: bool, yes: bool) -> Result<()> {
    let preview = scope.compact(args, true)?;

    if dry_run || preview.lines_removed == 0 {
        if args.json {
            return print_json(&preview);
        }
        print_compact_report(&preview);
        if dry_run && preview.lines_removed > 0 {
            println!();
            println!("This was a dry run. To rewrite the log, run:");
            println!("  {}", style(scope.command("compact")).cyan());
        }
        return Ok(());
    }

    if !yes && !confirm(&preview)? {
        anyhow::bail!("Compaction cancelled");
    }

    let report = scope.compact(args, false).context("Failed to compact log")?;
    if args.json {
        return print_json(&report);
    }
    print_compact_report(&report);
    println!();
    println!(
        "{} Log compacted: {} superseded line(s) removed",
        style("✓").green(),
        report.lines_removed
    );
    Ok(())
}

fn confirm(preview: &CompactReport) -> Result<bool> {
    println!();
    println!(
        "{} {}",
        style("⚠").yellow().bold(),
        style("WARNING:").yellow().bold()
    );
    println!(
        "  Compaction rewrites the log, keeping only the latest snapshot of {} record(s).",
        preview.unique_records
    );
    println!(
        "  {} superseded line(s) of history will be removed permanently.",
        preview.lines_removed
    );
    if preview.corrupt_lines > 0 {
        println!(
            "  {} corrupt line(s) will be dropped as well.",
            style(preview.corrupt_lines).red()
        );
    }
    println!();

    print!("Continue with compaction? [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_compact_report(report: &CompactReport) {
    println!();
    println!("{}", style("Compaction Report:").bold());
    println!("  Log lines:       {}", style(report.original_lines).cyan());
    println!("  Unique records:  {}", style(report.unique_records).green());
    println!(
        "  Removable lines: {}",
        if report.lines_removed > 0 {
            style(report.lines_removed).yellow()
        } else {
            style(report.lines_removed).green()
        }
    );
    if report.corrupt_lines > 0 {
        println!("  Corrupt lines:   {}", style(report.corrupt_lines).red());
    }
}

/// Rebuild the index by replaying the log.
pub fn rebuild(args: &GlobalArgs, scope: Scope) -> Result<()> {
    let start = Instant::now();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message("Replaying log...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let report = scope.rebuild(args).context("Failed to rebuild index");
    spinner.finish_and_clear();
    let report = report?;

    if args.json {
        return print_json(&report);
    }

    println!(
        "{} Index rebuilt in {:.2}s: {} record(s) from {} line(s)",
        style("✓").green(),
        start.elapsed().as_secs_f64(),
        report.records,
        report.log_lines
    );
    if !report.corrupt_lines.is_empty() {
        println!(
            "  {} Skipped corrupt line(s): {}",
            style("⚠").yellow(),
            join_numbers(&report.corrupt_lines)
        );
    }
    Ok(())
}

/// Compare the persisted index with the log and recommend repairs.
pub fn verify(args: &GlobalArgs, scope: Scope) -> Result<()> {
    let report = scope.verify(args)?;

    if args.json {
        return print_json(&report);
    }

    println!();
    println!("{}", style("Verification Report:").bold());
    println!("  Log records:        {}", style(report.log_records).cyan());
    println!("  Unique records:     {}", style(report.unique_records).cyan());
    match report.index_entries {
        Some(entries) => println!("  Index entries:      {}", style(entries).cyan()),
        None if report.index_present => {
            println!("  Index entries:      {}", style("unreadable").red())
        }
        None => println!("  Index entries:      {}", style("not built").dim()),
    }
    if !report.corrupt_lines.is_empty() {
        println!(
            "  Corrupt log lines:  {} ({})",
            style(report.corrupt_lines.len()).red(),
            join_numbers(&report.corrupt_lines)
        );
    }
    for (label, ids) in [
        ("Missing from index:", &report.missing_from_index),
        ("Stale in index:", &report.stale_in_index),
        ("Orphaned in index:", &report.orphaned_in_index),
    ] {
        if ids.is_empty() {
            continue;
        }
        println!("  {:<19} {}", label, style(ids.len()).yellow());
        for id in ids {
            println!("    {} {}", style("⚠").yellow(), id);
        }
    }

    println!();
    if report.has_issues() {
        println!("{}", style(&report.summary()).yellow().bold());
        println!();
        println!("{}", style("Recommendations:").bold());
        if report.needs_rebuild() {
            println!(
                "  {} Run {} to regenerate the index",
                style("→").cyan(),
                style(scope.command("rebuild")).cyan()
            );
        }
        if !report.corrupt_lines.is_empty() {
            println!(
                "  {} Run {} to drop corrupt lines from the log",
                style("→").cyan(),
                style(scope.command("compact")).cyan()
            );
        }
    } else {
        println!("{} {}", style("✓").green(), style(&report.summary()).green());
    }
    Ok(())
}

fn join_numbers(numbers: &[usize]) -> String {
    numbers
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
