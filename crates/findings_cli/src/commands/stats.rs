//! Stats command.

use super::{print_json, GlobalArgs};
use anyhow::Result;
use console::style;
use std::collections::BTreeMap;

/// Print counts by status, severity, type and category.
pub fn run(args: &GlobalArgs) -> Result<()> {
    let mut store = args.open_store()?;
    let stats = store.get_statistics()?;

    if args.json {
        return print_json(&stats);
    }

    println!("{}", style("Findings Statistics:").bold());
    println!("  Total:    {}", style(stats.total).cyan());
    println!("  Ready:    {}", style(stats.ready).green());
    println!("  Blocked:  {}", style(stats.blocked).yellow());
    print_counts("By status", &stats.by_status);
    print_counts("By severity", &stats.by_severity);
    print_counts("By type", &stats.by_type);
    print_counts("By category", &stats.by_category);
    Ok(())
}

pub fn print_counts(heading: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    println!();
    println!("  {}", style(heading).bold());
    for (key, count) in counts {
        println!("    {:<16} {}", key, count);
    }
}
