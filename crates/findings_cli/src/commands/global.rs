//! Commands against the cross-repository global store.

use super::stats::print_counts;
use super::{local_time, parse_opt, print_json, repo_name, severity_label, GlobalArgs};
use anyhow::{Context, Result};
use console::style;
use findings_core::{GlobalFinding, GlobalQuery, RepoInfo, Severity, Status, Visibility};
use indicatif::{ProgressBar, ProgressStyle};

/// Flags accepted by `findings global search`.
#[derive(Debug, Default)]
pub struct GlobalSearchArgs {
    pub text: Option<String>,
    pub source_repo: Option<String>,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// Push every finding of the local store into the global store.
pub fn sync(args: &GlobalArgs, repo_name_override: Option<String>) -> Result<()> {
    let mut store = args.open_store()?;
    let mut global = args.open_global()?;
    let name = repo_name_override.unwrap_or_else(|| repo_name(store.root()));

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:12} [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("█▓▒░  "),
    );
    pb.set_message("Syncing");

    let report = global
        .sync_store_with_progress(&mut store, &name, |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        })
        .with_context(|| format!("Failed to sync {} into the global store", name));
    pb.finish_and_clear();
    let report = report?;

    if args.json {
        return print_json(&report);
    }

    println!(
        "{} Synced {} finding(s) from {}",
        style("✓").green(),
        style(report.synced).cyan(),
        style(&name).bold()
    );
    if report.skipped_private > 0 {
        println!(
            "  {} {} finding(s) skipped by privacy tags",
            style("→").dim(),
            report.skipped_private
        );
    }
    Ok(())
}

/// Filtered search across every synced repository.
pub fn search(args: &GlobalArgs, search: GlobalSearchArgs) -> Result<()> {
    let query = GlobalQuery {
        source_repo: search.source_repo,
        status: parse_opt::<Status>(search.status.as_deref())?,
        severity: parse_opt::<Severity>(search.severity.as_deref())?,
        category: search.category,
        search: search.text,
        limit: search.limit,
    };

    let mut global = args.open_global()?;
    let findings = global.query_findings(&query)?;
    if args.json {
        return print_json(&findings);
    }

    if findings.is_empty() {
        println!("{}", style("No global findings.").dim());
        return Ok(());
    }
    for finding in &findings {
        print_global_line(finding);
    }
    println!();
    println!("{}", style(format!("{} finding(s)", findings.len())).dim());
    Ok(())
}

/// Global findings similar to a title and description.
pub fn similar(
    args: &GlobalArgs,
    title: &str,
    description: Option<&str>,
    threshold: Option<f64>,
) -> Result<()> {
    if let Some(t) = threshold {
        if !(0.0..=1.0).contains(&t) {
            anyhow::bail!("--threshold must be between 0 and 1, got {}", t);
        }
    }

    let mut global = args.open_global()?;
    let matches = global.find_similar(title, description.unwrap_or_default(), threshold)?;
    if args.json {
        return print_json(&matches);
    }

    if matches.is_empty() {
        println!("{}", style("No similar findings.").dim());
        return Ok(());
    }
    for m in &matches {
        print!("{}  ", style(format!("{:.2}", m.score)).green());
        print_global_line(&m.finding);
    }
    Ok(())
}

/// Print every field of a global record.
pub fn show(args: &GlobalArgs, global_id: &str) -> Result<()> {
    let mut global = args.open_global()?;
    let Some(g) = global.get_finding(global_id)? else {
        anyhow::bail!("Global finding {} not found", global_id);
    };
    if args.json {
        return print_json(&g);
    }

    println!("{} {}", style(&g.global_id).cyan().bold(), style(&g.title).bold());
    println!();
    println!("  Source:      {} ({})", style(&g.source_repo).bold(), g.id);
    println!("  Path:        {}", g.source_repo_path);
    if let Some(branch) = &g.source_branch {
        println!("  Branch:      {}", branch);
    }
    println!("  Type:        {}", g.finding_type);
    println!("  Severity:    {}", severity_label(g.severity));
    println!("  Status:      {}", g.status);
    println!("  Priority:    P{}", g.priority.level());
    println!("  Category:    {}", g.category);
    println!("  Visibility:  {}", visibility_label(g.visibility));
    if let Some(file) = &g.file_path {
        match g.line_number {
            Some(line) => println!("  Location:    {}:{}", file, line),
            None => println!("  Location:    {}", file),
        }
    }
    if !g.tags.is_empty() {
        println!("  Tags:        {}", g.tags.join(", "));
    }
    if !g.linked_findings.is_empty() {
        println!("  Linked:      {}", g.linked_findings.join(", "));
    }
    println!("  Synced:      {}", local_time(&g.synced_at));

    if !g.description.is_empty() {
        println!();
        for line in g.description.lines() {
            println!("  {}", line);
        }
    }
    Ok(())
}

/// Counts over the whole global store.
pub fn stats(args: &GlobalArgs) -> Result<()> {
    let mut global = args.open_global()?;
    let stats = global.get_statistics()?;
    if args.json {
        return print_json(&stats);
    }

    println!("{}", style("Global Findings Statistics:").bold());
    println!("  Total:         {}", style(stats.total).cyan());
    println!("  Repositories:  {}", style(stats.repositories).cyan());
    print_counts("By repository", &stats.by_repo);
    print_counts("By severity", &stats.by_severity);
    print_counts("By status", &stats.by_status);
    Ok(())
}

/// Link two global findings to each other.
pub fn link(args: &GlobalArgs, a: &str, b: &str) -> Result<()> {
    let mut global = args.open_global()?;
    if !global.link_findings(a, b)? {
        anyhow::bail!("Cannot link {} and {}: both must exist and differ", a, b);
    }

    if args.json {
        return print_json(&serde_json::json!({ "linked": [a, b] }));
    }
    println!(
        "{} Linked {} and {}",
        style("✓").green(),
        style(a).cyan(),
        style(b).cyan()
    );
    Ok(())
}

/// List registered repositories.
pub fn repos_list(args: &GlobalArgs) -> Result<()> {
    let global = args.open_global()?;
    let repos = global.list_repositories()?;
    if args.json {
        return print_json(&repos);
    }

    if repos.is_empty() {
        println!("{}", style("No repositories registered.").dim());
        return Ok(());
    }
    for repo in &repos {
        println!(
            "{:<24} {:>5} finding(s)  {}",
            style(&repo.name).bold(),
            repo.finding_count,
            style(
                repo.last_synced
                    .as_deref()
                    .map(local_time)
                    .unwrap_or_else(|| "never synced".to_string())
            )
            .dim()
        );
    }
    Ok(())
}

pub fn repos_show(args: &GlobalArgs, name: &str) -> Result<()> {
    let global = args.open_global()?;
    let Some(repo) = global.get_repository(name)? else {
        anyhow::bail!("Repository {} is not registered", name);
    };
    if args.json {
        return print_json(&repo);
    }
    print_repo(&repo);
    Ok(())
}

/// Register a repository by hand. Defaults to the `--repo` path.
pub fn repos_add(
    args: &GlobalArgs,
    name: &str,
    path: Option<String>,
    remote_url: Option<String>,
) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => args
            .repo
            .canonicalize()
            .unwrap_or_else(|_| args.repo.clone())
            .display()
            .to_string(),
    };
    let remote_url = remote_url.or_else(|| findings_core::remote_url(std::path::Path::new(&path)));

    let mut global = args.open_global()?;
    let repo = global
        .register_repository(name, &path, remote_url)
        .with_context(|| format!("Failed to register {}", name))?;
    if args.json {
        return print_json(&repo);
    }
    println!("{} Registered {}", style("✓").green(), style(&repo.name).bold());
    Ok(())
}

pub fn repos_remove(args: &GlobalArgs, name: &str) -> Result<()> {
    let mut global = args.open_global()?;
    if !global.unregister_repository(name)? {
        anyhow::bail!("Repository {} is not registered", name);
    }
    if args.json {
        return print_json(&serde_json::json!({ "removed": name }));
    }
    println!(
        "{} Unregistered {} (synced findings are kept)",
        style("✓").green(),
        style(name).bold()
    );
    Ok(())
}

fn print_repo(repo: &RepoInfo) {
    println!("{}", style(&repo.name).bold());
    println!("  Path:        {}", repo.path);
    if let Some(url) = &repo.remote_url {
        println!("  Remote:      {}", url);
    }
    println!("  Findings:    {}", repo.finding_count);
    println!("  Registered:  {}", local_time(&repo.registered_at));
    match &repo.last_synced {
        Some(at) => println!("  Last sync:   {}", local_time(at)),
        None => println!("  Last sync:   {}", style("never").dim()),
    }
}

fn print_global_line(g: &GlobalFinding) {
    println!(
        "{}  {:<16}  {:<8}  {:<11}  {}",
        style(&g.global_id).cyan(),
        g.source_repo,
        severity_label(g.severity),
        g.status.as_str(),
        g.title
    );
}

fn visibility_label(visibility: Visibility) -> console::StyledObject<&'static str> {
    match visibility {
        Visibility::Global => style("global").green(),
        Visibility::Private => style("private").yellow(),
    }
}
