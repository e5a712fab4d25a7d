//! Findings CLI - capture, triage and share findings across repositories.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use findings_core::FindingsError;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

use commands::capture::CaptureArgs;
use commands::global::GlobalSearchArgs;
use commands::maintenance::Scope;
use commands::query::SearchArgs;
use commands::update::UpdateArgs;
use commands::GlobalArgs;

#[derive(Parser)]
#[command(name = "findings")]
#[command(about = "Findings store for coding agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository root holding .findings/
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,
    /// Global store directory (default: ~/.claude/findings)
    #[arg(long, global = true, env = "FINDINGS_GLOBAL_DIR")]
    global_dir: Option<PathBuf>,
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new finding
    Capture {
        /// Short title
        title: String,
        /// discovery, todo, question, note, tech-debt or bug
        #[arg(long = "type")]
        finding_type: Option<String>,
        /// critical, high, medium, low or info
        #[arg(long)]
        severity: Option<String>,
        /// Free-form category (e.g. security, performance)
        #[arg(long)]
        category: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// File the evidence points at
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        line: Option<u32>,
        #[arg(long)]
        snippet: Option<String>,
        #[arg(long)]
        function: Option<String>,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// 1 (highest) to 4
        #[arg(long)]
        priority: Option<u8>,
        /// 0.0 to 1.0
        #[arg(long)]
        confidence: Option<f64>,
        /// What was being done when this was found
        #[arg(long)]
        during: Option<String>,
        /// Evaluation outcome
        #[arg(long)]
        eval: Option<String>,
        /// External work item reference
        #[arg(long)]
        ado: Option<String>,
        /// Finding id this one waits on (repeatable)
        #[arg(long = "blocked-by")]
        blocked_by: Vec<String>,
        #[arg(long)]
        parent: Option<String>,
        /// small, medium, large or unknown
        #[arg(long)]
        effort: Option<String>,
        /// Who discovered it
        #[arg(long)]
        by: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
    /// Show a finding
    Show {
        /// Finding id (f-xxxxxxxx)
        id: String,
    },
    /// Update fields of a finding
    Update {
        id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Replace tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Replace blockers (repeatable)
        #[arg(long = "blocked-by")]
        blocked_by: Vec<String>,
        #[arg(long)]
        effort: Option<String>,
        /// JSON object of field updates; unknown keys are ignored
        #[arg(long)]
        set_json: Option<String>,
    },
    /// Mark a finding resolved
    Resolve {
        id: String,
        /// How it was resolved
        #[arg(short, long)]
        resolution: String,
        #[arg(long, default_value = "agent")]
        by: String,
    },
    /// Mark a finding promoted to a work item
    Promote {
        id: String,
        /// Work item reference
        work_item: String,
    },
    /// List open findings
    Open,
    /// List open findings whose blocked-by list is empty
    Ready,
    /// List open findings waiting on others
    Blocked,
    /// Search findings
    Search {
        /// Substring of title or description
        text: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long = "type")]
        finding_type: Option<String>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show statistics
    Stats,
    /// Drop superseded snapshots from the log
    Compact {
        /// Report what would be removed without rewriting
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Rebuild the index from the log
    Rebuild,
    /// Check the index against the log
    Verify,
    /// Cross-repository global store
    Global {
        #[command(subcommand)]
        command: GlobalCommands,
    },
}

#[derive(Subcommand)]
enum GlobalCommands {
    /// Push every local finding to the global store
    Sync {
        /// Name to sync under (default: repository directory name)
        #[arg(long)]
        repo_name: Option<String>,
    },
    /// Search across repositories
    Search {
        text: Option<String>,
        #[arg(long)]
        source_repo: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Find similar findings in other repositories
    Similar {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Jaccard cutoff (default from config.json)
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Show a global finding
    Show {
        /// Global id (g-xxxxxxxxxxxx)
        global_id: String,
    },
    /// Show global statistics
    Stats,
    /// Link two global findings
    Link { a: String, b: String },
    /// Drop superseded snapshots from the global log
    Compact {
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        yes: bool,
    },
    /// Rebuild the global index
    Rebuild,
    /// Check the global index against the log
    Verify,
    /// Manage the repository registry
    Repos {
        #[command(subcommand)]
        command: ReposCommands,
    },
}

#[derive(Subcommand)]
enum ReposCommands {
    /// List registered repositories
    List,
    /// Show one repository
    Show { name: String },
    /// Register a repository
    Add {
        name: String,
        /// Repository path (default: --repo)
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        remote_url: Option<String>,
    },
    /// Unregister a repository; its findings are kept
    Remove { name: String },
}

fn main() -> ExitCode {
    // Respects RUST_LOG (e.g. RUST_LOG=findings_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            let hint = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<FindingsError>())
                .and_then(FindingsError::recovery_suggestion);
            if let Some(hint) = hint {
                eprintln!("{} {}", style("hint:").cyan(), hint);
            }
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let args = GlobalArgs {
        repo: cli.repo,
        global_dir: cli.global_dir,
        json: cli.json,
    };

    match cli.command {
        Commands::Capture {
            title,
            finding_type,
            severity,
            category,
            description,
            file,
            line,
            snippet,
            function,
            tags,
            priority,
            confidence,
            during,
            eval,
            ado,
            blocked_by,
            parent,
            effort,
            by,
            session,
        } => commands::capture::run(
            &args,
            CaptureArgs {
                title,
                finding_type,
                severity,
                category,
                description,
                file,
                line,
                snippet,
                function,
                tags,
                priority,
                confidence,
                during,
                eval,
                ado,
                blocked_by,
                parent,
                effort,
                by,
                session,
            },
        ),
        Commands::Show { id } => commands::show::run(&args, &id),
        Commands::Update {
            id,
            status,
            severity,
            priority,
            title,
            description,
            tags,
            blocked_by,
            effort,
            set_json,
        } => commands::update::run(
            &args,
            &id,
            UpdateArgs {
                status,
                severity,
                priority,
                title,
                description,
                tags,
                blocked_by,
                effort,
                set_json,
            },
        ),
        Commands::Resolve { id, resolution, by } => {
            commands::update::resolve(&args, &id, &resolution, &by)
        }
        Commands::Promote { id, work_item } => commands::update::promote(&args, &id, &work_item),
        Commands::Open => commands::query::open(&args),
        Commands::Ready => commands::query::ready(&args),
        Commands::Blocked => commands::query::blocked(&args),
        Commands::Search {
            text,
            status,
            finding_type,
            severity,
            category,
            branch,
            tag,
            limit,
        } => commands::query::search(
            &args,
            SearchArgs {
                text,
                status,
                finding_type,
                severity,
                category,
                branch,
                tag,
                limit,
            },
        ),
        Commands::Stats => commands::stats::run(&args),
        Commands::Compact { dry_run, yes } => {
            commands::maintenance::compact(&args, Scope::Local, dry_run, yes)
        }
        Commands::Rebuild => commands::maintenance::rebuild(&args, Scope::Local),
        Commands::Verify => commands::maintenance::verify(&args, Scope::Local),
        Commands::Global { command } => match command {
            GlobalCommands::Sync { repo_name } => commands::global::sync(&args, repo_name),
            GlobalCommands::Search {
                text,
                source_repo,
                status,
                severity,
                category,
                limit,
            } => commands::global::search(
                &args,
                GlobalSearchArgs {
                    text,
                    source_repo,
                    status,
                    severity,
                    category,
                    limit,
                },
            ),
            GlobalCommands::Similar {
                title,
                description,
                threshold,
            } => commands::global::similar(&args, &title, description.as_deref(), threshold),
            GlobalCommands::Show { global_id } => commands::global::show(&args, &global_id),
            GlobalCommands::Stats => commands::global::stats(&args),
            GlobalCommands::Link { a, b } => commands::global::link(&args, &a, &b),
            GlobalCommands::Compact { dry_run, yes } => {
                commands::maintenance::compact(&args, Scope::Global, dry_run, yes)
            }
            GlobalCommands::Rebuild => commands::maintenance::rebuild(&args, Scope::Global),
            GlobalCommands::Verify => commands::maintenance::verify(&args, Scope::Global),
            GlobalCommands::Repos { command } => match command {
                ReposCommands::List => commands::global::repos_list(&args),
                ReposCommands::Show { name } => commands::global::repos_show(&args, &name),
                ReposCommands::Add {
                    name,
                    path,
                    remote_url,
                } => commands::global::repos_add(&args, &name, path, remote_url),
                ReposCommands::Remove { name } => commands::global::repos_remove(&args, &name),
            },
        },
    }
}
