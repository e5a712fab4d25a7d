//! Per-repository findings store.
//!
//! State lives in `<repo>/.findings/`:
//!
//! ```text
//! .findings/
//!   findings.jsonl   append-only log, version-controlled
//!   index.json       derived index, gitignored
//!   .lock            advisory write lock, gitignored
//!   .gitignore       written on first open
//! ```

use crate::clock::{Clock, TimeProvider};
use crate::error::Result;
use crate::journal::{Journal, RebuildReport};
use crate::log::{CompactReport, LogRecord};
use crate::record_id::{finding_id, random_salt};
use crate::types::{
    checked_confidence, Finding, FindingPatch, FindingStats, FindingType, NewFinding, Severity, Status,
};
use crate::vcs::VcsContext;
use crate::verify::VerifyReport;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory holding a repository's findings.
pub const FINDINGS_DIR: &str = ".findings";

/// Log file name inside [`FINDINGS_DIR`].
pub const FINDINGS_LOG: &str = "findings.jsonl";

const GITIGNORE: &str = "\
# Derived and local-only state; findings.jsonl is the source of truth.
index.json
session-context.json
*.db
.lock
*.tmp
";

impl LogRecord for Finding {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Filters for [`FindingsStore::query_findings`]. All set filters must match.
#[derive(Debug, Clone, Default)]
pub struct FindingQuery {
    pub status: Option<Status>,
    pub finding_type: Option<FindingType>,
    pub severity: Option<Severity>,
    pub category: Option<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
    /// Applied after sorting.
    pub limit: Option<usize>,
}

impl FindingQuery {
    /// Only findings in `status`.
    pub fn with_status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    fn matches(&self, finding: &Finding, search_lower: Option<&str>) -> bool {
        self.status.map_or(true, |s| finding.status == s)
            && self.finding_type.map_or(true, |t| finding.finding_type == t)
            && self.severity.map_or(true, |s| finding.severity == s)
            && self.category.as_deref().map_or(true, |c| finding.category == c)
            && self
                .branch
                .as_deref()
                .map_or(true, |b| finding.branch.as_deref() == Some(b))
            && self
                .tag
                .as_deref()
                .map_or(true, |t| finding.tags.iter().any(|tag| tag == t))
            && search_lower.map_or(true, |needle| finding.matches_text(needle))
    }
}

/// Handle on one repository's findings.
///
/// Reads are served from the lazily loaded index. Every mutation takes the
/// store lock, so several handles (or processes) may write concurrently.
pub struct FindingsStore {
    root: PathBuf,
    journal: Journal<Finding>,
    vcs: Option<VcsContext>,
}

impl FindingsStore {
    /// Opens the store for the repository at `repo_root`, creating `.findings/` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or its `.gitignore` cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use findings_core::{FindingsStore, NewFinding};
    ///
    /// let mut store = FindingsStore::open(".").unwrap();
    /// let id = store.create_finding(NewFinding::new("N+1 query in OrderService")).unwrap();
    /// ```
    pub fn open(repo_root: impl AsRef<Path>) -> Result<Self> {
        let root = repo_root.as_ref().to_path_buf();
        let dir = root.join(FINDINGS_DIR);
        fs::create_dir_all(&dir)?;

        let gitignore = dir.join(".gitignore");
        if !gitignore.exists() {
            fs::write(&gitignore, GITIGNORE)?;
            debug!(path = %gitignore.display(), "created findings .gitignore");
        }

        Ok(Self {
            journal: Journal::new(&dir, FINDINGS_LOG, Clock::default()),
            root,
            vcs: None,
        })
    }

    /// Uses `provider` instead of the system clock for every timestamp.
    pub fn with_time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.journal.set_clock(Clock::with_provider(provider));
        self
    }

    /// Stamps new findings with this context instead of probing git.
    pub fn with_vcs_context(mut self, vcs: VcsContext) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// Repository root this store belongs to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.findings/` directory.
    pub fn findings_dir(&self) -> &Path {
        self.journal.dir()
    }

    /// Records a new open finding and returns its id.
    ///
    /// # Errors
    ///
    /// Fails if the confidence is not a finite number or the log cannot be
    /// appended to.
    pub fn create_finding(&mut self, new: NewFinding) -> Result<String> {
        let confidence = checked_confidence(new.confidence)?;
        let vcs = match &self.vcs {
            Some(vcs) => vcs.clone(),
            None => VcsContext::detect(&self.root),
        };

        let guard = self.journal.lock()?;
        let written = self.journal.transact(&guard, |index, now| {
            let mut id = finding_id(&new.title, now, &random_salt());
            while index.get(&id).is_some() {
                warn!(%id, "finding id collision, drawing a new salt");
                id = finding_id(&new.title, now, &random_salt());
            }

            Ok(Some(Finding {
                id,
                version: 1,
                title: new.title,
                finding_type: new.finding_type,
                category: new.category,
                severity: new.severity,
                description: new.description,
                evidence: new.evidence,
                discovered_at: now.to_string(),
                discovered_by: new.discovered_by,
                discovered_during: new.discovered_during,
                session_id: new.session_id,
                branch: vcs.branch,
                commit: vcs.commit,
                related_to: new.related_to,
                blocks: new.blocks,
                blocked_by: new.blocked_by,
                parent: new.parent,
                ado_work_item: new.ado_work_item,
                eval_result: new.eval_result,
                status: Status::Open,
                resolution: None,
                resolved_at: None,
                resolved_by: None,
                tags: new.tags,
                priority: new.priority,
                effort: new.effort,
                confidence,
                created_at: now.to_string(),
                updated_at: now.to_string(),
            }))
        })?;

        let id = written.map(|finding| finding.id).unwrap_or_default();
        info!(%id, "created finding");
        Ok(id)
    }

    /// Latest snapshot of `id`, if it exists.
    pub fn get_finding(&mut self, id: &str) -> Result<Option<Finding>> {
        Ok(self.journal.index()?.get(id).cloned())
    }

    /// Applies `patch` to `id`. Returns false if `id` is unknown.
    ///
    /// An empty patch still appends a new version. A non-finite confidence is
    /// rejected before anything is written.
    pub fn update_finding(&mut self, id: &str, patch: FindingPatch) -> Result<bool> {
        if let Some(confidence) = patch.confidence {
            checked_confidence(confidence)?;
        }
        self.mutate(id, |finding, _| patch.apply_to(finding))
    }

    /// Marks `id` resolved. Returns false if `id` is unknown.
    pub fn resolve_finding(&mut self, id: &str, resolution: &str, resolved_by: &str) -> Result<bool> {
        self.mutate(id, |finding, now| {
            finding.status = Status::Resolved;
            finding.resolution = Some(resolution.to_string());
            finding.resolved_by = Some(resolved_by.to_string());
            finding.resolved_at = Some(now.to_string());
        })
    }

    /// Marks `id` promoted to an external work item. Returns false if `id` is unknown.
    pub fn promote_to_ado(&mut self, id: &str, work_item_id: &str) -> Result<bool> {
        self.mutate(id, |finding, _| {
            finding.status = Status::Promoted;
            finding.ado_work_item = Some(work_item_id.to_string());
        })
    }

    fn mutate<F>(&mut self, id: &str, change: F) -> Result<bool>
    where
        F: FnOnce(&mut Finding, &str),
    {
        let guard = self.journal.lock()?;
        let written = self.journal.transact(&guard, |index, now| {
            let Some(current) = index.get(id) else {
                return Ok(None);
            };

            let mut next = current.clone();
            change(&mut next, now);
            next.id = current.id.clone();
            next.created_at = current.created_at.clone();
            next.version = current.version + 1;
            next.updated_at = now.to_string();
            Ok(Some(next))
        })?;

        match &written {
            Some(finding) => debug!(%id, version = finding.version, "updated finding"),
            None => debug!(%id, "update of unknown finding ignored"),
        }
        Ok(written.is_some())
    }

    /// Findings matching every filter in `query`, newest first.
    pub fn query_findings(&mut self, query: &FindingQuery) -> Result<Vec<Finding>> {
        let search_lower = query.search.as_ref().map(|s| s.to_lowercase());
        let mut found: Vec<Finding> = self
            .journal
            .index()?
            .records()
            .filter(|f| query.matches(f, search_lower.as_deref()))
            .cloned()
            .collect();

        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    /// Open findings with nothing blocking them, highest priority first.
    pub fn get_ready_findings(&mut self) -> Result<Vec<Finding>> {
        self.open_view(Finding::is_ready)
    }

    /// Open findings waiting on other findings, highest priority first.
    pub fn get_blocked_findings(&mut self) -> Result<Vec<Finding>> {
        self.open_view(Finding::is_blocked)
    }

    fn open_view(&mut self, keep: fn(&Finding) -> bool) -> Result<Vec<Finding>> {
        let mut found: Vec<Finding> = self
            .journal
            .index()?
            .records()
            .filter(|f| keep(f))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(found)
    }

    /// Every finding's latest snapshot, ordered by id.
    pub fn all_findings(&mut self) -> Result<Vec<Finding>> {
        Ok(self.journal.index()?.records().cloned().collect())
    }

    /// Counts over the whole index, recomputed on every call.
    pub fn get_statistics(&mut self) -> Result<FindingStats> {
        let mut stats = FindingStats::default();
        for finding in self.journal.index()?.records() {
            stats.total += 1;
            if finding.is_ready() {
                stats.ready += 1;
            }
            if finding.is_blocked() {
                stats.blocked += 1;
            }
            *stats.by_status.entry(finding.status.to_string()).or_default() += 1;
            *stats.by_severity.entry(finding.severity.to_string()).or_default() += 1;
            *stats.by_type.entry(finding.finding_type.to_string()).or_default() += 1;
            *stats.by_category.entry(finding.category.clone()).or_default() += 1;
        }
        Ok(stats)
    }

    /// Drops superseded snapshots from the log. `dry_run` only reports.
    pub fn compact(&mut self, dry_run: bool) -> Result<CompactReport> {
        let guard = self.journal.lock()?;
        let report = self.journal.compact(&guard, !dry_run)?;
        info!(
            dry_run,
            removed = report.lines_removed,
            kept = report.unique_records,
            "compacted findings log"
        );
        Ok(report)
    }

    /// Drops the cached index and reloads it from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.journal.reload()?;
        Ok(())
    }

    /// Rebuilds the index by replaying the whole log.
    pub fn rebuild(&mut self) -> Result<RebuildReport> {
        let guard = self.journal.lock()?;
        self.journal.rebuild(&guard)
    }

    /// Checks the persisted index against the log.
    pub fn verify(&self) -> Result<VerifyReport> {
        self.journal.verify()
    }
}
