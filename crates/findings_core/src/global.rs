//! Cross-repository findings store.
//!
//! A second log + index pair under a user-scoped directory (by default
//! `~/.claude/findings/`), fed by syncing local stores:
//!
//! ```text
//! ~/.claude/findings/
//!   global-findings.jsonl   append-only log
//!   index.json              derived index with a by_repo grouping
//!   repositories.json       repository registry
//!   config.json             sync, privacy, similarity and registry settings
//! ```
//!
//! Global ids are derived from `(source_repo, local id, title)`, and re-syncing
//! a finding reuses the global id already recorded for its `(source_repo, id)`
//! pair, so repeated syncs update in place.

use crate::clock::{Clock, TimeProvider};
use crate::config::{GlobalConfig, CONFIG_FILE_NAME};
use crate::error::{FindingsError, Result};
use crate::index::RecordIndex;
use crate::journal::{Journal, RebuildReport};
use crate::log::{CompactReport, LogRecord};
use crate::record_id::global_id;
use crate::registry::RepoRegistry;
use crate::similarity::{jaccard, tokenize};
use crate::store::FindingsStore;
use crate::types::{Finding, GlobalFinding, GlobalStats, RepoInfo, Severity, Status, Visibility};
use crate::vcs;
use crate::verify::VerifyReport;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Log file name inside the global store directory.
pub const GLOBAL_LOG: &str = "global-findings.jsonl";

impl LogRecord for GlobalFinding {
    fn record_id(&self) -> &str {
        &self.global_id
    }

    fn partition(&self) -> Option<&str> {
        Some(&self.source_repo)
    }
}

/// Default location of the global store: `~/.claude/findings`.
pub fn default_global_dir() -> Result<PathBuf> {
    home::home_dir()
        .map(|home| home.join(".claude").join("findings"))
        .ok_or(FindingsError::HomeDirNotFound)
}

/// Filters for [`GlobalStore::query_findings`]. All set filters must match.
///
/// Private records are only returned when `source_repo` names their repository.
#[derive(Debug, Clone, Default)]
pub struct GlobalQuery {
    pub source_repo: Option<String>,
    pub status: Option<Status>,
    pub severity: Option<Severity>,
    pub category: Option<String>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
    /// Applied after sorting.
    pub limit: Option<usize>,
}

impl GlobalQuery {
    fn matches(&self, record: &GlobalFinding, search_lower: Option<&str>) -> bool {
        let visible = match self.source_repo.as_deref() {
            Some(repo) => record.source_repo == repo,
            None => record.visibility == Visibility::Global,
        };

        visible
            && self.status.map_or(true, |s| record.status == s)
            && self.severity.map_or(true, |s| record.severity == s)
            && self.category.as_deref().map_or(true, |c| record.category == c)
            && search_lower.map_or(true, |needle| record.matches_text(needle))
    }
}

/// A global record scored against a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarFinding {
    pub finding: GlobalFinding,
    /// Jaccard similarity in `[0, 1]`.
    pub score: f64,
}

/// Outcome of pushing a whole local store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Findings written to the global log.
    pub synced: usize,
    /// Findings held back by `privacy.exclude_tags`.
    pub skipped_private: usize,
    /// Global ids of the synced findings, in sync order.
    pub global_ids: Vec<String>,
}

/// Handle on the cross-repository store.
pub struct GlobalStore {
    root: PathBuf,
    journal: Journal<GlobalFinding>,
    config: GlobalConfig,
    clock: Clock,
}

impl GlobalStore {
    /// Opens the global store at `root`, creating it with a default `config.json` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or `config.json` is invalid.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        if !root.join(CONFIG_FILE_NAME).exists() {
            GlobalConfig::default().save(&root)?;
            debug!(root = %root.display(), "wrote default global config");
        }
        let config = GlobalConfig::load(&root)?;

        let clock = Clock::default();
        Ok(Self {
            journal: Journal::new(&root, GLOBAL_LOG, clock.clone()),
            root,
            config,
            clock,
        })
    }

    /// Opens the global store at `~/.claude/findings`.
    pub fn open_default() -> Result<Self> {
        Self::open(default_global_dir()?)
    }

    /// Uses `provider` instead of the system clock for every timestamp.
    pub fn with_time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.clock = Clock::with_provider(provider);
        self.journal.set_clock(self.clock.clone());
        self
    }

    /// Directory holding the global store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configuration loaded at open.
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Pushes one local finding. Returns its global id, or `""` if the
    /// finding carries an excluded tag (nothing is written in that case).
    ///
    /// # Errors
    ///
    /// Fails if the global log cannot be appended to or the registry cannot be saved.
    pub fn sync_finding(
        &mut self,
        finding: &Finding,
        source_repo: &str,
        source_repo_path: &str,
    ) -> Result<String> {
        if self.config.is_excluded(&finding.tags) {
            info!(id = %finding.id, source_repo, "finding has an excluded tag, not syncing");
            return Ok(String::new());
        }

        let default_visibility = self.config.privacy.default_visibility;
        let guard = self.journal.lock()?;
        let written = self.journal.transact(&guard, |index, now| {
            let existing = index
                .records()
                .find(|g| g.source_repo == source_repo && g.id == finding.id);

            let (gid, visibility, linked) = match existing {
                Some(previous) => (
                    previous.global_id.clone(),
                    previous.visibility,
                    previous.linked_findings.clone(),
                ),
                None => (
                    global_id(source_repo, &finding.id, &finding.title),
                    default_visibility,
                    Vec::new(),
                ),
            };

            let mut record = GlobalFinding::from_finding(
                finding,
                gid,
                source_repo,
                source_repo_path,
                visibility,
                now.to_string(),
            )?;
            record.linked_findings = linked;
            Ok(Some(record))
        })?;

        let Some(record) = written else {
            return Ok(String::new());
        };
        debug!(global_id = %record.global_id, source_repo, "synced finding");

        self.refresh_repository(source_repo, source_repo_path, &record.synced_at)?;
        drop(guard);
        Ok(record.global_id)
    }

    /// Pushes every finding of `store` under the name `source_repo`.
    pub fn sync_store(&mut self, store: &mut FindingsStore, source_repo: &str) -> Result<SyncReport> {
        self.sync_store_with_progress(store, source_repo, |_, _| {})
    }

    /// Like [`GlobalStore::sync_store`], calling `progress(done, total)` after each finding.
    pub fn sync_store_with_progress<P>(
        &mut self,
        store: &mut FindingsStore,
        source_repo: &str,
        mut progress: P,
    ) -> Result<SyncReport>
    where
        P: FnMut(usize, usize),
    {
        let repo_path = store
            .root()
            .canonicalize()
            .unwrap_or_else(|_| store.root().to_path_buf());
        let repo_path = repo_path.display().to_string();
        let findings = store.all_findings()?;

        let mut report = SyncReport::default();
        for (done, finding) in findings.iter().enumerate() {
            let gid = self.sync_finding(finding, source_repo, &repo_path)?;
            if gid.is_empty() {
                report.skipped_private += 1;
            } else {
                report.synced += 1;
                report.global_ids.push(gid);
            }
            progress(done + 1, findings.len());
        }

        info!(
            source_repo,
            synced = report.synced,
            skipped = report.skipped_private,
            "synced local store"
        );
        Ok(report)
    }

    fn refresh_repository(&mut self, name: &str, path: &str, synced_at: &str) -> Result<()> {
        let mut registry = RepoRegistry::load(&self.root)?;

        if !registry.contains(name) {
            if !self.config.repositories.auto_register {
                return Ok(());
            }
            let remote = vcs::remote_url(Path::new(path));
            let limit = self.config.repositories.max_tracked;
            if let Err(e) = registry.upsert(name, path, remote, synced_at, limit) {
                warn!(repo = name, error = %e, "not auto-registering repository");
                return Ok(());
            }
            info!(repo = name, "registered repository");
        }

        let count = finding_count(self.journal.index()?, name);
        registry.record_sync(name, synced_at, count);
        registry.save()
    }

    /// Records matching `query`, most recently synced first.
    pub fn query_findings(&mut self, query: &GlobalQuery) -> Result<Vec<GlobalFinding>> {
        let search_lower = query.search.as_ref().map(|s| s.to_lowercase());
        let mut found: Vec<GlobalFinding> = self
            .journal
            .index()?
            .records()
            .filter(|g| query.matches(g, search_lower.as_deref()))
            .cloned()
            .collect();

        found.sort_by(|a, b| b.synced_at.cmp(&a.synced_at));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    /// Global records whose title and description are at least `threshold`
    /// Jaccard-similar to the query, best match first.
    ///
    /// `threshold` defaults to `similarity.threshold` from the config.
    /// Private records are never returned.
    pub fn find_similar(
        &mut self,
        title: &str,
        description: &str,
        threshold: Option<f64>,
    ) -> Result<Vec<SimilarFinding>> {
        let threshold = threshold.unwrap_or(self.config.similarity.threshold);
        let query = tokenize(&format!("{} {}", title, description));

        let mut similar: Vec<SimilarFinding> = self
            .journal
            .index()?
            .records()
            .filter(|g| g.visibility == Visibility::Global)
            .filter_map(|g| {
                let tokens = tokenize(&format!("{} {}", g.title, g.description));
                let score = jaccard(&query, &tokens);
                (score >= threshold).then(|| SimilarFinding {
                    finding: g.clone(),
                    score,
                })
            })
            .collect();

        similar.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(similar)
    }

    /// Latest snapshot of `global_id`, if it exists.
    pub fn get_finding(&mut self, global_id: &str) -> Result<Option<GlobalFinding>> {
        Ok(self.journal.index()?.get(global_id).cloned())
    }

    /// Links two global records to each other. Returns false if either is unknown
    /// or both ids are the same.
    pub fn link_findings(&mut self, a: &str, b: &str) -> Result<bool> {
        if a == b {
            return Ok(false);
        }

        let guard = self.journal.lock()?;
        let mut linked = true;
        for (from, to) in [(a, b), (b, a)] {
            let mut known = false;
            self.journal.transact(&guard, |index, _| {
                let Some(current) = index.get(from) else {
                    return Ok(None);
                };
                known = index.get(to).is_some();
                if !known || current.linked_findings.iter().any(|id| id == to) {
                    return Ok(None);
                }
                let mut next = current.clone();
                next.linked_findings.push(to.to_string());
                Ok(Some(next))
            })?;
            linked &= known;
        }

        if linked {
            debug!(a, b, "linked global findings");
        }
        Ok(linked)
    }

    /// Counts over the whole index and registry, recomputed on every call.
    pub fn get_statistics(&mut self) -> Result<GlobalStats> {
        let repositories = RepoRegistry::load(&self.root)?.len();
        let index = self.journal.index()?;

        let mut stats = GlobalStats {
            total: index.len(),
            repositories,
            ..Default::default()
        };
        for (repo, ids) in index.partitions() {
            stats.by_repo.insert(repo.clone(), ids.len());
        }
        for record in index.records() {
            *stats.by_severity.entry(record.severity.to_string()).or_default() += 1;
            *stats.by_status.entry(record.status.to_string()).or_default() += 1;
        }
        Ok(stats)
    }

    /// Registers (or refreshes) a repository by hand.
    ///
    /// # Errors
    ///
    /// `ConfigError` if `name` is new and `repositories.max_tracked` is reached.
    pub fn register_repository(
        &mut self,
        name: &str,
        path: &str,
        remote_url: Option<String>,
    ) -> Result<RepoInfo> {
        let guard = self.journal.lock()?;
        let now = self.clock.timestamp();
        let count = finding_count(self.journal.index()?, name);

        let mut registry = RepoRegistry::load(&self.root)?;
        let limit = self.config.repositories.max_tracked;
        registry.upsert(name, path, remote_url, &now, limit)?;
        registry.set_finding_count(name, count);
        registry.save()?;
        drop(guard);

        info!(repo = name, "registered repository");
        registry
            .get(name)
            .cloned()
            .ok_or_else(|| FindingsError::NotFound(name.to_string()))
    }

    /// Registry entry for `name`.
    pub fn get_repository(&self, name: &str) -> Result<Option<RepoInfo>> {
        Ok(RepoRegistry::load(&self.root)?.get(name).cloned())
    }

    /// Every registered repository, ordered by name.
    pub fn list_repositories(&self) -> Result<Vec<RepoInfo>> {
        Ok(RepoRegistry::load(&self.root)?.list().cloned().collect())
    }

    /// Drops a repository from the registry. Its synced findings stay.
    pub fn unregister_repository(&mut self, name: &str) -> Result<bool> {
        let _guard = self.journal.lock()?;
        let mut registry = RepoRegistry::load(&self.root)?;
        let removed = registry.remove(name);
        if removed {
            registry.save()?;
            info!(repo = name, "unregistered repository");
        }
        Ok(removed)
    }

    /// Drops superseded snapshots from the global log. `dry_run` only reports.
    pub fn compact(&mut self, dry_run: bool) -> Result<CompactReport> {
        let guard = self.journal.lock()?;
        self.journal.compact(&guard, !dry_run)
    }

    /// Rebuilds the global index by replaying the whole log.
    pub fn rebuild(&mut self) -> Result<RebuildReport> {
        let guard = self.journal.lock()?;
        self.journal.rebuild(&guard)
    }

    /// Drops the cached index and reloads it from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.journal.reload()?;
        Ok(())
    }

    /// Checks the persisted global index against the log.
    pub fn verify(&self) -> Result<VerifyReport> {
        self.journal.verify()
    }
}

fn finding_count(index: &RecordIndex<GlobalFinding>, repo: &str) -> usize {
    index.partition(repo).map_or(0, |ids| ids.len())
}
