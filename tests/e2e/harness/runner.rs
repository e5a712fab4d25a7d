use super::assertions::Assertion;
use super::clock::MockClock;
use super::steps::ScenarioStep;
use super::workspace::TestWorkspace;
use anyhow::{anyhow, bail, ensure, Context, Result};
use findings_core::{
    FindingPatch, FindingQuery, FindingsStore, GlobalQuery, GlobalStore, NewFinding,
};
use std::collections::{BTreeMap, HashMap};

/// Repository used until a scenario switches with `in_repo`.
pub const DEFAULT_REPO: &str = "service-a";

/// Executes scenarios against real stores in a temp workspace.
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    clock: MockClock,
    stores: BTreeMap<String, FindingsStore>,
    global: Option<GlobalStore>,
    current_repo: String,
    /// alias -> (workspace repo, local id)
    aliases: HashMap<String, (String, String)>,
    /// workspace repo -> name it was synced under
    synced_as: HashMap<String, String>,
    crashed: bool,
    current_step: usize,
}

impl ScenarioRunner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            workspace: TestWorkspace::empty()?,
            clock: MockClock::new(),
            stores: BTreeMap::new(),
            global: None,
            current_repo: DEFAULT_REPO.to_string(),
            aliases: HashMap::new(),
            synced_as: HashMap::new(),
            crashed: false,
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::UseRepo { name } => {
                self.current_repo = name.clone();
                Ok(())
            }

            ScenarioStep::Capture {
                alias,
                title,
                description,
                severity,
                priority,
                tags,
                blocked_by,
            } => {
                let blockers = blocked_by
                    .iter()
                    .map(|a| self.id(a))
                    .collect::<Result<Vec<_>>>()?;
                let mut new = NewFinding::new(title.as_str())
                    .description(description.as_str())
                    .severity(*severity)
                    .priority(*priority);
                new.tags = tags.clone();
                new.blocked_by = blockers;
                self.handle_capture(alias, new)
            }
            ScenarioStep::Update { alias, patch } => self.handle_update(alias, patch.clone()),
            ScenarioStep::Resolve { alias, resolution } => {
                let id = self.id(alias)?;
                let updated = self.store()?.resolve_finding(&id, resolution, "agent")?;
                ensure!(updated, "resolve of {} wrote nothing", alias);
                Ok(())
            }
            ScenarioStep::Promote { alias, work_item } => {
                let id = self.id(alias)?;
                let updated = self.store()?.promote_to_ado(&id, work_item)?;
                ensure!(updated, "promote of {} wrote nothing", alias);
                Ok(())
            }
            ScenarioStep::Compact => {
                self.store()?.compact(false)?;
                Ok(())
            }
            ScenarioStep::Rebuild => {
                self.store()?.rebuild()?;
                Ok(())
            }
            ScenarioStep::Reload => self.store()?.reload().map_err(Into::into),

            ScenarioStep::Sync { repo_name } => self.handle_sync(repo_name),
            ScenarioStep::Link { a, b } => {
                let a = self.global_id(a)?;
                let b = self.global_id(b)?;
                let linked = self.global()?.link_findings(&a, &b)?;
                ensure!(linked, "link of {} and {} was refused", a, b);
                Ok(())
            }
            ScenarioStep::RegisterRepo { name } => {
                let path = self.workspace.repo_path(&self.current_repo);
                let path = path.display().to_string();
                self.global()?.register_repository(name, &path, None)?;
                Ok(())
            }

            ScenarioStep::Wait { duration } => {
                self.clock.advance(*duration);
                Ok(())
            }

            ScenarioStep::Crash => self.handle_crash(),
            ScenarioStep::Restart => {
                ensure!(self.crashed, "restart without a crash");
                self.crashed = false;
                Ok(())
            }
            ScenarioStep::TornWrite { fragment } => self
                .workspace
                .append_raw(&self.current_repo, fragment.as_bytes()),
            ScenarioStep::DeleteIndex => {
                let path = self.workspace.index_path(&self.current_repo);
                self.workspace.remove_file(&path)
            }
            ScenarioStep::CorruptIndex => {
                let path = self.workspace.index_path(&self.current_repo);
                self.workspace.write_file(&path, b"{\"findings\": {\"f-")
            }
            ScenarioStep::ForeignAppend { alias, title } => self.handle_foreign_append(alias, title),

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    // ===== Handles =====

    fn store(&mut self) -> Result<&mut FindingsStore> {
        if self.crashed {
            bail!("Store not available (crashed?)");
        }
        let repo = self.current_repo.clone();
        if !self.stores.contains_key(&repo) {
            let store = self.workspace.open_store(&repo, &self.clock)?;
            self.stores.insert(repo.clone(), store);
        }
        self.stores
            .get_mut(&repo)
            .ok_or_else(|| anyhow!("store {} not open", repo))
    }

    fn global(&mut self) -> Result<&mut GlobalStore> {
        if self.crashed {
            bail!("Global store not available (crashed?)");
        }
        if self.global.is_none() {
            self.global = Some(self.workspace.open_global(&self.clock)?);
        }
        self.global
            .as_mut()
            .ok_or_else(|| anyhow!("global store not open"))
    }

    fn id(&self, alias: &str) -> Result<String> {
        self.aliases
            .get(alias)
            .map(|(_, id)| id.clone())
            .ok_or_else(|| anyhow!("unknown alias {}", alias))
    }

    fn ids(&self, aliases: &[String]) -> Result<Vec<String>> {
        aliases.iter().map(|a| self.id(a)).collect()
    }

    /// Global id of an aliased finding, looked up by (source repo, local id).
    fn global_id(&mut self, alias: &str) -> Result<String> {
        let (repo, id) = self
            .aliases
            .get(alias)
            .cloned()
            .ok_or_else(|| anyhow!("unknown alias {}", alias))?;
        let source_repo = self
            .synced_as
            .get(&repo)
            .cloned()
            .ok_or_else(|| anyhow!("repository {} was never synced", repo))?;

        let query = GlobalQuery {
            source_repo: Some(source_repo),
            ..Default::default()
        };
        self.global()?
            .query_findings(&query)?
            .into_iter()
            .find(|g| g.id == id)
            .map(|g| g.global_id)
            .ok_or_else(|| anyhow!("{} has no global record", alias))
    }

    // ===== Action handlers =====

    fn handle_capture(&mut self, alias: &str, new: NewFinding) -> Result<()> {
        ensure!(!self.aliases.contains_key(alias), "alias {} already used", alias);
        let id = self.store()?.create_finding(new)?;
        self.aliases
            .insert(alias.to_string(), (self.current_repo.clone(), id));
        Ok(())
    }

    fn handle_update(&mut self, alias: &str, patch: FindingPatch) -> Result<()> {
        let id = self.id(alias)?;
        let updated = self.store()?.update_finding(&id, patch)?;
        ensure!(updated, "update of {} wrote nothing", alias);
        Ok(())
    }

    fn handle_sync(&mut self, repo_name: &str) -> Result<()> {
        self.store()?;
        self.global()?;
        let store = self
            .stores
            .get_mut(&self.current_repo)
            .ok_or_else(|| anyhow!("store not open"))?;
        let global = self
            .global
            .as_mut()
            .ok_or_else(|| anyhow!("global store not open"))?;

        global.sync_store(store, repo_name)?;
        self.synced_as
            .insert(self.current_repo.clone(), repo_name.to_string());
        Ok(())
    }

    fn handle_crash(&mut self) -> Result<()> {
        // Drop every handle without any shutdown work.
        self.stores.clear();
        self.global = None;
        self.crashed = true;
        Ok(())
    }

    fn handle_foreign_append(&mut self, alias: &str, title: &str) -> Result<()> {
        let id = self.id(alias)?;
        let mut other = self.workspace.open_store(&self.current_repo, &self.clock)?;
        let patch = FindingPatch {
            title: Some(title.to_string()),
            ..Default::default()
        };
        ensure!(
            other.update_finding(&id, patch)?,
            "foreign update of {} wrote nothing",
            alias
        );
        Ok(())
    }

    // ===== Assertion handlers =====

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::FindingCount(expected) => {
                let actual = self.store()?.all_findings()?.len();
                ensure!(actual == *expected, "expected {} findings, found {}", expected, actual);
            }
            Assertion::StatusIs { alias, status } => {
                let id = self.id(alias)?;
                let finding = self
                    .store()?
                    .get_finding(&id)?
                    .ok_or_else(|| anyhow!("{} not found", alias))?;
                ensure!(
                    finding.status == *status,
                    "{} has status {}, expected {}",
                    alias,
                    finding.status,
                    status
                );
            }
            Assertion::VersionIs { alias, version } => {
                let id = self.id(alias)?;
                let finding = self
                    .store()?
                    .get_finding(&id)?
                    .ok_or_else(|| anyhow!("{} not found", alias))?;
                ensure!(
                    finding.version == *version,
                    "{} has version {}, expected {}",
                    alias,
                    finding.version,
                    version
                );
            }
            Assertion::TitleIs { alias, title } => {
                let id = self.id(alias)?;
                let finding = self
                    .store()?
                    .get_finding(&id)?
                    .ok_or_else(|| anyhow!("{} not found", alias))?;
                ensure!(
                    finding.title == *title,
                    "{} has title {:?}, expected {:?}",
                    alias,
                    finding.title,
                    title
                );
            }
            Assertion::FindingMissing { alias } => {
                let id = self.id(alias)?;
                ensure!(
                    self.store()?.get_finding(&id)?.is_none(),
                    "{} should not exist",
                    alias
                );
            }

            Assertion::ReadyAre(aliases) => {
                let expected = self.ids(aliases)?;
                let actual: Vec<String> = self
                    .store()?
                    .get_ready_findings()?
                    .into_iter()
                    .map(|f| f.id)
                    .collect();
                ensure!(actual == expected, "ready view {:?}, expected {:?}", actual, expected);
            }
            Assertion::BlockedAre(aliases) => {
                let expected = self.ids(aliases)?;
                let actual: Vec<String> = self
                    .store()?
                    .get_blocked_findings()?
                    .into_iter()
                    .map(|f| f.id)
                    .collect();
                ensure!(actual == expected, "blocked view {:?}, expected {:?}", actual, expected);
            }
            Assertion::SearchReturns { text, aliases } => {
                let expected = self.ids(aliases)?;
                let query = FindingQuery {
                    search: Some(text.clone()),
                    ..Default::default()
                };
                let actual: Vec<String> = self
                    .store()?
                    .query_findings(&query)?
                    .into_iter()
                    .map(|f| f.id)
                    .collect();
                ensure!(actual == expected, "search {:?} gave {:?}, expected {:?}", text, actual, expected);
            }

            Assertion::LogLineCount(expected) => {
                let actual = self.workspace.log_lines(&self.current_repo)?.len();
                ensure!(actual == *expected, "log has {} lines, expected {}", actual, expected);
            }
            Assertion::IndexExists => {
                let path = self.workspace.index_path(&self.current_repo);
                ensure!(path.exists(), "{} does not exist", path.display());
            }
            Assertion::IndexMissing => {
                let path = self.workspace.index_path(&self.current_repo);
                ensure!(!path.exists(), "{} should not exist", path.display());
            }

            Assertion::VerifyClean => {
                let report = self.store()?.verify()?;
                ensure!(!report.has_issues(), "verify found issues: {}", report.summary());
            }
            Assertion::VerifyNeedsRebuild => {
                let report = self.store()?.verify()?;
                ensure!(report.needs_rebuild(), "verify reported no rebuild: {}", report.summary());
            }
            Assertion::CorruptLineCount(expected) => {
                let actual = self.store()?.verify()?.corrupt_lines.len();
                ensure!(actual == *expected, "{} corrupt lines, expected {}", actual, expected);
            }

            Assertion::GlobalCount(expected) => {
                let actual = self.global()?.get_statistics()?.total;
                ensure!(actual == *expected, "{} global findings, expected {}", actual, expected);
            }
            Assertion::GlobalRepoCount { repo, count } => {
                let stats = self.global()?.get_statistics()?;
                let actual = stats.by_repo.get(repo).copied().unwrap_or_default();
                ensure!(actual == *count, "{} has {} global findings, expected {}", repo, actual, count);
            }
            Assertion::GlobalTitleIs { alias, title } => {
                let gid = self.global_id(alias)?;
                let record = self
                    .global()?
                    .get_finding(&gid)?
                    .ok_or_else(|| anyhow!("{} missing", gid))?;
                ensure!(record.title == *title, "{} has title {:?}", gid, record.title);
            }
            Assertion::SimilarTo {
                title,
                threshold,
                aliases,
            } => {
                let mut expected = self.ids(aliases)?;
                let mut actual: Vec<String> = self
                    .global()?
                    .find_similar(title, "", Some(*threshold))?
                    .into_iter()
                    .map(|m| m.finding.id)
                    .collect();
                expected.sort();
                actual.sort();
                ensure!(actual == expected, "similar gave {:?}, expected {:?}", actual, expected);
            }
            Assertion::LinkedTo { alias, other } => {
                let gid = self.global_id(alias)?;
                let other_gid = self.global_id(other)?;
                let record = self
                    .global()?
                    .get_finding(&gid)?
                    .ok_or_else(|| anyhow!("{} missing", gid))?;
                ensure!(
                    record.linked_findings.contains(&other_gid),
                    "{} is not linked to {}",
                    alias,
                    other
                );
            }
            Assertion::RepoRegistered {
                name,
                finding_count,
            } => {
                let repo = self
                    .global()?
                    .get_repository(name)?
                    .ok_or_else(|| anyhow!("{} is not registered", name))?;
                ensure!(
                    repo.finding_count == *finding_count,
                    "{} registered with {} findings, expected {}",
                    name,
                    repo.finding_count,
                    finding_count
                );
            }
            Assertion::RepoNotRegistered { name } => {
                ensure!(
                    self.global()?.get_repository(name)?.is_none(),
                    "{} should not be registered",
                    name
                );
            }

            Assertion::Custom(check) => check(self.store()?)?,
        }
        Ok(())
    }
}
