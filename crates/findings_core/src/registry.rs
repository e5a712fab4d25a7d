//! Repository registry (`repositories.json`).
//!
//! Small enough to rewrite in full on every save, so no log is kept.

use crate::atomic::write_json_atomic;
use crate::error::{FindingsError, Result};
use crate::types::RepoInfo;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Name of the registry file inside the global store directory.
pub const REGISTRY_FILE_NAME: &str = "repositories.json";

/// Map of repository name to [`RepoInfo`], persisted as one JSON object.
#[derive(Debug, Clone)]
pub struct RepoRegistry {
    path: PathBuf,
    repos: BTreeMap<String, RepoInfo>,
}

impl RepoRegistry {
    /// Loads the registry from `root/repositories.json`.
    ///
    /// A missing file is an empty registry. An unparseable one is treated as
    /// empty with a warning and replaced on the next save.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(REGISTRY_FILE_NAME);
        let repos = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(repos) => repos,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "repository registry corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, repos })
    }

    /// Writes the registry atomically.
    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.repos)
    }

    pub fn get(&self, name: &str) -> Option<&RepoInfo> {
        self.repos.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.repos.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Every entry, ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &RepoInfo> {
        self.repos.values()
    }

    /// Inserts or refreshes an entry. Re-registering keeps `registered_at`,
    /// `last_synced` and `finding_count`.
    ///
    /// # Errors
    ///
    /// `ConfigError` if `name` is new and the registry already holds `max_tracked` entries.
    pub fn upsert(
        &mut self,
        name: &str,
        path: &str,
        remote_url: Option<String>,
        now: &str,
        max_tracked: usize,
    ) -> Result<&RepoInfo> {
        if !self.repos.contains_key(name) && self.repos.len() >= max_tracked {
            return Err(FindingsError::ConfigError(format!(
                "cannot register '{}': repositories.max_tracked ({}) reached",
                name, max_tracked
            )));
        }

        let entry = self
            .repos
            .entry(name.to_string())
            .and_modify(|info| {
                info.path = path.to_string();
                if remote_url.is_some() {
                    info.remote_url = remote_url.clone();
                }
            })
            .or_insert_with(|| RepoInfo {
                name: name.to_string(),
                path: path.to_string(),
                remote_url: remote_url.clone(),
                last_synced: None,
                finding_count: 0,
                registered_at: now.to_string(),
            });
        Ok(entry)
    }

    /// Stamps a sync on an existing entry. Returns false if `name` is unknown.
    pub fn record_sync(&mut self, name: &str, synced_at: &str, finding_count: usize) -> bool {
        match self.repos.get_mut(name) {
            Some(info) => {
                info.last_synced = Some(synced_at.to_string());
                info.finding_count = finding_count;
                true
            }
            None => false,
        }
    }

    /// Overwrites the recomputed finding count. Returns false if `name` is unknown.
    pub fn set_finding_count(&mut self, name: &str, finding_count: usize) -> bool {
        match self.repos.get_mut(name) {
            Some(info) => {
                info.finding_count = finding_count;
                true
            }
            None => false,
        }
    }

    /// Removes an entry. Returns false if `name` is unknown.
    pub fn remove(&mut self, name: &str) -> bool {
        self.repos.remove(name).is_some()
    }
}
