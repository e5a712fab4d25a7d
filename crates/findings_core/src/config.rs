//! Global store configuration (`config.json`).

use crate::atomic::write_json_atomic;
use crate::error::{FindingsError, Result};
use crate::types::Visibility;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Name of the configuration file inside the global store directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration of the cross-repository store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    /// Push scheduling hints for callers.
    #[serde(default)]
    pub sync: SyncConfig,

    /// What may leave a repository.
    #[serde(default)]
    pub privacy: PrivacyConfig,

    /// Similarity search settings.
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Repository registry limits.
    #[serde(default)]
    pub repositories: RepositoriesConfig,
}

impl GlobalConfig {
    /// Load configuration from `root/config.json`, or defaults if it is missing.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| FindingsError::ConfigError(format!("failed to read config: {}", e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| FindingsError::ConfigError(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `root/config.json`.
    pub fn save(&self, root: &Path) -> Result<()> {
        self.validate()?;
        write_json_atomic(&root.join(CONFIG_FILE_NAME), self)
            .map_err(|e| FindingsError::ConfigError(format!("failed to write config: {}", e)))
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.similarity.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FindingsError::ConfigError(format!(
                "similarity.threshold must be between 0 and 1, got {}",
                threshold
            )));
        }
        Ok(())
    }

    /// True if a finding carrying these tags must stay out of the global store.
    pub fn is_excluded(&self, tags: &[String]) -> bool {
        tags.iter()
            .any(|tag| self.privacy.exclude_tags.iter().any(|excluded| excluded == tag))
    }
}

/// Sync scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Push local findings automatically after capture (default: false).
    pub auto_push: bool,

    /// Hours between scheduled pushes (default: 24).
    pub interval_hours: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_push: false,
            interval_hours: 24,
        }
    }
}

/// Privacy rules applied before anything is written globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Visibility stamped on newly synced records (default: global).
    pub default_visibility: Visibility,

    /// Findings carrying any of these tags are never synced (default: `["private"]`).
    pub exclude_tags: Vec<String>,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            default_visibility: Visibility::Global,
            exclude_tags: vec!["private".to_string()],
        }
    }
}

/// Similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Default Jaccard cutoff for `find_similar` (default: 0.8).
    pub threshold: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self { threshold: 0.8 }
    }
}

/// Repository registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoriesConfig {
    /// Maximum number of registered repositories (default: 50).
    pub max_tracked: usize,

    /// Register unknown repositories on first sync (default: true).
    pub auto_register: bool,
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            max_tracked: 50,
            auto_register: true,
        }
    }
}
