//! Core data types for the findings store.
//!
//! Field names and nesting here are the on-disk format of `findings.jsonl`,
//! `global-findings.jsonl` and both `index.json` files.

use crate::error::{FindingsError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Recommended categories. `category` stays free text; this list feeds CLI help.
pub const CATEGORIES: &[&str] = &[
    "architecture",
    "performance",
    "security",
    "testing",
    "documentation",
    "code-quality",
    "dependencies",
    "infrastructure",
    "ux",
    "general",
];

/// Renders a timestamp the way every record stores it: RFC 3339, microseconds, `Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Confidence as stored: finite values clamped into `0.0..=1.0`.
///
/// # Errors
///
/// NaN and infinities are rejected; they cannot be written back as JSON numbers.
pub fn checked_confidence(value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(FindingsError::InvalidValue {
            field: "confidence",
            value: value.to_string(),
            expected: "a number between 0 and 1".to_string(),
        });
    }
    Ok(value.clamp(0.0, 1.0))
}

fn parse_closed<T: Copy>(
    field: &'static str,
    value: &str,
    all: &[T],
    name: fn(T) -> &'static str,
) -> Result<T> {
    let wanted = value.trim().to_ascii_lowercase();
    all.iter()
        .copied()
        .find(|candidate| name(*candidate) == wanted)
        .ok_or_else(|| FindingsError::InvalidValue {
            field,
            value: value.to_string(),
            expected: all.iter().map(|v| name(*v)).collect::<Vec<_>>().join(", "),
        })
}

/// Kind of observation a finding records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingType {
    /// Something learned about the codebase.
    #[default]
    Discovery,
    /// Work that should be done later.
    Todo,
    /// An open question needing an answer.
    Question,
    /// Free-form note.
    Note,
    /// Known shortcut or structural debt.
    TechDebt,
    /// A defect.
    Bug,
}

impl FindingType {
    /// Every accepted value, in display order.
    pub const ALL: [FindingType; 6] = [
        Self::Discovery,
        Self::Todo,
        Self::Question,
        Self::Note,
        Self::TechDebt,
        Self::Bug,
    ];

    /// Wire name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Todo => "todo",
            Self::Question => "question",
            Self::Note => "note",
            Self::TechDebt => "tech-debt",
            Self::Bug => "bug",
        }
    }
}

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be addressed immediately.
    Critical,
    /// Should be addressed soon.
    High,
    /// Normal priority.
    #[default]
    Medium,
    /// Nice to fix.
    Low,
    /// Informational only.
    Info,
}

impl Severity {
    /// Every accepted value, most severe first.
    pub const ALL: [Severity; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Info,
    ];

    /// Wire name of this severity.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }
}

/// Lifecycle state of a finding.
///
/// `Resolved`, `WontFix` and `Promoted` are the terminal states; findings are
/// never physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Newly captured.
    #[default]
    Open,
    /// Someone is working on it.
    InProgress,
    /// Fixed or answered.
    Resolved,
    /// Deliberately not addressed.
    WontFix,
    /// Moved to an external work item.
    Promoted,
}

impl Status {
    /// Every accepted value.
    pub const ALL: [Status; 5] = [
        Self::Open,
        Self::InProgress,
        Self::Resolved,
        Self::WontFix,
        Self::Promoted,
    ];

    /// Wire name of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::WontFix => "wont_fix",
            Self::Promoted => "promoted",
        }
    }

    /// True for states that close a finding.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::WontFix | Self::Promoted)
    }
}

/// Rough size of the work a finding implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    /// Under an hour or so.
    Small,
    /// About a day.
    Medium,
    /// Multiple days.
    Large,
    /// Not estimated.
    #[default]
    Unknown,
}

impl Effort {
    /// Every accepted value.
    pub const ALL: [Effort; 4] = [Self::Small, Self::Medium, Self::Large, Self::Unknown];

    /// Wire name of this effort.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Unknown => "unknown",
        }
    }
}

/// Priority 1 (highest) through 4, stored as a bare integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Priority {
    /// P1.
    Critical = 1,
    /// P2.
    High = 2,
    /// P3.
    #[default]
    Medium = 3,
    /// P4.
    Low = 4,
}

impl Priority {
    /// Converts 1..=4 into a priority.
    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            1 => Ok(Self::Critical),
            2 => Ok(Self::High),
            3 => Ok(Self::Medium),
            4 => Ok(Self::Low),
            other => Err(FindingsError::InvalidValue {
                field: "priority",
                value: other.to_string(),
                expected: "1, 2, 3, 4".to_string(),
            }),
        }
    }

    /// Numeric level, 1 is highest.
    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Whether a global record may be shown outside its source repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Searchable across repositories.
    #[default]
    Global,
    /// Kept only for its source repository.
    Private,
}

impl Visibility {
    /// Every accepted value.
    pub const ALL: [Visibility; 2] = [Self::Global, Self::Private];

    /// Wire name of this visibility.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Private => "private",
        }
    }
}

macro_rules! closed_enum_text {
    ($ty:ty, $field:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = FindingsError;

            fn from_str(s: &str) -> Result<Self> {
                parse_closed($field, s, &<$ty>::ALL, <$ty>::as_str)
            }
        }
    };
}

closed_enum_text!(FindingType, "finding type");
closed_enum_text!(Severity, "severity");
closed_enum_text!(Status, "status");
closed_enum_text!(Effort, "effort");
closed_enum_text!(Visibility, "visibility");

/// Code location backing a finding. Absent parts are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Repository-relative file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based line number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Short excerpt of the relevant code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Enclosing function or method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl Evidence {
    /// True when no part of the location is known.
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.line.is_none() && self.snippet.is_none() && self.function.is_none()
    }
}

/// A persisted observation in one repository's findings store.
///
/// Every mutation appends a full snapshot of this struct to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Finding {
    pub id: String,
    /// Starts at 1, incremented by exactly one on every mutation.
    pub version: u32,
    pub title: String,
    pub finding_type: FindingType,
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub evidence: Option<Evidence>,

    pub discovered_at: String,
    pub discovered_by: String,
    pub discovered_during: Option<String>,
    pub session_id: Option<String>,
    pub branch: Option<String>,
    pub commit: Option<String>,

    // Semantic links only; referential integrity is not enforced.
    pub related_to: Vec<String>,
    pub blocks: Vec<String>,
    pub blocked_by: Vec<String>,
    pub parent: Option<String>,

    pub ado_work_item: Option<String>,
    pub eval_result: Option<String>,

    pub status: Status,
    pub resolution: Option<String>,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<String>,

    pub tags: Vec<String>,
    pub priority: Priority,
    pub effort: Effort,
    pub confidence: f64,

    pub created_at: String,
    pub updated_at: String,
}

impl Default for Finding {
    fn default() -> Self {
        Self {
            id: String::new(),
            version: 1,
            title: String::new(),
            finding_type: FindingType::default(),
            category: "general".to_string(),
            severity: Severity::default(),
            description: String::new(),
            evidence: None,
            discovered_at: String::new(),
            discovered_by: "agent".to_string(),
            discovered_during: None,
            session_id: None,
            branch: None,
            commit: None,
            related_to: Vec::new(),
            blocks: Vec::new(),
            blocked_by: Vec::new(),
            parent: None,
            ado_work_item: None,
            eval_result: None,
            status: Status::default(),
            resolution: None,
            resolved_at: None,
            resolved_by: None,
            tags: Vec::new(),
            priority: Priority::default(),
            effort: Effort::default(),
            confidence: 0.8,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

impl Finding {
    /// True if the finding is open and nothing blocks it.
    pub fn is_ready(&self) -> bool {
        self.status == Status::Open && self.blocked_by.is_empty()
    }

    /// True if the finding is open but waiting on other findings.
    pub fn is_blocked(&self) -> bool {
        self.status == Status::Open && !self.blocked_by.is_empty()
    }

    /// Case-insensitive substring match against title or description.
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
    }
}

/// Input for [`crate::FindingsStore::create_finding`].
///
/// Identity, timestamps, version, status and VCS context are filled in by the store.
#[derive(Debug, Clone)]
pub struct NewFinding {
    pub title: String,
    pub finding_type: FindingType,
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub evidence: Option<Evidence>,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub effort: Effort,
    pub confidence: f64,
    pub discovered_by: String,
    pub discovered_during: Option<String>,
    pub session_id: Option<String>,
    pub eval_result: Option<String>,
    pub ado_work_item: Option<String>,
    pub related_to: Vec<String>,
    pub blocks: Vec<String>,
    pub blocked_by: Vec<String>,
    pub parent: Option<String>,
}

impl NewFinding {
    /// Starts a finding with the given title and default attributes.
    pub fn new(title: impl Into<String>) -> Self {
        let defaults = Finding::default();
        Self {
            title: title.into(),
            finding_type: defaults.finding_type,
            severity: defaults.severity,
            category: defaults.category,
            description: String::new(),
            evidence: None,
            tags: Vec::new(),
            priority: defaults.priority,
            effort: defaults.effort,
            confidence: defaults.confidence,
            discovered_by: defaults.discovered_by,
            discovered_during: None,
            session_id: None,
            eval_result: None,
            ado_work_item: None,
            related_to: Vec::new(),
            blocks: Vec::new(),
            blocked_by: Vec::new(),
            parent: None,
        }
    }

    pub fn finding_type(mut self, finding_type: FindingType) -> Self {
        self.finding_type = finding_type;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = (!evidence.is_empty()).then_some(evidence);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn blocked_by(mut self, id: impl Into<String>) -> Self {
        self.blocked_by.push(id.into());
        self
    }
}

/// Typed field updates for [`crate::FindingsStore::update_finding`].
///
/// Only `Some` fields are applied. Deserializing from a JSON object ignores
/// unknown keys, which is how the CLI accepts free-form updates.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FindingPatch {
    pub title: Option<String>,
    pub finding_type: Option<FindingType>,
    pub category: Option<String>,
    pub severity: Option<Severity>,
    pub description: Option<String>,
    pub evidence: Option<Evidence>,
    pub discovered_by: Option<String>,
    pub discovered_during: Option<String>,
    pub session_id: Option<String>,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub related_to: Option<Vec<String>>,
    pub blocks: Option<Vec<String>>,
    pub blocked_by: Option<Vec<String>>,
    pub parent: Option<String>,
    pub ado_work_item: Option<String>,
    pub eval_result: Option<String>,
    pub status: Option<Status>,
    pub resolution: Option<String>,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<Priority>,
    pub effort: Option<Effort>,
    pub confidence: Option<f64>,
}

impl FindingPatch {
    /// Parses a JSON object of field updates; unknown keys are dropped.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Writes every present field into `finding`.
    ///
    /// Does not touch `version` or `updated_at`; the store owns those.
    pub fn apply_to(self, finding: &mut Finding) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        set(&mut finding.title, self.title);
        set(&mut finding.finding_type, self.finding_type);
        set(&mut finding.category, self.category);
        set(&mut finding.severity, self.severity);
        set(&mut finding.description, self.description);
        set_opt(&mut finding.evidence, self.evidence);
        set(&mut finding.discovered_by, self.discovered_by);
        set_opt(&mut finding.discovered_during, self.discovered_during);
        set_opt(&mut finding.session_id, self.session_id);
        set_opt(&mut finding.branch, self.branch);
        set_opt(&mut finding.commit, self.commit);
        set(&mut finding.related_to, self.related_to);
        set(&mut finding.blocks, self.blocks);
        set(&mut finding.blocked_by, self.blocked_by);
        set_opt(&mut finding.parent, self.parent);
        set_opt(&mut finding.ado_work_item, self.ado_work_item);
        set_opt(&mut finding.eval_result, self.eval_result);
        set(&mut finding.status, self.status);
        set_opt(&mut finding.resolution, self.resolution);
        set_opt(&mut finding.resolved_at, self.resolved_at);
        set_opt(&mut finding.resolved_by, self.resolved_by);
        set(&mut finding.tags, self.tags);
        set(&mut finding.priority, self.priority);
        set(&mut finding.effort, self.effort);
        set(&mut finding.confidence, self.confidence.and_then(|c| checked_confidence(c).ok()));
    }
}

/// A finding as held by the cross-repository global store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalFinding {
    /// `g-` + 12 hex chars, derived from (source_repo, id, title).
    pub global_id: String,
    /// Id of the finding in its source repository.
    pub id: String,
    pub title: String,
    pub finding_type: FindingType,
    pub category: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub function_name: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub discovered_at: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,

    pub source_repo: String,
    pub source_repo_path: String,
    #[serde(default)]
    pub source_branch: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub synced_at: String,

    /// Global ids this record has been linked to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_findings: Vec<String>,

    /// Verbatim copy of the local record at sync time.
    #[serde(default)]
    pub original_data: serde_json::Value,
}

impl GlobalFinding {
    /// Flattens a local finding into its global projection.
    pub fn from_finding(
        finding: &Finding,
        global_id: String,
        source_repo: &str,
        source_repo_path: &str,
        visibility: Visibility,
        synced_at: String,
    ) -> Result<Self> {
        let evidence = finding.evidence.clone().unwrap_or_default();
        Ok(Self {
            global_id,
            id: finding.id.clone(),
            title: finding.title.clone(),
            finding_type: finding.finding_type,
            category: finding.category.clone(),
            severity: finding.severity,
            description: finding.description.clone(),
            file_path: evidence.file,
            line_number: evidence.line,
            function_name: evidence.function,
            status: finding.status,
            tags: finding.tags.clone(),
            priority: finding.priority,
            discovered_at: finding.discovered_at.clone(),
            created_at: finding.created_at.clone(),
            updated_at: finding.updated_at.clone(),
            source_repo: source_repo.to_string(),
            source_repo_path: source_repo_path.to_string(),
            source_branch: finding.branch.clone(),
            visibility,
            synced_at,
            linked_findings: Vec::new(),
            original_data: serde_json::to_value(finding)?,
        })
    }

    /// Case-insensitive substring match against title or description.
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
    }
}

/// Registry entry for a repository that pushes into the global store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub last_synced: Option<String>,
    #[serde(default)]
    pub finding_count: usize,
    pub registered_at: String,
}

/// Aggregate counts over a local store, recomputed on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindingStats {
    pub total: usize,
    pub ready: usize,
    pub blocked: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

/// Aggregate counts over the global store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    pub total: usize,
    pub repositories: usize,
    pub by_repo: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
}
