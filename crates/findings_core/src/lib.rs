//! Findings Core Library
//!
//! Persistent findings for coding agents, providing:
//! - An append-only JSONL log per repository as the source of truth
//! - A derived, self-healing index for every read
//! - Explicit compaction down to the latest snapshot per finding
//! - A cross-repository global store with deterministic ids and similarity search
//!
//! # Quick Start
//!
//! ```
//! use findings_core::{FindingsStore, NewFinding, Severity, Status, VcsContext};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let mut store = FindingsStore::open(tmp.path())
//!     .unwrap()
//!     .with_vcs_context(VcsContext::default());
//!
//! let id = store
//!     .create_finding(NewFinding::new("N+1 query in OrderService").severity(Severity::Medium))
//!     .unwrap();
//! assert!(id.starts_with("f-"));
//!
//! store.resolve_finding(&id, "fixed in abc123", "agent").unwrap();
//! let finding = store.get_finding(&id).unwrap().unwrap();
//! assert_eq!(finding.status, Status::Resolved);
//! assert_eq!(finding.version, 2);
//! ```
//!
//! # Global Store
//!
//! Findings are pushed into a second store shared by every repository. A
//! finding synced twice maps to the same global id:
//!
//! ```
//! use findings_core::{FindingsStore, GlobalStore, NewFinding, VcsContext};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let mut local = FindingsStore::open(tmp.path().join("api"))
//!     .unwrap()
//!     .with_vcs_context(VcsContext::default());
//! let mut global = GlobalStore::open(tmp.path().join("global")).unwrap();
//!
//! let id = local.create_finding(NewFinding::new("Slow query")).unwrap();
//! let finding = local.get_finding(&id).unwrap().unwrap();
//!
//! let first = global.sync_finding(&finding, "api", "/src/api").unwrap();
//! let second = global.sync_finding(&finding, "api", "/src/api").unwrap();
//! assert_eq!(first, second);
//! assert_eq!(global.get_statistics().unwrap().total, 1);
//! ```

mod atomic;
mod clock;
mod config;
mod error;
mod global;
mod index;
mod journal;
mod lock;
mod log;
mod record_id;
mod registry;
mod similarity;
mod store;
mod types;
mod vcs;
mod verify;

pub use atomic::{write_atomic, write_json_atomic};
pub use clock::TimeProvider;
pub use config::{
    GlobalConfig, PrivacyConfig, RepositoriesConfig, SimilarityConfig, SyncConfig,
    CONFIG_FILE_NAME,
};
pub use error::{FindingsError, Result};
pub use global::{
    default_global_dir, GlobalQuery, GlobalStore, SimilarFinding, SyncReport, GLOBAL_LOG,
};
pub use index::RecordIndex;
pub use journal::{Journal, RebuildReport, INDEX_FILE_NAME};
pub use lock::{LockGuard, LOCK_FILE_NAME};
pub use log::{latest_snapshots, CompactReport, LogRecord, RecordLog, Replay};
pub use record_id::{
    finding_id, global_id, is_finding_id, is_global_id, random_salt, FINDING_ID_PREFIX,
    GLOBAL_ID_PREFIX,
};
pub use registry::{RepoRegistry, REGISTRY_FILE_NAME};
pub use similarity::{jaccard, text_similarity, tokenize};
pub use store::{FindingQuery, FindingsStore, FINDINGS_DIR, FINDINGS_LOG};
pub use types::*;
pub use vcs::{remote_url, VcsContext, GIT_TIMEOUT};
pub use verify::{verify, VerifyReport};
