//! Best-effort git context for new findings.
//!
//! Every query runs `git` with a bounded wait. Any failure, including a
//! missing git binary or a directory outside a work tree, yields `None`.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Upper bound on any single git invocation.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Branch and commit a finding was captured on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsContext {
    pub branch: Option<String>,
    pub commit: Option<String>,
}

impl VcsContext {
    /// Probes the work tree at `repo_root`.
    pub fn detect(repo_root: &Path) -> Self {
        Self {
            branch: git(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"]),
            commit: git(repo_root, &["rev-parse", "HEAD"]),
        }
    }

    /// Fixed context, for callers that already know it.
    pub fn fixed(branch: Option<String>, commit: Option<String>) -> Self {
        Self { branch, commit }
    }
}

/// URL of the `origin` remote, if any.
pub fn remote_url(repo_root: &Path) -> Option<String> {
    git(repo_root, &["remote", "get-url", "origin"])
}

/// Runs `git args` in `dir` and returns trimmed stdout on success.
fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let mut child = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| debug!(error = %e, "git not available"))
        .ok()?;

    let deadline = Instant::now() + GIT_TIMEOUT;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            Ok(None) => {
                debug!(?args, "git timed out");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Err(e) => {
                debug!(?args, error = %e, "git wait failed");
                return None;
            }
        }
    };

    if !status.success() {
        debug!(?args, ?status, "git exited with failure");
        return None;
    }

    let mut stdout = String::new();
    child.stdout.take()?.read_to_string(&mut stdout).ok()?;
    let value = stdout.trim();
    (!value.is_empty()).then(|| value.to_string())
}
