use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use findings_core::{FindingPatch, Priority, Severity, Status};
use std::time::Duration;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    steps: Vec<ScenarioStep>,
}

/// Options for a captured finding beyond its title.
#[derive(Debug, Clone)]
pub struct Capture {
    pub description: String,
    pub severity: Severity,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub blocked_by: Vec<String>,
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            description: String::new(),
            severity: Severity::Medium,
            priority: Priority::Medium,
            tags: Vec::new(),
            blocked_by: Vec::new(),
        }
    }
}

impl Capture {
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn blocked_by(mut self, alias: &str) -> Self {
        self.blocked_by.push(alias.to_string());
        self
    }
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    fn step(mut self, step: ScenarioStep) -> Self {
        self.steps.push(step);
        self
    }

    // ===== Repository selection =====

    /// Run the following steps against another repository of the workspace
    pub fn in_repo(self, name: &str) -> Self {
        self.step(ScenarioStep::UseRepo {
            name: name.to_string(),
        })
    }

    // ===== Local store actions =====

    /// Capture a finding with default options
    pub fn capture(self, alias: &str, title: &str) -> Self {
        self.capture_with(alias, title, Capture::default())
    }

    pub fn capture_with(self, alias: &str, title: &str, options: Capture) -> Self {
        self.step(ScenarioStep::Capture {
            alias: alias.to_string(),
            title: title.to_string(),
            description: options.description,
            severity: options.severity,
            priority: options.priority,
            tags: options.tags,
            blocked_by: options.blocked_by,
        })
    }

    pub fn update(self, alias: &str, patch: FindingPatch) -> Self {
        self.step(ScenarioStep::Update {
            alias: alias.to_string(),
            patch,
        })
    }

    pub fn set_status(self, alias: &str, status: Status) -> Self {
        self.update(
            alias,
            FindingPatch {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    pub fn retitle(self, alias: &str, title: &str) -> Self {
        self.update(
            alias,
            FindingPatch {
                title: Some(title.to_string()),
                ..Default::default()
            },
        )
    }

    pub fn resolve(self, alias: &str, resolution: &str) -> Self {
        self.step(ScenarioStep::Resolve {
            alias: alias.to_string(),
            resolution: resolution.to_string(),
        })
    }

    pub fn promote(self, alias: &str, work_item: &str) -> Self {
        self.step(ScenarioStep::Promote {
            alias: alias.to_string(),
            work_item: work_item.to_string(),
        })
    }

    pub fn compact(self) -> Self {
        self.step(ScenarioStep::Compact)
    }

    pub fn rebuild(self) -> Self {
        self.step(ScenarioStep::Rebuild)
    }

    pub fn reload(self) -> Self {
        self.step(ScenarioStep::Reload)
    }

    // ===== Global store actions =====

    /// Push every finding of the current repository under `repo_name`
    pub fn sync_as(self, repo_name: &str) -> Self {
        self.step(ScenarioStep::Sync {
            repo_name: repo_name.to_string(),
        })
    }

    pub fn link(self, a: &str, b: &str) -> Self {
        self.step(ScenarioStep::Link {
            a: a.to_string(),
            b: b.to_string(),
        })
    }

    /// Register the current repository by hand under `name`
    pub fn register_repo(self, name: &str) -> Self {
        self.step(ScenarioStep::RegisterRepo {
            name: name.to_string(),
        })
    }

    // ===== Time control =====

    pub fn wait(self, duration: Duration) -> Self {
        self.step(ScenarioStep::Wait { duration })
    }

    pub fn wait_hours(self, hours: u64) -> Self {
        self.wait(Duration::from_secs(hours * 3600))
    }

    // ===== Failure simulation =====

    /// Drop every store handle without shutdown
    pub fn crash(self) -> Self {
        self.step(ScenarioStep::Crash)
    }

    /// Allow handles to be reopened after a crash
    pub fn restart(self) -> Self {
        self.step(ScenarioStep::Restart)
    }

    /// Leave a partial line at the end of the log, as a writer killed mid-append would
    pub fn torn_write(self, fragment: &str) -> Self {
        self.step(ScenarioStep::TornWrite {
            fragment: fragment.to_string(),
        })
    }

    pub fn delete_index(self) -> Self {
        self.step(ScenarioStep::DeleteIndex)
    }

    pub fn corrupt_index(self) -> Self {
        self.step(ScenarioStep::CorruptIndex)
    }

    /// Retitle a finding through a second store handle
    pub fn foreign_retitle(self, alias: &str, title: &str) -> Self {
        self.step(ScenarioStep::ForeignAppend {
            alias: alias.to_string(),
            title: title.to_string(),
        })
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(self, assertion: Assertion) -> Self {
        self.step(ScenarioStep::Assert { assertion })
    }

    pub fn assert_count(self, count: usize) -> Self {
        self.assert(Assertion::FindingCount(count))
    }

    pub fn assert_status(self, alias: &str, status: Status) -> Self {
        self.assert(Assertion::StatusIs {
            alias: alias.to_string(),
            status,
        })
    }

    pub fn assert_version(self, alias: &str, version: u32) -> Self {
        self.assert(Assertion::VersionIs {
            alias: alias.to_string(),
            version,
        })
    }

    pub fn assert_title(self, alias: &str, title: &str) -> Self {
        self.assert(Assertion::TitleIs {
            alias: alias.to_string(),
            title: title.to_string(),
        })
    }

    pub fn assert_ready(self, aliases: &[&str]) -> Self {
        self.assert(Assertion::ReadyAre(to_strings(aliases)))
    }

    pub fn assert_blocked(self, aliases: &[&str]) -> Self {
        self.assert(Assertion::BlockedAre(to_strings(aliases)))
    }

    pub fn assert_log_lines(self, count: usize) -> Self {
        self.assert(Assertion::LogLineCount(count))
    }

    pub fn assert_verify_clean(self) -> Self {
        self.assert(Assertion::VerifyClean)
    }

    pub fn assert_global_count(self, count: usize) -> Self {
        self.assert(Assertion::GlobalCount(count))
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new() {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

fn to_strings(aliases: &[&str]) -> Vec<String> {
    aliases.iter().map(|a| a.to_string()).collect()
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
