//! Listing commands: open, ready, blocked and search.

use super::{parse_opt, print_finding_list, GlobalArgs};
use anyhow::Result;
use findings_core::{FindingQuery, FindingType, Severity, Status};

/// Flags accepted by `findings search`.
#[derive(Debug, Default)]
pub struct SearchArgs {
    pub text: Option<String>,
    pub status: Option<String>,
    pub finding_type: Option<String>,
    pub severity: Option<String>,
    pub category: Option<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

/// List open findings, newest first.
pub fn open(args: &GlobalArgs) -> Result<()> {
    let mut store = args.open_store()?;
    let findings = store.query_findings(&FindingQuery::with_status(Status::Open))?;
    print_finding_list(&findings, args.json)
}

/// List open findings that nothing blocks.
pub fn ready(args: &GlobalArgs) -> Result<()> {
    let mut store = args.open_store()?;
    let findings = store.get_ready_findings()?;
    print_finding_list(&findings, args.json)
}

/// List open findings waiting on others.
pub fn blocked(args: &GlobalArgs) -> Result<()> {
    let mut store = args.open_store()?;
    let findings = store.get_blocked_findings()?;
    print_finding_list(&findings, args.json)
}

/// Filtered search over every finding.
pub fn search(args: &GlobalArgs, search: SearchArgs) -> Result<()> {
    let query = FindingQuery {
        status: parse_opt::<Status>(search.status.as_deref())?,
        finding_type: parse_opt::<FindingType>(search.finding_type.as_deref())?,
        severity: parse_opt::<Severity>(search.severity.as_deref())?,
        category: search.category,
        branch: search.branch,
        tag: search.tag,
        search: search.text,
        limit: search.limit,
    };

    let mut store = args.open_store()?;
    let findings = store.query_findings(&query)?;
    print_finding_list(&findings, args.json)
}
