use crate::harness::{Assertion, Capture, Scenario};
use findings_core::{FindingPatch, Priority, Status};

#[test]
fn test_capture_update_resolve() {
    Scenario::new("capture_update_resolve")
        .capture("sqli", "SQL injection in login handler")
        .assert_version("sqli", 1)
        .assert_status("sqli", Status::Open)
        .set_status("sqli", Status::InProgress)
        .assert_version("sqli", 2)
        .resolve("sqli", "Switched to parameterized queries")
        .assert_status("sqli", Status::Resolved)
        .assert_version("sqli", 3)
        .assert_count(1)
        .assert_log_lines(3)
        .assert_verify_clean()
        .run()
        .unwrap();
}

#[test]
fn test_state_survives_restart() {
    Scenario::new("state_survives_restart")
        .capture("leak", "File handle leak in exporter")
        .retitle("leak", "File handle leak in CSV exporter")
        .crash()
        .restart()
        .assert_title("leak", "File handle leak in CSV exporter")
        .assert_version("leak", 2)
        .assert(Assertion::IndexExists)
        .run()
        .unwrap();
}

#[test]
fn test_ready_and_blocked_views() {
    Scenario::new("ready_and_blocked")
        .capture_with("schema", "Schema drift in orders", Capture::default().priority(Priority::High))
        .capture_with(
            "migrate",
            "Migrate orders table",
            Capture::default()
                .priority(Priority::Critical)
                .blocked_by("schema"),
        )
        .capture_with("docs", "Document the retry policy", Capture::default().priority(Priority::Low))
        .assert_ready(&["schema", "docs"])
        .assert_blocked(&["migrate"])
        // Resolving a blocker does not clear `blocked_by` on dependents.
        .resolve("schema", "Added migration guard")
        .assert_ready(&["docs"])
        .assert_blocked(&["migrate"])
        .update(
            "migrate",
            FindingPatch {
                blocked_by: Some(Vec::new()),
                ..Default::default()
            },
        )
        .assert_ready(&["migrate", "docs"])
        .assert_blocked(&[])
        .promote("docs", "AB#1234")
        .assert_status("docs", Status::Promoted)
        .assert_ready(&["migrate"])
        .run()
        .unwrap();
}

#[test]
fn test_search_is_newest_first() {
    Scenario::new("search_newest_first")
        .capture("stampede", "Cache stampede on cold start")
        .wait_hours(1)
        .capture("collision", "Cache key collision")
        .capture("unrelated", "Flaky integration test")
        .assert(Assertion::SearchReturns {
            text: "CACHE".into(),
            aliases: vec!["collision".into(), "stampede".into()],
        })
        .run()
        .unwrap();
}

#[test]
fn test_second_handle_sees_changes_after_reload() {
    Scenario::new("second_handle")
        .capture("slow", "Slow query")
        .foreign_retitle("slow", "Slow query in monthly report")
        // This handle still serves its last load.
        .assert_title("slow", "Slow query")
        .reload()
        .assert_title("slow", "Slow query in monthly report")
        .assert_version("slow", 2)
        .run()
        .unwrap();
}

#[test]
fn test_write_after_foreign_append_keeps_both_changes() {
    Scenario::new("write_after_foreign_append")
        .capture("slow", "Slow query")
        .foreign_retitle("slow", "Slow query in monthly report")
        .set_status("slow", Status::InProgress)
        .assert_version("slow", 3)
        .assert_title("slow", "Slow query in monthly report")
        .assert_status("slow", Status::InProgress)
        .assert_log_lines(3)
        .run()
        .unwrap();
}
