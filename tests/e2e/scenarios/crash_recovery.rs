use crate::harness::{Assertion, Scenario};

#[test]
fn test_torn_line_is_skipped_and_isolated() {
    Scenario::new("torn_line")
        .capture("a", "Deadlock in job scheduler")
        .torn_write("{\"id\": \"f-0bad\", \"title\": \"half writ")
        .crash()
        .restart()
        .assert_count(1)
        .assert(Assertion::CorruptLineCount(1))
        // The next append starts on a fresh line.
        .capture("b", "Unchecked array index")
        .assert_count(2)
        .assert_log_lines(3)
        .assert(Assertion::CorruptLineCount(1))
        .run()
        .unwrap();
}

#[test]
fn test_compaction_drops_torn_line() {
    Scenario::new("compaction_drops_torn_line")
        .capture("a", "Deadlock in job scheduler")
        .torn_write("{\"id\": \"f-0bad\"")
        .crash()
        .restart()
        .compact()
        .assert_log_lines(1)
        .assert(Assertion::CorruptLineCount(0))
        .assert_verify_clean()
        .run()
        .unwrap();
}

#[test]
fn test_deleted_index_is_rebuilt() {
    Scenario::new("deleted_index")
        .capture("a", "Deadlock in job scheduler")
        .capture("b", "Unchecked array index")
        .resolve("b", "Bounds check added")
        .crash()
        .delete_index()
        .restart()
        .assert(Assertion::IndexMissing)
        .assert_count(2)
        .assert(Assertion::IndexExists)
        .assert_version("b", 2)
        .assert_verify_clean()
        .run()
        .unwrap();
}

#[test]
fn test_corrupt_index_is_rebuilt() {
    Scenario::new("corrupt_index")
        .capture("a", "Deadlock in job scheduler")
        .crash()
        .corrupt_index()
        .restart()
        .assert(Assertion::VerifyNeedsRebuild)
        .assert_count(1)
        .assert_title("a", "Deadlock in job scheduler")
        .assert_verify_clean()
        .run()
        .unwrap();
}

#[test]
fn test_explicit_rebuild_matches_log() {
    Scenario::new("explicit_rebuild")
        .capture("a", "Deadlock in job scheduler")
        .retitle("a", "Deadlock in nightly job scheduler")
        .rebuild()
        .assert_title("a", "Deadlock in nightly job scheduler")
        .assert_version("a", 2)
        .assert_verify_clean()
        .run()
        .unwrap();
}
