use crate::harness::{Assertion, Capture, Scenario};

#[test]
fn test_sync_is_idempotent_and_honors_privacy() {
    Scenario::new("sync_idempotent")
        .capture("timeout", "Missing timeout on HTTP client")
        .capture_with(
            "secret",
            "Hardcoded credentials in staging config",
            Capture::default().tag("private"),
        )
        .sync_as("service-a")
        .assert_global_count(1)
        .sync_as("service-a")
        .assert_global_count(1)
        .assert(Assertion::RepoRegistered {
            name: "service-a".into(),
            finding_count: 1,
        })
        .run()
        .unwrap();
}

#[test]
fn test_resync_after_retitle_keeps_global_id() {
    Scenario::new("resync_after_retitle")
        .capture("timeout", "Missing timeout on HTTP client")
        .sync_as("service-a")
        .retitle("timeout", "Missing timeout on outbound HTTP client")
        .sync_as("service-a")
        .assert_global_count(1)
        .assert(Assertion::GlobalTitleIs {
            alias: "timeout".into(),
            title: "Missing timeout on outbound HTTP client".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_cross_repo_similarity_and_links() {
    Scenario::new("cross_repo_similarity")
        .capture("pool-a", "Connection pool exhausted under load")
        .sync_as("service-a")
        .in_repo("service-b")
        .capture("pool-b", "Connection pool exhausted under heavy load")
        .capture("typo", "Typo in README")
        .sync_as("service-b")
        .assert_global_count(3)
        .assert(Assertion::GlobalRepoCount {
            repo: "service-b".into(),
            count: 2,
        })
        .assert(Assertion::SimilarTo {
            title: "Connection pool exhausted under load".into(),
            threshold: 0.8,
            aliases: vec!["pool-a".into(), "pool-b".into()],
        })
        .link("pool-a", "pool-b")
        .assert(Assertion::LinkedTo {
            alias: "pool-a".into(),
            other: "pool-b".into(),
        })
        .assert(Assertion::LinkedTo {
            alias: "pool-b".into(),
            other: "pool-a".into(),
        })
        // Re-syncing the source keeps the link.
        .in_repo("service-a")
        .retitle("pool-a", "Connection pool exhausted under burst load")
        .sync_as("service-a")
        .assert(Assertion::LinkedTo {
            alias: "pool-a".into(),
            other: "pool-b".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_manual_registration() {
    Scenario::new("manual_registration")
        .assert(Assertion::RepoNotRegistered {
            name: "tooling".into(),
        })
        .register_repo("tooling")
        .assert(Assertion::RepoRegistered {
            name: "tooling".into(),
            finding_count: 0,
        })
        .run()
        .unwrap();
}
