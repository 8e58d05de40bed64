//! `check` / Poller scenarios: absent version, unresolvable version, path filtering,
//! non-fast-forward recovery.

mod common;

use gitpool::backend::Backend;
use gitpool::config::Params;
use gitpool::{orchestrator, poller, Version};

async fn checked_backend(source: gitpool::SourceConfig) -> Backend {
    let mut backend = Backend::new(source).expect("backend construction");
    backend.setup().await.expect("setup succeeds");
    backend.reset().await.expect("reset succeeds");
    backend
}

#[tokio::test]
async fn check_with_absent_version_returns_only_tip() {
    let remote = common::seed_remote("my_pool", &["lock-a"]);
    let backend = checked_backend(common::source_config(&remote)).await;

    let versions = poller::check(backend.repo().unwrap(), &common::source_config(&remote), None)
        .await
        .expect("check succeeds");

    assert_eq!(versions.len(), 1);
}

#[tokio::test]
async fn check_with_unresolvable_version_behaves_like_absent() {
    let remote = common::seed_remote("my_pool", &["lock-a"]);
    let backend = checked_backend(common::source_config(&remote)).await;

    let bogus = Version::new("0000000000000000000000000000000000abcd");
    let versions = poller::check(
        backend.repo().unwrap(),
        &common::source_config(&remote),
        Some(&bogus),
    )
    .await
    .expect("check succeeds");

    assert_eq!(versions.len(), 1);
}

#[tokio::test]
async fn check_reports_claiming_commits_since_a_known_version() {
    let remote = common::seed_remote("my_pool", &["lock-a", "lock-b"]);

    let backend = checked_backend(common::source_config(&remote)).await;
    let initial = poller::check(backend.repo().unwrap(), &common::source_config(&remote), None)
        .await
        .expect("check succeeds");
    let since = initial.into_iter().next().expect("tip exists");

    orchestrator::acquire(common::source_config(&remote))
        .await
        .expect("acquire succeeds");

    let backend = checked_backend(common::source_config(&remote)).await;
    let versions = poller::check(
        backend.repo().unwrap(),
        &common::source_config(&remote),
        Some(&since),
    )
    .await
    .expect("check succeeds");

    assert_eq!(versions.len(), 1, "exactly one claiming commit landed");
}

#[tokio::test]
async fn check_path_filter_excludes_versions_outside_the_narrower_path() {
    let remote = common::seed_remote("my_pool", &["lock-a"]);

    let backend = checked_backend(common::source_config(&remote)).await;
    let initial = poller::check(backend.repo().unwrap(), &common::source_config(&remote), None)
        .await
        .expect("check succeeds");
    let since = initial.into_iter().next().expect("tip exists");

    orchestrator::acquire(common::source_config(&remote))
        .await
        .expect("acquire succeeds");

    let mut narrowed = common::source_config(&remote);
    narrowed.paths = Some("nonexistent-subpath".to_string());

    let backend = checked_backend(narrowed.clone()).await;
    let versions = poller::check(backend.repo().unwrap(), &narrowed, Some(&since))
        .await
        .expect("check succeeds");

    assert!(versions.is_empty(), "claim under a different subpath must be filtered out");
}

/// Scenario: two sibling pools share one remote branch. `paths` disambiguates between
/// them as a direct top-level prefix, not nested under `source.pool`.
#[tokio::test]
async fn paths_disambiguates_two_sibling_pools_sharing_one_branch() {
    let remote = common::seed_remote("my_pool", &["lock-a"]);
    common::add_sibling_pool(&remote, "my_other_pool", &["lock-x"]);

    let mut my_pool_source = common::source_config(&remote);
    my_pool_source.paths = Some("my_pool".to_string());

    // A distinct `pool` (so `acquire` mutates the right directory) but the *same*
    // branch/remote, checked instead through a `paths` filter rather than `pool`.
    let mut other_pool_acquire_source = common::source_config(&remote);
    other_pool_acquire_source.pool = "my_other_pool".to_string();

    let mut other_pool_check_source = common::source_config(&remote);
    other_pool_check_source.paths = Some("my_other_pool".to_string());

    let backend = checked_backend(my_pool_source.clone()).await;
    let baseline = poller::check(backend.repo().unwrap(), &my_pool_source, None)
        .await
        .expect("check succeeds");
    let since = baseline.into_iter().next().expect("tip exists");

    // Claim out of `my_other_pool`; `my_pool`'s filter must not see it.
    orchestrator::acquire(other_pool_acquire_source.clone())
        .await
        .expect("acquire succeeds");

    let backend = checked_backend(my_pool_source.clone()).await;
    let my_pool_versions = poller::check(backend.repo().unwrap(), &my_pool_source, Some(&since))
        .await
        .expect("check succeeds");
    assert!(
        my_pool_versions.is_empty(),
        "a claim scoped to my_other_pool must not surface under my_pool's filter"
    );

    let backend = checked_backend(other_pool_check_source.clone()).await;
    let other_pool_versions = poller::check(
        backend.repo().unwrap(),
        &other_pool_check_source,
        Some(&since),
    )
    .await
    .expect("check succeeds");
    assert_eq!(
        other_pool_versions.len(),
        1,
        "the claim scoped to my_other_pool must surface under its own filter"
    );
}

/// Scenario: a second client pushes a divergent commit on the same branch before this
/// client publishes. After `Backend::reset`, `check` must see only origin's tip, never
/// the abandoned local commit.
#[tokio::test]
async fn reset_recovers_from_a_non_fast_forward_divergence() {
    let remote = common::seed_remote("my_pool", &["lock-a"]);

    let mut backend = Backend::new(common::source_config(&remote)).expect("backend construction");
    backend.setup().await.expect("setup succeeds");
    backend.reset().await.expect("reset succeeds");

    // A concurrent client claims and publishes first, moving origin's tip.
    orchestrator::acquire(common::source_config(&remote))
        .await
        .expect("acquire succeeds");
    let origin_tip = common::read_remote_head(&remote);

    // This client's working copy still thinks the pre-claim commit is the tip; create a
    // local commit that diverges from what's now on origin.
    common::commit_local_divergence(&backend, "stale-local-only-commit");

    backend.reset().await.expect("reset recovers from divergence");

    let versions = poller::check(backend.repo().unwrap(), &common::source_config(&remote), None)
        .await
        .expect("check succeeds");

    assert_eq!(versions.len(), 1);
    assert_eq!(
        versions[0].git_ref, origin_tip,
        "after reset, check must report only origin's tip, not the abandoned local commit"
    );
}

#[tokio::test]
async fn remove_and_release_commits_are_not_reported_as_claiming() {
    let remote = common::seed_remote("my_pool", &["lock-a"]);

    let acquire_output = orchestrator::acquire(common::source_config(&remote))
        .await
        .expect("acquire succeeds");
    let name = acquire_output
        .metadata
        .iter()
        .find(|m| m.name == "lock_name")
        .unwrap()
        .value
        .clone();

    let backend = checked_backend(common::source_config(&remote)).await;
    let after_acquire = poller::check(backend.repo().unwrap(), &common::source_config(&remote), None)
        .await
        .expect("check succeeds");
    let since = after_acquire.into_iter().next().expect("tip exists");

    let scratch = tempfile::tempdir().unwrap();
    std::fs::write(scratch.path().join("name"), &name).unwrap();
    orchestrator::release(
        common::source_config(&remote),
        Params::Release {
            dir: scratch.path().to_path_buf(),
        },
    )
    .await
    .expect("release succeeds");

    let backend = checked_backend(common::source_config(&remote)).await;
    let versions = poller::check(
        backend.repo().unwrap(),
        &common::source_config(&remote),
        Some(&since),
    )
    .await
    .expect("check succeeds");

    assert!(versions.is_empty(), "an unclaiming commit is not a claiming commit");
}
