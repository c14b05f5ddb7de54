//! End-to-end pipeline tests against a real Postgres instance.
//!
//! These drive `process_extracted` with synthetic pages (no HTTP) and
//! `execute_scan` against a wiremock extraction service, asserting on run
//! rows, snapshot state, and ledger contents.

use serde_json::json;
use sqlx::PgPool;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use churnwatch_db::{ScanRunRow, TrackedTargetRow};
use churnwatch_engine::{process_extracted, RunError, RunOutcome, ScanSettings};
use churnwatch_extract::RawProfile;

const THRESHOLD: f64 = 0.80;

fn profile(identity: &str) -> RawProfile {
    RawProfile {
        identity: identity.to_string(),
        display_name: format!("Display {identity}"),
        bio: None,
        verified: false,
        followers_count: 100,
        following_count: 50,
        avatar_url: None,
        location: None,
    }
}

fn page(identities: &[&str]) -> Vec<RawProfile> {
    identities.iter().map(|id| profile(id)).collect()
}

async fn seed_target(pool: &PgPool, handle: &str) -> TrackedTargetRow {
    churnwatch_db::create_target(pool, handle, None, None)
        .await
        .expect("create_target")
}

/// Creates a run and advances it to `extracting`, the status
/// `process_extracted` expects.
async fn extracting_run(pool: &PgPool, target_id: i64) -> ScanRunRow {
    let run = churnwatch_db::create_scan_run(pool, target_id, "test")
        .await
        .expect("create_scan_run");
    churnwatch_db::start_extraction(pool, run.id)
        .await
        .expect("start_extraction");
    run
}

async fn run_pages(
    pool: &PgPool,
    target: &TrackedTargetRow,
    pages: Vec<Vec<RawProfile>>,
) -> Result<RunOutcome, RunError> {
    let run = extracting_run(pool, target.id).await;
    process_extracted(pool, target, &run, pages, THRESHOLD).await
}

// ---------------------------------------------------------------------------
// first run
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn first_run_imports_everyone_as_new_follows(pool: PgPool) {
    let target = seed_target(&pool, "first-run").await;

    let outcome = run_pages(&pool, &target, vec![page(&["a", "b", "c"])])
        .await
        .expect("first run");

    match outcome {
        RunOutcome::Completed {
            coverage,
            unfollows,
            new_follows,
            refollows,
        } => {
            assert!(coverage.trusted, "empty baseline must be trusted");
            assert_eq!((unfollows, new_follows, refollows), (0, 3, 0));
        }
        RunOutcome::UntrustedPartial { .. } => panic!("first run must not be untrusted"),
    }

    let active = churnwatch_db::list_active_identities(&pool, target.id)
        .await
        .expect("active");
    assert_eq!(active.len(), 3);

    let ledger = churnwatch_db::list_events_for_classification(&pool, target.id)
        .await
        .expect("ledger");
    assert_eq!(ledger.len(), 3);
    assert!(ledger.iter().all(|e| e.event_type == "new_follow"));
}

// ---------------------------------------------------------------------------
// churn cycle: {a,b,c} -> {b,c,d}, then a comes back
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn unfollow_then_return_is_refollow_not_new_follow(pool: PgPool) {
    let target = seed_target(&pool, "refollow-distinction").await;

    run_pages(&pool, &target, vec![page(&["a", "b", "c"])])
        .await
        .expect("run 1");

    // a disappears; d appears. 3 extracted vs 3 known → ratio 1.0, trusted.
    let outcome = run_pages(&pool, &target, vec![page(&["b", "c", "d"])])
        .await
        .expect("run 2");
    match outcome {
        RunOutcome::Completed {
            unfollows,
            new_follows,
            refollows,
            ..
        } => assert_eq!((unfollows, new_follows, refollows), (1, 1, 0)),
        RunOutcome::UntrustedPartial { .. } => panic!("ratio 1.0 must be trusted"),
    }

    let unfollowers = churnwatch_db::list_unfollowers(&pool, target.id, 10)
        .await
        .expect("unfollowers");
    assert_eq!(unfollowers.len(), 1);
    assert_eq!(unfollowers[0].identity_key, "a");

    // a reappears: must be a refollow, not a new follow.
    let outcome = run_pages(&pool, &target, vec![page(&["a", "b", "c", "d"])])
        .await
        .expect("run 3");
    match outcome {
        RunOutcome::Completed {
            unfollows,
            new_follows,
            refollows,
            ..
        } => assert_eq!((unfollows, new_follows, refollows), (0, 0, 1)),
        RunOutcome::UntrustedPartial { .. } => panic!("growth must be trusted"),
    }

    let ledger = churnwatch_db::list_events_for_classification(&pool, target.id)
        .await
        .expect("ledger");
    let refollow_events: Vec<_> = ledger
        .iter()
        .filter(|e| e.event_type == "refollow")
        .collect();
    assert_eq!(refollow_events.len(), 1);
    assert_eq!(refollow_events[0].identity_key, "a");

    // The record is active again with its unfollow cleared.
    let row = churnwatch_db::get_followers_by_keys(&pool, target.id, &["a".to_string()])
        .await
        .expect("fetch a")
        .remove(0);
    assert_eq!(row.status, "active");
    assert!(row.unfollowed_at.is_none());
}

// ---------------------------------------------------------------------------
// coverage gate
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn partial_extraction_skips_diff_and_mutates_nothing(pool: PgPool) {
    let target = seed_target(&pool, "partial-scan").await;

    let all: Vec<&str> = vec!["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
    run_pages(&pool, &target, vec![page(&all)])
        .await
        .expect("baseline run");

    // Only 7 of 10 retrieved: ratio 0.7 < 0.8 → untrusted.
    let outcome = run_pages(&pool, &target, vec![page(&all[..7])])
        .await
        .expect("partial run");

    match outcome {
        RunOutcome::UntrustedPartial { coverage } => {
            assert!(!coverage.trusted);
            assert!((coverage.ratio - 0.7).abs() < f64::EPSILON);
        }
        RunOutcome::Completed { .. } => panic!("partial scan must not be trusted"),
    }

    // No false unfollows: everyone is still active, ledger unchanged.
    let active = churnwatch_db::list_active_identities(&pool, target.id)
        .await
        .expect("active");
    assert_eq!(active.len(), 10);
    let ledger = churnwatch_db::list_events_for_classification(&pool, target.id)
        .await
        .expect("ledger");
    assert_eq!(ledger.len(), 10, "only the baseline import events");

    // The run row records the distrust for the reporting layer.
    let runs = churnwatch_db::list_scan_runs(&pool, Some(target.id), 1)
        .await
        .expect("runs");
    assert_eq!(runs[0].status, "completed");
    assert_eq!(runs[0].trusted, Some(false));

    // The skipped run did not advance the baseline pointer.
    let fetched = churnwatch_db::get_target_by_handle(&pool, "partial-scan")
        .await
        .expect("get")
        .expect("exists");
    assert_ne!(fetched.last_completed_run_id, Some(runs[0].id));
}

// ---------------------------------------------------------------------------
// replay / idempotence
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn rescanning_identical_state_emits_no_events(pool: PgPool) {
    let target = seed_target(&pool, "steady-state").await;

    run_pages(&pool, &target, vec![page(&["a", "b"])])
        .await
        .expect("run 1");
    let outcome = run_pages(&pool, &target, vec![page(&["a", "b"])])
        .await
        .expect("run 2");

    match outcome {
        RunOutcome::Completed {
            unfollows,
            new_follows,
            refollows,
            ..
        } => assert_eq!((unfollows, new_follows, refollows), (0, 0, 0)),
        RunOutcome::UntrustedPartial { .. } => panic!("full rescan must be trusted"),
    }

    let ledger = churnwatch_db::list_events_for_classification(&pool, target.id)
        .await
        .expect("ledger");
    assert_eq!(ledger.len(), 2, "no events beyond the initial import");
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_pages_within_a_run_are_folded(pool: PgPool) {
    let target = seed_target(&pool, "overlapping-pages").await;

    // Retry overlap: page 2 re-fetches "b".
    let outcome = run_pages(
        &pool,
        &target,
        vec![page(&["a", "b"]), page(&["b", "c"])],
    )
    .await
    .expect("run");

    match outcome {
        RunOutcome::Completed { new_follows, .. } => assert_eq!(new_follows, 3),
        RunOutcome::UntrustedPartial { .. } => panic!("first run must be trusted"),
    }

    let active = churnwatch_db::list_active_identities(&pool, target.id)
        .await
        .expect("active");
    assert_eq!(active.len(), 3);
}

// ---------------------------------------------------------------------------
// failure paths
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn zero_profiles_fails_the_run_without_mutation(pool: PgPool) {
    let target = seed_target(&pool, "empty-extraction").await;
    run_pages(&pool, &target, vec![page(&["a"])])
        .await
        .expect("baseline");

    let err = run_pages(&pool, &target, vec![vec![], vec![]])
        .await
        .expect_err("zero profiles must fail");
    assert!(matches!(err, RunError::EmptyExtraction { .. }));

    let runs = churnwatch_db::list_scan_runs(&pool, Some(target.id), 1)
        .await
        .expect("runs");
    assert_eq!(runs[0].status, "failed");

    // Baseline untouched: "a" was not mass-unfollowed.
    let active = churnwatch_db::list_active_identities(&pool, target.id)
        .await
        .expect("active");
    assert_eq!(active, vec!["a".to_string()]);
}

// ---------------------------------------------------------------------------
// execute_scan end to end (extraction service stubbed with wiremock)
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn execute_scan_drives_extraction_and_commit(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/targets/live-scan/followers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "profiles": [
                {"identity": "alpha", "displayName": "Alpha", "verified": false,
                 "followersCount": 10, "followingCount": 5},
                {"identity": "beta", "displayName": "Beta", "verified": true,
                 "followersCount": 20, "followingCount": 8}
            ],
            "nextCursor": null
        })))
        .mount(&server)
        .await;

    let target = seed_target(&pool, "live-scan").await;
    let client = churnwatch_extract::ExtractionClient::new(
        &server.uri(),
        None,
        5,
        "churnwatch-test/0.1",
        0,
        0,
    )
    .expect("client");
    let settings = ScanSettings {
        coverage_trust_threshold: THRESHOLD,
        page_size: 200,
        inter_request_delay_ms: 0,
    };

    let outcome = churnwatch_engine::execute_scan(&pool, &client, settings, &target, "test")
        .await
        .expect("scan");

    match outcome {
        RunOutcome::Completed { new_follows, .. } => assert_eq!(new_follows, 2),
        RunOutcome::UntrustedPartial { .. } => panic!("first scan must be trusted"),
    }

    let runs = churnwatch_db::list_scan_runs(&pool, Some(target.id), 1)
        .await
        .expect("runs");
    assert_eq!(runs[0].status, "completed");
    assert_eq!(runs[0].extracted_count, 2);
    assert_eq!(runs[0].trusted, Some(true));

    let fetched = churnwatch_db::get_target_by_handle(&pool, "live-scan")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(fetched.last_completed_run_id, Some(runs[0].id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn execute_scan_extraction_failure_marks_run_failed(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/targets/gone/followers"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let target = seed_target(&pool, "gone").await;
    let client = churnwatch_extract::ExtractionClient::new(
        &server.uri(),
        None,
        5,
        "churnwatch-test/0.1",
        0,
        0,
    )
    .expect("client");
    let settings = ScanSettings {
        coverage_trust_threshold: THRESHOLD,
        page_size: 200,
        inter_request_delay_ms: 0,
    };

    let err = churnwatch_engine::execute_scan(&pool, &client, settings, &target, "test")
        .await
        .expect_err("404 must fail the scan");
    assert!(matches!(err, RunError::Extract(_)));

    let runs = churnwatch_db::list_scan_runs(&pool, Some(target.id), 1)
        .await
        .expect("runs");
    assert_eq!(runs[0].status, "failed");
    assert!(runs[0].error_message.is_some());
}
