//! E2E tests: timeline and version set.

use greenboard_lib::views::{IndexSchema, JobDocument};

use super::test_helpers::*;

fn coverage_fixture() -> Vec<JobDocument> {
    let mut docs = Vec::new();
    for i in 0..10 {
        docs.push(JobDocument::new("5.0.0-1", "linux", "core", &format!("job-{:02}", i)));
    }
    for i in 0..7 {
        docs.push(
            JobDocument::new("5.0.0-2", "linux", "core", &format!("job-{:02}", i)).with_counts(4, 1),
        );
    }
    docs
}

/// (1) RelExecuted is the share of the version's distinct jobs that ran.
#[actix_rt::test]
async fn test_timeline_relative_executed() {
    let store = memory_store(IndexSchema::V2, coverage_fixture());
    let app = create_test_app(aggregator(store, IndexSchema::V2, None), None).await;

    let (status, body) = get_json(&app, "/api/v1/timeline").await;

    assert_eq!(status, 200, "{:?}", body);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0]["Version"], "5.0.0-1");
    assert_eq!(rows[0]["RelExecuted"], 100.0);

    let second = &rows[1];
    assert_eq!(second["Version"], "5.0.0-2");
    assert_eq!(second["AbsPassed"], 21);
    assert_eq!(second["AbsFailed"], 7);
    assert_eq!(second["RelPassed"], 75.0);
    assert_eq!(second["RelFailed"], 25.0);
    assert_eq!(second["RelExecuted"], 70.0);
}

/// (2) Legacy negated failures come back as positive magnitudes.
#[actix_rt::test]
async fn test_timeline_legacy_index() {
    let store = memory_store(IndexSchema::V1, coverage_fixture());
    let app = create_test_app(aggregator(store, IndexSchema::V1, None), None).await;

    let (_, body) = get_json(&app, "/api/v1/timeline").await;

    let second = &body[1];
    assert_eq!(second["AbsFailed"], 7);
    assert_eq!(second["RelFailed"], 25.0);
    assert_eq!(second["RelExecuted"], 70.0);
}

/// (3) Bounds select builds by key, inclusive on both ends.
#[actix_rt::test]
async fn test_timeline_bounds() {
    let store = memory_store(
        IndexSchema::V2,
        vec![
            JobDocument::new("1.0.0-1", "linux", "core", "A"),
            JobDocument::new("2.0.0-1", "linux", "core", "A"),
            JobDocument::new("2.0.0-2", "windows", "ui", "A"),
            JobDocument::new("3.0.0-1", "linux", "core", "A"),
        ],
    );
    let app = create_test_app(aggregator(store, IndexSchema::V2, None), None).await;

    let (_, body) = get_json(&app, "/api/v1/timeline?start_key=2.0.0-1&end_key=2.0.0-2").await;

    let builds: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["Version"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(builds, vec!["2.0.0-1", "2.0.0-2"]);

    let (_, versions) = get_json(&app, "/api/v1/versions").await;
    assert_eq!(versions, serde_json::json!({ "2.0.0": true }));
}

/// (4) Placeholder builds and versions not ending in a digit are dropped.
#[actix_rt::test]
async fn test_timeline_filters_builds() {
    let store = memory_store(
        IndexSchema::V2,
        vec![
            JobDocument::new("0.0.0-XXXX", "linux", "core", "A"),
            JobDocument::new("2.0.0-1", "linux", "core", "A"),
            JobDocument::new("sherlock-1", "linux", "core", "A"),
        ],
    );
    let app = create_test_app(aggregator(store, IndexSchema::V2, None), None).await;

    let (_, body) = get_json(&app, "/api/v1/timeline").await;

    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["Version"], "2.0.0-1");

    let (_, versions) = get_json(&app, "/api/v1/versions").await;
    assert_eq!(versions, serde_json::json!({ "2.0.0": true }));
}

/// (5) Repeating a timeline request returns the same rows.
#[actix_rt::test]
async fn test_timeline_idempotent() {
    let store = memory_store(IndexSchema::V2, coverage_fixture());
    let app = create_test_app(aggregator(store, IndexSchema::V2, None), None).await;

    let (_, first) = get_json(&app, "/api/v1/timeline").await;
    let (_, second) = get_json(&app, "/api/v1/timeline").await;

    assert_eq!(first, second);
}

/// (6) The version set starts empty and grows with timelines.
#[actix_rt::test]
async fn test_versions_grow_with_timelines() {
    let mut docs = coverage_fixture();
    docs.push(JobDocument::new("6.0.0-1", "linux", "core", "A"));
    let store = memory_store(IndexSchema::V2, docs);
    let app = create_test_app(aggregator(store, IndexSchema::V2, None), None).await;

    let (status, versions) = get_json(&app, "/api/v1/versions").await;
    assert_eq!(status, 200);
    assert_eq!(versions, serde_json::json!({}));

    get_json(&app, "/api/v1/timeline?start_key=5.0.0-1&end_key=5.0.0-2").await;
    let (_, versions) = get_json(&app, "/api/v1/versions").await;
    assert_eq!(versions, serde_json::json!({ "5.0.0": true }));

    get_json(&app, "/api/v1/timeline").await;
    let (_, versions) = get_json(&app, "/api/v1/versions").await;
    assert_eq!(versions, serde_json::json!({ "5.0.0": true, "6.0.0": true }));
}

/// (7) A build whose jobs recorded no tests still appears, at 0% passed.
#[actix_rt::test]
async fn test_timeline_keeps_zero_count_builds() {
    let store = memory_store(
        IndexSchema::V2,
        vec![
            JobDocument::new("2.0.0-1", "linux", "core", "A").with_counts(4, 1),
            JobDocument::new("2.0.0-1", "linux", "core", "B").with_counts(2, 0),
            JobDocument::new("2.0.0-2", "linux", "core", "A").with_counts(0, 0),
        ],
    );
    let app = create_test_app(aggregator(store, IndexSchema::V2, None), None).await;

    let (status, body) = get_json(&app, "/api/v1/timeline").await;

    assert_eq!(status, 200, "{:?}", body);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[1]["Version"], "2.0.0-2");
    assert_eq!(body[1]["AbsPassed"], 0);
    assert_eq!(body[1]["RelPassed"], 0.0);
    assert_eq!(body[1]["RelFailed"], 0.0);
    assert_eq!(body[1]["RelExecuted"], 50.0);
}
