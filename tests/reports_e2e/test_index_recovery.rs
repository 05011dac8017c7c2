//! E2E tests: view REST client against the mock view service, including
//! design document recovery and failure mapping.

use greenboard_lib::views::IndexSchema;
use std::sync::atomic::Ordering;

use super::mock_view_service::MockViewService;
use super::test_helpers::*;

/// (1) Reports served over HTTP match the in-memory backend.
#[actix_rt::test]
async fn test_reports_over_http() {
    let mock = MockViewService::start(IndexSchema::V2).await;
    mock.views().extend(standard_jobs());
    let views = couchbase_views(&mock.base_url, IndexSchema::V2);
    let app = create_test_app(aggregator(views, IndexSchema::V2, None), None).await;

    let (status, body) = get_json(&app, "/api/v1/jobs?build=2.0.0-100").await;
    assert_eq!(status, 200, "{:?}", body);
    assert_eq!(job_names(&body), vec!["A", "B"]);

    let (status, body) = get_json(&app, "/api/v1/timeline").await;
    assert_eq!(status, 200, "{:?}", body);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = get_json(&app, "/api/v1/missing_jobs?build=2.0.0-100").await;
    assert_eq!(job_names(&body), vec!["C"]);

    let (_, body) = get_json(&app, "/api/v1/breakdown?build=2.0.0").await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

/// (2) Every query asks for bounded staleness.
#[actix_rt::test]
async fn test_queries_use_update_after() {
    let mock = MockViewService::start(IndexSchema::V2).await;
    mock.views().extend(standard_jobs());
    let views = couchbase_views(&mock.base_url, IndexSchema::V2);
    let app = create_test_app(aggregator(views, IndexSchema::V2, None), None).await;

    get_json(&app, "/api/v1/timeline").await;
    get_json(&app, "/api/v1/breakdown?build=2.0.0").await;

    let queries = mock.recorded_queries();
    assert!(!queries.is_empty());
    for query in queries {
        assert!(query.contains("stale=update_after"), "{}", query);
    }
}

/// (3) A deleted design document is installed and the query retried once.
#[actix_rt::test]
async fn test_missing_design_doc_is_reinstalled() {
    let mock = MockViewService::start(IndexSchema::V2).await;
    mock.views().extend(standard_jobs());
    mock.views().remove_design_doc("jenkins");
    let views = couchbase_views(&mock.base_url, IndexSchema::V2);
    let app = create_test_app(aggregator(views, IndexSchema::V2, None), None).await;

    let (status, body) = get_json(&app, "/api/v1/jobs?build=2.0.0-100").await;

    assert_eq!(status, 200, "{:?}", body);
    assert_eq!(job_names(&body), vec!["A", "B"]);
    assert_eq!(mock.install_count(), 1);
    assert!(mock.views().is_installed("jenkins"));
}

/// (4) An index that stays missing after the install surfaces as 503.
#[actix_rt::test]
async fn test_index_still_missing_is_unavailable() {
    let mock = MockViewService::start(IndexSchema::V2).await;
    mock.state.index_broken.store(true, Ordering::SeqCst);
    let views = couchbase_views(&mock.base_url, IndexSchema::V2);
    let app = create_test_app(aggregator(views, IndexSchema::V2, None), None).await;

    let (status, body) = get_json(&app, "/api/v1/breakdown?build=2.0.0").await;

    assert_eq!(status, 503, "{:?}", body);
    assert_eq!(body["error"], "INDEX_UNAVAILABLE");
    // One install per failed attempt.
    assert_eq!(mock.install_count(), 2);
}

/// (5) Other view service errors surface as 502.
#[actix_rt::test]
async fn test_view_service_error_is_bad_gateway() {
    let mock = MockViewService::start(IndexSchema::V2).await;
    mock.state.failing.store(true, Ordering::SeqCst);
    let views = couchbase_views(&mock.base_url, IndexSchema::V2);
    let app = create_test_app(aggregator(views, IndexSchema::V2, None), None).await;

    let (status, body) = get_json(&app, "/api/v1/timeline").await;

    assert_eq!(status, 502, "{:?}", body);
    assert_eq!(body["error"], "VIEW_SERVICE_ERROR");
    assert_eq!(mock.install_count(), 0);
}

/// (6) An unreachable view service surfaces as 502.
#[actix_rt::test]
async fn test_unreachable_view_service() {
    let views = couchbase_views("http://127.0.0.1:9", IndexSchema::V2);
    let app = create_test_app(aggregator(views, IndexSchema::V2, None), None).await;

    let (status, body) = get_json(&app, "/api/v1/jobs?build=2.0.0-100").await;

    assert_eq!(status, 502, "{:?}", body);
    assert_eq!(body["error"], "VIEW_SERVICE_ERROR");
}

/// (7) The legacy index schema round-trips through the REST client.
#[actix_rt::test]
async fn test_legacy_index_over_http() {
    let mock = MockViewService::start(IndexSchema::V1).await;
    mock.views().extend(standard_jobs());
    mock.views().remove_design_doc("jenkins");
    let views = couchbase_views(&mock.base_url, IndexSchema::V1);
    let app = create_test_app(aggregator(views, IndexSchema::V1, None), None).await;

    let (status, body) = get_json(&app, "/api/v1/breakdown?build=2.0.0").await;

    assert_eq!(status, 200, "{:?}", body);
    assert_eq!(body[0]["Passed"], 13);
    assert_eq!(body[0]["Failed"], 2);
}
